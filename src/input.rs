// SELECTOR.IN, PROFILE.DAT and ATMOSPH.IN writers. Reals are written in their
// shortest round-trip form so read_input gives back the same values

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::boundary_cond::{BottomBoundary, TopBoundary};
use crate::error::Error;
use crate::model::ModelSpec;

pub const SELECTOR_IN: &str = "SELECTOR.IN";
pub const PROFILE_DAT: &str = "PROFILE.DAT";
pub const ATMOSPH_IN: &str = "ATMOSPH.IN";

const FILE_VERSION: &str = "Pcp_File_Version=4";
const PRINT_TIMES_PER_LINE: usize = 6;

/// Fixed array sizes compiled into the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverLimits {
    pub max_nodes: usize,
    pub max_materials: usize,
    pub max_observation_nodes: usize,
    pub max_print_times: usize,
}

impl Default for SolverLimits {
    fn default() -> Self {
        SolverLimits {
            max_nodes: 1001,
            max_materials: 20,
            max_observation_nodes: 10,
            max_print_times: 250,
        }
    }
}

/// Renders a [`ModelSpec`] into the solver's input files.
#[derive(Debug, Clone, Default)]
pub struct InputSerializer {
    limits: SolverLimits,
}

impl InputSerializer {
    pub fn new() -> Self {
        InputSerializer::default()
    }

    pub fn with_limits(limits: SolverLimits) -> Self {
        InputSerializer { limits }
    }

    /// Writes the full input file set into `directory`, creating it if needed.
    ///
    /// Each file is written to a temporary sibling first and renamed into
    /// place, so an interrupted earlier write never leaves a half-written file
    /// behind for the solver.
    pub fn write(&self, spec: &ModelSpec, directory: &Path) -> Result<Vec<PathBuf>, Error> {
        let files = self.render(spec)?;
        fs::create_dir_all(directory).map_err(|e| Error::io(directory, e))?;

        let mut written = Vec::with_capacity(files.len());
        for (name, contents) in files {
            let path = write_atomic(directory, name, &contents)?;
            debug!(path = %path.display(), bytes = contents.len(), "wrote input file");
            written.push(path);
        }
        info!(
            model = spec.name(),
            directory = %directory.display(),
            files = written.len(),
            "input files written"
        );
        Ok(written)
    }

    /// File names and contents, without touching the filesystem.
    pub fn render(&self, spec: &ModelSpec) -> Result<Vec<(&'static str, String)>, Error> {
        self.check_limits(spec)?;
        let mut files = vec![(SELECTOR_IN, selector(spec)), (PROFILE_DAT, profile(spec))];
        if let TopBoundary::Atmospheric { records, h_crit_s } = spec.boundary().top() {
            files.push((ATMOSPH_IN, atmosphere(records, *h_crit_s)));
        }
        Ok(files)
    }

    fn check_limits(&self, spec: &ModelSpec) -> Result<(), Error> {
        let checks = [
            ("nodes", spec.profile().len(), self.limits.max_nodes),
            ("materials", spec.materials().len(), self.limits.max_materials),
            (
                "observation nodes",
                spec.profile().observation_nodes().count(),
                self.limits.max_observation_nodes,
            ),
            (
                "print times",
                spec.time().print_times().len(),
                self.limits.max_print_times,
            ),
        ];
        for (what, count, limit) in checks {
            if count > limit {
                return Err(Error::Serialization(format!(
                    "{count} {what} exceed the solver limit of {limit}"
                )));
            }
        }
        Ok(())
    }
}

fn write_atomic(directory: &Path, name: &str, contents: &str) -> Result<PathBuf, Error> {
    let path = directory.join(name);
    let tmp = directory.join(format!(".{name}.tmp"));
    let mut file = File::create(&tmp).map_err(|e| Error::io(&tmp, e))?;
    file.write_all(contents.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| Error::io(&tmp, e))?;
    fs::rename(&tmp, &path).map_err(|e| Error::io(&path, e))?;
    Ok(path)
}

// Shortest text that parses back to the same value
pub(crate) fn fmt_real(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude == 0.0 {
        "0".to_string()
    } else if (1e-4..1e7).contains(&magnitude) {
        format!("{value}")
    } else {
        format!("{value:e}")
    }
}

fn real(value: f64) -> String {
    format!(" {:>12}", fmt_real(value))
}

fn flag(value: bool) -> &'static str {
    if value { "t" } else { "f" }
}

fn selector(spec: &ModelSpec) -> String {
    let units = spec.units();
    let bc = spec.boundary();
    let time = spec.time();
    let heading = if spec.description().trim().is_empty() {
        spec.name().to_string()
    } else {
        spec.description().replace(['\r', '\n'], " ")
    };

    let mut lines = vec![
        FILE_VERSION.to_string(),
        "*** BLOCK A: BASIC INFORMATION *****************************************".to_string(),
        "Heading".to_string(),
        heading,
        "LUnit  TUnit  MUnit  (indicated units are obligatory for all input data)".to_string(),
        units.length.code().to_string(),
        units.time.code().to_string(),
        units.mass.clone(),
        "lWat   lChem lTemp  lSink lRoot lShort lWDep lScreen lVariabBC lEquil lInverse".to_string(),
        format!(
            " t     f     f      f     f     {}      f     t       f         t       f",
            flag(spec.short_output())
        ),
        "lSnow  lHP1   lMeteo  lVapor lActiveU lFluxes lIrrig  lDummy  lDummy  lDummy".to_string(),
        " f     f      f       f      f        f       f       f       f       f".to_string(),
        "NMat    NLay  CosAlpha".to_string(),
        format!("{:>5}{:>8}{}", spec.materials().len(), 1, real(spec.cos_alpha())),
        "*** BLOCK B: WATER FLOW INFORMATION ************************************".to_string(),
        "MaxIt   TolTh   TolH       (maximum number of iterations and tolerances)".to_string(),
    ];

    let it = bc.iteration();
    lines.push(format!("{:>5}{}{}", it.max_iter, real(it.tol_th), real(it.tol_h)));

    lines.push("TopInf WLayer KodTop InitCond".to_string());
    lines.push(format!(
        " {}     f     {:>3}       f",
        flag(bc.top().is_time_variable()),
        bc.top().kod()
    ));

    let (free_drainage, seepage, h_seep) = match bc.bottom() {
        BottomBoundary::FreeDrainage => (true, false, 0.0),
        BottomBoundary::SeepageFace { h_seep } => (false, true, *h_seep),
        _ => (false, false, 0.0),
    };
    lines.push("BotInf qGWLF FreeD SeepF KodBot DrainF  hSeep".to_string());
    lines.push(format!(
        " f     f     {}     {}    {:>3}      f {}",
        flag(free_drainage),
        flag(seepage),
        bc.bottom().kod(),
        real(h_seep)
    ));

    let r_top = match bc.top() {
        TopBoundary::ConstantFlux { flux } => Some(*flux),
        _ => None,
    };
    let r_bot = match bc.bottom() {
        BottomBoundary::ConstantFlux { flux } => Some(*flux),
        _ => None,
    };
    if r_top.is_some() || r_bot.is_some() {
        lines.push("     rTop         rBot        rRoot".to_string());
        lines.push(format!(
            "{}{}{}",
            real(r_top.unwrap_or(0.0)),
            real(r_bot.unwrap_or(0.0)),
            real(0.0)
        ));
    }

    let table = bc.head_table();
    lines.push("    hTab1   hTabN".to_string());
    lines.push(format!("{}{}", real(table.ha), real(table.hb)));
    lines.push("    Model   Hysteresis".to_string());
    lines.push("      0          0".to_string());
    lines.push("   thr     ths    Alfa      n         Ks       l".to_string());
    for (_, m) in spec.materials().iter() {
        lines.push(format!(
            "{}{}{}{}{}{}",
            real(m.thr),
            real(m.ths),
            real(m.alpha),
            real(m.n),
            real(m.ks),
            real(m.l)
        ));
    }

    let control = time.step_control();
    let steps = time.print_steps();
    lines.push("*** BLOCK C: TIME INFORMATION ******************************************".to_string());
    lines.push("        dt       dtMin       dtMax     DMul    DMul2  ItMin ItMax  MPL".to_string());
    lines.push(format!(
        "{}{}{}{}{}{:>6}{:>6}{:>6}",
        real(time.dt_init()),
        real(time.dt_min()),
        real(time.dt_max()),
        real(control.dmul),
        real(control.dmul2),
        control.it_min,
        control.it_max,
        time.print_times().len()
    ));
    lines.push("      tInit        tMax".to_string());
    lines.push(format!("{}{}", real(time.t_init()), real(time.t_max())));
    lines.push("  lPrintD  nPrintSteps tPrintInterval lEnter".to_string());
    lines.push(format!(
        "     {}  {:>10} {}       f",
        flag(steps.at_interval),
        steps.n_print_steps,
        real(steps.t_print_interval)
    ));
    lines.push("TPrint(1),TPrint(2),...,TPrint(MPL)".to_string());
    for chunk in time.print_times().chunks(PRINT_TIMES_PER_LINE) {
        lines.push(chunk.iter().map(|&t| real(t)).collect());
    }
    lines.push("*** END OF INPUT FILE 'SELECTOR.IN' ************************************".to_string());

    lines.join("\n") + "\n"
}

fn profile(spec: &ModelSpec) -> String {
    let profile = spec.profile();
    let mut lines = vec![
        FILE_VERSION.to_string(),
        "    0".to_string(),
        format!(
            "{:>5}    0    0    1 x         h      Mat  Lay      Beta           Axz            Bxz            Dxz",
            profile.len()
        ),
    ];
    for (i, node) in profile.nodes().iter().enumerate() {
        lines.push(format!(
            "{:>5}{}{}{:>5}{:>5}{}{}{}{}",
            i + 1,
            real(node.depth),
            real(node.pressure_head),
            node.material.0,
            1,
            real(0.0),
            real(1.0),
            real(1.0),
            real(1.0)
        ));
    }
    let observations: Vec<usize> = profile.observation_nodes().map(|(i, _)| i).collect();
    lines.push(format!("{:>5}", observations.len()));
    if !observations.is_empty() {
        lines.push(observations.iter().map(|i| format!("{i:>5}")).collect());
    }
    lines.join("\n") + "\n"
}

fn atmosphere(records: &[crate::atmosphere::AtmosphericRecord], h_crit_s: f64) -> String {
    let mut lines = vec![
        FILE_VERSION.to_string(),
        "*** BLOCK I: ATMOSPHERIC INFORMATION  **********************************".to_string(),
        "   MaxAL                    (MaxAL = number of atmospheric data-records)".to_string(),
        format!("{:>5}", records.len()),
        " DailyVar  SinusVar  lLay  lBCCycles lInterc lDummy  lDummy  lDummy  lDummy  lDummy".to_string(),
        "       f       f       f       f       f       f       f       f       f       f".to_string(),
        " hCritS                 (max. allowed pressure head at the soil surface)".to_string(),
        real(h_crit_s),
        "       tAtm        Prec       rSoil       rRoot      hCritA          rB          hB          ht".to_string(),
    ];
    for r in records {
        lines.push(format!(
            "{}{}{}{}{}{}{}{}",
            real(r.time),
            real(r.precipitation),
            real(r.evaporation),
            real(r.transpiration),
            real(r.h_crit_a),
            real(0.0),
            real(0.0),
            real(0.0)
        ));
    }
    lines.push("end*** END OF INPUT FILE 'ATMOSPH.IN' **********************************".to_string());
    lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary_cond::BoundaryConditions;
    use crate::profile::ProfileBuilder;
    use crate::soil_hydra::Material;
    use crate::time_info::TimeConfig;

    fn spec(top: TopBoundary, surface: Option<f64>, observations: &[f64]) -> ModelSpec {
        let mut builder = ProfileBuilder::build(-100.0, 1.0, -100.0).unwrap();
        if let Some(head) = surface {
            builder.set_surface_head(head).unwrap();
        }
        builder.mark_observations(observations).unwrap();
        let profile = builder.finish();
        let boundary = BoundaryConditions::configure(top, BottomBoundary::FreeDrainage, &profile).unwrap();
        let print_times = TimeConfig::derive_print_schedule(0.0, 1.0, 12).unwrap();
        let mut ml = ModelSpec::builder("model");
        ml.description("Infiltration of Water into a Single-Layered Soil Profile");
        ml.materials_mut()
            .add(Material::new(0.078, 0.43, 0.036, 1.56, 24.96, 0.5))
            .unwrap();
        ml.profile(profile)
            .boundary(boundary)
            .time(TimeConfig::configure(0.0, 1.0, 0.001, 1e-5, 5.0, print_times).unwrap())
            .working_dir("unused");
        ml.validate().unwrap()
    }

    #[test]
    fn real_numbers_use_shortest_form() {
        assert_eq!(fmt_real(0.078), "0.078");
        assert_eq!(fmt_real(24.96), "24.96");
        assert_eq!(fmt_real(1e-6), "1e-6");
        assert_eq!(fmt_real(10000.0), "10000");
        assert_eq!(fmt_real(-100.0), "-100");
        assert_eq!(fmt_real(0.0), "0");
        assert_eq!(fmt_real(1.0 / 12.0).parse::<f64>().unwrap(), 1.0 / 12.0);
    }

    #[test]
    fn selector_encodes_constant_head_and_free_drainage() {
        let files = InputSerializer::new()
            .render(&spec(TopBoundary::ConstantHead { head: 1.0 }, Some(1.0), &[]))
            .unwrap();
        assert_eq!(files.len(), 2);
        let selector = &files[0].1;
        let lines: Vec<&str> = selector.lines().collect();
        assert_eq!(lines[0], "Pcp_File_Version=4");
        assert_eq!(lines[3], "Infiltration of Water into a Single-Layered Soil Profile");
        assert_eq!(&lines[5..8], &["cm", "days", "mmol"]);

        let top = lines.iter().position(|l| l.starts_with("TopInf")).unwrap();
        assert_eq!(lines[top + 1].split_whitespace().collect::<Vec<_>>(), ["f", "f", "1", "f"]);
        let bot = lines.iter().position(|l| l.starts_with("BotInf")).unwrap();
        assert_eq!(
            lines[bot + 1].split_whitespace().collect::<Vec<_>>(),
            ["f", "f", "t", "f", "-1", "f", "0"]
        );
        assert!(!selector.contains("rTop"));
        let material = lines.iter().position(|l| l.trim_start().starts_with("thr")).unwrap();
        assert_eq!(
            lines[material + 1].split_whitespace().collect::<Vec<_>>(),
            ["0.078", "0.43", "0.036", "1.56", "24.96", "0.5"]
        );
        let tprint = lines.iter().position(|l| l.starts_with("TPrint")).unwrap();
        assert_eq!(lines[tprint + 1].split_whitespace().count(), 6);
        assert_eq!(lines[tprint + 2].split_whitespace().last(), Some("1"));
        assert!(lines[tprint + 3].starts_with("*** END OF INPUT FILE"));
    }

    #[test]
    fn constant_flux_top_writes_flux_line() {
        let files = InputSerializer::new()
            .render(&spec(TopBoundary::ConstantFlux { flux: -0.5 }, None, &[]))
            .unwrap();
        let lines: Vec<&str> = files[0].1.lines().collect();
        let r = lines.iter().position(|l| l.trim_start().starts_with("rTop")).unwrap();
        assert_eq!(lines[r + 1].split_whitespace().collect::<Vec<_>>(), ["-0.5", "0", "0"]);
    }

    #[test]
    fn profile_lists_nodes_and_observations() {
        let files = InputSerializer::new()
            .render(&spec(
                TopBoundary::ConstantHead { head: 1.0 },
                Some(1.0),
                &[-20.0, -40.0, -60.0, -80.0, -100.0],
            ))
            .unwrap();
        let lines: Vec<&str> = files[1].1.lines().collect();
        assert_eq!(lines[2].split_whitespace().next(), Some("101"));
        assert_eq!(
            lines[3].split_whitespace().collect::<Vec<_>>(),
            ["1", "0", "1", "1", "1", "0", "1", "1", "1"]
        );
        assert_eq!(lines[104].trim(), "5");
        assert_eq!(
            lines[105].split_whitespace().collect::<Vec<_>>(),
            ["21", "41", "61", "81", "101"]
        );
    }

    #[test]
    fn limits_are_enforced() {
        let limits = SolverLimits {
            max_nodes: 50,
            ..Default::default()
        };
        let err = InputSerializer::with_limits(limits)
            .render(&spec(TopBoundary::ConstantHead { head: 1.0 }, Some(1.0), &[]))
            .unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn write_creates_directory_and_replaces_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("example_1");
        let serializer = InputSerializer::new();
        let spec = spec(TopBoundary::ConstantHead { head: 1.0 }, Some(1.0), &[]);

        fs::create_dir_all(&target).unwrap();
        fs::write(target.join(SELECTOR_IN), "partial").unwrap();
        let written = serializer.write(&spec, &target).unwrap();
        assert_eq!(written.len(), 2);
        let selector = fs::read_to_string(target.join(SELECTOR_IN)).unwrap();
        assert!(selector.starts_with(FILE_VERSION));
        assert!(!target.join(format!(".{SELECTOR_IN}.tmp")).exists());
    }
}
