use std::path::Path;

use tracing::debug;

use crate::atmosphere::AtmosphericRecord;
use crate::boundary_cond::{BottomBoundary, BoundaryConditions, HeadTable, IterationCriteria, TopBoundary};
use crate::error::{Error, ParseError};
use crate::fortran::TextFile;
use crate::input::{ATMOSPH_IN, PROFILE_DAT, SELECTOR_IN};
use crate::model::ModelBuilder;
use crate::profile::{Profile, ProfileNode};
use crate::soil_hydra::{Material, MaterialCatalog, MaterialId};
use crate::time_info::{PrintSteps, StepControl, TimeConfig};
use crate::units::{LengthUnit, TimeUnit, Units};

/// Model parts recovered from a directory of solver input files.
#[derive(Debug, Clone, PartialEq)]
pub struct InputFiles {
    pub description: String,
    pub units: Units,
    pub short_output: bool,
    pub cos_alpha: f64,
    pub materials: MaterialCatalog,
    pub profile: Profile,
    pub boundary: BoundaryConditions,
    pub time: TimeConfig,
}

impl InputFiles {
    /// A builder holding every recovered part, working in `directory`.
    pub fn into_builder(self, name: impl Into<String>, directory: &Path) -> ModelBuilder {
        let mut ml = ModelBuilder::new(name);
        ml.description(self.description)
            .units(self.units)
            .short_output(self.short_output)
            .cos_alpha(self.cos_alpha)
            .materials(self.materials)
            .profile(self.profile)
            .boundary(self.boundary)
            .time(self.time)
            .working_dir(directory);
        ml
    }
}

// Settings read from SELECTOR.IN before the profile is known
struct Selector {
    description: String,
    units: Units,
    short_output: bool,
    cos_alpha: f64,
    materials: MaterialCatalog,
    iteration: IterationCriteria,
    head_table: HeadTable,
    top_variable: bool,
    kod_top: i64,
    free_drainage: bool,
    seepage: bool,
    kod_bot: i64,
    h_seep: f64,
    r_top: f64,
    r_bot: f64,
    time: TimeConfig,
}

/// Reads `SELECTOR.IN`, `PROFILE.DAT` and, when the top boundary is
/// time-variable, `ATMOSPH.IN` from `directory`.
///
/// Dirichlet boundary values are recovered from the initial pressure heads of
/// the first and last node.
pub fn read_input(directory: &Path) -> Result<InputFiles, Error> {
    let selector = read_selector(&TextFile::read(&directory.join(SELECTOR_IN))?)?;
    let profile = read_profile(&TextFile::read(&directory.join(PROFILE_DAT))?)?;

    let top = if selector.top_variable {
        let (records, h_crit_s) = read_atmosphere(&TextFile::read(&directory.join(ATMOSPH_IN))?)?;
        TopBoundary::Atmospheric { records, h_crit_s }
    } else if selector.kod_top > 0 {
        TopBoundary::ConstantHead {
            head: profile.surface().pressure_head,
        }
    } else {
        TopBoundary::ConstantFlux { flux: selector.r_top }
    };
    let bottom = if selector.free_drainage {
        BottomBoundary::FreeDrainage
    } else if selector.seepage {
        BottomBoundary::SeepageFace {
            h_seep: selector.h_seep,
        }
    } else if selector.kod_bot > 0 {
        BottomBoundary::ConstantHead {
            head: profile.bottom().pressure_head,
        }
    } else {
        BottomBoundary::ConstantFlux { flux: selector.r_bot }
    };
    let boundary = BoundaryConditions::configure(top, bottom, &profile)?
        .with_iteration(selector.iteration)
        .with_head_table(selector.head_table);

    debug!(directory = %directory.display(), nodes = profile.len(), "read input files");
    Ok(InputFiles {
        description: selector.description,
        units: selector.units,
        short_output: selector.short_output,
        cos_alpha: selector.cos_alpha,
        materials: selector.materials,
        profile,
        boundary,
        time: selector.time,
    })
}

fn read_selector(file: &TextFile) -> Result<Selector, Error> {
    let heading = file.section(0, "Heading")?;
    // Labels are only searched below the free-text heading
    let body = heading + 2;
    let description = file.line(heading + 1)?.trim().to_string();

    let lunit = file.section(body, "LUnit")?;
    let length = LengthUnit::from_code(file.line(lunit + 1)?)
        .ok_or_else(|| file.malformed(lunit + 1, "unknown length unit"))?;
    let time_unit = TimeUnit::from_code(file.line(lunit + 2)?)
        .ok_or_else(|| file.malformed(lunit + 2, "unknown time unit"))?;
    let mass = file.line(lunit + 3)?.trim().to_string();

    let lwat = file.section(body, "lWat")?;
    let short_output = file.flag(lwat + 1, 5)?;

    let nmat = file.section(body, "NMat")?;
    let n_materials = file.integer(nmat + 1, 0)?;
    let cos_alpha = file.real(nmat + 1, 2)?;

    let maxit = file.section(body, "MaxIt")?;
    let max_iter = u32::try_from(file.integer(maxit + 1, 0)?)
        .map_err(|_| file.malformed(maxit + 1, "MaxIt must be non-negative"))?;
    let iteration = IterationCriteria::new(max_iter, file.real(maxit + 1, 1)?, file.real(maxit + 1, 2)?)?;

    let top = file.section(body, "TopInf")?;
    let top_variable = file.flag(top + 1, 0)?;
    let kod_top = file.integer(top + 1, 2)?;

    let bot = file.section(body, "BotInf")?;
    let free_drainage = file.flag(bot + 1, 2)?;
    let seepage = file.flag(bot + 1, 3)?;
    let kod_bot = file.integer(bot + 1, 4)?;
    let h_seep = file.real(bot + 1, 6)?;

    let (r_top, r_bot) = match file.find(bot + 2, "rTop") {
        Some(r) => (file.real(r + 1, 0)?, file.real(r + 1, 1)?),
        None => (0.0, 0.0),
    };

    let htab = file.section(body, "hTab1")?;
    let head_table = HeadTable::new(file.real(htab + 1, 0)?, file.real(htab + 1, 1)?)?;

    let thr = file.section(body, "thr")?;
    let mut materials = MaterialCatalog::new();
    for i in 0..n_materials.max(0) as usize {
        let line = thr + 1 + i;
        let material = Material::new(
            file.real(line, 0)?,
            file.real(line, 1)?,
            file.real(line, 2)?,
            file.real(line, 3)?,
            file.real(line, 4)?,
            file.real(line, 5)?,
        );
        materials.add(material)?;
    }

    let dt = file.section(body, "dt")?;
    let control = StepControl {
        dmul: file.real(dt + 1, 3)?,
        dmul2: file.real(dt + 1, 4)?,
        it_min: count(file, dt + 1, 5)?,
        it_max: count(file, dt + 1, 6)?,
    };
    let mpl = count(file, dt + 1, 7)? as usize;

    let tinit = file.section(body, "tInit")?;
    let lprint = file.section(body, "lPrintD")?;
    let print_steps = PrintSteps {
        at_interval: file.flag(lprint + 1, 0)?,
        n_print_steps: count(file, lprint + 1, 1)?,
        t_print_interval: file.real(lprint + 1, 2)?,
    };

    let tprint = file.section(body, "TPrint")?;
    let mut print_times = Vec::with_capacity(mpl);
    let mut line = tprint + 1;
    while print_times.len() < mpl {
        let tokens = file.tokens(line)?;
        if tokens.first().is_some_and(|t| t.starts_with("***")) {
            return Err(file.truncated(format!("expected {mpl} print times, found {}", print_times.len())).into());
        }
        for column in 0..tokens.len() {
            print_times.push(file.real(line, column)?);
        }
        line += 1;
    }

    let time = TimeConfig::configure(
        file.real(tinit + 1, 0)?,
        file.real(tinit + 1, 1)?,
        file.real(dt + 1, 0)?,
        file.real(dt + 1, 1)?,
        file.real(dt + 1, 2)?,
        print_times,
    )?
    .with_step_control(control)?
    .with_print_steps(print_steps)?;

    Ok(Selector {
        description,
        units: Units {
            length,
            time: time_unit,
            mass,
        },
        short_output,
        cos_alpha,
        materials,
        iteration,
        head_table,
        top_variable,
        kod_top,
        free_drainage,
        seepage,
        kod_bot,
        h_seep,
        r_top,
        r_bot,
        time,
    })
}

fn count(file: &TextFile, line: usize, column: usize) -> Result<u32, ParseError> {
    u32::try_from(file.integer(line, column)?)
        .map_err(|_| file.malformed(line, "expected a non-negative count"))
}

fn read_profile(file: &TextFile) -> Result<Profile, Error> {
    // Line 2 holds the number of fixed points, each on its own line
    let fixed = file.integer(1, 0)?.max(0) as usize;
    let header = 2 + fixed;
    let n = file.integer(header, 0)?.max(0) as usize;

    let mut nodes = Vec::with_capacity(n);
    for i in 0..n {
        let line = header + 1 + i;
        if file.integer(line, 0)? != (i + 1) as i64 {
            return Err(file.malformed(line, format!("expected node {}", i + 1)).into());
        }
        let material = u32::try_from(file.integer(line, 3)?)
            .map_err(|_| file.malformed(line, "material index must be positive"))?;
        nodes.push(ProfileNode {
            depth: file.real(line, 1)?,
            pressure_head: file.real(line, 2)?,
            material: MaterialId(material),
            is_observation: false,
        });
    }

    let obs_line = header + 1 + n;
    let n_obs = file.integer(obs_line, 0)?.max(0) as usize;
    let mut line = obs_line + 1;
    let mut marked = 0;
    while marked < n_obs {
        let tokens = file.tokens(line)?;
        for column in 0..tokens.len() {
            let number = file.integer(line, column)?;
            let node = usize::try_from(number - 1)
                .ok()
                .and_then(|i| nodes.get_mut(i))
                .ok_or_else(|| file.malformed(line, format!("observation node {number} does not exist")))?;
            node.is_observation = true;
            marked += 1;
        }
        line += 1;
    }

    Ok(Profile::from_nodes(nodes)?)
}

fn read_atmosphere(file: &TextFile) -> Result<(Vec<AtmosphericRecord>, f64), Error> {
    let maxal = file.section(0, "MaxAL")?;
    let n = file.integer(maxal + 1, 0)?.max(0) as usize;
    let hcrit = file.section(0, "hCritS")?;
    let h_crit_s = file.real(hcrit + 1, 0)?;
    let header = file.section(0, "tAtm")?;

    let mut records = Vec::with_capacity(n);
    for i in 0..n {
        let line = header + 1 + i;
        records.push(AtmosphericRecord {
            time: file.real(line, 0)?,
            precipitation: file.real(line, 1)?,
            evaporation: file.real(line, 2)?,
            transpiration: file.real(line, 3)?,
            h_crit_a: file.real(line, 4)?,
        });
    }
    Ok((records, h_crit_s))
}
