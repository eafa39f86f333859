//! Shell scripts standing in for the solver executable

use std::fmt::Write as _;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use soil_column::{ModelSpec, NOD_INF_OUT, OBS_NODE_OUT, T_LEVEL_OUT};

const T_LEVEL_COLUMNS: &str = "Time rTop rRoot vTop vRoot vBot sum(rTop) sum(rRoot) sum(vTop) sum(vRoot) \
                               sum(vBot) hTop hRoot hBot RunOff sum(RunOff) Volume sum(Infil) sum(Evap) TLevel \
                               Cum(WTrans) SnowLayer";

/// Writes an executable `/bin/sh` script named `name` into `dir`.
pub fn script_stub(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A solver that checks its invocation and copies the `.OUT` files found in
/// `fixtures` into its working directory.
pub fn copying_stub(dir: &Path, fixtures: &Path) -> PathBuf {
    let body = format!(
        "[ \"$2\" = \"-1\" ] || exit 2\n\
         [ -f SELECTOR.IN ] && [ -f PROFILE.DAT ] || exit 3\n\
         echo \"Welcome to HYDRUS-1D\"\n\
         cp \"{}\"/*.OUT \"$1\"/",
        fixtures.display()
    );
    script_stub(dir, "hydrus", &body)
}

/// Writes solver output for `spec` in the HYDRUS-1D layout: an infiltration
/// front moving down the column, printed at every print time.
pub fn write_fixture_outputs(spec: &ModelSpec, dir: &Path) {
    let profile = spec.profile();
    let times: Vec<f64> = spec.time().print_times().to_vec();
    let material = |id| *spec.materials().get(id).unwrap();
    let head_at = |depth: f64, time: f64| -> f64 {
        let front = -100.0 * time;
        if depth >= front { 1.0 + depth * 0.01 } else { profile.bottom().pressure_head }
    };

    let mut t_level = String::from(
        "******* Program HYDRUS\n******* \nWelcome to HYDRUS-1D\n\
         Units: L = cm   , T = days , M = mmol\n\n",
    );
    let columns: Vec<&str> = T_LEVEL_COLUMNS.split_whitespace().collect();
    writeln!(t_level, "       {}", columns.join("  ")).unwrap();
    writeln!(t_level, "        [T]         [L/T]        [L/T]        [L/T]\n").unwrap();
    for (step, &t) in times.iter().enumerate() {
        let mut row = format!("{t:12.4E}");
        for column in &columns[1..] {
            let value = match *column {
                "vBot" => -0.05 * t,
                "vTop" | "rTop" => -2.0 + t,
                "Volume" => 20.0 + 10.0 * t,
                "TLevel" => (step + 1) as f64,
                _ => 0.0,
            };
            write!(row, " {value:12.4E}").unwrap();
        }
        writeln!(t_level, "{row}").unwrap();
    }
    t_level.push_str("end\n");

    let mut nod_inf = String::from(" ******* Program HYDRUS\n Units: L = cm   , T = days , M = mmol\n\n");
    for &t in std::iter::once(&0.0).chain(times.iter()) {
        writeln!(nod_inf, " Time:    {t:10.4}\n\n").unwrap();
        nod_inf.push_str(
            " Node      Depth      Head Moisture       K          C         Flux        Sink         Kappa   v/KsTop   Temp\n",
        );
        nod_inf.push_str(
            "           [L]        [L]    [-]        [L/T]      [1/L]      [L/T]        [1/T]         [-]      [-]      [C]\n\n",
        );
        for (i, node) in profile.nodes().iter().enumerate() {
            let h = head_at(node.depth, t);
            let soil = material(node.material);
            writeln!(
                nod_inf,
                "{:4} {:10.4} {:11.3E} {:.4} {:11.4E} {:11.4E} {:11.4E} {:11.4E}  -1 {:11.4E} 20.00",
                i + 1,
                node.depth,
                h,
                soil.theta(h),
                soil.k(h),
                soil.c(h),
                -soil.k(h),
                0.0,
                0.0,
            )
            .unwrap();
        }
        nod_inf.push_str("end\n");
    }

    let observed: Vec<(usize, f64)> = profile
        .observation_nodes()
        .map(|(number, node)| (number, node.depth))
        .collect();
    let mut obs_node = String::from("\n\n Units: L = cm   , T = days , M = mmol\n\n");
    let labels: Vec<String> = observed.iter().map(|(n, _)| format!("Node({n:5})")).collect();
    writeln!(obs_node, "               {}\n", labels.join("                         ")).unwrap();
    let header = "        h        theta    Flux   ".repeat(observed.len());
    writeln!(obs_node, "       time {header}").unwrap();
    for &t in &times {
        let mut row = format!("{t:11.4}");
        for &(_, depth) in &observed {
            let h = head_at(depth, t);
            let soil = material(profile.bottom().material);
            write!(row, " {h:10.3} {:.4} {:11.4E}", soil.theta(h), -soil.k(h)).unwrap();
        }
        writeln!(obs_node, "{row}").unwrap();
    }
    obs_node.push_str("end\n");

    fs::write(dir.join(T_LEVEL_OUT), t_level).unwrap();
    fs::write(dir.join(NOD_INF_OUT), nod_inf).unwrap();
    fs::write(dir.join(OBS_NODE_OUT), obs_node).unwrap();
}
