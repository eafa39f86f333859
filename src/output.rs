use std::collections::BTreeMap;
use std::path::Path;

use approx::abs_diff_eq;
use nalgebra::DVector;
use serde::Serialize;
use tracing::debug;

use crate::error::ParseError;
use crate::fortran::{TextFile, parse_real};
use crate::model::ModelSpec;
use crate::runner::RunReport;

pub const T_LEVEL_OUT: &str = "T_LEVEL.OUT";
pub const NOD_INF_OUT: &str = "NOD_INF.OUT";
pub const OBS_NODE_OUT: &str = "OBS_NODE.OUT";
pub const ERROR_MSG: &str = "Error.msg";

// T_LEVEL.OUT column headers and the quantity names they are reported under
const QUANTITIES: [(&str, &str); 10] = [
    ("rTop", "Potential Surface Flux"),
    ("rRoot", "Potential Root Water Uptake"),
    ("vTop", "Actual Surface Flux"),
    ("vRoot", "Actual Root Water Uptake"),
    ("vBot", "Bottom Flux"),
    ("hTop", "Pressure head at the soil surface"),
    (
        "hRoot",
        "Mean value of the pressure head over the region for which Beta(n)>0",
    ),
    ("hBot", "Pressure head at the Bottom of the Soil Profile"),
    ("RunOff", "Surface runoff"),
    ("Volume", "Volume of water in the entire flow domain"),
];

/// Output files a successful run of `spec` must leave behind.
pub fn expected_outputs(spec: &ModelSpec) -> Vec<&'static str> {
    let mut files = vec![T_LEVEL_OUT, NOD_INF_OUT];
    if spec.profile().observation_nodes().next().is_some() {
        files.push(OBS_NODE_OUT);
    }
    files
}

/// How a simulation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    Success,
    SolverError,
    Timeout,
    OutputMissing,
    Cancelled,
}

/// Nodal values at one print time, read from `NOD_INF.OUT`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSnapshot {
    pub time: f64,
    pub depth: DVector<f64>,
    pub head: DVector<f64>,
    pub moisture: DVector<f64>,
    pub conductivity: DVector<f64>,
    pub flux: DVector<f64>,
}

impl ProfileSnapshot {
    /// Water stored in the column, integrating the moisture over depth with
    /// the trapezoidal rule.
    pub fn water_storage(&self) -> f64 {
        let n = self.depth.len();
        if n < 2 {
            return 0.0;
        }
        let thickness = self.depth.rows(0, n - 1) - self.depth.rows(1, n - 1);
        let mean = (self.moisture.rows(0, n - 1) + self.moisture.rows(1, n - 1)) * 0.5;
        thickness.dot(&mean)
    }
}

/// Time series recorded at one observation node, from `OBS_NODE.OUT`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObservationSeries {
    /// 1-based node number.
    pub node: usize,
    pub depth: f64,
    pub time: Vec<f64>,
    pub head: Vec<f64>,
    pub moisture: Vec<f64>,
    pub flux: Vec<f64>,
}

/// Everything parsed from one output directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationOutput {
    pub time_series: BTreeMap<String, Vec<(f64, f64)>>,
    pub profile_snapshots: Vec<ProfileSnapshot>,
    pub observations: Vec<ObservationSeries>,
}

/// Outcome of a simulation: the run status plus whatever output could be read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub status: ExitStatus,
    pub run: Option<RunReport>,
    pub time_series: BTreeMap<String, Vec<(f64, f64)>>,
    pub profile_snapshots: Vec<ProfileSnapshot>,
    pub observations: Vec<ObservationSeries>,
    pub diagnostic: Option<String>,
}

impl SimulationResult {
    pub(crate) fn from_run(run: RunReport) -> Self {
        SimulationResult {
            status: run.status,
            diagnostic: run.diagnostic.clone(),
            run: Some(run),
            time_series: BTreeMap::new(),
            profile_snapshots: Vec::new(),
            observations: Vec::new(),
        }
    }

    pub(crate) fn with_output(mut self, output: SimulationOutput) -> Self {
        self.time_series = output.time_series;
        self.profile_snapshots = output.profile_snapshots;
        self.observations = output.observations;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ExitStatus::Success
    }

    /// `(time, value)` pairs of a `T_LEVEL.OUT` quantity, e.g. `"Bottom Flux"`.
    pub fn series(&self, quantity: &str) -> Option<&[(f64, f64)]> {
        self.time_series.get(quantity).map(Vec::as_slice)
    }

    /// The snapshot printed closest to `time`.
    pub fn snapshot_at(&self, time: f64) -> Option<&ProfileSnapshot> {
        self.profile_snapshots
            .iter()
            .min_by(|a, b| (a.time - time).abs().total_cmp(&(b.time - time).abs()))
    }
}

/// Reads the solver's output files for a model.
pub struct OutputParser;

impl OutputParser {
    /// Parses `T_LEVEL.OUT`, `NOD_INF.OUT` and, when the profile has
    /// observation nodes, `OBS_NODE.OUT` from `directory`.
    pub fn parse(directory: &Path, spec: &ModelSpec) -> Result<SimulationOutput, ParseError> {
        let time_series = parse_t_level(&TextFile::read(&directory.join(T_LEVEL_OUT))?)?;
        let profile_snapshots = parse_nod_inf(&TextFile::read(&directory.join(NOD_INF_OUT))?, spec)?;
        let observations = if spec.profile().observation_nodes().next().is_some() {
            parse_obs_node(&TextFile::read(&directory.join(OBS_NODE_OUT))?, spec)?
        } else {
            Vec::new()
        };

        debug!(
            directory = %directory.display(),
            series = time_series.len(),
            snapshots = profile_snapshots.len(),
            observations = observations.len(),
            "parsed solver output"
        );
        Ok(SimulationOutput {
            time_series,
            profile_snapshots,
            observations,
        })
    }
}

fn quantity_name(column: &str) -> String {
    QUANTITIES
        .iter()
        .find(|(header, _)| *header == column)
        .map_or_else(|| column.to_string(), |(_, name)| name.to_string())
}

fn is_end(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("end")
}

// Reads whitespace separated rows of at least `width` reals, starting at
// `from`, until an `end` line; returns the rows and the index of that line.
fn read_rows(file: &TextFile, from: usize, width: usize) -> Result<(Vec<Vec<f64>>, usize), ParseError> {
    let mut rows = Vec::new();
    let mut index = from;
    loop {
        if index >= file.len() {
            return Err(file.truncated("missing 'end' marker"));
        }
        let line = file.line(index)?;
        if is_end(line) {
            return Ok((rows, index));
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if !tokens.is_empty() {
            if tokens.len() < width {
                return Err(file.malformed(
                    index,
                    format!("expected {width} values, found {}", tokens.len()),
                ));
            }
            let row = tokens
                .iter()
                .map(|t| parse_real(t).ok_or_else(|| file.malformed(index, format!("'{t}' is not a number"))))
                .collect::<Result<Vec<f64>, ParseError>>()?;
            rows.push(row);
        }
        index += 1;
    }
}

// Skips the bracketed units line that follows a column header, if present
fn first_data_line(file: &TextFile, header: usize) -> usize {
    match file.tokens(header + 1) {
        Ok(tokens) if tokens.first().is_some_and(|t| t.starts_with('[')) => header + 2,
        _ => header + 1,
    }
}

fn parse_t_level(file: &TextFile) -> Result<BTreeMap<String, Vec<(f64, f64)>>, ParseError> {
    let header = file.section(0, "Time")?;
    let columns = file.tokens(header)?;
    let (rows, _) = read_rows(file, first_data_line(file, header), columns.len())?;

    let mut series = BTreeMap::new();
    for (column, name) in columns.iter().enumerate().skip(1) {
        let values = rows.iter().map(|row| (row[0], row[column])).collect();
        series.insert(quantity_name(name), values);
    }
    Ok(series)
}

fn column_of(file: &TextFile, header: usize, columns: &[&str], name: &str) -> Result<usize, ParseError> {
    columns
        .iter()
        .position(|c| *c == name)
        .ok_or_else(|| file.malformed(header, format!("no '{name}' column")))
}

fn parse_nod_inf(file: &TextFile, spec: &ModelSpec) -> Result<Vec<ProfileSnapshot>, ParseError> {
    let nodes = spec.profile().len();
    let mut snapshots = Vec::new();
    let mut index = 0;

    while let Some(start) = file.find(index, "Time:") {
        let time = file.real(start, 1)?;
        let header = file
            .find(start + 1, "Node")
            .ok_or_else(|| file.truncated(format!("no node table after t = {time}")))?;
        let columns = file.tokens(header)?;
        let depth = column_of(file, header, &columns, "Depth")?;
        let head = column_of(file, header, &columns, "Head")?;
        let moisture = column_of(file, header, &columns, "Moisture")?;
        let k = column_of(file, header, &columns, "K")?;
        let flux = column_of(file, header, &columns, "Flux")?;

        let (rows, end) = read_rows(file, first_data_line(file, header), columns.len())?;
        if rows.len() != nodes {
            return Err(file.malformed(
                end,
                format!("t = {time}: expected {nodes} nodes, found {}", rows.len()),
            ));
        }
        let column = |c: usize| DVector::from_iterator(nodes, rows.iter().map(|row| row[c]));
        snapshots.push(ProfileSnapshot {
            time,
            depth: column(depth),
            head: column(head),
            moisture: column(moisture),
            conductivity: column(k),
            flux: column(flux),
        });
        index = end + 1;
    }

    // Print times are written with limited precision
    let time = spec.time();
    let tolerance = 1e-4 * (time.t_max() - time.t_init());
    for &print_time in time.print_times() {
        if !snapshots
            .iter()
            .any(|s| abs_diff_eq!(s.time, print_time, epsilon = tolerance))
        {
            return Err(ParseError::MissingPrintTime {
                path: file.path().to_path_buf(),
                time: print_time,
            });
        }
    }
    Ok(snapshots)
}

// Node numbers from a line such as `Node(   21)         Node(   41)`
fn node_numbers(line: &str) -> Option<Vec<usize>> {
    line.split("Node(")
        .skip(1)
        .map(|part| part.split(')').next()?.trim().parse().ok())
        .collect()
}

fn parse_obs_node(file: &TextFile, spec: &ModelSpec) -> Result<Vec<ObservationSeries>, ParseError> {
    let expected: Vec<(usize, f64)> = spec
        .profile()
        .observation_nodes()
        .map(|(number, node)| (number, node.depth))
        .collect();

    let label = file.section(0, "Node(")?;
    let numbers = node_numbers(file.line(label)?)
        .ok_or_else(|| file.malformed(label, "unreadable observation node numbers"))?;
    if numbers != expected.iter().map(|(n, _)| *n).collect::<Vec<_>>() {
        return Err(file.malformed(
            label,
            format!("observation nodes {numbers:?} do not match the profile"),
        ));
    }

    let header = file.section(label + 1, "time")?;
    let (rows, _) = read_rows(file, first_data_line(file, header), 1 + 3 * numbers.len())?;

    let series = expected
        .iter()
        .enumerate()
        .map(|(i, &(node, depth))| {
            let base = 1 + 3 * i;
            ObservationSeries {
                node,
                depth,
                time: rows.iter().map(|row| row[0]).collect(),
                head: rows.iter().map(|row| row[base]).collect(),
                moisture: rows.iter().map(|row| row[base + 1]).collect(),
                flux: rows.iter().map(|row| row[base + 2]).collect(),
            }
        })
        .collect();
    Ok(series)
}
