use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One line of the atmospheric boundary table; rates apply until `time`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtmosphericRecord {
    pub time: f64,          // End of the period [T]
    pub precipitation: f64, // Precipitation plus irrigation [L/T]
    pub evaporation: f64,   // Potential evaporation [L/T]
    #[serde(default)]
    pub transpiration: f64, // Potential transpiration [L/T]
    #[serde(default = "default_h_crit_a")]
    pub h_crit_a: f64, // Minimum allowed surface pressure head, absolute value [L]
}

pub(crate) fn default_h_crit_a() -> f64 {
    100_000.0
}

pub(crate) fn validate_records(records: &[AtmosphericRecord]) -> Result<(), ValidationError> {
    let Some(first) = records.first() else {
        return Err(ValidationError::OutOfRange {
            name: "atmospheric records",
            value: 0.0,
            expected: "at least one record",
        });
    };
    if !first.time.is_finite() {
        return Err(ValidationError::AtmosphericTimesNotIncreasing {
            index: 0,
            time: first.time,
        });
    }
    for (index, pair) in records.windows(2).enumerate() {
        if !(pair[1].time.is_finite() && pair[1].time > pair[0].time) {
            return Err(ValidationError::AtmosphericTimesNotIncreasing {
                index: index + 1,
                time: pair[1].time,
            });
        }
    }
    for record in records {
        for (name, value) in [
            ("precipitation", record.precipitation),
            ("evaporation", record.evaporation),
            ("transpiration", record.transpiration),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ValidationError::OutOfRange {
                    name,
                    value,
                    expected: "a non-negative rate",
                });
            }
        }
        if !record.h_crit_a.is_finite() {
            return Err(ValidationError::OutOfRange {
                name: "h_crit_a",
                value: record.h_crit_a,
                expected: "a finite value",
            });
        }
    }
    Ok(())
}

// Per-period input data for rainfall, irrigation, evaporation and transpiration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyInputs {
    pub rainfall: Vec<f64>,      // Rainfall rates [L/T]
    #[serde(default)]
    pub irrigation: Vec<f64>,    // Irrigation rates [L/T]
    #[serde(default)]
    pub evaporation: Vec<f64>,   // Potential evaporation rates [L/T]
    #[serde(default)]
    pub transpiration: Vec<f64>, // Potential transpiration rates [L/T]
}

impl DailyInputs {
    // Get value for the given period, repeating the last value past the end
    fn get_daily_value(period: usize, values: &[f64]) -> f64 {
        values
            .get(period)
            .or_else(|| values.last())
            .copied()
            .unwrap_or(0.0)
    }

    fn periods(&self) -> usize {
        [
            self.rainfall.len(),
            self.irrigation.len(),
            self.evaporation.len(),
            self.transpiration.len(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// One record per period of length `period`, starting at `t_init`.
    pub fn to_records(&self, t_init: f64, period: f64) -> Vec<AtmosphericRecord> {
        (0..self.periods())
            .map(|i| AtmosphericRecord {
                time: t_init + (i + 1) as f64 * period,
                precipitation: Self::get_daily_value(i, &self.rainfall)
                    + Self::get_daily_value(i, &self.irrigation),
                evaporation: Self::get_daily_value(i, &self.evaporation),
                transpiration: Self::get_daily_value(i, &self.transpiration),
                h_crit_a: default_h_crit_a(),
            })
            .collect()
    }
}
