use std::fmt;

use serde::{Deserialize, Serialize};

/// Length unit used for every length-bearing input and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    Mm,
    Cm,
    M,
}

impl LengthUnit {
    pub fn code(self) -> &'static str {
        match self {
            LengthUnit::Mm => "mm",
            LengthUnit::Cm => "cm",
            LengthUnit::M => "m",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "mm" => Some(LengthUnit::Mm),
            "cm" => Some(LengthUnit::Cm),
            "m" => Some(LengthUnit::M),
            _ => None,
        }
    }

    // Size of one unit in centimetres
    pub(crate) fn in_cm(self) -> f64 {
        match self {
            LengthUnit::Mm => 0.1,
            LengthUnit::Cm => 1.0,
            LengthUnit::M => 100.0,
        }
    }
}

/// Time unit used for every time-bearing input and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Years,
}

impl TimeUnit {
    pub fn code(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "sec",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
            TimeUnit::Years => "years",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "sec" | "seconds" => Some(TimeUnit::Seconds),
            "min" | "minutes" => Some(TimeUnit::Minutes),
            "hours" => Some(TimeUnit::Hours),
            "days" => Some(TimeUnit::Days),
            "years" => Some(TimeUnit::Years),
            _ => None,
        }
    }

    // Size of one unit in days
    pub(crate) fn in_days(self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0 / 86_400.0,
            TimeUnit::Minutes => 1.0 / 1_440.0,
            TimeUnit::Hours => 1.0 / 24.0,
            TimeUnit::Days => 1.0,
            TimeUnit::Years => 365.0,
        }
    }
}

/// Mass, time and length units of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Units {
    pub length: LengthUnit,
    pub time: TimeUnit,
    #[serde(default = "default_mass")]
    pub mass: String,
}

fn default_mass() -> String {
    "mmol".to_string()
}

impl Default for Units {
    fn default() -> Self {
        Units {
            length: LengthUnit::Cm,
            time: TimeUnit::Days,
            mass: default_mass(),
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "L = {}, T = {}, M = {}",
            self.length.code(),
            self.time.code(),
            self.mass
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_read_back() {
        for unit in [LengthUnit::Mm, LengthUnit::Cm, LengthUnit::M] {
            assert_eq!(LengthUnit::from_code(unit.code()), Some(unit));
        }
        for unit in [
            TimeUnit::Seconds,
            TimeUnit::Minutes,
            TimeUnit::Hours,
            TimeUnit::Days,
            TimeUnit::Years,
        ] {
            assert_eq!(TimeUnit::from_code(unit.code()), Some(unit));
        }
        assert_eq!(LengthUnit::from_code("ft"), None);
    }
}
