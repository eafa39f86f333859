use serde::Serialize;

use crate::error::ValidationError;

/// Time window, step-size control and print schedule of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeConfig {
    t_init: f64,
    t_max: f64,
    dt_init: f64,
    dt_min: f64,
    dt_max: f64,
    print_times: Vec<f64>,
    step_control: StepControl,
    print_steps: PrintSteps,
}

/// Adaptive time step multipliers and the iteration counts that trigger them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, serde::Deserialize)]
pub struct StepControl {
    pub dmul: f64,  // Step increase factor when iterations < it_min
    pub dmul2: f64, // Step decrease factor when iterations > it_max
    pub it_min: u32,
    pub it_max: u32,
}

impl Default for StepControl {
    fn default() -> Self {
        StepControl {
            dmul: 1.3,
            dmul2: 0.7,
            it_min: 3,
            it_max: 7,
        }
    }
}

/// Regular printing of boundary information in addition to the print times.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, serde::Deserialize)]
pub struct PrintSteps {
    pub at_interval: bool,
    pub n_print_steps: u32,
    pub t_print_interval: f64,
}

impl Default for PrintSteps {
    fn default() -> Self {
        PrintSteps {
            at_interval: false,
            n_print_steps: 1,
            t_print_interval: 1.0,
        }
    }
}

impl TimeConfig {
    pub fn configure(
        t_init: f64,
        t_max: f64,
        dt_init: f64,
        dt_min: f64,
        dt_max: f64,
        print_times: Vec<f64>,
    ) -> Result<Self, ValidationError> {
        if !(t_init.is_finite() && t_max.is_finite() && t_init < t_max) {
            return Err(ValidationError::TimeWindow { t_init, t_max });
        }
        let steps_ok = dt_min.is_finite()
            && dt_max.is_finite()
            && dt_init.is_finite()
            && 0.0 < dt_min
            && dt_min <= dt_init
            && dt_init <= dt_max;
        if !steps_ok {
            return Err(ValidationError::TimeStepBounds {
                dt_init,
                dt_min,
                dt_max,
            });
        }
        check_print_times(&print_times, t_init, t_max)?;

        Ok(TimeConfig {
            t_init,
            t_max,
            dt_init,
            dt_min,
            dt_max,
            print_times,
            step_control: StepControl::default(),
            print_steps: PrintSteps::default(),
        })
    }

    /// `count` evenly spaced print times in `(t_init, t_max]`, the last one at `t_max`.
    pub fn derive_print_schedule(t_init: f64, t_max: f64, count: usize) -> Result<Vec<f64>, ValidationError> {
        if !(t_init.is_finite() && t_max.is_finite() && t_init < t_max) {
            return Err(ValidationError::TimeWindow { t_init, t_max });
        }
        if count == 0 {
            return Err(ValidationError::NoPrintTimes);
        }
        let step = (t_max - t_init) / count as f64;
        Ok((1..=count)
            .map(|i| if i == count { t_max } else { t_init + i as f64 * step })
            .collect())
    }

    pub fn with_step_control(mut self, control: StepControl) -> Result<Self, ValidationError> {
        if !(control.dmul.is_finite() && control.dmul >= 1.0) {
            return Err(ValidationError::OutOfRange {
                name: "dmul",
                value: control.dmul,
                expected: "dmul >= 1",
            });
        }
        if !(control.dmul2 > 0.0 && control.dmul2 <= 1.0) {
            return Err(ValidationError::OutOfRange {
                name: "dmul2",
                value: control.dmul2,
                expected: "0 < dmul2 <= 1",
            });
        }
        if control.it_min < 1 || control.it_min > control.it_max {
            return Err(ValidationError::OutOfRange {
                name: "it_min",
                value: f64::from(control.it_min),
                expected: "1 <= it_min <= it_max",
            });
        }
        self.step_control = control;
        Ok(self)
    }

    pub fn with_print_steps(mut self, steps: PrintSteps) -> Result<Self, ValidationError> {
        if steps.n_print_steps < 1 {
            return Err(ValidationError::OutOfRange {
                name: "n_print_steps",
                value: f64::from(steps.n_print_steps),
                expected: "at least 1",
            });
        }
        if !(steps.t_print_interval.is_finite() && steps.t_print_interval > 0.0) {
            return Err(ValidationError::OutOfRange {
                name: "t_print_interval",
                value: steps.t_print_interval,
                expected: "a positive interval",
            });
        }
        self.print_steps = steps;
        Ok(self)
    }

    pub fn t_init(&self) -> f64 {
        self.t_init
    }

    pub fn t_max(&self) -> f64 {
        self.t_max
    }

    pub fn dt_init(&self) -> f64 {
        self.dt_init
    }

    pub fn dt_min(&self) -> f64 {
        self.dt_min
    }

    pub fn dt_max(&self) -> f64 {
        self.dt_max
    }

    pub fn print_times(&self) -> &[f64] {
        &self.print_times
    }

    pub fn step_control(&self) -> StepControl {
        self.step_control
    }

    pub fn print_steps(&self) -> PrintSteps {
        self.print_steps
    }
}

fn check_print_times(times: &[f64], t_init: f64, t_max: f64) -> Result<(), ValidationError> {
    if times.is_empty() {
        return Err(ValidationError::NoPrintTimes);
    }
    for (index, &time) in times.iter().enumerate() {
        if !(time > t_init && time <= t_max) {
            return Err(ValidationError::PrintTimeOutsideWindow { time, t_init, t_max });
        }
        if index > 0 && time <= times[index - 1] {
            return Err(ValidationError::PrintTimesNotIncreasing { index, time });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn derive_print_schedule_ends_at_t_max() {
        let times = TimeConfig::derive_print_schedule(0.0, 1.0, 12).unwrap();
        assert_eq!(times.len(), 12);
        assert_relative_eq!(times[0], 1.0 / 12.0);
        assert_eq!(times[11], 1.0);
        assert!(times.windows(2).all(|w| w[0] < w[1]));
        assert!(TimeConfig::derive_print_schedule(0.0, 1.0, 0).is_err());
        assert!(TimeConfig::derive_print_schedule(1.0, 1.0, 3).is_err());
    }

    #[test]
    fn configure_accepts_ordered_bounds() {
        let grid = [1e-5, 1e-3, 5.0];
        for &dt_min in &grid {
            for &dt_init in &grid {
                for &dt_max in &grid {
                    let result = TimeConfig::configure(0.0, 1.0, dt_init, dt_min, dt_max, vec![0.5, 1.0]);
                    let ordered = dt_min <= dt_init && dt_init <= dt_max;
                    assert_eq!(result.is_ok(), ordered, "{dt_min} {dt_init} {dt_max}");
                    if !ordered {
                        assert!(matches!(result, Err(ValidationError::TimeStepBounds { .. })));
                    }
                }
            }
        }
    }

    #[test]
    fn configure_rejects_each_violation() {
        let ok = || vec![0.5, 1.0];
        assert!(matches!(
            TimeConfig::configure(1.0, 1.0, 0.001, 1e-5, 5.0, ok()),
            Err(ValidationError::TimeWindow { .. })
        ));
        assert!(matches!(
            TimeConfig::configure(0.0, 1.0, 0.001, 0.0, 5.0, ok()),
            Err(ValidationError::TimeStepBounds { .. })
        ));
        assert!(matches!(
            TimeConfig::configure(0.0, 1.0, 0.001, 1e-5, 5.0, vec![]),
            Err(ValidationError::NoPrintTimes)
        ));
        assert!(matches!(
            TimeConfig::configure(0.0, 1.0, 0.001, 1e-5, 5.0, vec![0.0, 1.0]),
            Err(ValidationError::PrintTimeOutsideWindow { .. })
        ));
        assert!(matches!(
            TimeConfig::configure(0.0, 1.0, 0.001, 1e-5, 5.0, vec![0.5, 1.5]),
            Err(ValidationError::PrintTimeOutsideWindow { .. })
        ));
        assert!(matches!(
            TimeConfig::configure(0.0, 1.0, 0.001, 1e-5, 5.0, vec![0.5, 0.5]),
            Err(ValidationError::PrintTimesNotIncreasing { index: 1, .. })
        ));
    }

    #[test]
    fn step_control_and_print_steps_are_checked() {
        let time = TimeConfig::configure(0.0, 1.0, 0.001, 1e-5, 5.0, vec![1.0]).unwrap();
        assert!(time.clone().with_step_control(StepControl { dmul: 0.5, ..Default::default() }).is_err());
        assert!(time.clone().with_step_control(StepControl { it_min: 9, ..Default::default() }).is_err());
        let time = time
            .with_print_steps(PrintSteps {
                at_interval: true,
                n_print_steps: 10,
                t_print_interval: 0.1,
            })
            .unwrap();
        assert_eq!(time.print_steps().n_print_steps, 10);
    }
}
