use approx::relative_eq;
use serde::{Deserialize, Serialize};

use crate::atmosphere::{AtmosphericRecord, validate_records};
use crate::error::{ConflictError, Error, ValidationError};
use crate::profile::Profile;

// Top boundary condition types. Fluxes are positive upward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TopBoundary {
    ConstantHead {
        head: f64,
    },
    ConstantFlux {
        flux: f64,
    },
    Atmospheric {
        records: Vec<AtmosphericRecord>,
        #[serde(default)]
        h_crit_s: f64, // Maximum allowed surface pressure head [L]
    },
}

// Bottom boundary condition types. Fluxes are positive upward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BottomBoundary {
    FreeDrainage,
    ConstantHead { head: f64 },
    ConstantFlux { flux: f64 },
    SeepageFace { h_seep: f64 },
}

impl TopBoundary {
    pub fn mode(&self) -> &'static str {
        match self {
            TopBoundary::ConstantHead { .. } => "constant_head",
            TopBoundary::ConstantFlux { .. } => "constant_flux",
            TopBoundary::Atmospheric { .. } => "atmospheric",
        }
    }

    // KodTop: +1 for a prescribed head, -1 for a prescribed flux
    pub(crate) fn kod(&self) -> i32 {
        match self {
            TopBoundary::ConstantHead { .. } => 1,
            _ => -1,
        }
    }

    pub(crate) fn is_time_variable(&self) -> bool {
        matches!(self, TopBoundary::Atmospheric { .. })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            TopBoundary::ConstantHead { head } => finite("top head", *head),
            TopBoundary::ConstantFlux { flux } => finite("top flux", *flux),
            TopBoundary::Atmospheric { records, h_crit_s } => {
                finite("h_crit_s", *h_crit_s)?;
                validate_records(records)
            }
        }
    }
}

impl BottomBoundary {
    pub fn mode(&self) -> &'static str {
        match self {
            BottomBoundary::FreeDrainage => "free_drainage",
            BottomBoundary::ConstantHead { .. } => "constant_head",
            BottomBoundary::ConstantFlux { .. } => "constant_flux",
            BottomBoundary::SeepageFace { .. } => "seepage_face",
        }
    }

    pub(crate) fn kod(&self) -> i32 {
        match self {
            BottomBoundary::ConstantHead { .. } => 1,
            _ => -1,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            BottomBoundary::FreeDrainage => Ok(()),
            BottomBoundary::ConstantHead { head } => finite("bottom head", *head),
            BottomBoundary::ConstantFlux { flux } => finite("bottom flux", *flux),
            BottomBoundary::SeepageFace { h_seep } => finite("h_seep", *h_seep),
        }
    }
}

/// Iteration criteria of the nonlinear solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationCriteria {
    pub max_iter: u32,
    pub tol_th: f64, // Water content tolerance [-]
    pub tol_h: f64,  // Pressure head tolerance [L]
}

impl IterationCriteria {
    pub fn new(max_iter: u32, tol_th: f64, tol_h: f64) -> Result<Self, ValidationError> {
        let criteria = IterationCriteria {
            max_iter,
            tol_th,
            tol_h,
        };
        criteria.validate()?;
        Ok(criteria)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_iter < 1 {
            return Err(ValidationError::OutOfRange {
                name: "max_iter",
                value: f64::from(self.max_iter),
                expected: "at least 1",
            });
        }
        positive("tol_th", self.tol_th)?;
        positive("tol_h", self.tol_h)
    }
}

impl Default for IterationCriteria {
    fn default() -> Self {
        IterationCriteria {
            max_iter: 10,
            tol_th: 0.001,
            tol_h: 1.0,
        }
    }
}

/// Interval of absolute pressure heads over which hydraulic functions are tabulated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadTable {
    pub ha: f64,
    pub hb: f64,
}

impl HeadTable {
    pub fn new(ha: f64, hb: f64) -> Result<Self, ValidationError> {
        positive("ha", ha)?;
        if !(hb.is_finite() && hb > ha) {
            return Err(ValidationError::OutOfRange {
                name: "hb",
                value: hb,
                expected: "hb > ha",
            });
        }
        Ok(HeadTable { ha, hb })
    }
}

impl Default for HeadTable {
    fn default() -> Self {
        HeadTable { ha: 1e-6, hb: 1e4 }
    }
}

// Boundary condition parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryConditions {
    top: TopBoundary,
    bottom: BottomBoundary,
    iteration: IterationCriteria,
    head_table: HeadTable,
}

impl BoundaryConditions {
    /// Validates both boundaries and checks them against the initial condition.
    ///
    /// Dirichlet boundary values are taken from the initial pressure heads of
    /// the first and last node, so a constant head boundary must agree with
    /// them, and a surface head override is only meaningful with a constant
    /// head top boundary.
    pub fn configure(top: TopBoundary, bottom: BottomBoundary, profile: &Profile) -> Result<Self, Error> {
        top.validate()?;
        bottom.validate()?;
        let bc = BoundaryConditions {
            top,
            bottom,
            iteration: IterationCriteria::default(),
            head_table: HeadTable::default(),
        };
        if let Some(conflict) = bc.conflicts_with(profile).into_iter().next() {
            return Err(conflict.into());
        }
        Ok(bc)
    }

    pub fn with_iteration(mut self, iteration: IterationCriteria) -> Self {
        self.iteration = iteration;
        self
    }

    pub fn with_head_table(mut self, head_table: HeadTable) -> Self {
        self.head_table = head_table;
        self
    }

    pub fn top(&self) -> &TopBoundary {
        &self.top
    }

    pub fn bottom(&self) -> &BottomBoundary {
        &self.bottom
    }

    pub fn iteration(&self) -> IterationCriteria {
        self.iteration
    }

    pub fn head_table(&self) -> HeadTable {
        self.head_table
    }

    pub(crate) fn validate(&self) -> Vec<ValidationError> {
        [
            self.top.validate(),
            self.bottom.validate(),
            self.iteration.validate(),
            HeadTable::new(self.head_table.ha, self.head_table.hb).map(|_| ()),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect()
    }

    pub(crate) fn conflicts_with(&self, profile: &Profile) -> Vec<ConflictError> {
        let mut conflicts = Vec::new();
        let surface = profile.surface().pressure_head;
        match (&self.top, profile.surface_head_override()) {
            (TopBoundary::ConstantHead { head }, _) => {
                if !same_head(*head, surface) {
                    conflicts.push(ConflictError::TopHeadMismatch {
                        boundary: *head,
                        surface,
                    });
                }
            }
            (top, Some(head)) => conflicts.push(ConflictError::SurfaceHeadWithoutConstantHead {
                head,
                top_mode: top.mode(),
            }),
            (_, None) => {}
        }
        if let BottomBoundary::ConstantHead { head } = self.bottom {
            let bottom = profile.bottom().pressure_head;
            if !same_head(head, bottom) {
                conflicts.push(ConflictError::BottomHeadMismatch {
                    boundary: head,
                    bottom,
                });
            }
        }
        conflicts
    }
}

fn same_head(a: f64, b: f64) -> bool {
    relative_eq!(a, b, epsilon = 1e-12, max_relative = 1e-12)
}

fn finite(name: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            name,
            value,
            expected: "a finite value",
        })
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            name,
            value,
            expected: "a positive value",
        })
    }
}
