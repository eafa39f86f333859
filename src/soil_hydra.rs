use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ValidationError};
use crate::units::Units;

const TEXTURES: &str = include_str!("../soil_parameters.toml");

/// 1-based position of a material in the [`MaterialCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialId(pub u32);

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for MaterialId {
    fn default() -> Self {
        MaterialId(1)
    }
}

// Soil hydraulic parameters (van Genuchten-Mualem model)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    #[serde(alias = "theta_r")]
    pub thr: f64, // Residual water content [-]
    #[serde(alias = "theta_s")]
    pub ths: f64, // Saturated water content [-]
    pub alpha: f64, // van Genuchten parameter [1/L]
    pub n: f64,     // van Genuchten parameter [-]
    pub ks: f64,    // Saturated hydraulic conductivity [L/T]
    #[serde(default = "default_l")]
    pub l: f64, // Pore-connectivity exponent [-]
}

fn default_l() -> f64 {
    0.5
}

/// One point of the soil hydraulic property curves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HydraulicPoint {
    pub head: f64,
    pub theta: f64,
    pub k: f64,
    pub c: f64,
}

impl Material {
    pub fn new(thr: f64, ths: f64, alpha: f64, n: f64, ks: f64, l: f64) -> Self {
        Material {
            thr,
            ths,
            alpha,
            n,
            ks,
            l,
        }
    }

    /// Looks up a USDA textural class and converts it to `units`.
    ///
    /// The table is stored in cm and days; `alpha` and `ks` are rescaled.
    pub fn texture(name: &str, units: &Units) -> Result<Self, Error> {
        let table: BTreeMap<String, Material> = toml::from_str(TEXTURES)?;
        let key = name.trim().to_lowercase().replace(['_', '-'], " ");
        let base = table
            .get(&key)
            .ok_or_else(|| Error::UnknownTexture(name.to_string()))?;

        let length = units.length.in_cm();
        let time = units.time.in_days();
        Ok(Material {
            alpha: base.alpha * length,
            ks: base.ks * time / length,
            ..*base
        })
    }

    /// Checks every parameter against its physical range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let out_of_range = |name, value, expected| {
            Err(ValidationError::OutOfRange {
                name,
                value,
                expected,
            })
        };
        if !(self.ths.is_finite() && self.ths > 0.0 && self.ths <= 1.0) {
            return out_of_range("ths", self.ths, "0 < ths <= 1");
        }
        if !(self.thr.is_finite() && self.thr >= 0.0 && self.thr < self.ths) {
            return out_of_range("thr", self.thr, "0 <= thr < ths");
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return out_of_range("alpha", self.alpha, "alpha > 0");
        }
        if !(self.n.is_finite() && self.n > 1.0) {
            return out_of_range("n", self.n, "n > 1");
        }
        if !(self.ks.is_finite() && self.ks > 0.0) {
            return out_of_range("ks", self.ks, "ks > 0");
        }
        if !self.l.is_finite() {
            return out_of_range("l", self.l, "a finite value");
        }
        Ok(())
    }

    fn m(&self) -> f64 {
        1.0 - 1.0 / self.n
    }

    // Effective saturation as a function of pressure head
    pub fn effective_saturation(&self, h: f64) -> f64 {
        if h >= 0.0 {
            1.0
        } else {
            let ah = self.alpha * h.abs();
            (1.0 + ah.powf(self.n)).powf(-self.m())
        }
    }

    // Water content as a function of pressure head
    pub fn theta(&self, h: f64) -> f64 {
        self.thr + (self.ths - self.thr) * self.effective_saturation(h)
    }

    // Hydraulic conductivity as a function of pressure head
    pub fn k(&self, h: f64) -> f64 {
        if h >= 0.0 {
            self.ks
        } else {
            let m = self.m();
            let se = self.effective_saturation(h);
            self.ks * se.powf(self.l) * (1.0 - (1.0 - se.powf(1.0 / m)).powf(m)).powi(2)
        }
    }

    // Specific moisture capacity, C(h) = d(theta)/dh
    pub fn c(&self, h: f64) -> f64 {
        if h >= 0.0 {
            0.0
        } else {
            let m = self.m();
            let ah = self.alpha * h.abs();
            let denom = (1.0 + ah.powf(self.n)).powf(m + 1.0);
            self.alpha * (self.ths - self.thr) * m * self.n * ah.powf(self.n - 1.0) / denom
        }
    }

    /// Water retention and conductivity curves sampled at `heads`.
    pub fn hydraulic_curve(&self, heads: &[f64]) -> Vec<HydraulicPoint> {
        heads
            .iter()
            .map(|&head| HydraulicPoint {
                head,
                theta: self.theta(head),
                k: self.k(head),
                c: self.c(head),
            })
            .collect()
    }
}

/// Table of materials referenced by profile nodes.
///
/// The catalog only grows; ids are positions in insertion order, starting at 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialCatalog {
    materials: Vec<Material>,
}

impl MaterialCatalog {
    pub fn new() -> Self {
        MaterialCatalog::default()
    }

    pub fn add(&mut self, material: Material) -> Result<MaterialId, ValidationError> {
        material.validate()?;
        self.materials.push(material);
        Ok(MaterialId(self.materials.len() as u32))
    }

    pub fn add_texture(&mut self, name: &str, units: &Units) -> Result<MaterialId, Error> {
        let material = Material::texture(name, units)?;
        Ok(self.add(material)?)
    }

    pub fn get(&self, id: MaterialId) -> Result<&Material, Error> {
        (id.0 as usize)
            .checked_sub(1)
            .and_then(|i| self.materials.get(i))
            .ok_or(Error::NotFound(id))
    }

    pub fn contains(&self, id: MaterialId) -> bool {
        self.get(id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MaterialId, &Material)> {
        self.materials
            .iter()
            .enumerate()
            .map(|(i, m)| (MaterialId(i as u32 + 1), m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{LengthUnit, TimeUnit};
    use approx::assert_relative_eq;

    fn loam() -> Material {
        Material::new(0.078, 0.43, 0.036, 1.56, 24.96, 0.5)
    }

    #[test]
    fn add_accepts_loam() {
        let mut catalog = MaterialCatalog::new();
        let id = catalog.add(loam()).unwrap();
        assert_eq!(id, MaterialId(1));
        assert_eq!(catalog.get(id).unwrap(), &loam());
    }

    #[test]
    fn add_rejects_residual_above_saturated() {
        let mut catalog = MaterialCatalog::new();
        let bad = Material { thr: 0.5, ..loam() };
        let err = catalog.add(bad).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { name: "thr", .. }));
        assert!(catalog.is_empty());
    }

    #[test]
    fn add_rejects_each_bad_parameter() {
        let cases = [
            Material { ths: 1.2, ..loam() },
            Material { alpha: 0.0, ..loam() },
            Material { n: 1.0, ..loam() },
            Material { ks: -1.0, ..loam() },
            Material { l: f64::NAN, ..loam() },
        ];
        let mut catalog = MaterialCatalog::new();
        for material in cases {
            assert!(catalog.add(material).is_err());
        }
    }

    #[test]
    fn get_unknown_id_is_not_found() {
        let mut catalog = MaterialCatalog::new();
        catalog.add(loam()).unwrap();
        assert!(matches!(catalog.get(MaterialId(2)), Err(Error::NotFound(MaterialId(2)))));
        assert!(matches!(catalog.get(MaterialId(0)), Err(Error::NotFound(_))));
    }

    #[test]
    fn texture_matches_loam_in_cm_days() {
        let m = Material::texture("Loam", &Units::default()).unwrap();
        assert_eq!(m, loam());
    }

    #[test]
    fn texture_is_converted_to_model_units() {
        let units = Units {
            length: LengthUnit::M,
            time: TimeUnit::Hours,
            mass: "mmol".into(),
        };
        let m = Material::texture("silt_loam", &units).unwrap();
        assert_relative_eq!(m.alpha, 2.0, epsilon = 1e-12);
        assert_relative_eq!(m.ks, 10.8 / 100.0 / 24.0, epsilon = 1e-12);
        assert!(matches!(
            Material::texture("peat", &units),
            Err(Error::UnknownTexture(_))
        ));
    }

    #[test]
    fn hydraulic_functions_at_saturation_and_dry_end() {
        let m = loam();
        assert_relative_eq!(m.theta(0.0), m.ths);
        assert_relative_eq!(m.k(1.0), m.ks);
        assert_eq!(m.c(0.0), 0.0);

        let dry = m.theta(-15_000.0);
        assert!(dry > m.thr && dry < 0.15);
        assert!(m.k(-100.0) < m.k(-10.0));
        assert!(m.c(-100.0) > 0.0);
    }

    #[test]
    fn hydraulic_curve_samples_every_head() {
        let curve = loam().hydraulic_curve(&[-1000.0, -100.0, -10.0, 0.0]);
        assert_eq!(curve.len(), 4);
        assert!(curve.windows(2).all(|w| w[0].theta < w[1].theta));
    }
}
