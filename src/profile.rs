use serde::Serialize;

use crate::error::ValidationError;
use crate::soil_hydra::MaterialId;

// Observation depths closer than this to an existing node reuse that node
const OBSERVATION_SNAP: f64 = 1e-6;
const MAX_ELEMENTS: f64 = 1.0e6;

/// One node of the discretized soil column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfileNode {
    pub depth: f64,         // Vertical coordinate, 0 at the surface, negative below [L]
    pub pressure_head: f64, // Initial pressure head [L]
    pub material: MaterialId,
    pub is_observation: bool,
}

/// Ordered nodes from the surface down to the bottom of the column.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    nodes: Vec<ProfileNode>,
    surface_head_override: Option<f64>,
}

impl Profile {
    /// Builds a profile from explicit nodes, checking the ordering invariants.
    pub fn from_nodes(nodes: Vec<ProfileNode>) -> Result<Self, ValidationError> {
        check_depths(nodes.iter().map(|n| n.depth))?;
        for node in &nodes {
            check_head(node.pressure_head)?;
        }
        Ok(Profile {
            nodes,
            surface_head_override: None,
        })
    }

    pub fn nodes(&self) -> &[ProfileNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn surface(&self) -> &ProfileNode {
        &self.nodes[0]
    }

    pub fn bottom(&self) -> &ProfileNode {
        &self.nodes[self.nodes.len() - 1]
    }

    pub fn bottom_depth(&self) -> f64 {
        self.bottom().depth
    }

    /// Surface pressure head set through [`ProfileBuilder::set_surface_head`], if any.
    pub fn surface_head_override(&self) -> Option<f64> {
        self.surface_head_override
    }

    /// Observation nodes with their 1-based node numbers.
    pub fn observation_nodes(&self) -> impl Iterator<Item = (usize, &ProfileNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_observation)
            .map(|(i, n)| (i + 1, n))
    }
}

/// Incremental construction of a [`Profile`].
#[derive(Debug, Clone)]
pub struct ProfileBuilder {
    nodes: Vec<ProfileNode>,
    surface_head_override: Option<f64>,
}

impl ProfileBuilder {
    /// Evenly spaced nodes from the surface down to `bottom`, all at `initial_head`.
    ///
    /// When `spacing` does not divide the column, the last element is shortened
    /// so the bottom node sits exactly at `bottom`.
    pub fn build(bottom: f64, spacing: f64, initial_head: f64) -> Result<Self, ValidationError> {
        if !(bottom.is_finite() && bottom < 0.0) {
            return Err(ValidationError::OutOfRange {
                name: "bottom depth",
                value: bottom,
                expected: "a negative depth",
            });
        }
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(ValidationError::OutOfRange {
                name: "spacing",
                value: spacing,
                expected: "spacing > 0",
            });
        }
        check_head(initial_head)?;

        let steps = bottom.abs() / spacing;
        if steps > MAX_ELEMENTS {
            return Err(ValidationError::OutOfRange {
                name: "spacing",
                value: spacing,
                expected: "at most one million elements",
            });
        }
        // A column shallower than the rounding tolerance still has one element
        let elements = if (steps - steps.round()).abs() < 1e-9 {
            steps.round()
        } else {
            steps.ceil()
        } as usize;
        let elements = elements.max(1);

        let mut depths: Vec<f64> = (0..elements).map(|i| 0.0 - i as f64 * spacing).collect();
        depths.push(bottom);
        Self::from_depths(&depths, initial_head)
    }

    /// Nodes at explicit depths, which must start at 0 and decrease strictly.
    pub fn from_depths(depths: &[f64], initial_head: f64) -> Result<Self, ValidationError> {
        check_depths(depths.iter().copied())?;
        check_head(initial_head)?;
        let nodes = depths
            .iter()
            .map(|&depth| ProfileNode {
                depth,
                pressure_head: initial_head,
                material: MaterialId::default(),
                is_observation: false,
            })
            .collect();
        Ok(ProfileBuilder {
            nodes,
            surface_head_override: None,
        })
    }

    /// Overrides the pressure head of the surface node.
    pub fn set_surface_head(&mut self, head: f64) -> Result<&mut Self, ValidationError> {
        check_head(head)?;
        self.nodes[0].pressure_head = head;
        self.surface_head_override = Some(head);
        Ok(self)
    }

    /// Sets the material of every node with `bottom <= depth <= top`.
    pub fn assign_material(
        &mut self,
        top: f64,
        bottom: f64,
        material: MaterialId,
    ) -> Result<&mut Self, ValidationError> {
        if !(top.is_finite() && bottom.is_finite() && bottom <= top) {
            return Err(ValidationError::OutOfRange {
                name: "layer bottom",
                value: bottom,
                expected: "a depth at or below the layer top",
            });
        }
        for node in self
            .nodes
            .iter_mut()
            .filter(|n| n.depth <= top && n.depth >= bottom)
        {
            node.material = material;
        }
        Ok(self)
    }

    /// Flags the node at each depth as an observation node, inserting one when
    /// no node lies at that depth.
    ///
    /// Inserted nodes take the pressure head interpolated from their neighbours
    /// and the material of the node above. Nothing is changed if any depth is
    /// outside the column.
    pub fn mark_observations(&mut self, depths: &[f64]) -> Result<&mut Self, ValidationError> {
        let bottom = self.nodes[self.nodes.len() - 1].depth;
        if let Some(&depth) = depths
            .iter()
            .find(|&&d| !(d.is_finite() && d <= 0.0 && d >= bottom))
        {
            return Err(ValidationError::ObservationOutsideProfile { depth, bottom });
        }

        for &depth in depths {
            let index = match self
                .nodes
                .iter()
                .position(|n| (n.depth - depth).abs() <= OBSERVATION_SNAP)
            {
                Some(index) => index,
                None => self.insert_node(depth),
            };
            self.nodes[index].is_observation = true;
        }
        Ok(self)
    }

    // Insert a node strictly between two existing ones and return its index
    fn insert_node(&mut self, depth: f64) -> usize {
        let index = self
            .nodes
            .iter()
            .position(|n| n.depth < depth)
            .unwrap_or(self.nodes.len() - 1);
        let above = self.nodes[index - 1];
        let below = self.nodes[index];
        let w = (above.depth - depth) / (above.depth - below.depth);
        self.nodes.insert(
            index,
            ProfileNode {
                depth,
                pressure_head: above.pressure_head + w * (below.pressure_head - above.pressure_head),
                material: above.material,
                is_observation: false,
            },
        );
        index
    }

    pub fn finish(self) -> Profile {
        Profile {
            nodes: self.nodes,
            surface_head_override: self.surface_head_override,
        }
    }
}

fn check_head(head: f64) -> Result<(), ValidationError> {
    if head.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            name: "pressure head",
            value: head,
            expected: "a finite value",
        })
    }
}

fn check_depths(depths: impl Iterator<Item = f64>) -> Result<(), ValidationError> {
    let mut count = 0;
    let mut previous = f64::NAN;
    for (index, depth) in depths.enumerate() {
        if index == 0 {
            if depth != 0.0 {
                return Err(ValidationError::OutOfRange {
                    name: "surface depth",
                    value: depth,
                    expected: "0",
                });
            }
        } else if !(depth.is_finite() && depth < previous) {
            return Err(ValidationError::NotStrictlyDecreasing {
                index,
                depth,
                previous,
            });
        }
        previous = depth;
        count += 1;
    }
    if count < 2 {
        return Err(ValidationError::TooFewNodes(count));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn build_spans_surface_to_bottom() {
        let profile = ProfileBuilder::build(-100.0, 1.0, -100.0).unwrap().finish();
        assert_eq!(profile.len(), 101);
        assert_eq!(profile.surface().depth, 0.0);
        assert_eq!(profile.bottom_depth(), -100.0);
        assert!(profile.nodes().windows(2).all(|w| w[1].depth < w[0].depth));
        assert!(profile.nodes().iter().all(|n| n.pressure_head == -100.0));
    }

    #[test]
    fn build_keeps_very_shallow_column() {
        let profile = ProfileBuilder::build(-1e-12, 1.0, -10.0).unwrap().finish();
        assert_eq!(profile.len(), 2);
        assert_eq!(profile.surface().depth, 0.0);
        assert_eq!(profile.bottom_depth(), -1e-12);
    }

    #[test]
    fn build_shortens_last_element() {
        let profile = ProfileBuilder::build(-10.0, 3.0, -50.0).unwrap().finish();
        let depths: Vec<f64> = profile.nodes().iter().map(|n| n.depth).collect();
        assert_eq!(depths, vec![0.0, -3.0, -6.0, -9.0, -10.0]);
    }

    #[test]
    fn build_keeps_two_nodes_for_coarse_spacing() {
        let profile = ProfileBuilder::build(-5.0, 50.0, -1.0).unwrap().finish();
        assert_eq!(profile.len(), 2);
    }

    #[test]
    fn build_rejects_bad_geometry() {
        assert!(ProfileBuilder::build(0.0, 1.0, -100.0).is_err());
        assert!(ProfileBuilder::build(10.0, 1.0, -100.0).is_err());
        assert!(ProfileBuilder::build(-100.0, 0.0, -100.0).is_err());
        assert!(ProfileBuilder::build(-100.0, -1.0, -100.0).is_err());
        assert!(ProfileBuilder::build(-100.0, 1.0, f64::NAN).is_err());
    }

    #[test]
    fn from_depths_requires_strict_decrease() {
        let err = ProfileBuilder::from_depths(&[0.0, -1.0, -1.0], -10.0).unwrap_err();
        assert!(matches!(err, ValidationError::NotStrictlyDecreasing { index: 2, .. }));
        let err = ProfileBuilder::from_depths(&[0.0], -10.0).unwrap_err();
        assert_eq!(err, ValidationError::TooFewNodes(1));
        assert!(ProfileBuilder::from_depths(&[-1.0, -2.0], -10.0).is_err());
        assert!(ProfileBuilder::from_depths(&[0.0, -0.5, -3.0], -10.0).is_ok());
    }

    #[test]
    fn surface_head_override_is_recorded() {
        let mut builder = ProfileBuilder::build(-100.0, 1.0, -100.0).unwrap();
        builder.set_surface_head(1.0).unwrap();
        let profile = builder.finish();
        assert_eq!(profile.surface().pressure_head, 1.0);
        assert_eq!(profile.nodes()[1].pressure_head, -100.0);
        assert_eq!(profile.surface_head_override(), Some(1.0));
    }

    #[test]
    fn observations_reuse_existing_nodes() {
        let mut builder = ProfileBuilder::build(-100.0, 1.0, -100.0).unwrap();
        builder
            .mark_observations(&[-20.0, -40.0, -60.0, -80.0, -100.0])
            .unwrap();
        let profile = builder.finish();
        assert_eq!(profile.len(), 101);
        let numbers: Vec<usize> = profile.observation_nodes().map(|(i, _)| i).collect();
        assert_eq!(numbers, vec![21, 41, 61, 81, 101]);
    }

    #[test]
    fn observations_insert_missing_nodes() {
        let mut builder = ProfileBuilder::from_depths(&[0.0, -10.0, -20.0], -100.0).unwrap();
        builder.set_surface_head(0.0).unwrap();
        builder.mark_observations(&[-2.5]).unwrap();
        let profile = builder.finish();
        assert_eq!(profile.len(), 4);
        let inserted = profile.nodes()[1];
        assert_eq!(inserted.depth, -2.5);
        assert!(inserted.is_observation);
        assert_relative_eq!(inserted.pressure_head, -25.0);
    }

    #[test]
    fn observation_outside_column_changes_nothing() {
        let mut builder = ProfileBuilder::build(-100.0, 1.0, -100.0).unwrap();
        let err = builder.mark_observations(&[-20.0, -150.0]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::ObservationOutsideProfile {
                depth: -150.0,
                bottom: -100.0
            }
        );
        assert!(builder.mark_observations(&[5.0]).is_err());
        assert_eq!(builder.finish().observation_nodes().count(), 0);
    }

    #[test]
    fn layers_assign_materials_by_depth() {
        let mut builder = ProfileBuilder::build(-10.0, 1.0, -100.0).unwrap();
        builder.assign_material(-5.0, -10.0, MaterialId(2)).unwrap();
        let profile = builder.finish();
        assert_eq!(profile.nodes()[4].material, MaterialId(1));
        assert_eq!(profile.nodes()[5].material, MaterialId(2));
        assert_eq!(profile.bottom().material, MaterialId(2));
    }

    #[test]
    fn from_nodes_checks_ordering() {
        let node = |depth| ProfileNode {
            depth,
            pressure_head: -1.0,
            material: MaterialId(1),
            is_observation: false,
        };
        assert!(Profile::from_nodes(vec![node(0.0), node(-1.0)]).is_ok());
        assert!(Profile::from_nodes(vec![node(0.0), node(1.0)]).is_err());
    }
}
