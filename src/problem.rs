use tracing::debug;

use crate::{
    datatypes::{Box2D, ConductorPlacement, DielectricPlacement, PortId, ProblemGeometry},
    error::TLineError,
    materials::{ConductorMaterial, DielectricMaterial},
};

/// Collects ports and placements for one cross-section problem
///
/// Ports are handed out sequentially from zero, so the allocation order of a
/// builder is also the row order of the solver result.
#[derive(Debug)]
pub struct ProblemBuilder {
    world_box: Box2D,
    focus_box: Box2D,
    tolerance: f64,
    min_feature_size: f64,
    port_count: usize,
    conductors: Vec<ConductorPlacement>,
    dielectrics: Vec<DielectricPlacement>,
}

impl ProblemBuilder {
    /// Starts a new problem
    ///
    /// # Arguments
    /// * `world_box` - The full simulation domain
    /// * `focus_box` - The region where refinement matters most. Must lie
    ///     inside `world_box`
    /// * `tolerance` - Relative error target for the solver
    /// * `min_feature_size` - Absolute floor on mesh cell size
    pub fn new(
        world_box: Box2D,
        focus_box: Box2D,
        tolerance: f64,
        min_feature_size: f64,
    ) -> ProblemBuilder {
        ProblemBuilder {
            world_box,
            focus_box,
            tolerance,
            min_feature_size,
            port_count: 0,
            conductors: Vec::new(),
            dielectrics: Vec::new(),
        }
    }

    pub fn world_box(&self) -> Box2D {
        self.world_box
    }

    pub fn add_port(&mut self) -> PortId {
        let port = PortId(self.port_count);
        self.port_count += 1;
        port
    }

    pub fn add_conductor(
        &mut self,
        region: Box2D,
        refinement_step: f64,
        material: &ConductorMaterial,
        port: PortId,
    ) {
        debug!("problem: conductor {:?} on port {}", region, port.index());
        self.conductors.push(ConductorPlacement {
            region,
            refinement_step,
            material: material.clone(),
            port,
        });
    }

    pub fn add_dielectric(
        &mut self,
        region: Box2D,
        refinement_step: f64,
        material: &DielectricMaterial,
    ) {
        debug!("problem: dielectric {:?} ({})", region, material.name);
        self.dielectrics.push(DielectricPlacement {
            region,
            refinement_step,
            material: material.clone(),
        });
    }

    /// Finishes the problem
    ///
    /// # Returns
    /// The assembled geometry, or a geometry error if a port was allocated
    /// without any conductor attached to it or a placement references a
    /// port that was never allocated
    pub fn finish(self) -> Result<ProblemGeometry, TLineError> {
        for port in 0..self.port_count {
            if !self.conductors.iter().any(|c| c.port.index() == port) {
                return Err(TLineError::Geometry(format!(
                    "Port {port} has no conductor attached"
                )));
            }
        }
        if let Some(stray) = self.conductors.iter().find(|c| c.port.index() >= self.port_count) {
            return Err(TLineError::Geometry(format!(
                "Conductor references unallocated port {}",
                stray.port.index()
            )));
        }

        Ok(ProblemGeometry {
            world_box: self.world_box,
            focus_box: self.focus_box,
            tolerance: self.tolerance,
            min_feature_size: self.min_feature_size,
            port_count: self.port_count,
            conductors: self.conductors,
            dielectrics: self.dielectrics,
        })
    }
}
