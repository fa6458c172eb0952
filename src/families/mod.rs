use crate::{
    datatypes::ProblemGeometry, error::TLineError, modes::ModeSet, parameters::ResolvedParameters,
    settings::BuilderSettings,
};

pub mod microstrip;

pub use microstrip::{DifferentialMicrostrip, SingleMicrostrip};

/// A built cross-section: the problem for the solver and the modes to read
/// back from its result
#[derive(Debug, Clone, PartialEq)]
pub struct CrossSection {
    pub geometry: ProblemGeometry,
    pub modes: ModeSet,
}

/// Geometry builder of one transmission-line family.
///
/// Implementations must be deterministic and hold no mutable state, so one
/// builder can serve concurrent requests. They receive parameters already
/// resolved by [`crate::parameters::resolve`] and assume every length is
/// strictly positive.
pub trait CrossSectionBuilder: Send + Sync {
    /// Default relative error target handed to the solver
    fn default_tolerance(&self) -> f64;

    fn build(
        &self,
        params: &ResolvedParameters,
        settings: &BuilderSettings,
    ) -> Result<CrossSection, TLineError>;
}
