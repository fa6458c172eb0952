//! Builds 2-D simulation problems for transmission-line cross-sections.
//!
//! A [`registry::FamilyRegistry`] holds the known families. Each one turns a
//! resolved parameter set into a [`families::CrossSection`]: the domain,
//! conductor and dielectric placements with their ports and refinement hints,
//! and the mode vectors used to read modal impedances back from an external
//! field solver.

pub mod datatypes;
pub mod error;
pub mod families;
pub mod input;
pub mod materials;
pub mod modes;
pub mod parameters;
pub mod post_processor;
pub mod problem;
pub mod registry;
pub mod settings;
pub mod solver;
