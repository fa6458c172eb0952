use thiserror::Error;

/// Errors raised while turning a parameter set into a solved cross-section.
///
/// Each variant names the stage that failed so the caller can report where a
/// request was aborted.
#[derive(Debug, Error)]
pub enum TLineError {
    #[error("Input error: {0}")]
    Input(String),
    #[error("Parameter error: {0}")]
    Parameter(String),
    #[error("Material error: {0}")]
    Material(String),
    #[error("Geometry error: {0}")]
    Geometry(String),
    #[error("Registry error: {0}")]
    Registry(String),
    #[error("Solver error: {0}")]
    Solver(String),
    #[error("Output error: {0}")]
    Output(String),
}
