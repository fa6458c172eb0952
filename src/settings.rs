use json::JsonValue;

use crate::error::TLineError;

/// Lateral simulation margin, as a multiple of the characteristic feature size
pub const DEFAULT_MARGIN_X: f64 = 15.0;
/// Margin above the conductors, as a multiple of the characteristic feature size
pub const DEFAULT_MARGIN_Y: f64 = 25.0;
/// Signal conductor refinement step, as a fraction of the smallest relevant feature
pub const DEFAULT_REFINEMENT_FRACTION: f64 = 0.02;
/// Smallest cell the mesher may produce, as a fraction of the substrate thickness
pub const DEFAULT_MIN_FEATURE_FRACTION: f64 = 1.0e-6;

/// Tunable constants used by the cross-section builders.
///
/// The defaults are empirical. They keep the open boundary far enough away
/// from the conductors to not disturb the near field while bounding the mesh
/// size, but nothing about them is physically exact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuilderSettings {
    pub margin_x: f64,
    pub margin_y: f64,
    pub refinement_fraction: f64,
    pub min_feature_fraction: f64,
    /// Replaces the family's default solver tolerance when set
    pub tolerance: Option<f64>,
}

impl Default for BuilderSettings {
    fn default() -> Self {
        BuilderSettings {
            margin_x: DEFAULT_MARGIN_X,
            margin_y: DEFAULT_MARGIN_Y,
            refinement_fraction: DEFAULT_REFINEMENT_FRACTION,
            min_feature_fraction: DEFAULT_MIN_FEATURE_FRACTION,
            tolerance: None,
        }
    }
}

impl BuilderSettings {
    /// Reads settings from the `settings` section of an input file
    ///
    /// # Arguments
    /// * `settings_json` - The `settings` object. Missing keys keep their
    ///     default, a null value gives the defaults
    ///
    /// # Returns
    /// A BuilderSettings instance
    pub fn from_json(settings_json: &JsonValue) -> Result<BuilderSettings, TLineError> {
        let mut settings = BuilderSettings::default();

        if settings_json.is_null() {
            return Ok(settings);
        }
        if !settings_json.is_object() {
            return Err(TLineError::Input(
                "settings section must be a json object".to_owned(),
            ));
        }

        for (name, value) in settings_json.entries() {
            let number = match value.as_f64() {
                Some(n) if n.is_finite() && n > 0.0 => n,
                _ => {
                    return Err(TLineError::Input(format!(
                        "Setting '{name}' must be a positive number, got {value}"
                    )))
                }
            };

            match name {
                "margin_x" => settings.margin_x = number,
                "margin_y" => settings.margin_y = number,
                "refinement_fraction" => settings.refinement_fraction = number,
                "min_feature_fraction" => settings.min_feature_fraction = number,
                "tolerance" => settings.tolerance = Some(number),
                other => {
                    return Err(TLineError::Input(format!("Unrecognized setting '{other}'")));
                }
            }
        }

        Ok(settings)
    }
}
