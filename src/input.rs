use json::JsonValue;
use tracing::info;

use crate::{
    error::TLineError,
    parameters::{LengthUnit, ParameterTree},
    registry::FamilyRegistry,
    settings::BuilderSettings,
};

/// One build request as read from an input file
#[derive(Debug, Clone)]
pub struct Request {
    pub family: String,
    pub tree: ParameterTree,
    pub settings: BuilderSettings,
}

/// Parses the input json into a JsonValue object
///
/// # Arguments
/// * `input_file` - The path to the input file
///
/// # Returns
/// A JsonValue object
fn load_input_file(input_file: &str) -> Result<JsonValue, TLineError> {
    let file_string = match std::fs::read_to_string(input_file) {
        Ok(f) => f,
        Err(err) => {
            return Err(TLineError::Input(format!(
                "Unable to open input file {input_file}: {err}"
            )))
        }
    };

    match json::parse(&file_string) {
        Ok(f) => Ok(f),
        Err(err) => Err(TLineError::Input(format!(
            "Error in input file json: {err}"
        ))),
    }
}

/// Builds a request from a parsed input file
///
/// Parameters the file leaves out take the family defaults.
///
/// # Arguments
/// * `input_json` - The input file as a JsonValue object
/// * `registry` - Registry used to look up the family schema
pub fn parse_request(
    input_json: &JsonValue,
    registry: &FamilyRegistry,
) -> Result<Request, TLineError> {
    let family = match input_json["family"].as_str() {
        Some(f) => f.to_owned(),
        None => {
            return Err(TLineError::Input(
                "Input json missing family field".to_owned(),
            ))
        }
    };

    let length_unit: LengthUnit = match &input_json["length_unit"] {
        JsonValue::Null => LengthUnit::default(),
        value => match value.as_str() {
            Some(unit) => unit.parse()?,
            None => {
                return Err(TLineError::Input(format!(
                    "length_unit must be a string, got {value}"
                )))
            }
        },
    };

    let parameters = &input_json["parameters"];
    if !parameters.is_null() && !parameters.is_object() {
        return Err(TLineError::Input(
            "parameters section must be a json object".to_owned(),
        ));
    }

    let descriptor = registry.find(&family)?;
    let mut tree = ParameterTree::new(parameters.clone(), length_unit);
    tree.fill_defaults(&descriptor.parameters);

    let settings = BuilderSettings::from_json(&input_json["settings"])?;

    info!(
        "loaded request for '{}' with {} parameters",
        family,
        tree.values.len()
    );

    Ok(Request {
        family,
        tree,
        settings,
    })
}

/// Reads an input file into a request
pub fn load_request(input_file: &str, registry: &FamilyRegistry) -> Result<Request, TLineError> {
    let input_json = load_input_file(input_file)?;
    parse_request(&input_json, registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{families::microstrip, materials::MaterialDatabase, solver};

    #[test]
    fn request_fills_defaults_in_requested_unit() {
        let registry = FamilyRegistry::with_builtin_families().unwrap();
        let input = json::object! {
            family: "Microstrip (differential)",
            length_unit: "um",
            parameters: { track_width: 150.0 },
            settings: { margin_y: 30.0 }
        };

        let request = parse_request(&input, &registry).unwrap();
        assert_eq!(request.family, microstrip::DIFFERENTIAL_NAME);
        assert_eq!(request.tree.length_unit, LengthUnit::Micrometre);
        assert_eq!(request.tree.values["track_width"].as_f64(), Some(150.0));
        assert_eq!(request.tree.values["track_spacing"].as_f64(), Some(1000.0));
        assert_eq!(request.tree.values["track_material"].as_str(), Some("Copper"));
        assert_eq!(request.settings.margin_y, 30.0);
    }

    #[test]
    fn missing_family_is_an_input_error() {
        let registry = FamilyRegistry::with_builtin_families().unwrap();
        let err = parse_request(&json::object! { parameters: {} }, &registry).unwrap_err();
        assert!(matches!(err, TLineError::Input(_)));
    }

    #[test]
    fn unknown_family_is_a_registry_error() {
        let registry = FamilyRegistry::with_builtin_families().unwrap();
        let err = parse_request(&json::object! { family: "Slotline" }, &registry).unwrap_err();
        assert!(matches!(err, TLineError::Registry(_)));
    }

    #[test]
    fn bad_unit_is_rejected() {
        let registry = FamilyRegistry::with_builtin_families().unwrap();
        let input = json::object! { family: "Microstrip (single)", length_unit: "inch" };
        assert!(parse_request(&input, &registry).is_err());
    }

    #[test]
    fn misspelled_parameter_does_not_fall_back_to_default() {
        let registry = FamilyRegistry::with_builtin_families().unwrap();
        let input = json::object! {
            family: "Microstrip (single)",
            parameters: { track_widht: 0.2 }
        };

        let request = parse_request(&input, &registry).unwrap();
        let family = registry.find(&request.family).unwrap();
        let err = solver::build(
            family,
            &request.tree,
            &MaterialDatabase::with_defaults(),
            &request.settings,
        )
        .unwrap_err();
        assert!(matches!(err, TLineError::Parameter(_)));
        assert!(err.to_string().contains("track_widht"));
    }

    #[test]
    fn unreadable_file_is_an_input_error() {
        let registry = FamilyRegistry::with_builtin_families().unwrap();
        let err = load_request("/nonexistent/request.json", &registry).unwrap_err();
        assert!(err.to_string().starts_with("Input error"));
        assert!(err.to_string().contains("/nonexistent/request.json: "));
    }
}
