use std::collections::BTreeMap;
use std::str::FromStr;

use json::JsonValue;
use tracing::debug;

use crate::{
    error::TLineError,
    materials::{ConductorMaterial, DielectricMaterial, MaterialDatabase},
};

/// Unit that the lengths of a parameter tree are written in. Geometry is
/// always built in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthUnit {
    #[default]
    Millimetre,
    Micrometre,
    Mil,
    Metre,
}

impl LengthUnit {
    fn millimetres_per_unit(&self) -> f64 {
        match self {
            LengthUnit::Millimetre => 1.0,
            LengthUnit::Micrometre => 1.0e-3,
            LengthUnit::Mil => 0.0254,
            LengthUnit::Metre => 1.0e3,
        }
    }

    /// Converts a length written in this unit to millimetres
    pub fn unscale(&self, value: f64) -> f64 {
        value * self.millimetres_per_unit()
    }

    /// Converts a length in millimetres to this unit
    pub fn scale(&self, value: f64) -> f64 {
        value / self.millimetres_per_unit()
    }
}

impl FromStr for LengthUnit {
    type Err = TLineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "mm" => Ok(LengthUnit::Millimetre),
            "um" => Ok(LengthUnit::Micrometre),
            "mil" => Ok(LengthUnit::Mil),
            "m" => Ok(LengthUnit::Metre),
            other => Err(TLineError::Input(format!(
                "Unrecognized length unit '{other}'. Expected one of mm, um, mil, m"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Real,
    MaterialConductor,
    MaterialDielectric,
}

/// Declarative description of one family parameter
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub label: String,
    pub kind: ParameterKind,
    /// Default in millimetres for lengths
    pub default_value: JsonValue,
    pub is_length: bool,
    /// Grouping hint for presentation layers
    pub display_group: u32,
}

impl ParameterSpec {
    pub fn new(
        label: &str,
        kind: ParameterKind,
        default_value: JsonValue,
        is_length: bool,
        display_group: u32,
    ) -> ParameterSpec {
        ParameterSpec {
            label: label.to_owned(),
            kind,
            default_value,
            is_length,
            display_group,
        }
    }

    /// Key of this parameter in a parameter tree: "Track Width" becomes
    /// `track_width`
    pub fn key(&self) -> String {
        self.label.trim().to_lowercase().replace(' ', "_")
    }
}

/// Tagged parameter values as supplied by a caller, keyed by parameter key
#[derive(Debug, Clone)]
pub struct ParameterTree {
    pub values: JsonValue,
    pub length_unit: LengthUnit,
}

impl ParameterTree {
    pub fn new(values: JsonValue, length_unit: LengthUnit) -> ParameterTree {
        ParameterTree {
            values,
            length_unit,
        }
    }

    /// Builds a tree holding every default of the given schema
    pub fn from_defaults(specs: &[ParameterSpec], length_unit: LengthUnit) -> ParameterTree {
        let mut tree = ParameterTree::new(JsonValue::new_object(), length_unit);
        tree.fill_defaults(specs);
        tree
    }

    /// Inserts the schema default for every key the tree does not set.
    /// Length defaults are converted into the tree's unit.
    pub fn fill_defaults(&mut self, specs: &[ParameterSpec]) {
        if !self.values.is_object() {
            self.values = JsonValue::new_object();
        }

        for spec in specs {
            let key = spec.key();
            if self.values.has_key(&key) {
                continue;
            }

            let default = match (spec.is_length, spec.default_value.as_f64()) {
                (true, Some(mm)) => JsonValue::from(self.length_unit.scale(mm)),
                _ => spec.default_value.clone(),
            };
            debug!("parameter: defaulting {key} to {default}");
            self.values[key.as_str()] = default;
        }
    }

    /// Overwrites a single length value, given in millimetres
    pub fn set_length(&mut self, key: &str, millimetres: f64) {
        if !self.values.is_object() {
            self.values = JsonValue::new_object();
        }
        self.values[key] = JsonValue::from(self.length_unit.scale(millimetres));
    }
}

/// A parameter value after unit conversion and material lookup
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    Length(f64),
    Real(f64),
    Conductor(ConductorMaterial),
    Dielectric(DielectricMaterial),
}

/// Validated parameters in physical units, ready for a builder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedParameters {
    values: BTreeMap<String, ResolvedValue>,
}

impl ResolvedParameters {
    pub fn insert(&mut self, key: &str, value: ResolvedValue) {
        self.values.insert(key.to_owned(), value);
    }

    fn get(&self, key: &str) -> Result<&ResolvedValue, TLineError> {
        self.values
            .get(key)
            .ok_or_else(|| TLineError::Parameter(format!("Missing parameter '{key}'")))
    }

    /// A length in millimetres, guaranteed strictly positive by `resolve`
    pub fn length(&self, key: &str) -> Result<f64, TLineError> {
        match self.get(key)? {
            ResolvedValue::Length(v) => Ok(*v),
            other => Err(wrong_kind(key, "length", other)),
        }
    }

    pub fn real(&self, key: &str) -> Result<f64, TLineError> {
        match self.get(key)? {
            ResolvedValue::Real(v) | ResolvedValue::Length(v) => Ok(*v),
            other => Err(wrong_kind(key, "number", other)),
        }
    }

    pub fn conductor(&self, key: &str) -> Result<&ConductorMaterial, TLineError> {
        match self.get(key)? {
            ResolvedValue::Conductor(m) => Ok(m),
            other => Err(wrong_kind(key, "conductor material", other)),
        }
    }

    pub fn dielectric(&self, key: &str) -> Result<&DielectricMaterial, TLineError> {
        match self.get(key)? {
            ResolvedValue::Dielectric(m) => Ok(m),
            other => Err(wrong_kind(key, "dielectric material", other)),
        }
    }
}

fn wrong_kind(key: &str, expected: &str, found: &ResolvedValue) -> TLineError {
    TLineError::Parameter(format!(
        "Parameter '{key}' should be a {expected}, found {found:?}"
    ))
}

/// Validates a parameter tree against a schema
///
/// Lengths are converted to millimetres here and nowhere else. Non-physical
/// lengths (zero, negative, non-finite) are rejected so that builders can
/// assume strictly positive dimensions. Keys the schema does not declare are
/// rejected rather than ignored.
///
/// # Arguments
/// * `specs` - The family's parameter schema
/// * `tree` - The caller-supplied parameter values
/// * `materials` - The database material names are resolved against
///
/// # Returns
/// The resolved parameters, keyed by parameter key
pub fn resolve(
    specs: &[ParameterSpec],
    tree: &ParameterTree,
    materials: &MaterialDatabase,
) -> Result<ResolvedParameters, TLineError> {
    let mut resolved = ResolvedParameters::default();

    let keys: Vec<String> = specs.iter().map(|s| s.key()).collect();
    for (key, _) in tree.values.entries() {
        if !keys.iter().any(|k| k == key) {
            return Err(TLineError::Parameter(format!(
                "Unknown parameter '{key}'. Expected one of {}",
                keys.join(", ")
            )));
        }
    }

    for spec in specs {
        let key = spec.key();
        let value = &tree.values[key.as_str()];

        if value.is_null() {
            return Err(TLineError::Parameter(format!(
                "Missing parameter '{key}' ({})",
                spec.label
            )));
        }

        let resolved_value = match spec.kind {
            ParameterKind::Real => {
                let number = match value.as_f64() {
                    Some(n) => n,
                    None => {
                        return Err(TLineError::Parameter(format!(
                            "Parameter '{key}' must be a number, got {value}"
                        )))
                    }
                };

                if spec.is_length {
                    let length = tree.length_unit.unscale(number);
                    if !length.is_finite() || length <= 0.0 {
                        return Err(TLineError::Parameter(format!(
                            "Parameter '{key}' must be a positive length, got {number}"
                        )));
                    }
                    ResolvedValue::Length(length)
                } else {
                    if !number.is_finite() {
                        return Err(TLineError::Parameter(format!(
                            "Parameter '{key}' must be finite, got {number}"
                        )));
                    }
                    ResolvedValue::Real(number)
                }
            }
            ParameterKind::MaterialConductor => {
                let name = material_name(&key, value)?;
                ResolvedValue::Conductor(materials.conductor(name).map_err(|e| for_key(e, &key))?)
            }
            ParameterKind::MaterialDielectric => {
                let name = material_name(&key, value)?;
                ResolvedValue::Dielectric(
                    materials.dielectric(name).map_err(|e| for_key(e, &key))?,
                )
            }
        };

        resolved.insert(&key, resolved_value);
    }

    Ok(resolved)
}

fn material_name<'a>(key: &str, value: &'a JsonValue) -> Result<&'a str, TLineError> {
    match value.as_str() {
        Some(name) => Ok(name),
        None => Err(TLineError::Parameter(format!(
            "Parameter '{key}' must be a material name, got {value}"
        ))),
    }
}

fn for_key(err: TLineError, key: &str) -> TLineError {
    match err {
        TLineError::Material(msg) => TLineError::Material(format!("{msg} in parameter '{key}'")),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn schema() -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("Track Width", ParameterKind::Real, 1.0.into(), true, 0),
            ParameterSpec::new("Track Material", ParameterKind::MaterialConductor, "Copper".into(), false, 1),
            ParameterSpec::new("Substrate Material", ParameterKind::MaterialDielectric, "FR-4".into(), false, 0),
        ]
    }

    #[test]
    fn key_is_derived_from_label() {
        let spec = ParameterSpec::new("Substrate Thickness", ParameterKind::Real, 1.6.into(), true, 0);
        assert_eq!(spec.key(), "substrate_thickness");
    }

    #[test]
    fn lengths_are_unscaled_once() {
        let tree = ParameterTree::new(
            json::object! {
                track_width: 250.0,
                track_material: "Copper",
                substrate_material: "FR-4"
            },
            LengthUnit::Micrometre,
        );
        let resolved = resolve(&schema(), &tree, &MaterialDatabase::with_defaults()).unwrap();
        assert_relative_eq!(resolved.length("track_width").unwrap(), 0.25, epsilon = 1e-12);
        assert_eq!(resolved.conductor("track_material").unwrap().name, "Copper");
        assert_eq!(resolved.dielectric("substrate_material").unwrap().name, "FR-4");
    }

    #[test]
    fn missing_key_names_the_parameter() {
        let tree = ParameterTree::new(
            json::object! { track_material: "Copper", substrate_material: "FR-4" },
            LengthUnit::Millimetre,
        );
        let err = resolve(&schema(), &tree, &MaterialDatabase::with_defaults()).unwrap_err();
        assert!(matches!(err, TLineError::Parameter(_)));
        assert!(err.to_string().contains("track_width"));
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let tree = ParameterTree::new(
            json::object! { track_width: "wide", track_material: "Copper", substrate_material: "FR-4" },
            LengthUnit::Millimetre,
        );
        let err = resolve(&schema(), &tree, &MaterialDatabase::with_defaults()).unwrap_err();
        assert!(err.to_string().contains("track_width"));

        let tree = ParameterTree::new(
            json::object! { track_width: 1.0, track_material: 5, substrate_material: "FR-4" },
            LengthUnit::Millimetre,
        );
        let err = resolve(&schema(), &tree, &MaterialDatabase::with_defaults()).unwrap_err();
        assert!(err.to_string().contains("track_material"));
    }

    #[test]
    fn non_physical_lengths_are_rejected() {
        for bad in [0.0, -1.0] {
            let tree = ParameterTree::new(
                json::object! { track_width: bad, track_material: "Copper", substrate_material: "FR-4" },
                LengthUnit::Millimetre,
            );
            let err = resolve(&schema(), &tree, &MaterialDatabase::with_defaults()).unwrap_err();
            assert!(matches!(err, TLineError::Parameter(_)));
        }
    }

    #[test]
    fn unknown_material_names_the_material_and_category() {
        let tree = ParameterTree::new(
            json::object! { track_width: 1.0, track_material: "Unobtainium", substrate_material: "FR-4" },
            LengthUnit::Millimetre,
        );
        let err = resolve(&schema(), &tree, &MaterialDatabase::with_defaults()).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, TLineError::Material(_)));
        assert!(msg.contains("Unobtainium"));
        assert!(msg.contains("conductor"));
        assert!(msg.contains("track_material"));
    }

    #[test]
    fn defaults_are_written_in_tree_unit() {
        let tree = ParameterTree::from_defaults(&schema(), LengthUnit::Micrometre);
        assert_relative_eq!(tree.values["track_width"].as_f64().unwrap(), 1000.0, epsilon = 1e-9);
        assert_eq!(tree.values["track_material"].as_str(), Some("Copper"));

        let resolved = resolve(&schema(), &tree, &MaterialDatabase::with_defaults()).unwrap();
        assert_relative_eq!(resolved.length("track_width").unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn fill_defaults_keeps_supplied_values() {
        let mut tree = ParameterTree::new(json::object! { track_width: 0.3 }, LengthUnit::Millimetre);
        tree.fill_defaults(&schema());
        assert_eq!(tree.values["track_width"].as_f64(), Some(0.3));
        assert_eq!(tree.values["substrate_material"].as_str(), Some("FR-4"));
    }

    #[test]
    fn undeclared_key_is_rejected() {
        let mut tree = ParameterTree::new(json::object! { track_widht: 0.2 }, LengthUnit::Millimetre);
        tree.fill_defaults(&schema());
        let err = resolve(&schema(), &tree, &MaterialDatabase::with_defaults()).unwrap_err();
        assert!(matches!(err, TLineError::Parameter(_)));
        assert!(err.to_string().contains("track_widht"));
    }

    #[test]
    fn plain_reals_are_not_unscaled() {
        let mut specs = schema();
        specs.push(ParameterSpec::new("Roughness Factor", ParameterKind::Real, 1.0.into(), false, 2));

        let tree = ParameterTree::new(
            json::object! {
                track_width: 10.0,
                track_material: "Copper",
                substrate_material: "FR-4",
                roughness_factor: 1.25
            },
            LengthUnit::Mil,
        );
        let resolved = resolve(&specs, &tree, &MaterialDatabase::with_defaults()).unwrap();
        assert_eq!(resolved.real("roughness_factor").unwrap(), 1.25);
        assert_relative_eq!(resolved.real("track_width").unwrap(), 0.254, epsilon = 1e-12);
        assert!(resolved.length("roughness_factor").is_err());
        assert!(resolved.real("track_material").is_err());

        let mut tree = tree;
        tree.values["roughness_factor"] = JsonValue::from(f64::INFINITY);
        let err = resolve(&specs, &tree, &MaterialDatabase::with_defaults()).unwrap_err();
        assert!(err.to_string().contains("roughness_factor"));
    }

    #[test]
    fn length_units_parse() {
        assert_eq!("mil".parse::<LengthUnit>().unwrap(), LengthUnit::Mil);
        assert_relative_eq!(LengthUnit::Mil.unscale(10.0), 0.254, epsilon = 1e-12);
        assert!("furlong".parse::<LengthUnit>().is_err());
    }
}
