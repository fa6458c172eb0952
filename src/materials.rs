use std::collections::BTreeMap;

use json::JsonValue;
use tracing::{debug, info};

use crate::error::TLineError;

#[derive(Debug, Clone, PartialEq)]
pub struct ConductorMaterial {
    pub name: String,
    /// Electrical conductivity in S/m
    pub conductivity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DielectricMaterial {
    pub name: String,
    /// Relative permittivity
    pub permittivity: f64,
    pub loss_tangent: f64,
}

/// The two categories a material name can be looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialCategory {
    Conductor,
    Dielectric,
}

impl std::fmt::Display for MaterialCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaterialCategory::Conductor => write!(f, "conductor"),
            MaterialCategory::Dielectric => write!(f, "dielectric"),
        }
    }
}

/// Named conductor and dielectric properties
#[derive(Debug, Clone, Default)]
pub struct MaterialDatabase {
    conductors: BTreeMap<String, ConductorMaterial>,
    dielectrics: BTreeMap<String, DielectricMaterial>,
}

impl MaterialDatabase {
    /// Creates a database holding the common PCB materials
    pub fn with_defaults() -> MaterialDatabase {
        let mut db = MaterialDatabase::default();

        db.add_conductor("Copper", 5.8e7);
        db.add_conductor("Aluminium", 3.77e7);
        db.add_conductor("Gold", 4.1e7);
        db.add_conductor("Silver", 6.3e7);

        db.add_dielectric("Isola DE104", 4.3, 0.017);
        db.add_dielectric("FR-4", 4.4, 0.02);
        db.add_dielectric("Rogers RO4350B", 3.66, 0.0037);
        db.add_dielectric("Air", 1.0, 0.0);

        db
    }

    pub fn add_conductor(&mut self, name: &str, conductivity: f64) {
        self.conductors.insert(
            name.to_owned(),
            ConductorMaterial {
                name: name.to_owned(),
                conductivity,
            },
        );
    }

    pub fn add_dielectric(&mut self, name: &str, permittivity: f64, loss_tangent: f64) {
        self.dielectrics.insert(
            name.to_owned(),
            DielectricMaterial {
                name: name.to_owned(),
                permittivity,
                loss_tangent,
            },
        );
    }

    /// Looks up a conductor by name
    ///
    /// # Returns
    /// A copy of the material, or a material error naming the missing entry
    pub fn conductor(&self, name: &str) -> Result<ConductorMaterial, TLineError> {
        self.conductors
            .get(name)
            .cloned()
            .ok_or_else(|| unknown_material(name, MaterialCategory::Conductor))
    }

    /// Looks up a dielectric by name
    pub fn dielectric(&self, name: &str) -> Result<DielectricMaterial, TLineError> {
        self.dielectrics
            .get(name)
            .cloned()
            .ok_or_else(|| unknown_material(name, MaterialCategory::Dielectric))
    }

    pub fn names(&self, category: MaterialCategory) -> Vec<&str> {
        match category {
            MaterialCategory::Conductor => self.conductors.keys().map(|k| k.as_str()).collect(),
            MaterialCategory::Dielectric => self.dielectrics.keys().map(|k| k.as_str()).collect(),
        }
    }

    /// Adds or replaces entries from a parsed materials file
    ///
    /// Every entry is validated before any is applied, so a bad file leaves
    /// the database unchanged.
    ///
    /// # Arguments
    /// * `materials_json` - An object with optional `conductors` and
    ///     `dielectrics` sections, each mapping a name to its properties
    pub fn merge_json(&mut self, materials_json: &JsonValue) -> Result<(), TLineError> {
        if !materials_json.is_object() {
            return Err(TLineError::Input(
                "Materials file must contain a json object".to_owned(),
            ));
        }

        let mut conductors: BTreeMap<String, f64> = BTreeMap::new();
        for (name, entry) in section_entries(materials_json, "conductors")? {
            let conductivity = match entry["conductivity"].as_f64() {
                Some(c) => c,
                None => {
                    return Err(TLineError::Input(format!(
                        "Conductor '{name}' is missing a numeric conductivity"
                    )))
                }
            };
            conductors.insert(name.to_owned(), conductivity);
        }

        let mut dielectrics: BTreeMap<String, (f64, f64)> = BTreeMap::new();
        for (name, entry) in section_entries(materials_json, "dielectrics")? {
            let permittivity = match entry["permittivity"].as_f64() {
                Some(p) => p,
                None => {
                    return Err(TLineError::Input(format!(
                        "Dielectric '{name}' is missing a numeric permittivity"
                    )))
                }
            };
            let loss_tangent = match &entry["loss_tangent"] {
                JsonValue::Null => 0.0,
                value => match value.as_f64() {
                    Some(t) => t,
                    None => {
                        return Err(TLineError::Input(format!(
                            "Dielectric '{name}' has a non-numeric loss_tangent {value}"
                        )))
                    }
                },
            };
            dielectrics.insert(name.to_owned(), (permittivity, loss_tangent));
        }

        let loaded = conductors.len() + dielectrics.len();

        for (name, conductivity) in conductors {
            debug!("material: conductor {name} ({conductivity} S/m)");
            self.add_conductor(&name, conductivity);
        }
        for (name, (permittivity, loss_tangent)) in dielectrics {
            debug!("material: dielectric {name} (er = {permittivity}, tand = {loss_tangent})");
            self.add_dielectric(&name, permittivity, loss_tangent);
        }

        info!("loaded {} materials from materials file", loaded);

        Ok(())
    }

    /// Reads a materials file and merges it over the current entries
    pub fn load_file(&mut self, materials_file: &str) -> Result<(), TLineError> {
        let contents = match std::fs::read_to_string(materials_file) {
            Ok(c) => c,
            Err(err) => {
                return Err(TLineError::Input(format!(
                    "Unable to open materials file {materials_file}: {err}"
                )))
            }
        };

        let materials_json = match json::parse(&contents) {
            Ok(j) => j,
            Err(err) => {
                return Err(TLineError::Input(format!(
                    "Error in materials file json: {err}"
                )))
            }
        };

        self.merge_json(&materials_json)
    }
}

/// Entries of an optional section of the materials file
fn section_entries<'a>(
    materials_json: &'a JsonValue,
    section: &str,
) -> Result<json::iterators::Entries<'a>, TLineError> {
    let value = &materials_json[section];
    if !value.is_null() && !value.is_object() {
        return Err(TLineError::Input(format!(
            "Materials file section '{section}' must be a json object"
        )));
    }
    Ok(value.entries())
}

fn unknown_material(name: &str, category: MaterialCategory) -> TLineError {
    TLineError::Material(format!("Unknown {category} material '{name}'"))
}
