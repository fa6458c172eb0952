use json::JsonValue;
use nalgebra::DMatrix;
use tracing::{debug, info};

use crate::{
    datatypes::ProblemGeometry,
    error::TLineError,
    families::CrossSection,
    materials::MaterialDatabase,
    modes::{ModeResult, PortResult},
    parameters::{self, ParameterTree},
    registry::{FamilyDescriptor, FamilyRegistry},
    settings::BuilderSettings,
};

/// Seam to the external mesher and field solver
pub trait FieldSolver {
    /// Solves one problem
    ///
    /// # Returns
    /// A square matrix over all `geometry.port_count` ports, indexed by
    /// port id
    fn solve(&self, geometry: &ProblemGeometry) -> Result<PortResult, TLineError>;
}

/// Replays a port matrix that an external solver wrote to disk
#[derive(Debug, Clone)]
pub struct PortResultFile {
    result: PortResult,
}

impl PortResultFile {
    /// Reads a port result file
    ///
    /// # Arguments
    /// * `result_file` - Path to a json file of the form
    ///     `{"kind": "impedance" | "admittance", "matrix": [[...], ...]}`
    pub fn load(result_file: &str) -> Result<PortResultFile, TLineError> {
        let contents = match std::fs::read_to_string(result_file) {
            Ok(c) => c,
            Err(err) => {
                return Err(TLineError::Solver(format!(
                    "Unable to open port result file {result_file}: {err}"
                )))
            }
        };

        let result_json = match json::parse(&contents) {
            Ok(j) => j,
            Err(err) => {
                return Err(TLineError::Solver(format!(
                    "Error in port result json: {err}"
                )))
            }
        };

        PortResultFile::from_json(&result_json)
    }

    pub fn from_json(result_json: &JsonValue) -> Result<PortResultFile, TLineError> {
        let rows = &result_json["matrix"];
        if !rows.is_array() || rows.is_empty() {
            return Err(TLineError::Solver(
                "Port result is missing a non-empty matrix field".to_owned(),
            ));
        }

        let size = rows.len();
        let mut values: Vec<f64> = Vec::with_capacity(size * size);

        for (i, row) in rows.members().enumerate() {
            if !row.is_array() || row.len() != size {
                return Err(TLineError::Solver(format!(
                    "Row {i} of the port result matrix does not have {size} entries"
                )));
            }
            for (j, entry) in row.members().enumerate() {
                match entry.as_f64() {
                    Some(v) => values.push(v),
                    None => {
                        return Err(TLineError::Solver(format!(
                            "Non-numeric port result at ({i}, {j}): {entry}"
                        )))
                    }
                }
            }
        }

        let matrix = DMatrix::from_row_slice(size, size, &values);
        let result = match result_json["kind"].as_str() {
            Some("impedance") => PortResult::Impedance(matrix),
            Some("admittance") => PortResult::Admittance(matrix),
            other => {
                return Err(TLineError::Solver(format!(
                    "Port result kind must be impedance or admittance, got {other:?}"
                )))
            }
        };

        Ok(PortResultFile { result })
    }
}

impl FieldSolver for PortResultFile {
    fn solve(&self, geometry: &ProblemGeometry) -> Result<PortResult, TLineError> {
        let size = self.result.matrix().nrows();
        if size != geometry.port_count {
            return Err(TLineError::Solver(format!(
                "Port result covers {size} ports but the problem has {}",
                geometry.port_count
            )));
        }
        Ok(self.result.clone())
    }
}

/// Modal impedances of one solved family
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub family: String,
    pub cross_section: CrossSection,
    pub modes: Vec<ModeResult>,
}

/// Resolves parameters and builds the cross-section of a family
///
/// # Arguments
/// * `family` - The family to build
/// * `tree` - Caller parameters. Every key of the schema must be present
/// * `materials` - Database to resolve material names against
/// * `settings` - Builder constants
pub fn build(
    family: &FamilyDescriptor,
    tree: &ParameterTree,
    materials: &MaterialDatabase,
    settings: &BuilderSettings,
) -> Result<CrossSection, TLineError> {
    let params = parameters::resolve(&family.parameters, tree, materials)?;
    debug!("solver: resolved parameters {:?}", params);

    let section = family.builder.build(&params, settings)?;
    info!(
        "built '{}' with {} conductors, {} dielectrics and {} ports",
        family.name,
        section.geometry.conductors.len(),
        section.geometry.dielectrics.len(),
        section.geometry.port_count
    );

    Ok(section)
}

/// Runs a full request: parameters, geometry, external solve, mode projection
///
/// A solver failure is returned unchanged. The geometry is deterministic, so
/// the solve is never retried.
///
/// # Arguments
/// * `registry` - Registered families
/// * `family_name` - Name of the family to solve
/// * `tree` - Caller parameters
/// * `materials` - Material database
/// * `settings` - Builder constants
/// * `solver` - The external field solver
///
/// # Returns
/// The built problem and one impedance per mode of the family
pub fn run(
    registry: &FamilyRegistry,
    family_name: &str,
    tree: &ParameterTree,
    materials: &MaterialDatabase,
    settings: &BuilderSettings,
    solver: &dyn FieldSolver,
) -> Result<SolveReport, TLineError> {
    let family = registry.find(family_name)?;
    let cross_section = build(family, tree, materials, settings)?;

    let start = std::time::Instant::now();
    info!("solving '{}'...", family.name);
    let port_result = solver.solve(&cross_section.geometry)?;
    let elapsed = start.elapsed().as_secs_f32();
    info!("solved system in {:.3} seconds", elapsed);

    let modes = cross_section.modes.project(&port_result)?;

    Ok(SolveReport {
        family: family.name.clone(),
        cross_section,
        modes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{families::microstrip, parameters::LengthUnit};
    use approx::assert_relative_eq;
    use nalgebra::dmatrix;
    use std::cell::Cell;

    /// Returns a fixed matrix and counts how often it was asked
    struct FixedSolver {
        result: PortResult,
        calls: Cell<usize>,
    }

    impl FieldSolver for FixedSolver {
        fn solve(&self, _geometry: &ProblemGeometry) -> Result<PortResult, TLineError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.result.clone())
        }
    }

    struct FailingSolver;

    impl FieldSolver for FailingSolver {
        fn solve(&self, _geometry: &ProblemGeometry) -> Result<PortResult, TLineError> {
            Err(TLineError::Solver("mesh did not converge".to_owned()))
        }
    }

    fn defaults(registry: &FamilyRegistry, name: &str) -> ParameterTree {
        registry
            .find(name)
            .unwrap()
            .default_parameters(LengthUnit::Millimetre)
    }

    #[test]
    fn differential_request_projects_both_modes() {
        let registry = FamilyRegistry::with_builtin_families().unwrap();
        let solver = FixedSolver {
            result: PortResult::Impedance(dmatrix![
                0.0, 0.0, 0.0;
                0.0, 55.0, 8.0;
                0.0, 8.0, 55.0
            ]),
            calls: Cell::new(0),
        };

        let report = run(
            &registry,
            microstrip::DIFFERENTIAL_NAME,
            &defaults(&registry, microstrip::DIFFERENTIAL_NAME),
            &MaterialDatabase::with_defaults(),
            &BuilderSettings::default(),
            &solver,
        )
        .unwrap();

        assert_eq!(solver.calls.get(), 1);
        assert_eq!(report.modes.len(), 2);
        assert_eq!(report.modes[0].name, "Differential");
        assert_relative_eq!(report.modes[0].impedance, 94.0, epsilon = 1e-9);
        assert_eq!(report.modes[1].name, "Common-mode");
        assert_relative_eq!(report.modes[1].impedance, 63.0, epsilon = 1e-9);
    }

    #[test]
    fn solver_failure_is_propagated_unchanged() {
        let registry = FamilyRegistry::with_builtin_families().unwrap();
        let err = run(
            &registry,
            microstrip::SINGLE_NAME,
            &defaults(&registry, microstrip::SINGLE_NAME),
            &MaterialDatabase::with_defaults(),
            &BuilderSettings::default(),
            &FailingSolver,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Solver error: mesh did not converge");
    }

    #[test]
    fn parameter_failure_stops_before_solving() {
        let registry = FamilyRegistry::with_builtin_families().unwrap();
        let mut tree = defaults(&registry, microstrip::SINGLE_NAME);
        tree.values["substrate_thickness"] = JsonValue::from(-1.6);

        let solver = FixedSolver {
            result: PortResult::Impedance(DMatrix::identity(2, 2)),
            calls: Cell::new(0),
        };
        let err = run(
            &registry,
            microstrip::SINGLE_NAME,
            &tree,
            &MaterialDatabase::with_defaults(),
            &BuilderSettings::default(),
            &solver,
        )
        .unwrap_err();

        assert!(matches!(err, TLineError::Parameter(_)));
        assert_eq!(solver.calls.get(), 0);
    }

    #[test]
    fn unknown_family_is_a_registry_error() {
        let registry = FamilyRegistry::with_builtin_families().unwrap();
        let tree = defaults(&registry, microstrip::SINGLE_NAME);
        let err = run(
            &registry,
            "Stripline",
            &tree,
            &MaterialDatabase::with_defaults(),
            &BuilderSettings::default(),
            &FailingSolver,
        )
        .unwrap_err();
        assert!(matches!(err, TLineError::Registry(_)));
    }

    #[test]
    fn port_result_file_parses_and_checks_size() {
        let file = PortResultFile::from_json(&json::object! {
            kind: "admittance",
            matrix: [[0.0, 0.0], [0.0, 0.02]]
        })
        .unwrap();

        let registry = FamilyRegistry::with_builtin_families().unwrap();
        let report = run(
            &registry,
            microstrip::SINGLE_NAME,
            &defaults(&registry, microstrip::SINGLE_NAME),
            &MaterialDatabase::with_defaults(),
            &BuilderSettings::default(),
            &file,
        )
        .unwrap();
        assert_relative_eq!(report.modes[0].impedance, 50.0, epsilon = 1e-9);

        let err = run(
            &registry,
            microstrip::DIFFERENTIAL_NAME,
            &defaults(&registry, microstrip::DIFFERENTIAL_NAME),
            &MaterialDatabase::with_defaults(),
            &BuilderSettings::default(),
            &file,
        )
        .unwrap_err();
        assert!(matches!(err, TLineError::Solver(_)));
    }

    #[test]
    fn malformed_port_result_files_are_rejected() {
        let ragged = json::object! { kind: "impedance", matrix: [[1.0, 0.0], [0.0]] };
        assert!(PortResultFile::from_json(&ragged).is_err());

        let unknown_kind = json::object! { kind: "scattering", matrix: [[1.0]] };
        assert!(PortResultFile::from_json(&unknown_kind).is_err());

        let empty = json::object! { kind: "impedance", matrix: [] };
        assert!(PortResultFile::from_json(&empty).is_err());
    }
}
