use std::fmt::Write as _;

use json::JsonValue;
use tracing::info;

use crate::{
    datatypes::{Box2D, PortId, ProblemGeometry, UNBOUNDED_STEP},
    error::TLineError,
    families::CrossSection,
    modes::ModeResult,
    registry::FamilyRegistry,
};

fn box_json(region: &Box2D) -> JsonValue {
    json::array![region.x1, region.y1, region.x2, region.y2]
}

/// Unbounded steps are written as null
fn step_json(step: f64) -> JsonValue {
    if step == UNBOUNDED_STEP {
        JsonValue::Null
    } else {
        JsonValue::from(step)
    }
}

/// Converts a built cross-section into the json handed to an external solver
///
/// # Arguments
/// * `family` - Name of the family that produced the cross-section
/// * `section` - The built cross-section
///
/// # Returns
/// A JsonValue with the problem geometry and the mode table
pub fn cross_section_json(family: &str, section: &CrossSection) -> JsonValue {
    let geometry = &section.geometry;

    let mut conductors = JsonValue::new_array();
    for conductor in &geometry.conductors {
        let _ = conductors.push(json::object! {
            region: box_json(&conductor.region),
            refinement_step: step_json(conductor.refinement_step),
            material: conductor.material.name.as_str(),
            conductivity: conductor.material.conductivity,
            port: conductor.port.index()
        });
    }

    let mut dielectrics = JsonValue::new_array();
    for dielectric in &geometry.dielectrics {
        let _ = dielectrics.push(json::object! {
            region: box_json(&dielectric.region),
            refinement_step: step_json(dielectric.refinement_step),
            material: dielectric.material.name.as_str(),
            permittivity: dielectric.material.permittivity,
            loss_tangent: dielectric.material.loss_tangent
        });
    }

    let mut modes = JsonValue::new_array();
    for mode in section.modes.modes() {
        let weights: Vec<f64> = mode.weights.iter().copied().collect();
        let _ = modes.push(json::object! {
            name: mode.name.as_str(),
            weights: weights,
            normalization: mode.normalization
        });
    }

    json::object! {
        family: family,
        world_box: box_json(&geometry.world_box),
        focus_box: box_json(&geometry.focus_box),
        tolerance: geometry.tolerance,
        min_feature_size: geometry.min_feature_size,
        port_count: geometry.port_count,
        conductors: conductors,
        dielectrics: dielectrics,
        modes: modes
    }
}

/// Converts mode results into json
pub fn modes_json(family: &str, results: &[ModeResult]) -> JsonValue {
    let mut modes = JsonValue::new_array();
    for result in results {
        let weights: Vec<f64> = result.weights.iter().copied().collect();
        let _ = modes.push(json::object! {
            name: result.name.as_str(),
            impedance: result.impedance,
            weights: weights
        });
    }

    json::object! {
        family: family,
        modes: modes
    }
}

/// Writes a json value to a file
pub fn write_json(value: &JsonValue, output: &str) -> Result<(), TLineError> {
    if let Err(err) = std::fs::write(output, value.pretty(2)) {
        return Err(TLineError::Output(format!(
            "Failed to write {output}: {err}"
        )));
    }
    info!("wrote output to {}", output);
    Ok(())
}

/// Renders the placements of a problem as csv, one row per placement
///
/// Columns are `kind,x1,y1,x2,y2,step,material,port`. Dielectrics have an
/// empty port and unbounded steps are left empty.
pub fn placements_csv(geometry: &ProblemGeometry) -> String {
    let mut csv = String::from("kind,x1,y1,x2,y2,step,material,port\n");

    let step = |s: f64| {
        if s == UNBOUNDED_STEP {
            String::new()
        } else {
            s.to_string()
        }
    };

    for c in &geometry.conductors {
        let _ = writeln!(
            csv,
            "conductor,{},{},{},{},{},{},{}",
            c.region.x1,
            c.region.y1,
            c.region.x2,
            c.region.y2,
            step(c.refinement_step),
            c.material.name,
            c.port.index()
        );
    }
    for d in &geometry.dielectrics {
        let _ = writeln!(
            csv,
            "dielectric,{},{},{},{},{},{},",
            d.region.x1,
            d.region.y1,
            d.region.x2,
            d.region.y2,
            step(d.refinement_step),
            d.material.name
        );
    }

    csv
}

/// Writes the placements of a problem to a csv file
///
/// # Arguments
/// * `geometry` - The built problem
/// * `output` - The filename of the output csv
pub fn csv_output(geometry: &ProblemGeometry, output: &str) -> Result<(), TLineError> {
    if let Err(err) = std::fs::write(output, placements_csv(geometry)) {
        return Err(TLineError::Output(format!(
            "Failed to create {output}: {err}"
        )));
    }
    info!("wrote placements to {}", output);
    Ok(())
}

/// Accumulates one row per sweep point
///
/// `signal_step` is the finest refinement step over the conductors of the
/// signal ports, every port but the ground at port 0.
#[derive(Debug, Default)]
pub struct SweepTable {
    rows: String,
}

impl SweepTable {
    pub fn new(parameter: &str) -> SweepTable {
        SweepTable {
            rows: format!(
                "{parameter},world_x1,world_y1,world_x2,world_y2,world_width,world_height,signal_step,ports,conductors\n"
            ),
        }
    }

    pub fn push(&mut self, value: f64, geometry: &ProblemGeometry) {
        let signal_step = (1..geometry.port_count)
            .flat_map(|port| geometry.conductors_on(PortId(port)))
            .map(|c| c.refinement_step)
            .fold(UNBOUNDED_STEP, f64::min);
        let w = &geometry.world_box;
        let _ = writeln!(
            self.rows,
            "{value},{},{},{},{},{},{},{},{},{}",
            w.x1,
            w.y1,
            w.x2,
            w.y2,
            w.width(),
            w.height(),
            signal_step,
            geometry.port_count,
            geometry.conductors.len()
        );
    }

    pub fn as_str(&self) -> &str {
        &self.rows
    }

    pub fn write(&self, output: &str) -> Result<(), TLineError> {
        if let Err(err) = std::fs::write(output, &self.rows) {
            return Err(TLineError::Output(format!(
                "Failed to create {output}: {err}"
            )));
        }
        info!("wrote sweep summary to {}", output);
        Ok(())
    }
}

/// Human readable listing of the registered families and their schemas
pub fn families_report(registry: &FamilyRegistry, tag: Option<&str>) -> String {
    let mut report = String::new();

    for (index, family) in registry.iter().enumerate() {
        if let Some(tag) = tag {
            if !family.has_tag(tag) {
                continue;
            }
        }

        let _ = writeln!(report, "[{index}] {}", family.name);
        let _ = writeln!(report, "    {}", family.description);
        let _ = writeln!(report, "    modes: {}", family.category_tags.join(", "));
        let _ = writeln!(
            report,
            "    default tolerance: {}",
            family.builder.default_tolerance()
        );
        for spec in &family.parameters {
            let unit = if spec.is_length { " mm" } else { "" };
            let _ = writeln!(
                report,
                "    {:<22} {:<22} default {}{} (group {})",
                spec.label,
                spec.key(),
                spec.default_value,
                unit,
                spec.display_group
            );
        }
    }

    report
}

/// Table of modal impedances
pub fn modes_report(family: &str, results: &[ModeResult]) -> String {
    let mut report = format!("{family}\n");
    for result in results {
        let weights: Vec<String> = result.weights.iter().map(|w| w.to_string()).collect();
        let _ = writeln!(
            report,
            "    {:<14} {:>10.3} ohm   weights ({})",
            result.name,
            result.impedance,
            weights.join(", ")
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        families::microstrip, materials::MaterialDatabase, parameters::LengthUnit, solver,
        settings::BuilderSettings,
    };
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    fn differential() -> CrossSection {
        let registry = FamilyRegistry::with_builtin_families().unwrap();
        let family = registry.find(microstrip::DIFFERENTIAL_NAME).unwrap();
        solver::build(
            family,
            &family.default_parameters(LengthUnit::Millimetre),
            &MaterialDatabase::with_defaults(),
            &BuilderSettings::default(),
        )
        .unwrap()
    }

    #[test]
    fn cross_section_json_carries_problem_and_modes() {
        let section = differential();
        let value = cross_section_json(microstrip::DIFFERENTIAL_NAME, &section);

        assert_eq!(value["port_count"].as_usize(), Some(3));
        assert_eq!(value["conductors"].len(), 3);
        assert_eq!(value["dielectrics"].len(), 1);
        assert!(value["conductors"][0]["refinement_step"].is_null());
        assert_eq!(value["conductors"][2]["port"].as_usize(), Some(2));
        assert_eq!(value["modes"][0]["name"].as_str(), Some("Differential"));
        assert_eq!(value["modes"][0]["weights"][2].as_f64(), Some(-1.0));
        assert_eq!(value["world_box"].len(), 4);
    }

    #[test]
    fn placements_csv_has_one_row_per_placement() {
        let section = differential();
        let csv = placements_csv(&section.geometry);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "kind,x1,y1,x2,y2,step,material,port");
        assert_eq!(lines.len(), 1 + 3 + 1);
        assert!(lines[1].starts_with("conductor,"));
        assert!(lines[1].ends_with(",,Copper,0"));
        assert!(lines[2].starts_with("conductor,-1.5,1.6,-0.5,"));
        assert!(lines[4].starts_with("dielectric,"));
        assert!(lines[4].ends_with(",Isola DE104,"));
    }

    #[test]
    fn sweep_table_reports_smallest_step() {
        let section = differential();
        let mut table = SweepTable::new("track_spacing");
        table.push(1.0, &section.geometry);

        let lines: Vec<&str> = table.as_str().lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("track_spacing,"));
        assert!(lines[0].contains(",world_width,world_height,"));
        assert!(lines[1].starts_with("1,"));
        assert!(lines[1].ends_with(",0.02,3,3"));

        let fields: Vec<f64> = lines[1].split(',').map(|f| f.parse().unwrap()).collect();
        assert_relative_eq!(fields[5], fields[3] - fields[1], epsilon = 1e-12);
        assert_relative_eq!(fields[6], fields[4] - fields[2], epsilon = 1e-12);
    }

    #[test]
    fn reports_list_families_and_modes() {
        let registry = FamilyRegistry::with_builtin_families().unwrap();
        let all = families_report(&registry, None);
        assert!(all.contains(microstrip::SINGLE_NAME));
        assert!(all.contains("track_spacing"));

        let single_only = families_report(&registry, Some("Single-ended"));
        assert!(!single_only.contains(microstrip::DIFFERENTIAL_NAME));

        let results = vec![ModeResult {
            name: "Differential".to_owned(),
            impedance: 94.0,
            weights: DVector::from_vec(vec![0.0, 1.0, -1.0]),
        }];
        let report = modes_report(microstrip::DIFFERENTIAL_NAME, &results);
        assert!(report.contains("94.000 ohm"));
        assert!(report.contains("(0, 1, -1)"));

        let value = modes_json(microstrip::DIFFERENTIAL_NAME, &results);
        assert_eq!(value["modes"][0]["impedance"].as_f64(), Some(94.0));
    }
}
