use json::JsonValue;
use tracing::debug;

use crate::{
    datatypes::{Box2D, PortId, UNBOUNDED_STEP},
    error::TLineError,
    families::{CrossSection, CrossSectionBuilder},
    modes::ModeSet,
    parameters::{ParameterKind, ParameterSpec, ResolvedParameters},
    problem::ProblemBuilder,
    registry::{FamilyDescriptor, FamilyRegistry},
    settings::BuilderSettings,
};

pub const SINGLE_NAME: &str = "Microstrip (single)";
pub const DIFFERENTIAL_NAME: &str = "Microstrip (differential)";

const SINGLE_TOLERANCE: f64 = 0.0015;
const DIFFERENTIAL_TOLERANCE: f64 = 0.15;

const MICROSTRIP_NOTE: &str = "Microstrips require very little space but are more susceptible \
    to crosstalk than most other types of transmission lines.";

/// Dimensions shared by every microstrip variant, in millimetres
struct Stackup {
    track_width: f64,
    track_thickness: f64,
    substrate_thickness: f64,
}

impl Stackup {
    fn read(params: &ResolvedParameters) -> Result<Stackup, TLineError> {
        Ok(Stackup {
            track_width: params.length("track_width")?,
            track_thickness: params.length("track_thickness")?,
            substrate_thickness: params.length("substrate_thickness")?,
        })
    }

    /// Lateral and vertical space between the tracks and the world edge
    fn margins(&self, settings: &BuilderSettings) -> (f64, f64) {
        let feature = self.track_width + self.track_thickness + self.substrate_thickness;
        (feature * settings.margin_x, feature * settings.margin_y)
    }

    /// Track sitting on top of the substrate between `x1` and `x2`
    fn track(&self, x1: f64, x2: f64) -> Box2D {
        Box2D::new(
            x1,
            self.substrate_thickness,
            x2,
            self.substrate_thickness + self.track_thickness,
        )
    }

    /// World and focus boxes around the leftmost and rightmost tracks
    fn domain(&self, left: &Box2D, right: &Box2D, settings: &BuilderSettings) -> (Box2D, Box2D) {
        let (space_x, space_y) = self.margins(settings);
        let tracks = left.union(right);

        let world_box = Box2D::new(
            tracks.x1 - space_x,
            0.0,
            tracks.x2 + space_x,
            tracks.y2 + space_y,
        );
        let focus_box = Box2D::new(tracks.x1, 0.0, tracks.x2, tracks.y2);

        (world_box, focus_box)
    }

    fn min_feature_size(&self, settings: &BuilderSettings) -> f64 {
        self.substrate_thickness * settings.min_feature_fraction
    }
}

/// Ground plane along the bottom of the world and the substrate above it.
/// The ground port must be the first port allocated.
fn add_ground_and_substrate(
    builder: &mut ProblemBuilder,
    stackup: &Stackup,
    params: &ResolvedParameters,
    ground_port: PortId,
) -> Result<(), TLineError> {
    let world_box = builder.world_box();
    let ground_box = Box2D::new(world_box.x1, 0.0, world_box.x2, 0.0);
    let substrate_box = Box2D::new(world_box.x1, 0.0, world_box.x2, stackup.substrate_thickness);

    builder.add_conductor(
        ground_box,
        UNBOUNDED_STEP,
        params.conductor("track_material")?,
        ground_port,
    );
    builder.add_dielectric(
        substrate_box,
        UNBOUNDED_STEP,
        params.dielectric("substrate_material")?,
    );

    Ok(())
}

/// A single track above a ground plane
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleMicrostrip;

impl CrossSectionBuilder for SingleMicrostrip {
    fn default_tolerance(&self) -> f64 {
        SINGLE_TOLERANCE
    }

    fn build(
        &self,
        params: &ResolvedParameters,
        settings: &BuilderSettings,
    ) -> Result<CrossSection, TLineError> {
        let stackup = Stackup::read(params)?;

        let track_box = stackup.track(-0.5 * stackup.track_width, 0.5 * stackup.track_width);
        let (world_box, focus_box) = stackup.domain(&track_box, &track_box, settings);
        let track_step = stackup.substrate_thickness * settings.refinement_fraction;

        let mut builder = ProblemBuilder::new(
            world_box,
            focus_box,
            settings.tolerance.unwrap_or(self.default_tolerance()),
            stackup.min_feature_size(settings),
        );

        let port_ground = builder.add_port();
        let port_signal = builder.add_port();

        add_ground_and_substrate(&mut builder, &stackup, params, port_ground)?;
        builder.add_conductor(
            track_box,
            track_step,
            params.conductor("track_material")?,
            port_signal,
        );

        let geometry = builder.finish()?;
        debug!("microstrip: single world {:?}", geometry.world_box);

        let modes = ModeSet::new(geometry.port_count, &["Single-ended"], &[0.0, 1.0], &[1.0])?;

        Ok(CrossSection { geometry, modes })
    }
}

/// A differential pair above a ground plane
///
/// Only the left track is laid out, the right one is its mirror image so the
/// pair is exactly symmetric about x = 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifferentialMicrostrip;

impl CrossSectionBuilder for DifferentialMicrostrip {
    fn default_tolerance(&self) -> f64 {
        DIFFERENTIAL_TOLERANCE
    }

    fn build(
        &self,
        params: &ResolvedParameters,
        settings: &BuilderSettings,
    ) -> Result<CrossSection, TLineError> {
        let stackup = Stackup::read(params)?;
        let track_spacing = params.length("track_spacing")?;

        let track1_box = stackup.track(
            -0.5 * track_spacing - stackup.track_width,
            -0.5 * track_spacing,
        );
        let track2_box = track1_box.mirrored_x();
        let (world_box, focus_box) = stackup.domain(&track1_box, &track2_box, settings);

        // narrow gaps need a finer step to resolve the coupling field
        let track_step = track_spacing.min(stackup.substrate_thickness) * settings.refinement_fraction;

        let mut builder = ProblemBuilder::new(
            world_box,
            focus_box,
            settings.tolerance.unwrap_or(self.default_tolerance()),
            stackup.min_feature_size(settings),
        );

        let port_ground = builder.add_port();
        let port_signal1 = builder.add_port();
        let port_signal2 = builder.add_port();

        let track_material = params.conductor("track_material")?;
        add_ground_and_substrate(&mut builder, &stackup, params, port_ground)?;
        builder.add_conductor(track1_box, track_step, track_material, port_signal1);
        builder.add_conductor(track2_box, track_step, track_material, port_signal2);

        let geometry = builder.finish()?;
        debug!("microstrip: differential world {:?}", geometry.world_box);

        let modes = ModeSet::new(
            geometry.port_count,
            &["Differential", "Common-mode"],
            &[0.0, 1.0, -1.0, 0.0, 1.0, 1.0],
            &[2.0, 1.0],
        )?;

        Ok(CrossSection { geometry, modes })
    }
}

fn length_spec(label: &str, default: f64) -> ParameterSpec {
    ParameterSpec::new(label, ParameterKind::Real, JsonValue::from(default), true, 0)
}

fn track_material_spec() -> ParameterSpec {
    ParameterSpec::new(
        "Track Material",
        ParameterKind::MaterialConductor,
        JsonValue::from("Copper"),
        false,
        1,
    )
}

fn substrate_material_spec() -> ParameterSpec {
    ParameterSpec::new(
        "Substrate Material",
        ParameterKind::MaterialDielectric,
        JsonValue::from("Isola DE104"),
        false,
        0,
    )
}

/// Registers the single and differential microstrip families
pub fn register(registry: &mut FamilyRegistry) -> Result<(), TLineError> {
    registry.register(FamilyDescriptor {
        name: SINGLE_NAME.to_owned(),
        description: format!(
            "A single track above a ground plane. This is the simplest and most common PCB \
            transmission line. {MICROSTRIP_NOTE}"
        ),
        parameters: vec![
            length_spec("Track Width", 1.0),
            length_spec("Track Thickness", 0.035),
            track_material_spec(),
            length_spec("Substrate Thickness", 1.6),
            substrate_material_spec(),
        ],
        category_tags: vec!["Single-ended".to_owned()],
        builder: Box::new(SingleMicrostrip),
    })?;

    registry.register(FamilyDescriptor {
        name: DIFFERENTIAL_NAME.to_owned(),
        description: format!(
            "A differential pair above a ground plane. This is the simplest and most common \
            differential PCB transmission line. {MICROSTRIP_NOTE}"
        ),
        parameters: vec![
            length_spec("Track Width", 1.0),
            length_spec("Track Spacing", 1.0),
            length_spec("Track Thickness", 0.035),
            track_material_spec(),
            length_spec("Substrate Thickness", 1.6),
            substrate_material_spec(),
        ],
        category_tags: vec!["Differential".to_owned(), "Common-mode".to_owned()],
        builder: Box::new(DifferentialMicrostrip),
    })?;

    Ok(())
}
