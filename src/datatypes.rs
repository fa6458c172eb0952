use crate::materials::{ConductorMaterial, DielectricMaterial};

/// Refinement step that requests no extra local refinement
pub const UNBOUNDED_STEP: f64 = f64::MAX;

/// Axis-aligned box in the cross-section plane, lower-left to upper-right.
///
/// Ordering (`x1 <= x2`, `y1 <= y2`) is the caller's responsibility and is not
/// checked here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Box2D {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Box2D {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Box2D {
        Box2D { x1, y1, x2, y2 }
    }

    /// Reflects the box across the Y axis
    ///
    /// # Returns
    /// The box `{-x2, y1, -x1, y2}`. Applying this twice gives back the
    /// original box.
    pub fn mirrored_x(&self) -> Box2D {
        Box2D {
            x1: -self.x2,
            y1: self.y1,
            x2: -self.x1,
            y2: self.y2,
        }
    }

    /// Smallest box enclosing both boxes
    pub fn union(&self, other: &Box2D) -> Box2D {
        Box2D {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    /// Whether `other` lies inside this box. Shared edges count as inside.
    pub fn contains(&self, other: &Box2D) -> bool {
        self.x1 <= other.x1 && self.y1 <= other.y1 && self.x2 >= other.x2 && self.y2 >= other.y2
    }

    /// Whether the two boxes overlap. Touching edges count as overlapping, so
    /// a zero-height box on the border of this box intersects it.
    pub fn intersects(&self, other: &Box2D) -> bool {
        self.x1 <= other.x2 && other.x1 <= self.x2 && self.y1 <= other.y2 && other.y1 <= self.y2
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }
}

/// Handle of an electrical port, also its row/column in solver results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub usize);

impl PortId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConductorPlacement {
    pub region: Box2D,
    pub refinement_step: f64,
    pub material: ConductorMaterial,
    pub port: PortId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DielectricPlacement {
    pub region: Box2D,
    pub refinement_step: f64,
    pub material: DielectricMaterial,
}

/// Everything the external mesher and field solver need for one request
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemGeometry {
    pub world_box: Box2D,
    pub focus_box: Box2D,
    pub tolerance: f64,
    pub min_feature_size: f64,
    pub port_count: usize,
    pub conductors: Vec<ConductorPlacement>,
    pub dielectrics: Vec<DielectricPlacement>,
}

impl ProblemGeometry {
    /// Conductors attached to the given port, in declaration order
    pub fn conductors_on(&self, port: PortId) -> impl Iterator<Item = &ConductorPlacement> {
        self.conductors.iter().filter(move |c| c.port == port)
    }
}
