//! Bindings to the host's spatial and entity API
//!
//! Units are owned by the host; scripts only ever see handles to them.

use std::rc::Rc;

/// World-space position
pub type Vector = [f64; 3];

/// Host-assigned unit identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub u64);

/// A unit living in the host world
pub trait Unit {
    fn id(&self) -> UnitId;

    /// Whether `other` is hostile to this unit
    fn is_enemy(&self, other: &dyn Unit) -> bool;

    fn kill(&self);
}

/// Spatial queries against the host world
pub trait World {
    fn find_units_in_radius(&self, center: Vector, radius: f64) -> Vec<Rc<dyn Unit>>;
}

/// Euclidean distance between two positions
pub fn distance(a: Vector, b: Vector) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}
