use glam::Vec2;

/// Axis-aligned rectangle reserved for readable page content.
///
/// Never stored by the field; it is derived from the canvas size through
/// [`ZoneLayout::zone_for`](crate::config::ZoneLayout::zone_for) every time
/// it is needed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExclusionZone {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl ExclusionZone {
    /// Points on the border are outside.
    pub fn contains(&self, point: Vec2) -> bool {
        point.x > self.left && point.x < self.right && point.y > self.top && point.y < self.bottom
    }

    pub fn center_x(&self) -> f32 {
        (self.left + self.right) / 2.0
    }
}
