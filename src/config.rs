use anyhow::ensure;
use glam::Vec2;

use crate::zone::ExclusionZone;

/// Straight (non-premultiplied) sRGB colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a,
        }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Geometry of the content area the particles stay away from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneLayout {
    pub max_width: f32,
    /// Fraction of the canvas width used when that is narrower than `max_width`
    pub width_fraction: f32,
    /// Height of the navigation bar; the zone starts below it
    pub top_offset: f32,
}

impl Default for ZoneLayout {
    fn default() -> Self {
        Self {
            max_width: 1024.0,
            width_fraction: 0.75,
            top_offset: 64.0,
        }
    }
}

impl ZoneLayout {
    pub fn zone_for(&self, size: Vec2) -> ExclusionZone {
        let width = self.max_width.min(size.x * self.width_fraction);
        ExclusionZone {
            left: (size.x - width) / 2.0,
            right: (size.x + width) / 2.0,
            top: self.top_offset,
            bottom: size.y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub base: Color,
    pub particle_alpha: f32,

    pub connection_alpha: f32,
    pub connection_width: f32,

    pub cursor_alpha: f32,
    pub cursor_radius: f32,
    pub cursor_line_alpha: f32,
    pub cursor_line_width: f32,

    pub highlight_alpha: f32,
    pub highlight_grow: f32,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            base: Color::from_rgba8(16, 185, 129, 1.0),
            particle_alpha: 0.4,

            connection_alpha: 0.15,
            connection_width: 1.0,

            cursor_alpha: 0.6,
            cursor_radius: 3.0,
            cursor_line_alpha: 0.6,
            cursor_line_width: 1.5,

            highlight_alpha: 0.8,
            highlight_grow: 1.0,
        }
    }
}

/// Tunables of a [`ParticleField`](crate::field::ParticleField).
///
/// Distances are in canvas pixels, `speed` in pixels per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldConfig {
    pub particle_count: usize,
    pub connection_distance: f32,
    pub cursor_distance: f32,
    pub speed: f32,
    pub max_spawn_attempts: u32,

    pub zone: ZoneLayout,
    pub palette: Palette,

    /// Opacity the whole layer is composited with
    pub layer_opacity: f32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            particle_count: 60,
            connection_distance: 150.0,
            cursor_distance: 200.0,
            speed: 0.5,
            max_spawn_attempts: 50,

            zone: ZoneLayout::default(),
            palette: Palette::default(),

            layer_opacity: 0.4,
        }
    }
}

impl FieldConfig {
    /// Largest magnitude either velocity component may reach inside the zone.
    pub fn max_speed(&self) -> f32 {
        self.speed * 2.0
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.connection_distance.is_finite() && self.connection_distance > 0.0,
            "connection distance must be a positive number, got {}",
            self.connection_distance
        );
        ensure!(
            self.cursor_distance.is_finite() && self.cursor_distance > 0.0,
            "cursor distance must be a positive number, got {}",
            self.cursor_distance
        );
        ensure!(
            self.speed.is_finite() && self.speed >= 0.0,
            "speed must be a non-negative number, got {}",
            self.speed
        );
        ensure!(
            self.max_spawn_attempts > 0,
            "at least one spawn attempt is required"
        );
        ensure!(
            self.zone.width_fraction > 0.0 && self.zone.width_fraction <= 1.0,
            "zone width fraction must be in (0, 1], got {}",
            self.zone.width_fraction
        );
        ensure!(
            self.zone.max_width.is_finite() && self.zone.max_width >= 0.0,
            "zone max width must be a non-negative number, got {}",
            self.zone.max_width
        );
        ensure!(
            self.zone.top_offset.is_finite(),
            "zone top offset must be finite"
        );

        let palette = &self.palette;
        for (name, alpha) in [
            ("particle", palette.particle_alpha),
            ("connection", palette.connection_alpha),
            ("cursor", palette.cursor_alpha),
            ("cursor line", palette.cursor_line_alpha),
            ("highlight", palette.highlight_alpha),
            ("layer", self.layer_opacity),
        ] {
            ensure!(
                (0.0..=1.0).contains(&alpha),
                "{name} opacity must be in [0, 1], got {alpha}"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(FieldConfig::default().validate().is_ok());
    }

    #[test]
    fn zone_is_capped_at_max_width() {
        let zone = ZoneLayout::default().zone_for(Vec2::new(1920.0, 1080.0));
        assert_eq!(zone.left, 448.0);
        assert_eq!(zone.right, 1472.0);
        assert_eq!(zone.top, 64.0);
        assert_eq!(zone.bottom, 1080.0);
    }

    #[test]
    fn narrow_canvas_uses_width_fraction() {
        let zone = ZoneLayout::default().zone_for(Vec2::new(800.0, 600.0));
        assert_eq!(zone.left, 100.0);
        assert_eq!(zone.right, 700.0);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = FieldConfig {
            connection_distance: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = FieldConfig {
            speed: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = FieldConfig {
            layer_opacity: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = FieldConfig::default();
        config.zone.width_fraction = 0.0;
        assert!(config.validate().is_err());
    }
}
