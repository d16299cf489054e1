use glam::Vec2;
use rand::rngs::StdRng;

use crate::{
    canvas::Canvas,
    config::FieldConfig,
    particle::Particle,
    zone::ExclusionZone,
};

/// Opacity of a connection between two points `distance` apart, falling
/// linearly from `1.0` at zero distance to `0.0` at `threshold`. `None` when
/// no connection should be drawn.
pub fn connection_opacity(distance: f32, threshold: f32) -> Option<f32> {
    (distance < threshold).then(|| 1.0 - distance / threshold)
}

/// The ambient particle simulation: a fixed population drifting over a
/// canvas, kept out of the content area, connected to its neighbours and to
/// the cursor.
pub struct ParticleField {
    config: FieldConfig,
    size: Vec2,
    particles: Vec<Particle>,
    cursor: Option<Vec2>,
    rng: StdRng,
}

impl ParticleField {
    pub fn new(config: FieldConfig, size: Vec2, rng: StdRng) -> anyhow::Result<Self> {
        config.validate()?;

        let mut field = Self {
            config,
            size: sanitize_size(size),
            particles: Vec::with_capacity(config.particle_count),
            cursor: None,
            rng,
        };
        field.reinitialize();

        Ok(field)
    }

    /// Builds a field around an explicit population instead of spawning one.
    /// `rng` drives later calls to [`reinitialize`](Self::reinitialize).
    pub fn with_particles(
        config: FieldConfig,
        size: Vec2,
        particles: Vec<Particle>,
        rng: StdRng,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            size: sanitize_size(size),
            particles,
            cursor: None,
            rng,
        })
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn cursor(&self) -> Option<Vec2> {
        self.cursor
    }

    pub fn exclusion_zone(&self) -> ExclusionZone {
        self.config.zone.zone_for(self.size)
    }

    /// Cursor position if it should interact with the particles, i.e. it is
    /// known and not hovering the content area.
    pub fn active_cursor(&self) -> Option<Vec2> {
        let zone = self.exclusion_zone();
        self.cursor.filter(|&cursor| !zone.contains(cursor))
    }

    pub fn set_cursor(&mut self, cursor: Option<Vec2>) {
        self.cursor = cursor;
    }

    /// Changes the canvas dimensions. Particles keep their positions and pick
    /// up the new bounds and zone on the next update.
    pub fn resize(&mut self, size: Vec2) {
        let size = sanitize_size(size);
        log::debug!(
            "Particle field resized {}x{} -> {}x{}",
            self.size.x,
            self.size.y,
            size.x,
            size.y
        );
        self.size = size;
    }

    /// Throws the population away and spawns a new one for the current size.
    pub fn reinitialize(&mut self) {
        let size = self.size;
        let config = self.config;
        let rng = &mut self.rng;

        self.particles.clear();
        self.particles.extend(
            (0..config.particle_count).map(|_| Particle::spawn(&mut *rng, size, &config)),
        );

        log::debug!(
            "Spawned {} particles on a {}x{} canvas",
            self.particles.len(),
            size.x,
            size.y
        );
    }

    pub fn update(&mut self) {
        let size = self.size;
        let zone = self.exclusion_zone();
        let max_speed = self.config.max_speed();

        for particle in &mut self.particles {
            particle.advance(size);
            particle.repel(&zone, max_speed);
        }
    }

    pub fn render<C: Canvas + ?Sized>(&self, canvas: &mut C) {
        let palette = &self.config.palette;
        canvas.clear();

        let particle_color = palette.base.with_alpha(palette.particle_alpha);
        for particle in &self.particles {
            canvas.fill_circle(particle.position, particle.radius, particle_color);
        }

        for (i, a) in self.particles.iter().enumerate() {
            for b in &self.particles[i + 1..] {
                let distance = a.position.distance(b.position);
                if let Some(opacity) = connection_opacity(distance, self.config.connection_distance)
                {
                    canvas.stroke_line(
                        a.position,
                        b.position,
                        palette.connection_width,
                        palette
                            .base
                            .with_alpha(opacity * palette.connection_alpha),
                    );
                }
            }
        }

        let Some(cursor) = self.active_cursor() else {
            return;
        };

        canvas.fill_circle(
            cursor,
            palette.cursor_radius,
            palette.base.with_alpha(palette.cursor_alpha),
        );
        for particle in &self.particles {
            let distance = cursor.distance(particle.position);
            if let Some(opacity) = connection_opacity(distance, self.config.cursor_distance) {
                canvas.stroke_line(
                    cursor,
                    particle.position,
                    palette.cursor_line_width,
                    palette
                        .base
                        .with_alpha(opacity * palette.cursor_line_alpha),
                );
                canvas.fill_circle(
                    particle.position,
                    particle.radius + palette.highlight_grow,
                    palette.base.with_alpha(opacity * palette.highlight_alpha),
                );
            }
        }
    }

    /// One animation frame: advance every particle, then draw the result.
    pub fn tick<C: Canvas + ?Sized>(&mut self, canvas: &mut C) {
        self.update();
        self.render(canvas);
    }
}

fn sanitize_size(size: Vec2) -> Vec2 {
    if size.is_finite() {
        size.max(Vec2::ZERO)
    } else {
        Vec2::ZERO
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::canvas::DrawList;

    const SIZE: Vec2 = Vec2::new(800.0, 600.0);

    fn still(x: f32, y: f32) -> Particle {
        Particle::new(Vec2::new(x, y), Vec2::ZERO, 2.0)
    }

    #[test]
    fn opacity_is_linear_and_cut_off() {
        assert_eq!(connection_opacity(0.0, 150.0), Some(1.0));
        assert_eq!(connection_opacity(75.0, 150.0), Some(0.5));
        assert_eq!(connection_opacity(150.0, 150.0), None);
        assert_eq!(connection_opacity(151.0, 150.0), None);
    }

    #[test]
    fn opacity_never_increases_with_distance() {
        let mut previous = f32::INFINITY;
        for step in 0..150 {
            let opacity = connection_opacity(step as f32, 150.0).unwrap();
            assert!(opacity <= previous);
            previous = opacity;
        }
    }

    #[test]
    fn new_spawns_configured_count() {
        let field =
            ParticleField::new(FieldConfig::default(), SIZE, StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(field.particles().len(), 60);
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = FieldConfig {
            cursor_distance: -1.0,
            ..Default::default()
        };
        assert!(ParticleField::new(config, SIZE, StdRng::seed_from_u64(1)).is_err());
    }

    #[test]
    fn renders_every_particle_after_clear() {
        let field = ParticleField::with_particles(
            FieldConfig::default(),
            SIZE,
            vec![still(10.0, 10.0), still(700.0, 20.0), still(20.0, 500.0)],
            StdRng::seed_from_u64(7),
        )
        .unwrap();

        let mut list = DrawList::new();
        field.render(&mut list);

        assert_eq!(list.commands()[0], crate::canvas::DrawCommand::Clear);
        assert_eq!(list.circles().count(), 3);
        assert_eq!(list.lines().count(), 0);
    }

    #[test]
    fn far_pairs_are_not_connected() {
        let field = ParticleField::with_particles(
            FieldConfig::default(),
            SIZE,
            vec![still(0.0, 0.0), still(150.0, 0.0), still(10.0, 0.0)],
            StdRng::seed_from_u64(7),
        )
        .unwrap();

        let mut list = DrawList::new();
        field.render(&mut list);

        // (0,0)-(10,0) and (10,0)-(150,0); exactly 150 apart is not connected
        assert_eq!(list.lines().count(), 2);
    }

    #[test]
    fn cursor_highlights_nearby_particles() {
        let mut field = ParticleField::with_particles(
            FieldConfig::default(),
            SIZE,
            vec![still(20.0, 30.0), still(760.0, 30.0)],
            StdRng::seed_from_u64(7),
        )
        .unwrap();
        field.set_cursor(Some(Vec2::new(20.0, 40.0)));

        let mut list = DrawList::new();
        field.render(&mut list);

        let palette = FieldConfig::default().palette;
        let cursor_lines: Vec<_> = list
            .lines()
            .filter(|(_, _, width, _)| *width == palette.cursor_line_width)
            .collect();
        assert_eq!(cursor_lines.len(), 1);
        assert!((cursor_lines[0].3.a - 0.95 * 0.6).abs() < 1e-5);

        // two particles, the cursor marker and one highlight
        assert_eq!(list.circles().count(), 4);
        assert!(list
            .circles()
            .any(|(center, radius, _)| center == Vec2::new(20.0, 30.0) && radius == 3.0));
    }

    #[test]
    fn cursor_leaving_stops_interaction() {
        let mut field = ParticleField::with_particles(
            FieldConfig::default(),
            SIZE,
            vec![still(20.0, 30.0)],
            StdRng::seed_from_u64(7),
        )
        .unwrap();
        field.set_cursor(Some(Vec2::new(20.0, 40.0)));
        field.set_cursor(None);

        let mut list = DrawList::new();
        field.render(&mut list);
        assert_eq!(list.circles().count(), 1);
        assert_eq!(list.lines().count(), 0);
    }

    #[test]
    fn reinitialize_replaces_population() {
        let mut field =
            ParticleField::new(FieldConfig::default(), SIZE, StdRng::seed_from_u64(5)).unwrap();
        let before = field.particles().to_vec();

        field.reinitialize();
        assert_eq!(field.particles().len(), before.len());
        assert_ne!(field.particles(), &before[..]);
    }

    #[test]
    fn hand_built_fields_respawn_deterministically() {
        let build = || {
            ParticleField::with_particles(
                FieldConfig::default(),
                SIZE,
                vec![still(20.0, 30.0)],
                StdRng::seed_from_u64(11),
            )
            .unwrap()
        };
        let mut first = build();
        let mut second = build();

        first.reinitialize();
        second.reinitialize();
        assert_eq!(first.particles().len(), 60);
        assert_eq!(first.particles(), second.particles());
    }

    #[test]
    fn negative_size_is_clamped() {
        let mut field = ParticleField::with_particles(
            FieldConfig::default(),
            SIZE,
            Vec::new(),
            StdRng::seed_from_u64(7),
        )
        .unwrap();
        field.resize(Vec2::new(-10.0, f32::NAN));
        assert_eq!(field.size(), Vec2::ZERO);
    }
}
