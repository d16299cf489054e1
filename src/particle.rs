use glam::Vec2;
use rand::Rng;

use crate::{config::FieldConfig, zone::ExclusionZone};

/// Horizontal acceleration applied every tick a particle spends in the zone.
pub const ZONE_PUSH: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
}

/// Samples a point uniformly over `size`, drawing again while it lands in
/// `zone`. Gives up after `max_attempts` draws and keeps the last one, so a
/// zone covering the whole canvas still terminates.
///
/// Returns the accepted point and how many draws it took.
pub fn sample_position<R: Rng + ?Sized>(
    rng: &mut R,
    size: Vec2,
    zone: &ExclusionZone,
    max_attempts: u32,
) -> (Vec2, u32) {
    let mut attempts = 0;
    loop {
        let point = Vec2::new(rng.gen::<f32>() * size.x, rng.gen::<f32>() * size.y);
        attempts += 1;

        if !zone.contains(point) || attempts >= max_attempts {
            return (point, attempts);
        }
    }
}

impl Particle {
    pub fn new(position: Vec2, velocity: Vec2, radius: f32) -> Self {
        Self {
            position,
            velocity,
            radius,
        }
    }

    pub fn spawn<R: Rng + ?Sized>(rng: &mut R, size: Vec2, config: &FieldConfig) -> Self {
        let zone = config.zone.zone_for(size);
        let (position, attempts) =
            sample_position(rng, size, &zone, config.max_spawn_attempts);
        if zone.contains(position) {
            log::debug!(
                "Spawn sampling gave up after {attempts} attempts, keeping ({:.1}, {:.1})",
                position.x,
                position.y
            );
        }

        let velocity = Vec2::new(
            rng.gen_range(-0.5f32..0.5) * config.speed,
            rng.gen_range(-0.5f32..0.5) * config.speed,
        );

        Self {
            position,
            velocity,
            radius: rng.gen_range(1.0f32..3.0),
        }
    }

    /// Moves by one tick of velocity and bounces off the canvas edges.
    ///
    /// A component is only reflected while the particle is outside the
    /// bounds and still heading away from them, so a particle stranded by a
    /// shrinking canvas travels back in.
    pub fn advance(&mut self, size: Vec2) {
        self.position += self.velocity;

        if (self.position.x < 0.0 && self.velocity.x < 0.0)
            || (self.position.x > size.x && self.velocity.x > 0.0)
        {
            self.velocity.x = -self.velocity.x;
        }
        if (self.position.y < 0.0 && self.velocity.y < 0.0)
            || (self.position.y > size.y && self.velocity.y > 0.0)
        {
            self.velocity.y = -self.velocity.y;
        }
    }

    /// Nudges the particle out of `zone` horizontally. Returns whether the
    /// particle was inside.
    pub fn repel(&mut self, zone: &ExclusionZone, max_speed: f32) -> bool {
        if !zone.contains(self.position) {
            return false;
        }

        self.velocity.x += if self.position.x > zone.center_x() {
            ZONE_PUSH
        } else {
            -ZONE_PUSH
        };
        self.velocity = self
            .velocity
            .clamp(Vec2::splat(-max_speed), Vec2::splat(max_speed));

        true
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    const SIZE: Vec2 = Vec2::new(800.0, 600.0);

    fn zone() -> ExclusionZone {
        FieldConfig::default().zone.zone_for(SIZE)
    }

    #[test]
    fn spawn_respects_ranges() {
        let config = FieldConfig::default();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..500 {
            let p = Particle::spawn(&mut rng, SIZE, &config);
            assert!((0.0..=SIZE.x).contains(&p.position.x));
            assert!((0.0..=SIZE.y).contains(&p.position.y));
            assert!(p.velocity.x.abs() <= config.speed / 2.0);
            assert!(p.velocity.y.abs() <= config.speed / 2.0);
            assert!((1.0..3.0).contains(&p.radius));
        }
    }

    #[test]
    fn spawn_avoids_zone() {
        let config = FieldConfig::default();
        let zone = zone();
        let mut rng = StdRng::seed_from_u64(11);

        let inside = (0..500)
            .map(|_| Particle::spawn(&mut rng, SIZE, &config))
            .filter(|p| zone.contains(p.position))
            .count();
        assert_eq!(inside, 0);
    }

    #[test]
    fn sampling_gives_up_on_full_cover() {
        let cover = ExclusionZone {
            left: f32::NEG_INFINITY,
            right: f32::INFINITY,
            top: f32::NEG_INFINITY,
            bottom: f32::INFINITY,
        };
        let mut rng = StdRng::seed_from_u64(3);

        let (point, attempts) = sample_position(&mut rng, SIZE, &cover, 50);
        assert_eq!(attempts, 50);
        assert!(cover.contains(point));
    }

    #[test]
    fn advance_reflects_outward_motion_only() {
        let mut p = Particle::new(Vec2::new(799.8, 300.0), Vec2::new(0.5, 0.0), 1.0);
        p.advance(SIZE);
        assert!(p.position.x > SIZE.x);
        assert_eq!(p.velocity.x, -0.5);

        p.advance(SIZE);
        assert!(p.position.x < SIZE.x);
        assert_eq!(p.velocity.x, -0.5);

        // stranded far outside but already heading back
        let mut p = Particle::new(Vec2::new(-50.0, 700.0), Vec2::new(0.2, -0.2), 1.0);
        p.advance(SIZE);
        assert_eq!(p.velocity, Vec2::new(0.2, -0.2));
    }

    #[test]
    fn repel_pushes_away_from_center() {
        let zone = zone();
        let mut right = Particle::new(Vec2::new(500.0, 300.0), Vec2::ZERO, 1.0);
        let mut left = Particle::new(Vec2::new(300.0, 300.0), Vec2::ZERO, 1.0);

        assert!(right.repel(&zone, 1.0));
        assert!(left.repel(&zone, 1.0));
        assert_eq!(right.velocity.x, ZONE_PUSH);
        assert_eq!(left.velocity.x, -ZONE_PUSH);
    }

    #[test]
    fn repel_clamps_velocity() {
        let zone = zone();
        let mut p = Particle::new(Vec2::new(500.0, 300.0), Vec2::new(0.95, -3.0), 1.0);
        p.repel(&zone, 1.0);
        assert_eq!(p.velocity, Vec2::new(1.0, -1.0));
    }

    #[test]
    fn repel_ignores_outside() {
        let mut p = Particle::new(Vec2::new(20.0, 300.0), Vec2::new(3.0, 3.0), 1.0);
        assert!(!p.repel(&zone(), 1.0));
        assert_eq!(p.velocity, Vec2::new(3.0, 3.0));
    }
}
