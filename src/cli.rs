use clap::Parser;
use particle_field::FieldConfig;

/// An ambient particle field that keeps clear of the page content area
#[derive(Parser)]
#[command()]
pub struct Args {
    /// Number of particles
    #[arg(short, long, default_value_t = 60)]
    pub particles: usize,

    /// Distance in pixels below which two particles are connected
    #[arg(long, default_value_t = 150.0)]
    pub connection_distance: f32,

    /// Distance in pixels below which particles connect to the cursor
    #[arg(long, default_value_t = 200.0)]
    pub cursor_distance: f32,

    /// Particle speed in pixels per frame
    #[arg(short, long, default_value_t = 0.5)]
    pub speed: f32,

    /// The framerate the field is animated at
    ///
    /// `0` runs as fast as the surface allows
    #[arg(short, long, default_value_t = 60)]
    pub framerate: u32,

    /// Seed for particle placement, random if omitted
    #[arg(long)]
    pub seed: Option<u64>,

    /// Initial window width in logical pixels
    #[arg(long, default_value_t = 1280.0)]
    pub width: f64,

    /// Initial window height in logical pixels
    #[arg(long, default_value_t = 800.0)]
    pub height: f64,

    /// Start with the tuning overlay visible [F1]
    #[arg(long)]
    pub overlay: bool,
}

impl Args {
    pub fn field_config(&self) -> FieldConfig {
        FieldConfig {
            particle_count: self.particles,
            connection_distance: self.connection_distance,
            cursor_distance: self.cursor_distance,
            speed: self.speed,
            ..Default::default()
        }
    }
}
