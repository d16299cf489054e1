//! Ambient particle field: a fixed population of drifting points that
//! avoid a central content area and draw proximity connections to each
//! other and to the cursor.
//!
//! The simulation is headless. It draws through the [`canvas::Canvas`]
//! trait and is driven by a [`layer::Host`], so the same code runs behind
//! the wgpu window in the binary and inside unit tests.

pub mod canvas;
pub mod config;
pub mod field;
pub mod layer;
pub mod particle;
pub mod zone;

pub use canvas::{Canvas, DrawCommand, DrawList};
pub use config::{Color, FieldConfig, Palette, ZoneLayout};
pub use field::{connection_opacity, ParticleField};
pub use layer::{FrameId, Host, HostEvent, LayerState, ListenerId, ListenerKind, ParticleLayer};
pub use particle::Particle;
pub use zone::ExclusionZone;
