//! Mount/unmount lifecycle of a [`ParticleField`] inside a host environment.
//!
//! The host (a browser window, a native event loop, a test double) delivers
//! viewport and pointer events and schedules animation frames. A mounted
//! layer registers for the events it needs and keeps exactly one frame
//! request outstanding; unmounting gives all of that back.

use glam::Vec2;
use rand::rngs::StdRng;

use crate::{canvas::Canvas, config::FieldConfig, field::ParticleField};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Resize,
    PointerMove,
    PointerLeave,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    Resized(Vec2),
    PointerMoved(Vec2),
    PointerLeft,
}

impl HostEvent {
    pub fn kind(&self) -> ListenerKind {
        match self {
            HostEvent::Resized(_) => ListenerKind::Resize,
            HostEvent::PointerMoved(_) => ListenerKind::PointerMove,
            HostEvent::PointerLeft => ListenerKind::PointerLeave,
        }
    }
}

pub trait Host {
    /// Size of the drawing surface, `None` when the host cannot provide one.
    fn viewport(&self) -> Option<Vec2>;

    fn add_listener(&mut self, kind: ListenerKind) -> ListenerId;
    fn remove_listener(&mut self, id: ListenerId);

    fn request_frame(&mut self) -> FrameId;
    fn cancel_frame(&mut self, id: FrameId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    Running,
    Stopped,
}

pub struct ParticleLayer {
    field: ParticleField,
    state: LayerState,
    listeners: Vec<ListenerId>,
    pending_frame: Option<FrameId>,
}

impl ParticleLayer {
    const LISTENS_TO: [ListenerKind; 3] = [
        ListenerKind::Resize,
        ListenerKind::PointerMove,
        ListenerKind::PointerLeave,
    ];

    /// Creates the field at the host's viewport size and starts animating.
    ///
    /// Returns `None`, leaving the host untouched, when there is no surface
    /// to draw on or the configuration is rejected.
    pub fn mount<H: Host + ?Sized>(host: &mut H, config: FieldConfig, rng: StdRng) -> Option<Self> {
        let Some(viewport) = host.viewport() else {
            log::warn!("No drawing surface available, particle layer stays inert");
            return None;
        };

        let field = match ParticleField::new(config, viewport, rng) {
            Ok(field) => field,
            Err(err) => {
                log::warn!("Particle layer not mounted: {err:#}");
                return None;
            }
        };

        let listeners = Self::LISTENS_TO
            .iter()
            .map(|&kind| host.add_listener(kind))
            .collect();
        let pending_frame = Some(host.request_frame());

        log::info!(
            "Particle layer mounted: {} particles on {}x{}",
            field.particles().len(),
            viewport.x,
            viewport.y
        );

        Some(Self {
            field,
            state: LayerState::Running,
            listeners,
            pending_frame,
        })
    }

    pub fn state(&self) -> LayerState {
        self.state
    }

    pub fn field(&self) -> &ParticleField {
        &self.field
    }

    /// Regenerates the particle population, as a fresh mount would.
    pub fn reinitialize(&mut self) {
        if self.state == LayerState::Running {
            self.field.reinitialize();
        }
    }

    /// Applies an event from the host. Only the cursor and canvas size are
    /// touched; particles are left for the next frame.
    pub fn handle_event(&mut self, event: &HostEvent) {
        if self.state == LayerState::Stopped {
            return;
        }

        match *event {
            HostEvent::Resized(size) => self.field.resize(size),
            HostEvent::PointerMoved(position) => self.field.set_cursor(Some(position)),
            HostEvent::PointerLeft => self.field.set_cursor(None),
        }
    }

    /// Runs the frame `frame` if it is the one this layer is waiting for,
    /// then schedules the next. Returns whether anything was drawn.
    pub fn on_frame<H, C>(&mut self, host: &mut H, frame: FrameId, canvas: &mut C) -> bool
    where
        H: Host + ?Sized,
        C: Canvas + ?Sized,
    {
        if self.state == LayerState::Stopped || self.pending_frame != Some(frame) {
            return false;
        }

        self.field.tick(canvas);
        self.pending_frame = Some(host.request_frame());

        true
    }

    /// Detaches every listener and cancels the outstanding frame. Calling it
    /// again is a no-op.
    pub fn unmount<H: Host + ?Sized>(&mut self, host: &mut H) {
        if self.state == LayerState::Stopped {
            return;
        }

        for id in self.listeners.drain(..) {
            host.remove_listener(id);
        }
        if let Some(frame) = self.pending_frame.take() {
            host.cancel_frame(frame);
        }

        self.field.set_cursor(None);
        self.state = LayerState::Stopped;
        log::info!("Particle layer unmounted");
    }
}
