mod cli;
mod framepace;
mod gpu;
mod gui;
mod render;
mod utils;

use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use clap::Parser;
use framepace::Framepacer;
use glam::Vec2;
use gpu::GpuContext;
use gui::{EguiIntegration, Overlay, OverlayAction, OverlayStats};
use particle_field::{
    Color, DrawList, FieldConfig, FrameId, Host, HostEvent, LayerState, ListenerId, ListenerKind,
    ParticleLayer,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use render::RenderModule;
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

fn background() -> Color {
    Color::from_rgba8(248, 250, 252, 1.0)
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    // Collect Arguments
    let args = cli::Args::parse();
    let config = args.field_config();
    config.validate().context("Invalid field configuration")?;

    // Setup Winit
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let seed_rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut app_state = AppState {
        tokio_rt: tokio::runtime::Runtime::new()?,
        gfx: None,
        host: WindowHost::default(),
        layer: None,
        config,
        seed_rng,
        canvas: DrawList::new(),
        overlay: Overlay::new(args.overlay, config),
        framepace: Framepacer::new(args.framerate),

        initial_size: LogicalSize::new(args.width, args.height),
        mouse_position: Vec2::ZERO,
        exit_error: None,
    };

    event_loop.run_app(&mut app_state)?;

    match app_state.exit_error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// The window seen from the particle layer: listener table, the single
/// outstanding frame request and the canvas size in logical pixels.
#[derive(Default)]
struct WindowHost {
    viewport: Option<Vec2>,
    listeners: HashMap<ListenerId, ListenerKind>,
    pending_frame: Option<FrameId>,
    minimized: bool,
    next_id: u64,
}

impl WindowHost {
    /// Records a new window size. Returns the logical viewport to report to
    /// the layer, or `None` while the window is minimized.
    fn resize(&mut self, size: PhysicalSize<u32>, scale_factor: f64) -> Option<Vec2> {
        self.minimized = size.width == 0 || size.height == 0;
        if self.minimized {
            return None;
        }

        let logical = size.to_logical::<f32>(scale_factor);
        let viewport = Vec2::new(logical.width, logical.height);
        self.viewport = Some(viewport);
        Some(viewport)
    }

    fn listens_to(&self, kind: ListenerKind) -> bool {
        self.listeners.values().any(|&registered| registered == kind)
    }

    /// The pending frame, held back while the window is minimized.
    fn take_frame(&mut self) -> Option<FrameId> {
        if self.minimized {
            return None;
        }
        self.pending_frame.take()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Host for WindowHost {
    fn viewport(&self) -> Option<Vec2> {
        self.viewport
    }

    fn add_listener(&mut self, kind: ListenerKind) -> ListenerId {
        let id = ListenerId(self.next_id());
        self.listeners.insert(id, kind);
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
    }

    fn request_frame(&mut self) -> FrameId {
        let id = FrameId(self.next_id());
        self.pending_frame = Some(id);
        id
    }

    fn cancel_frame(&mut self, id: FrameId) {
        if self.pending_frame == Some(id) {
            self.pending_frame = None;
        }
    }
}

struct GfxState {
    window: Arc<Window>,
    gpu: GpuContext,
    egui: EguiIntegration,
    render_module: RenderModule,
}

struct AppState {
    tokio_rt: tokio::runtime::Runtime,
    gfx: Option<GfxState>,

    host: WindowHost,
    layer: Option<ParticleLayer>,
    config: FieldConfig,
    seed_rng: StdRng,
    canvas: DrawList,

    overlay: Overlay,
    framepace: Framepacer,

    initial_size: LogicalSize<f64>,
    mouse_position: Vec2,
    exit_error: Option<anyhow::Error>,
}

impl AppState {
    fn init_graphics(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<GfxState> {
        let window = Arc::new(
            event_loop.create_window(
                Window::default_attributes()
                    .with_title("Particle Field")
                    .with_inner_size(self.initial_size),
            )?,
        );

        let gpu = self.tokio_rt.block_on(GpuContext::new(window.clone()))?;
        let render_module = RenderModule::new(&gpu.device, gpu.format());
        let mut egui = EguiIntegration::new(&gpu.device, gpu.format());

        let size = window.inner_size();
        egui.resize(size.width, size.height);

        Ok(GfxState {
            window,
            gpu,
            egui,
            render_module,
        })
    }

    fn scale_factor(&self) -> f64 {
        self.gfx
            .as_ref()
            .map_or(1.0, |gfx| gfx.window.scale_factor())
    }

    fn mount_layer(&mut self) {
        if matches!(&self.layer, Some(layer) if layer.state() == LayerState::Running) {
            return;
        }

        let rng = StdRng::seed_from_u64(self.seed_rng.gen());
        self.layer = ParticleLayer::mount(&mut self.host, self.config, rng);
    }

    fn unmount_layer(&mut self) {
        if let Some(layer) = &mut self.layer {
            layer.unmount(&mut self.host);
        }
    }

    fn toggle_layer(&mut self) {
        match self.layer.as_ref().map(ParticleLayer::state) {
            Some(LayerState::Running) => self.unmount_layer(),
            _ => self.mount_layer(),
        }
    }

    fn apply_config(&mut self, config: FieldConfig) {
        if let Err(err) = config.validate() {
            log::warn!("Ignoring overlay settings: {err:#}");
            return;
        }

        self.config = config;
        self.unmount_layer();
        self.mount_layer();
    }

    fn apply_window_size(&mut self, size: PhysicalSize<u32>, scale_factor: f64) {
        let Some(viewport) = self.host.resize(size, scale_factor) else {
            log::debug!("Window minimized, pausing the particle layer");
            return;
        };

        if let Some(gfx) = &mut self.gfx {
            gfx.gpu.resize(size.width, size.height);
            gfx.egui.resize(size.width, size.height);
            gfx.render_module
                .update_size(&gfx.gpu.queue, viewport.x, viewport.y);
        }
        self.dispatch(HostEvent::Resized(viewport));

        // A window that opened minimized mounts once it first has a size
        if self.layer.is_none() && self.gfx.is_some() {
            self.mount_layer();
        }
    }

    /// Forwards an event only if the layer currently listens for it.
    fn dispatch(&mut self, event: HostEvent) {
        if !self.host.listens_to(event.kind()) {
            return;
        }

        if let Some(layer) = &mut self.layer {
            layer.handle_event(&event);
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, key: KeyCode) -> bool {
        match key {
            KeyCode::Space => self.toggle_layer(),
            KeyCode::KeyR => {
                if let Some(layer) = &mut self.layer {
                    layer.reinitialize();
                }
            }
            KeyCode::F1 => self.overlay.visible = !self.overlay.visible,
            KeyCode::F11 => {
                if let Some(gfx) = &self.gfx {
                    if gfx.window.fullscreen().is_none() {
                        gfx.window
                            .set_fullscreen(Some(Fullscreen::Borderless(None)));
                    } else {
                        gfx.window.set_fullscreen(None);
                    }
                }
            }
            KeyCode::Escape => {
                self.unmount_layer();
                event_loop.exit();
            }
            _ => return false,
        }

        true
    }

    fn overlay_stats(&self) -> OverlayStats {
        let field = self.layer.as_ref().map(ParticleLayer::field);
        OverlayStats {
            state: self.layer.as_ref().map(ParticleLayer::state),
            fps: self.framepace.framerate(),
            particles: field.map_or(0, |field| field.particles().len()),
            cursor: field.and_then(|field| field.cursor()),
            cursor_active: field.and_then(|field| field.active_cursor()).is_some(),
        }
    }

    fn redraw(&mut self) {
        self.framepace.begin_frame();

        // Animation frame
        self.canvas.reset();
        if let Some(frame) = self.host.take_frame() {
            if let Some(layer) = &mut self.layer {
                layer.on_frame(&mut self.host, frame, &mut self.canvas);
            }
        }

        match self.present() {
            Some(OverlayAction::Apply(config)) => self.apply_config(config),
            Some(OverlayAction::ToggleLayer) => self.toggle_layer(),
            Some(OverlayAction::Reinitialize) => {
                if let Some(layer) = &mut self.layer {
                    layer.reinitialize();
                }
            }
            None => (),
        }

        self.framepace.end_frame();
    }

    /// Draws the recorded canvas and the overlay. Returns what the overlay
    /// asked for this frame.
    fn present(&mut self) -> Option<OverlayAction> {
        if self.host.minimized {
            return None;
        }
        let stats = self.overlay_stats();
        let gfx = self.gfx.as_mut()?;

        let frame = match gfx.gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gfx.gpu.reconfigure_surface();
                return None;
            }
            Err(err) => {
                log::warn!("Skipping frame: {err}");
                return None;
            }
        };

        let mut action = None;
        gfx.egui.run(|ctx| action = self.overlay.ui(ctx, &stats));

        gfx.render_module.prepare(
            &gfx.gpu.device,
            &gfx.gpu.queue,
            &self.canvas,
            self.config.layer_opacity,
        );

        let mut encoder = gfx
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        let egui_buffers = gfx.egui.pre_render(
            &gfx.gpu.device,
            &gfx.gpu.queue,
            &mut encoder,
            self.framepace.frametime(),
        );

        // Render
        {
            let view = frame
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());

            let mut rpass = gfx
                .render_module
                .begin_pass(&mut encoder, &view, background());
            gfx.egui.render(&mut rpass);
        }

        gfx.gpu
            .queue
            .submit(egui_buffers.into_iter().chain(Some(encoder.finish())));
        frame.present();

        action
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gfx.is_some() {
            return;
        }

        match self.init_graphics(event_loop) {
            Ok(gfx) => {
                let size = gfx.window.inner_size();
                let scale_factor = gfx.window.scale_factor();
                self.gfx = Some(gfx);
                self.apply_window_size(size, scale_factor);
            }
            Err(err) => {
                // Without a surface the layer mounts inert and there is nothing to show
                log::error!("Failed to set up graphics: {err:#}");
                self.exit_error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.gfx.is_none() {
            return;
        }
        let scale_factor = self.scale_factor();

        match event {
            WindowEvent::CloseRequested => {
                self.unmount_layer();
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => self.apply_window_size(new_size, scale_factor),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                // The physical size may stay the same, so no Resized follows
                if let Some(size) = self.gfx.as_ref().map(|gfx| gfx.window.inner_size()) {
                    self.apply_window_size(size, scale_factor);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let wants_keyboard = self
                    .gfx
                    .as_ref()
                    .is_some_and(|gfx| gfx.egui.wants_keyboard_input());

                let handled = !wants_keyboard
                    && event.state == ElementState::Pressed
                    && !event.repeat
                    && match event.physical_key {
                        PhysicalKey::Code(code) => self.handle_key(event_loop, code),
                        PhysicalKey::Unidentified(_) => false,
                    };

                if !handled {
                    if let Some(gfx) = &mut self.gfx {
                        gfx.egui.key_event(&event);
                    }
                }
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                if let Some(gfx) = &mut self.gfx {
                    gfx.egui.modifiers_event(modifiers);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let position = self.mouse_position;
                if let Some(gfx) = &mut self.gfx {
                    gfx.egui.mouse_event(position, state, button);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_position = Vec2::new(position.x as f32, position.y as f32);
                if let Some(gfx) = &mut self.gfx {
                    gfx.egui.mouse_motion(self.mouse_position);
                }

                let logical = position.to_logical::<f32>(scale_factor);
                self.dispatch(HostEvent::PointerMoved(Vec2::new(logical.x, logical.y)));
            }
            WindowEvent::CursorLeft { .. } => {
                if let Some(gfx) = &mut self.gfx {
                    gfx.egui.mouse_left();
                }
                self.dispatch(HostEvent::PointerLeft);
            }
            WindowEvent::RedrawRequested => self.redraw(),

            _ => (),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gfx) = &self.gfx {
            gfx.window.request_redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_host_tracks_listener_kinds() {
        let mut host = WindowHost::default();
        let resize = host.add_listener(ListenerKind::Resize);
        let moved = host.add_listener(ListenerKind::PointerMove);

        assert!(host.listens_to(ListenerKind::Resize));
        assert!(!host.listens_to(ListenerKind::PointerLeave));

        host.remove_listener(resize);
        assert!(!host.listens_to(ListenerKind::Resize));
        host.remove_listener(moved);
        assert!(host.listeners.is_empty());
    }

    #[test]
    fn window_host_keeps_only_latest_frame() {
        let mut host = WindowHost::default();
        let first = host.request_frame();
        let second = host.request_frame();

        host.cancel_frame(first);
        assert_eq!(host.take_frame(), Some(second));
        assert_eq!(host.take_frame(), None);
    }

    #[test]
    fn minimized_window_keeps_viewport_and_holds_frames() {
        let mut host = WindowHost::default();
        assert_eq!(
            host.resize(PhysicalSize::new(800, 600), 1.0),
            Some(Vec2::new(800.0, 600.0))
        );

        let mut layer =
            ParticleLayer::mount(&mut host, FieldConfig::default(), StdRng::seed_from_u64(1))
                .unwrap();
        let spawned = layer.field().particles().to_vec();

        assert_eq!(host.resize(PhysicalSize::new(0, 0), 1.0), None);
        assert_eq!(host.resize(PhysicalSize::new(800, 0), 1.0), None);
        assert_eq!(host.viewport, Some(Vec2::new(800.0, 600.0)));

        // ten minutes of redraws while minimized
        let mut canvas = DrawList::new();
        for _ in 0..36_000 {
            if let Some(frame) = host.take_frame() {
                layer.on_frame(&mut host, frame, &mut canvas);
            }
        }
        assert_eq!(layer.field().particles(), &spawned[..]);
        assert_eq!(layer.field().size(), Vec2::new(800.0, 600.0));

        // restoring resumes the held frame
        assert!(host.resize(PhysicalSize::new(800, 600), 1.0).is_some());
        let frame = host.take_frame().unwrap();
        assert!(layer.on_frame(&mut host, frame, &mut canvas));
        let near_origin = layer
            .field()
            .particles()
            .iter()
            .filter(|particle| particle.position.length() < 2.0)
            .count();
        assert!(near_origin < 5);
    }

    #[test]
    fn scale_change_updates_logical_viewport() {
        let mut host = WindowHost::default();
        host.resize(PhysicalSize::new(1600, 1200), 1.0);
        assert_eq!(
            host.resize(PhysicalSize::new(1600, 1200), 2.0),
            Some(Vec2::new(800.0, 600.0))
        );
        assert_eq!(host.viewport(), Some(Vec2::new(800.0, 600.0)));
    }

    #[test]
    fn layer_on_window_host_detaches_on_unmount() {
        let mut host = WindowHost {
            viewport: Some(Vec2::new(1024.0, 768.0)),
            ..Default::default()
        };
        let mut layer =
            ParticleLayer::mount(&mut host, FieldConfig::default(), StdRng::seed_from_u64(4))
                .unwrap();
        assert_eq!(host.listeners.len(), 3);

        layer.unmount(&mut host);
        assert!(host.listeners.is_empty());
        assert!(host.take_frame().is_none());
    }
}
