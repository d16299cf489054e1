use egui::Widget;
use glam::Vec2;
use particle_field::{FieldConfig, LayerState};

pub struct EguiIntegration {
    pub ctx: egui::Context,
    raw_input: egui::RawInput,
    modifiers: egui::Modifiers,

    renderer: egui_wgpu::Renderer,
    clipped_shapes: Vec<egui::ClippedPrimitive>,
    textures_delta: egui::TexturesDelta,
}

impl EguiIntegration {
    pub fn new(device: &wgpu::Device, swapchain_format: wgpu::TextureFormat) -> Self {
        let renderer = egui_wgpu::Renderer::new(device, swapchain_format, None, 1);

        Self {
            ctx: egui::Context::default(),
            raw_input: egui::RawInput::default(),
            modifiers: Default::default(),

            renderer,
            clipped_shapes: Vec::new(),
            textures_delta: egui::TexturesDelta::default(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.raw_input.screen_rect = Some(egui::Rect::from_min_size(
            Default::default(),
            egui::Vec2::new(width as f32, height as f32),
        ));
    }

    pub fn run<F: FnOnce(&egui::Context)>(&mut self, run_ui: F) {
        let raw_input = std::mem::take(&mut self.raw_input);
        self.ctx.begin_frame(raw_input);
        run_ui(&self.ctx);

        let output = self.ctx.end_frame();
        self.clipped_shapes = self.ctx.tessellate(output.shapes, output.pixels_per_point);
        self.textures_delta = output.textures_delta;
    }

    /// Uploads this frame's meshes and textures. Returns command buffers
    /// egui wants submitted before the main encoder.
    pub fn pre_render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        delta_time: f32,
    ) -> Vec<wgpu::CommandBuffer> {
        self.raw_input.predicted_dt = delta_time;

        for (id, delta) in &self.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, delta);
        }

        let command_buffers = self.renderer.update_buffers(
            device,
            queue,
            encoder,
            &self.clipped_shapes,
            &self.screen_descriptor(),
        );

        for id in &self.textures_delta.free {
            self.renderer.free_texture(id);
        }
        self.textures_delta.clear();

        command_buffers
    }

    pub fn render<'a>(&'a self, rpass: &mut wgpu::RenderPass<'a>) {
        self.renderer
            .render(rpass, &self.clipped_shapes, &self.screen_descriptor());
    }

    fn screen_descriptor(&self) -> egui_wgpu::ScreenDescriptor {
        let screen_rect = self.ctx.screen_rect();
        egui_wgpu::ScreenDescriptor {
            size_in_pixels: [screen_rect.width() as u32, screen_rect.height() as u32],
            pixels_per_point: self.ctx.pixels_per_point(),
        }
    }

    pub fn modifiers_event(&mut self, event: winit::event::Modifiers) {
        let state = event.state();
        self.modifiers.alt = state.alt_key();
        self.modifiers.ctrl = state.control_key();
        self.modifiers.shift = state.shift_key();
        self.modifiers.mac_cmd = state.super_key();
        self.modifiers.command = state.control_key() | state.super_key();
    }

    /// Forwards keys the overlay's text fields need: typed characters and
    /// the editing keys.
    pub fn key_event(&mut self, event: &winit::event::KeyEvent) {
        use winit::keyboard::{Key, NamedKey};

        let pressed = event.state.is_pressed();
        let key = match &event.logical_key {
            Key::Character(text) => {
                if pressed {
                    self.raw_input.events.push(egui::Event::Text(text.to_string()));
                }
                return;
            }
            Key::Named(NamedKey::Backspace) => egui::Key::Backspace,
            Key::Named(NamedKey::Delete) => egui::Key::Delete,
            Key::Named(NamedKey::Enter) => egui::Key::Enter,
            Key::Named(NamedKey::Tab) => egui::Key::Tab,
            Key::Named(NamedKey::Escape) => egui::Key::Escape,
            Key::Named(NamedKey::ArrowLeft) => egui::Key::ArrowLeft,
            Key::Named(NamedKey::ArrowRight) => egui::Key::ArrowRight,
            Key::Named(NamedKey::ArrowUp) => egui::Key::ArrowUp,
            Key::Named(NamedKey::ArrowDown) => egui::Key::ArrowDown,
            Key::Named(NamedKey::Home) => egui::Key::Home,
            Key::Named(NamedKey::End) => egui::Key::End,
            _ => return,
        };

        self.raw_input.events.push(egui::Event::Key {
            key,
            physical_key: None,
            pressed,
            repeat: event.repeat,
            modifiers: self.modifiers,
        });
    }

    pub fn mouse_event(
        &mut self,
        position: Vec2,
        state: winit::event::ElementState,
        button: winit::event::MouseButton,
    ) {
        let button = match button {
            winit::event::MouseButton::Left => egui::PointerButton::Primary,
            winit::event::MouseButton::Right => egui::PointerButton::Secondary,
            winit::event::MouseButton::Middle => egui::PointerButton::Middle,
            _ => return,
        };

        self.raw_input.events.push(egui::Event::PointerButton {
            pos: egui::Pos2::new(position.x, position.y),
            button,
            pressed: state.is_pressed(),
            modifiers: self.modifiers,
        });
    }

    pub fn mouse_motion(&mut self, position: Vec2) {
        self.raw_input
            .events
            .push(egui::Event::PointerMoved(egui::Pos2::new(
                position.x, position.y,
            )));
    }

    pub fn mouse_left(&mut self) {
        self.raw_input.events.push(egui::Event::PointerGone);
    }

    pub fn wants_keyboard_input(&self) -> bool {
        self.ctx.wants_keyboard_input()
    }
}

/// What the overlay shows about the running field.
pub struct OverlayStats {
    pub state: Option<LayerState>,
    pub fps: f32,
    pub particles: usize,
    pub cursor: Option<Vec2>,
    pub cursor_active: bool,
}

pub enum OverlayAction {
    Apply(FieldConfig),
    ToggleLayer,
    Reinitialize,
}

pub struct Overlay {
    pub visible: bool,
    edited: FieldConfig,
}

impl Overlay {
    pub fn new(visible: bool, config: FieldConfig) -> Self {
        Self {
            visible,
            edited: config,
        }
    }

    pub fn ui(&mut self, ctx: &egui::Context, stats: &OverlayStats) -> Option<OverlayAction> {
        if !self.visible {
            return None;
        }

        let mut action = None;
        egui::Window::new("Particle Field")
            .default_width(180.0)
            .show(ctx, |ui| {
                let state = match stats.state {
                    Some(LayerState::Running) => "Running",
                    Some(LayerState::Stopped) => "Stopped",
                    None => "Inert",
                };
                ui.label(format!("Layer: {state}"));
                ui.label(format!("FPS {:.1}", stats.fps));
                ui.label(format!("Particles {}", stats.particles));
                match stats.cursor {
                    Some(cursor) => ui.label(format!(
                        "Cursor {:.0}, {:.0}{}",
                        cursor.x,
                        cursor.y,
                        if stats.cursor_active { "" } else { " (content)" }
                    )),
                    None => ui.label("Cursor outside window"),
                };

                ui.horizontal(|ui| {
                    if ui.button("Mount/Unmount [Space]").clicked() {
                        action = Some(OverlayAction::ToggleLayer);
                    }
                    if ui.button("Respawn [R]").clicked() {
                        action = Some(OverlayAction::Reinitialize);
                    }
                });

                ui.separator();
                egui::DragValue::new(&mut self.edited.particle_count)
                    .clamp_range(0..=2000)
                    .suffix(" Particles")
                    .ui(ui);
                egui::DragValue::new(&mut self.edited.connection_distance)
                    .clamp_range(1.0..=1000.0)
                    .suffix(" px Connections")
                    .ui(ui);
                egui::DragValue::new(&mut self.edited.cursor_distance)
                    .clamp_range(1.0..=1000.0)
                    .suffix(" px Cursor")
                    .ui(ui);
                egui::DragValue::new(&mut self.edited.speed)
                    .clamp_range(0.0..=10.0)
                    .speed(0.01)
                    .suffix(" Speed")
                    .ui(ui);

                if ui.button("Apply").clicked() {
                    action = Some(OverlayAction::Apply(self.edited));
                }

                if stats.particles > 500 {
                    ui.colored_label(
                        egui::Color32::YELLOW,
                        "Connections are checked pairwise, large counts get slow",
                    );
                }
            });

        action
    }
}
