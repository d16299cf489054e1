use std::borrow::Cow;

use particle_field::{Color, DrawCommand, DrawList};
use wgpu::{util::DeviceExt, BindGroupLayoutEntry};

use crate::utils::{multiple_of, srgb_to_linear};

/// Instance buffers grow in steps of this many shapes.
const INSTANCE_CHUNK: u32 = 256;

const CIRCLE: f32 = 0.0;
const LINE: f32 = 1.0;

/// Most shapes a buffer of `max_buffer_size` bytes can hold.
pub fn max_instances(max_buffer_size: u64) -> u32 {
    let per_instance = std::mem::size_of::<ShapeInstance>() as u64;
    (max_buffer_size / per_instance).min(u32::MAX as u64) as u32
}

/// One disc or line segment, expanded to a quad in the vertex shader.
#[repr(C)]
#[derive(bytemuck::Pod, bytemuck::Zeroable, Clone, Copy, Debug, PartialEq)]
pub struct ShapeInstance {
    pub start: [f32; 2],
    pub end: [f32; 2],
    /// Radius for circles, half the stroke width for lines
    pub extent: f32,
    pub kind: f32,
    pub color: [f32; 4],
}

/// Converts recorded canvas calls into GPU instances, scaling every alpha by
/// the layer opacity.
pub fn shape_instances(list: &DrawList, layer_opacity: f32, linear_output: bool) -> Vec<ShapeInstance> {
    let encode = |color: Color| {
        let [r, g, b, a] = color.to_array();
        if linear_output {
            [srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b), a * layer_opacity]
        } else {
            [r, g, b, a * layer_opacity]
        }
    };

    list.commands()
        .iter()
        .filter_map(|command| match *command {
            DrawCommand::Clear => None,
            DrawCommand::Circle {
                center,
                radius,
                color,
            } => Some(ShapeInstance {
                start: center.to_array(),
                end: center.to_array(),
                extent: radius,
                kind: CIRCLE,
                color: encode(color),
            }),
            DrawCommand::Line {
                from,
                to,
                width,
                color,
            } => Some(ShapeInstance {
                start: from.to_array(),
                end: to.to_array(),
                extent: width / 2.0,
                kind: LINE,
                color: encode(color),
            }),
        })
        .collect()
}

pub struct RenderModule {
    screen_size_buffer: wgpu::Buffer,
    corners_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    instance_capacity: u32,
    instance_count: u32,
    instance_limit: u32,
    truncation_logged: bool,

    linear_output: bool,

    bind_group: wgpu::BindGroup,
    pipeline: wgpu::RenderPipeline,
}

impl RenderModule {
    pub fn new(device: &wgpu::Device, swapchain_format: wgpu::TextureFormat) -> Self {
        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("particle field shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("render.wgsl"))),
        });

        let screen_size_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("screen size"),
            size: 4 * 4,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // two triangles covering [-1, 1]^2
        let corners_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad corners"),
            contents: bytemuck::cast_slice(&[
                -1.0f32, -1.0, 1.0, -1.0, 1.0, 1.0, //
                -1.0, -1.0, 1.0, 1.0, -1.0, 1.0,
            ]),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let instance_buffer = create_instance_buffer(device, INSTANCE_CHUNK);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: None,
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: screen_size_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("render"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: None,
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader_module,
                entry_point: "vertex",
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<ShapeInstance>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Float32, 3 => Float32, 4 => Float32x4],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: 2 * 4,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![5 => Float32x2],
                    },
                ],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader_module,
                entry_point: "fragment",
                targets: &[Some(wgpu::ColorTargetState {
                    format: swapchain_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self {
            screen_size_buffer,
            corners_buffer,
            instance_buffer,
            instance_capacity: INSTANCE_CHUNK,
            instance_count: 0,
            instance_limit: max_instances(device.limits().max_buffer_size),
            truncation_logged: false,

            linear_output: swapchain_format.is_srgb(),

            bind_group,
            pipeline,
        }
    }

    /// `width` and `height` are the canvas size in logical pixels, the unit
    /// draw commands are recorded in.
    pub fn update_size(&self, queue: &wgpu::Queue, width: f32, height: f32) {
        queue.write_buffer(
            &self.screen_size_buffer,
            0,
            bytemuck::cast_slice(&[width.max(1.0), height.max(1.0), 0.0, 0.0]),
        );
    }

    /// Uploads this frame's shapes, growing the instance buffer if needed.
    /// Shapes past what the device can hold in one buffer are dropped.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        list: &DrawList,
        layer_opacity: f32,
    ) {
        let mut instances = shape_instances(list, layer_opacity, self.linear_output);
        if instances.len() > self.instance_limit as usize {
            if !self.truncation_logged {
                log::warn!(
                    "Frame has {} shapes, only drawing the first {}",
                    instances.len(),
                    self.instance_limit
                );
                self.truncation_logged = true;
            }
            instances.truncate(self.instance_limit as usize);
        }
        let count = instances.len() as u32;

        if count > self.instance_capacity {
            self.instance_capacity = grown_capacity(count, self.instance_limit);
            self.instance_buffer = create_instance_buffer(device, self.instance_capacity);
            log::debug!("Instance buffer grown to {} shapes", self.instance_capacity);
        }

        if count > 0 {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }
        self.instance_count = count;
    }

    pub fn begin_pass<'a>(
        &'a self,
        encoder: &'a mut wgpu::CommandEncoder,
        view: &'a wgpu::TextureView,
        background: Color,
    ) -> wgpu::RenderPass<'a> {
        let [mut r, mut g, mut b, a] = background.to_array();
        if self.linear_output {
            (r, g, b) = (srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b));
        }

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: None,
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: r as f64,
                        g: g as f64,
                        b: b as f64,
                        a: a as f64,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if self.instance_count > 0 {
            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.bind_group, &[]);
            rpass.set_vertex_buffer(0, self.instance_buffer.slice(..));
            rpass.set_vertex_buffer(1, self.corners_buffer.slice(..));
            rpass.draw(0..6, 0..self.instance_count);
        }

        rpass
    }
}

/// Capacity for `count` shapes, rounded up to whole chunks but never past
/// `limit`.
fn grown_capacity(count: u32, limit: u32) -> u32 {
    let count = count.min(limit).min(u32::MAX - INSTANCE_CHUNK);
    multiple_of(count, INSTANCE_CHUNK).min(limit)
}

fn create_instance_buffer(device: &wgpu::Device, capacity: u32) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("shape instances"),
        size: (std::mem::size_of::<ShapeInstance>() * capacity as usize) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

#[cfg(test)]
mod tests {
    use glam::Vec2;
    use particle_field::Canvas;

    use super::*;

    #[test]
    fn instances_skip_clear_and_scale_alpha() {
        let color = Color::from_rgba8(255, 0, 0, 0.5);
        let mut list = DrawList::new();
        list.clear();
        list.fill_circle(Vec2::new(1.0, 2.0), 3.0, color);
        list.stroke_line(Vec2::ZERO, Vec2::new(10.0, 0.0), 1.5, color);

        let instances = shape_instances(&list, 0.4, false);
        assert_eq!(instances.len(), 2);

        assert_eq!(instances[0].kind, CIRCLE);
        assert_eq!(instances[0].start, [1.0, 2.0]);
        assert_eq!(instances[0].extent, 3.0);
        assert!((instances[0].color[3] - 0.2).abs() < 1e-6);

        assert_eq!(instances[1].kind, LINE);
        assert_eq!(instances[1].end, [10.0, 0.0]);
        assert_eq!(instances[1].extent, 0.75);
    }

    #[test]
    fn linear_output_converts_rgb_only() {
        let mut list = DrawList::new();
        list.fill_circle(Vec2::ZERO, 1.0, Color::from_rgba8(128, 128, 128, 1.0));

        let instance = shape_instances(&list, 1.0, true)[0];
        assert!(instance.color[0] < 128.0 / 255.0);
        assert_eq!(instance.color[3], 1.0);
    }

    #[test]
    fn instance_count_is_bounded_by_buffer_size() {
        // 256 MiB, the downlevel WebGL2 limit
        assert_eq!(max_instances(256 << 20), 6_710_886);
        assert_eq!(max_instances(39), 0);
        assert_eq!(max_instances(u64::MAX), u32::MAX);
    }

    #[test]
    fn growth_never_exceeds_limit() {
        assert_eq!(grown_capacity(300, 10_000), 512);
        assert_eq!(grown_capacity(12_500_000, 6_710_886), 6_710_886);
        assert_eq!(grown_capacity(6_710_800, 6_710_886), 6_710_886);
    }

    #[test]
    fn instance_layout_matches_shader() {
        assert_eq!(std::mem::size_of::<ShapeInstance>(), 10 * 4);
    }
}
