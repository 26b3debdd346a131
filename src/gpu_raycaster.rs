use std::{borrow::Cow, sync::Arc};

use image::RgbaImage;
use wgpu::{PollType, util::DeviceExt};

use crate::{
    camera::Camera,
    intensity::NormalizedVolume,
    renderer::{RenderError, RenderableVolume, Renderer},
    transfer_function::TransferLut,
};

const WORKGROUP_SIZE: u32 = 8;

pub struct WGPU {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl WGPU {
    /// Acquire a device on the preferred adapter, without a surface.
    pub async fn request() -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                ..Default::default()
            })
            .await
            .map_err(|e| RenderError::Gpu(e.to_string()))?;
        log::info!("using GPU adapter {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Volume Raycaster Device"),
                ..Default::default()
            })
            .await
            .map_err(|e| RenderError::Gpu(e.to_string()))?;

        Ok(Self { device, queue })
    }
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    eye: [f32; 4],
    forward: [f32; 4],
    right: [f32; 4],
    up: [f32; 4],
    bounds_min: [f32; 4],
    bounds_max: [f32; 4],
    spacing: [f32; 4],
    volume_size: [f32; 4],
    lighting: [f32; 4],
    output: [u32; 4],
}

/// Camera basis is pre-scaled so the shader builds rays as
/// `forward + right * ndc_x + up * ndc_y`, matching [`Camera::ray`].
fn uniforms(
    scene: &RenderableVolume,
    camera: &Camera,
    width: u32,
    height: u32,
    sample_distance: f32,
) -> Uniforms {
    let (forward, right, up) = camera.basis();
    let tan_half = (camera.view_angle * 0.5).to_radians().tan();
    let aspect = width as f32 / height as f32;
    let right = right * (aspect * tan_half);
    let up = up * tan_half;
    let eye = camera.position();
    let bounds = scene.bounds();
    let spacing = scene.spacing();
    let (depth, rows, columns) = scene.volume.dim();
    let lighting = scene.property.lighting;

    Uniforms {
        eye: eye.extend(1.0).to_array(),
        forward: forward.extend(0.0).to_array(),
        right: right.extend(0.0).to_array(),
        up: up.extend(0.0).to_array(),
        bounds_min: bounds.min.extend(0.0).to_array(),
        bounds_max: bounds.max.extend(0.0).to_array(),
        spacing: spacing.extend(scene.sample_step(sample_distance)).to_array(),
        volume_size: [columns as f32, rows as f32, depth as f32, 0.0],
        lighting: [
            lighting.ambient,
            lighting.diffuse,
            lighting.specular,
            lighting.specular_power,
        ],
        output: [width, height, u32::from(scene.property.shade), 0],
    }
}

// The texture stays valid for as long as the session holds the same volume.
struct UploadedVolume {
    source: Arc<NormalizedVolume>,
    view: wgpu::TextureView,
    _texture: wgpu::Texture,
}

/// Compositing ray caster running as a wgpu compute shader.
pub struct GpuRaycaster {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    sample_distance: f32,
    uploaded: Option<UploadedVolume>,
}

impl GpuRaycaster {
    pub fn new(wgpu: WGPU, sample_distance: f32) -> Self {
        let WGPU { device, queue } = wgpu;

        // Linear filtering gives trilinear interpolation of the volume
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Volume Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Volume Raycast Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("shaders/raycast.wgsl"))),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Volume Raycast Bind Group Layout"),
            entries: &[
                // 3D texture
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D3,
                        multisampled: false,
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // Output buffer
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Transfer function LUT
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Volume Raycast Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Volume Raycast Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            sampler,
            sample_distance,
            uploaded: None,
        }
    }

    fn upload_volume(&mut self, volume: &Arc<NormalizedVolume>) -> Result<(), RenderError> {
        if self
            .uploaded
            .as_ref()
            .is_some_and(|uploaded| Arc::ptr_eq(&uploaded.source, volume))
        {
            return Ok(());
        }

        let (depth, height, width) = volume.dim();
        let (depth, height, width) = (depth as u32, height as u32, width as u32);
        let max_dim = self.device.limits().max_texture_dimension_3d;
        if width.max(height).max(depth) > max_dim {
            return Err(RenderError::Gpu(format!(
                "volume {width}x{height}x{depth} exceeds the 3D texture limit of {max_dim}"
            )));
        }

        let texture_size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: depth,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Volume 3D Texture"),
            size: texture_size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let data = volume.data();
        let bytes: Cow<'_, [u8]> = match data.as_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(data.iter().copied().collect()),
        };
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width),
                rows_per_image: Some(height),
            },
            texture_size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::debug!("uploaded {width}x{height}x{depth} volume texture");
        self.uploaded = Some(UploadedVolume {
            source: Arc::clone(volume),
            view,
            _texture: texture,
        });
        Ok(())
    }

    pub async fn render_async(
        &mut self,
        scene: &RenderableVolume,
        camera: &Camera,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyTarget);
        }
        self.upload_volume(&scene.volume)?;
        let Some(uploaded) = self.uploaded.as_ref() else {
            return Err(RenderError::Gpu("volume texture missing".to_string()));
        };

        let uniforms = uniforms(scene, camera, width, height, self.sample_distance);
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Uniform Buffer"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let lut = TransferLut::bake(&scene.property.color, &scene.property.opacity);
        let lut_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Transfer LUT Buffer"),
                contents: bytemuck::cast_slice(lut.entries()),
                usage: wgpu::BufferUsages::STORAGE,
            });
        let output_size = (width * height) as usize;
        let output_bytes = (output_size * std::mem::size_of::<u32>()) as u64;
        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Output Buffer"),
            size: output_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size: output_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Volume Raycast Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&uploaded.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: output_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: lut_buffer.as_entire_binding(),
                },
            ],
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Volume Raycast Encoder"),
            });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Volume Raycast Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            let dispatch_x = width.div_ceil(WORKGROUP_SIZE);
            let dispatch_y = height.div_ceil(WORKGROUP_SIZE);
            compute_pass.dispatch_workgroups(dispatch_x, dispatch_y, 1);
        }
        encoder.copy_buffer_to_buffer(&output_buffer, 0, &staging_buffer, 0, output_bytes);
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| RenderError::Gpu(e.to_string()))?;
        receiver
            .await
            .map_err(|_| RenderError::BufferMap)?
            .map_err(|_| RenderError::BufferMap)?;

        let pixels: Vec<u8> = {
            let data = buffer_slice.get_mapped_range();
            let packed: &[u32] = bytemuck::cast_slice(&data[..]);
            packed.iter().flat_map(|v| v.to_le_bytes()).collect()
        };
        staging_buffer.unmap();

        RgbaImage::from_raw(width, height, pixels).ok_or(RenderError::BufferMap)
    }
}

impl Renderer for GpuRaycaster {
    fn render(
        &mut self,
        scene: &RenderableVolume,
        camera: &Camera,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, RenderError> {
        futures::executor::block_on(self.render_async(scene, camera, width, height))
    }
}
