//! Compute pipelines for texture kernels.
//!
//! A kernel's WGSL is wrapped between the shared prelude and an entry point
//! that evaluates `sample_texel` once per element and stores the result in
//! the image's word buffer. `Float32` elements are stored as their bits,
//! `UInt8` elements are packed four to a word.

use crate::context::GpuDevice;
use crate::error::{TexgenError, TexgenResult};
use crate::image::{DeviceStorage, ElementType, ImageDim};
use crate::kernels::lattice::PRELUDE_WGSL;
use bytemuck::{Pod, Zeroable};
use std::sync::{Arc, Weak};
use wgpu::util::DeviceExt;

const WORKGROUP_SIZE: u32 = 64;
const MAX_GROUPS_PER_DIM: u32 = 65535;

const ENTRY_WGSL: &str = r#"
struct Dims {
    width: u32,
    height: u32,
    depth: u32,
    channels: u32,
    element_count: u32,
    word_count: u32,
    element_type: u32,
    row_stride: u32,
}

@group(0) @binding(0) var<uniform> dims: Dims;
@group(0) @binding(1) var<storage, read> params: Params;
@group(0) @binding(2) var<storage, read_write> output: array<u32>;

fn texel_of(index: u32) -> vec4<u32> {
    let c = index % dims.channels;
    let texel = index / dims.channels;
    let x = texel % dims.width;
    let rest = texel / dims.width;
    return vec4<u32>(x, rest % dims.height, rest / dims.height, c);
}

fn to_unorm8(v: f32) -> u32 {
    return u32(clamp(v * 255.0, 0.0, 255.0));
}

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let word = gid.x + gid.y * dims.row_stride;
    if (word >= dims.word_count) {
        return;
    }
    let p = params;
    let dim = vec4<u32>(dims.width, dims.height, dims.depth, dims.channels);

    if (dims.element_type == 1u) {
        output[word] = bitcast<u32>(sample_texel(p, texel_of(word), dim));
        return;
    }

    var packed = 0u;
    for (var b = 0u; b < 4u; b = b + 1u) {
        let index = word * 4u + b;
        if (index < dims.element_count) {
            packed = packed | (to_unorm8(sample_texel(p, texel_of(index), dim)) << (8u * b));
        }
    }
    output[word] = packed;
}
"#;

/// Assembles the full shader for a kernel's WGSL.
pub(crate) fn shader_source(kernel_wgsl: &str) -> String {
    format!("{PRELUDE_WGSL}\n{kernel_wgsl}\n{ENTRY_WGSL}")
}

/// Converts a sample to a `UInt8` element, matching `to_unorm8` in WGSL.
#[inline]
pub(crate) fn to_unorm8(v: f32) -> u8 {
    (v * 255.0).clamp(0.0, 255.0) as u8
}

/// Uniform buffer data for the entry point.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct DispatchUniforms {
    width: u32,
    height: u32,
    depth: u32,
    channels: u32,
    element_count: u32,
    word_count: u32,
    element_type: u32,
    row_stride: u32,
}

/// A compiled kernel pipeline.
pub(crate) struct KernelPipeline {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl KernelPipeline {
    fn compile(gpu: &GpuDevice, label: &str, source: &str) -> TexgenResult<Self> {
        let device = &gpu.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let storage_entry = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1, true),
                storage_entry(2, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(TexgenError::ShaderError(format!("{label}: {error}")));
        }

        tracing::debug!(kernel = label, "compiled kernel pipeline");
        Ok(Self {
            pipeline,
            bind_group_layout,
        })
    }

    /// Records and submits one dispatch over every element of `storage`.
    ///
    /// The dispatch is not awaited; the image must be synced to observe it.
    pub(crate) fn dispatch(
        &self,
        gpu: &GpuDevice,
        storage: &DeviceStorage,
        dim: &ImageDim,
        element_type: ElementType,
        params: &[u8],
    ) {
        let element_count = dim.element_count() as u32;
        let word_count = match element_type {
            ElementType::UInt8 => element_count.div_ceil(4),
            ElementType::Float32 => element_count,
        };
        let groups = word_count.div_ceil(WORKGROUP_SIZE).max(1);
        let groups_x = groups.min(MAX_GROUPS_PER_DIM);
        let groups_y = groups.div_ceil(groups_x);

        let uniforms = DispatchUniforms {
            width: dim.width as u32,
            height: dim.height as u32,
            depth: dim.depth as u32,
            channels: dim.channels as u32,
            element_count,
            word_count,
            element_type: element_type as u32,
            row_stride: groups_x * WORKGROUP_SIZE,
        };

        // Storage bindings need a non-empty, 16-byte aligned buffer.
        let mut param_bytes = params.to_vec();
        param_bytes.resize(params.len().div_ceil(16).max(1) * 16, 0);

        let device = &gpu.device;
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("texgen_dims"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("texgen_params"),
            contents: &param_bytes,
            usage: wgpu::BufferUsages::STORAGE,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("texgen_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: storage.buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("texgen_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("texgen_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        gpu.queue.submit(Some(encoder.finish()));

        tracing::debug!(groups_x, groups_y, word_count, "submitted kernel dispatch");
    }
}

/// Compiled pipelines of one kernel, one per device.
///
/// Entries whose device has been dropped are pruned on lookup.
#[derive(Default)]
pub(crate) struct PipelineCache {
    entries: Vec<(Weak<GpuDevice>, Arc<KernelPipeline>)>,
}

impl PipelineCache {
    /// Returns the pipeline for `device`, compiling it on first use.
    pub(crate) fn get_or_compile(
        &mut self,
        device: &Arc<GpuDevice>,
        label: &str,
        source: impl FnOnce() -> String,
    ) -> TexgenResult<Arc<KernelPipeline>> {
        self.entries.retain(|(owner, _)| owner.strong_count() > 0);
        if let Some((_, pipeline)) = self
            .entries
            .iter()
            .find(|(owner, _)| std::ptr::eq(owner.as_ptr(), Arc::as_ptr(device)))
        {
            return Ok(Arc::clone(pipeline));
        }

        let pipeline = Arc::new(KernelPipeline::compile(device, label, &source())?);
        self.entries
            .push((Arc::downgrade(device), Arc::clone(&pipeline)));
        Ok(pipeline)
    }
}
