//! WGSL compute pipeline infrastructure
//!
//! Pipeline caching and dispatch utilities for WGSL compute shaders.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingType, Buffer, BufferBindingType, ComputePipeline,
    ComputePipelineDescriptor, Device, PipelineLayoutDescriptor, ShaderModule,
    ShaderModuleDescriptor, ShaderSource, ShaderStages,
};

/// Workgroup size for compute shaders (matches CUDA BLOCK_SIZE)
pub const WORKGROUP_SIZE: u32 = 256;

/// Maximum workgroups per dispatch dimension guaranteed by WebGPU
pub const MAX_WORKGROUPS_PER_DIM: u32 = 65535;

/// Cache for shader modules, pipelines and bind group layouts
pub struct PipelineCache {
    device: Arc<Device>,
    /// Cached shader modules by name
    modules: Mutex<HashMap<&'static str, Arc<ShaderModule>>>,
    /// Cached pipelines by (shader_name, entry_point)
    pipelines: Mutex<HashMap<(&'static str, &'static str), Arc<ComputePipeline>>>,
    /// Cached bind group layouts by layout key
    layouts: Mutex<HashMap<LayoutKey, Arc<BindGroupLayout>>>,
}

/// Key for bind group layout cache
///
/// Bindings are numbered read-only storage first, then read-write storage,
/// then uniforms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayoutKey {
    /// Number of read-only storage buffers
    pub num_readonly_storage: u32,
    /// Number of read-write storage buffers
    pub num_storage_buffers: u32,
    /// Number of uniform buffers
    pub num_uniform_buffers: u32,
}

impl PipelineCache {
    /// Create a new pipeline cache
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            modules: Mutex::new(HashMap::new()),
            pipelines: Mutex::new(HashMap::new()),
            layouts: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create a shader module
    pub fn get_or_create_module(&self, name: &'static str, source: &str) -> Arc<ShaderModule> {
        let mut modules = self.modules.lock();
        if let Some(module) = modules.get(name) {
            return module.clone();
        }

        log::trace!("wgpu: compiling shader module {name}");
        let module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(name),
            source: ShaderSource::Wgsl(source.into()),
        });

        let module = Arc::new(module);
        modules.insert(name, module.clone());
        module
    }

    /// Get or create a compute pipeline
    pub fn get_or_create_pipeline(
        &self,
        shader_name: &'static str,
        entry_point: &'static str,
        module: &ShaderModule,
        layout: &BindGroupLayout,
    ) -> Arc<ComputePipeline> {
        let key = (shader_name, entry_point);
        let mut pipelines = self.pipelines.lock();

        if let Some(pipeline) = pipelines.get(&key) {
            return pipeline.clone();
        }

        log::trace!("wgpu: creating pipeline {shader_name}::{entry_point}");
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some(&format!("{}_layout", shader_name)),
                bind_group_layouts: &[layout],
                immediate_size: 0,
            });

        let pipeline = self
            .device
            .create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some(&format!("{}_{}", shader_name, entry_point)),
                layout: Some(&pipeline_layout),
                module,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            });

        let pipeline = Arc::new(pipeline);
        pipelines.insert(key, pipeline.clone());
        pipeline
    }

    /// Get or create a bind group layout
    pub fn get_or_create_layout(&self, key: LayoutKey) -> Arc<BindGroupLayout> {
        let mut layouts = self.layouts.lock();

        if let Some(layout) = layouts.get(&key) {
            return layout.clone();
        }

        let storage = |binding: u32, read_only: bool| BindGroupLayoutEntry {
            binding,
            visibility: ShaderStages::COMPUTE,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let mut entries = Vec::new();
        let mut binding = 0;
        for _ in 0..key.num_readonly_storage {
            entries.push(storage(binding, true));
            binding += 1;
        }
        for _ in 0..key.num_storage_buffers {
            entries.push(storage(binding, false));
            binding += 1;
        }
        for _ in 0..key.num_uniform_buffers {
            entries.push(BindGroupLayoutEntry {
                binding,
                visibility: ShaderStages::COMPUTE,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
            binding += 1;
        }

        let layout = self
            .device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("force_layout"),
                entries: &entries,
            });

        let layout = Arc::new(layout);
        layouts.insert(key, layout.clone());
        layout
    }

    /// Create a bind group binding `buffers` in order
    pub fn create_bind_group(&self, layout: &BindGroupLayout, buffers: &[&Buffer]) -> BindGroup {
        let entries: Vec<BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(i, buffer)| BindGroupEntry {
                binding: i as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();

        self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("compute_bind_group"),
            layout,
            entries: &entries,
        })
    }

    /// Get device reference
    pub fn device(&self) -> &Device {
        &self.device
    }
}

/// Compute a dispatch grid covering `n` invocations
///
/// Grids wider than [`MAX_WORKGROUPS_PER_DIM`] spill into the y dimension;
/// shaders flatten the id as `gid.x + gid.y * num_workgroups.x * WORKGROUP_SIZE`.
#[inline]
pub fn workgroup_grid(n: usize) -> (u32, u32) {
    let groups = n.div_ceil(WORKGROUP_SIZE as usize);
    if groups <= MAX_WORKGROUPS_PER_DIM as usize {
        return (groups as u32, 1);
    }
    let y = groups.div_ceil(MAX_WORKGROUPS_PER_DIM as usize);
    (MAX_WORKGROUPS_PER_DIM, y as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workgroup_grid_small() {
        assert_eq!(workgroup_grid(0), (0, 1));
        assert_eq!(workgroup_grid(1), (1, 1));
        assert_eq!(workgroup_grid(256), (1, 1));
        assert_eq!(workgroup_grid(257), (2, 1));
    }

    #[test]
    fn test_workgroup_grid_spills_to_y() {
        let n = 256 * 65535 + 1;
        let (x, y) = workgroup_grid(n);
        assert_eq!(x, MAX_WORKGROUPS_PER_DIM);
        assert_eq!(y, 2);
        assert!((x as usize) * (y as usize) * 256 >= n);
    }
}
