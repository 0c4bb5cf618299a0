/// Per-entity GPU state attached to mesh entities by the pipeline stages
///
/// Each stage that draws an entity keeps one uniform buffer and one
/// descriptor set per frame in flight. The state lives in the scene store
/// next to the entity's `MeshRenderer` and must be released before the
/// device is destroyed.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::graphics_device::{Buffer, DescriptorSet};
use crate::subpass::SubpassKind;

/// Uniform buffers and descriptor sets, indexed by frame in flight
pub struct PerFrameBindings {
    pub uniform_buffers: Vec<Arc<dyn Buffer>>,
    pub descriptor_sets: Vec<Arc<dyn DescriptorSet>>,
}

impl PerFrameBindings {
    pub fn frame_count(&self) -> usize {
        self.descriptor_sets.len()
    }
}

/// Stage bindings of one entity
#[derive(Default)]
pub struct MeshGpuState {
    stages: FxHashMap<SubpassKind, PerFrameBindings>,
}

impl MeshGpuState {
    pub fn get(&self, kind: SubpassKind) -> Option<&PerFrameBindings> {
        self.stages.get(&kind)
    }

    pub fn insert(&mut self, kind: SubpassKind, bindings: PerFrameBindings) {
        self.stages.insert(kind, bindings);
    }

    pub fn remove(&mut self, kind: SubpassKind) -> Option<PerFrameBindings> {
        self.stages.remove(&kind)
    }

    pub fn contains(&self, kind: SubpassKind) -> bool {
        self.stages.contains_key(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
