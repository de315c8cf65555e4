mod pointers;

pub use pointers::{MasterPointer, TransferPointer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureSetId(pub u32);

/// Draw order class. Layers are drawn in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DepthLayer {
    Geometry,
    DynamicGeometry,
    Overlay,
}

/// Pipeline state a bucket must be drawn with.
///
/// Only a descriptor: resolving it to real shader and sampler objects is up
/// to whoever submits draws on the GPU thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderState {
    program: ProgramId,
    depth_layer: DepthLayer,
    texture_set: Option<TextureSetId>,
}

impl RenderState {
    pub const fn new(program: ProgramId, depth_layer: DepthLayer) -> Self {
        Self {
            program,
            depth_layer,
            texture_set: None,
        }
    }

    pub const fn with_texture_set(mut self, texture_set: TextureSetId) -> Self {
        self.texture_set = Some(texture_set);
        self
    }

    pub const fn program(&self) -> ProgramId {
        self.program
    }

    pub const fn depth_layer(&self) -> DepthLayer {
        self.depth_layer
    }

    pub const fn texture_set(&self) -> Option<TextureSetId> {
        self.texture_set
    }
}

/// CPU-side geometry for one draw batch of a tile, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderBucket {
    vertex_data: Box<[u8]>,
    indices: Box<[u32]>,
}

impl RenderBucket {
    pub fn new(vertex_data: impl Into<Box<[u8]>>, indices: impl Into<Box<[u32]>>) -> Self {
        Self {
            vertex_data: vertex_data.into(),
            indices: indices.into(),
        }
    }

    pub fn vertex_data(&self) -> &[u8] {
        &self.vertex_data
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn byte_size(&self) -> usize {
        self.vertex_data.len() + self.indices.len() * size_of::<u32>()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_states_order_by_program_then_layer() {
        let geometry = RenderState::new(ProgramId(1), DepthLayer::Geometry);
        let overlay = RenderState::new(ProgramId(1), DepthLayer::Overlay);
        let other_program = RenderState::new(ProgramId(0), DepthLayer::Overlay);

        assert!(geometry < overlay);
        assert!(other_program < geometry);
        assert_ne!(geometry, geometry.with_texture_set(TextureSetId(3)));
    }

    #[test]
    fn bucket_reports_upload_size() {
        let bucket = RenderBucket::new(vec![0u8; 48], vec![0u32, 1, 2]);
        assert_eq!(bucket.index_count(), 3);
        assert_eq!(bucket.byte_size(), 48 + 12);
        assert!(!bucket.is_empty());
        assert!(RenderBucket::default().is_empty());
    }
}
