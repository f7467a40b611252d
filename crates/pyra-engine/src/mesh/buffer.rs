use thiserror::Error;

use crate::device::{
    BufferHandle, BufferTarget, BufferUsage, DeviceError, DeviceRef, IndexType, PrimitiveMode,
    VertexArrayHandle, VertexAttribute,
};

/// Position attribute: 3 tightly packed `f32` at slot 0.
pub const POSITION_ATTRIBUTE: VertexAttribute = VertexAttribute {
    slot: 0,
    components: 3,
    normalized: false,
    stride: 0,
    offset: 0,
};

const FLOATS_PER_VERTEX: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshError {
    #[error("vertex data must be a non-empty sequence of xyz triples, got {len} floats")]
    InvalidVertexData { len: usize },

    #[error("index data is empty")]
    EmptyIndices,

    #[error("triangle list needs a multiple of 3 indices, got {len}")]
    IncompleteTriangle { len: usize },

    #[error("index {index} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        index: u32,
        position: usize,
        vertex_count: usize,
    },

    #[error("mesh has no uploaded data")]
    NotUploaded,

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// GPU buffers for one indexed triangle mesh.
///
/// Owns a vertex array, a vertex buffer and an index buffer. All handles are
/// `None` until [`upload`](Self::upload) succeeds and return to `None` on
/// [`dispose`](Self::dispose), which also runs on drop.
pub struct MeshBuffer {
    device: DeviceRef,

    vertex_array: Option<VertexArrayHandle>,
    vertex_buffer: Option<BufferHandle>,
    index_buffer: Option<BufferHandle>,

    index_count: u32,
    vertex_count: u32,
}

impl MeshBuffer {
    pub fn new(device: DeviceRef) -> Self {
        Self {
            device,
            vertex_array: None,
            vertex_buffer: None,
            index_buffer: None,
            index_count: 0,
            vertex_count: 0,
        }
    }

    /// Creates a mesh and uploads `vertices`/`indices` in one step.
    pub fn with_data(device: DeviceRef, vertices: &[f32], indices: &[u32]) -> Result<Self, MeshError> {
        let mut mesh = Self::new(device);
        mesh.upload(vertices, indices)?;
        Ok(mesh)
    }

    /// Uploads vertex positions and triangle-list indices as static storage.
    ///
    /// `vertices` holds xyz triples; every index must address one of them.
    /// Uploading into a mesh that already holds data releases the previous
    /// buffers first.
    pub fn upload(&mut self, vertices: &[f32], indices: &[u32]) -> Result<(), MeshError> {
        if vertices.is_empty() || vertices.len() % FLOATS_PER_VERTEX != 0 {
            return Err(MeshError::InvalidVertexData {
                len: vertices.len(),
            });
        }
        if indices.is_empty() {
            return Err(MeshError::EmptyIndices);
        }
        if indices.len() % 3 != 0 {
            return Err(MeshError::IncompleteTriangle { len: indices.len() });
        }

        let vertex_count = vertices.len() / FLOATS_PER_VERTEX;
        if let Some((position, &index)) = indices
            .iter()
            .enumerate()
            .find(|(_, i)| **i as usize >= vertex_count)
        {
            return Err(MeshError::IndexOutOfRange {
                index,
                position,
                vertex_count,
            });
        }

        if self.is_uploaded() {
            log::debug!("re-uploading mesh; releasing previous buffers");
            self.dispose();
        }

        let device = self.device.clone();

        // Handles are stored as soon as they exist so a later failure is
        // cleaned up by `dispose`.
        let vao = device.create_vertex_array()?;
        self.vertex_array = Some(vao);
        device.bind_vertex_array(Some(vao));

        let result = self.fill_buffers(vertices, indices);

        device.bind_vertex_array(None);
        device.bind_buffer(BufferTarget::Vertex, None);
        device.bind_buffer(BufferTarget::Index, None);

        if let Err(e) = result {
            self.dispose();
            return Err(e);
        }

        self.index_count = indices.len() as u32;
        self.vertex_count = vertex_count as u32;

        log::debug!(
            "uploaded mesh: {} vertices, {} indices ({:?})",
            self.vertex_count,
            self.index_count,
            vao
        );
        Ok(())
    }

    fn fill_buffers(&mut self, vertices: &[f32], indices: &[u32]) -> Result<(), MeshError> {
        let device = &self.device;

        let ibo = device.create_buffer()?;
        self.index_buffer = Some(ibo);
        device.bind_buffer(BufferTarget::Index, Some(ibo));
        device.buffer_data(
            BufferTarget::Index,
            bytemuck::cast_slice(indices),
            BufferUsage::Static,
        );

        let vbo = device.create_buffer()?;
        self.vertex_buffer = Some(vbo);
        device.bind_buffer(BufferTarget::Vertex, Some(vbo));
        device.buffer_data(
            BufferTarget::Vertex,
            bytemuck::cast_slice(vertices),
            BufferUsage::Static,
        );

        device.vertex_attrib_pointer_f32(POSITION_ATTRIBUTE);
        device.enable_vertex_attrib_array(POSITION_ATTRIBUTE.slot);
        Ok(())
    }

    /// Issues one indexed triangle-list draw for the whole mesh.
    ///
    /// Leaves no vertex array or index buffer bound.
    pub fn draw(&self) -> Result<(), MeshError> {
        let (Some(vao), Some(ibo)) = (self.vertex_array, self.index_buffer) else {
            return Err(MeshError::NotUploaded);
        };
        if self.index_count == 0 {
            return Err(MeshError::NotUploaded);
        }

        self.device.bind_vertex_array(Some(vao));
        self.device.bind_buffer(BufferTarget::Index, Some(ibo));

        self.device.draw_elements(
            PrimitiveMode::Triangles,
            self.index_count as i32,
            IndexType::U32,
            0,
        );

        self.device.bind_vertex_array(None);
        self.device.bind_buffer(BufferTarget::Index, None);

        log::trace!("drew mesh {:?}: {} indices", vao, self.index_count);
        Ok(())
    }

    /// Releases index buffer, vertex buffer and vertex array, in that order.
    ///
    /// Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if let Some(ibo) = self.index_buffer.take() {
            self.device.delete_buffer(ibo);
        }
        if let Some(vbo) = self.vertex_buffer.take() {
            self.device.delete_buffer(vbo);
        }
        if let Some(vao) = self.vertex_array.take() {
            self.device.delete_vertex_array(vao);
            log::debug!("released mesh {vao:?}");
        }
        self.index_count = 0;
        self.vertex_count = 0;
    }

    pub fn is_uploaded(&self) -> bool {
        self.vertex_array.is_some()
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn vertex_array(&self) -> Option<VertexArrayHandle> {
        self.vertex_array
    }

    pub fn vertex_buffer(&self) -> Option<BufferHandle> {
        self.vertex_buffer
    }

    pub fn index_buffer(&self) -> Option<BufferHandle> {
        self.index_buffer
    }
}

impl Drop for MeshBuffer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for MeshBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshBuffer")
            .field("vertex_array", &self.vertex_array)
            .field("vertex_buffer", &self.vertex_buffer)
            .field("index_buffer", &self.index_buffer)
            .field("index_count", &self.index_count)
            .finish()
    }
}
