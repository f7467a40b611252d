use thiserror::Error;

use super::handle::{BufferHandle, ProgramHandle, ShaderHandle, UniformLocation, VertexArrayHandle};

/// Failure reported by the device while creating an object.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("device failed to create {kind}: {message}")]
pub struct DeviceError {
    pub kind: &'static str,
    pub message: String,
}

impl DeviceError {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Buffer binding point.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferTarget {
    /// Per-vertex attribute data.
    Vertex,
    /// Element indices.
    Index,
}

/// Storage hint for `buffer_data`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferUsage {
    /// Written once, drawn many times.
    Static,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PrimitiveMode {
    Triangles,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IndexType {
    U32,
}

impl IndexType {
    pub const fn size(self) -> usize {
        match self {
            IndexType::U32 => 4,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Which framebuffer planes `clear` resets.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ClearMask {
    pub color: bool,
    pub depth: bool,
}

impl ClearMask {
    pub const COLOR_DEPTH: ClearMask = ClearMask {
        color: true,
        depth: true,
    };
}

/// Layout of a single float vertex attribute.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexAttribute {
    pub slot: u32,
    pub components: i32,
    pub normalized: bool,
    /// Byte distance between consecutive vertices; `0` means tightly packed.
    pub stride: i32,
    pub offset: i32,
}

/// Graphics device seen by meshes, shader programs and surfaces.
///
/// Mirrors the bind-to-edit model of the device: bind state is ambient and
/// shared, so every caller restores "nothing bound" when it is done.
/// Methods take `&self`; implementations that track state use interior
/// mutability. The device must be current on the calling thread.
pub trait Device {
    // Buffers and vertex arrays.
    fn create_buffer(&self) -> Result<BufferHandle, DeviceError>;
    fn delete_buffer(&self, buffer: BufferHandle);
    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferHandle>);
    fn buffer_data(&self, target: BufferTarget, data: &[u8], usage: BufferUsage);

    fn create_vertex_array(&self) -> Result<VertexArrayHandle, DeviceError>;
    fn delete_vertex_array(&self, vertex_array: VertexArrayHandle);
    fn bind_vertex_array(&self, vertex_array: Option<VertexArrayHandle>);
    fn vertex_attrib_pointer_f32(&self, attribute: VertexAttribute);
    fn enable_vertex_attrib_array(&self, slot: u32);

    fn draw_elements(&self, mode: PrimitiveMode, count: i32, index_type: IndexType, offset: i32);

    // Shader stages.
    fn create_shader(&self, stage: ShaderStage) -> Result<ShaderHandle, DeviceError>;
    fn shader_source(&self, shader: ShaderHandle, source: &str);
    fn compile_shader(&self, shader: ShaderHandle);
    fn shader_compile_status(&self, shader: ShaderHandle) -> bool;
    fn shader_info_log(&self, shader: ShaderHandle) -> String;
    fn delete_shader(&self, shader: ShaderHandle);

    // Programs.
    fn create_program(&self) -> Result<ProgramHandle, DeviceError>;
    fn attach_shader(&self, program: ProgramHandle, shader: ShaderHandle);
    fn detach_shader(&self, program: ProgramHandle, shader: ShaderHandle);
    fn link_program(&self, program: ProgramHandle);
    fn program_link_status(&self, program: ProgramHandle) -> bool;
    /// Runs the validation pass and returns the validation status.
    fn validate_program(&self, program: ProgramHandle) -> bool;
    fn program_info_log(&self, program: ProgramHandle) -> String;
    fn delete_program(&self, program: ProgramHandle);
    fn use_program(&self, program: Option<ProgramHandle>);

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;
    /// Uploads a column-major 4x4 matrix to the current program.
    fn uniform_matrix_4_f32(&self, location: UniformLocation, value: &[f32; 16]);

    // Fixed-function state.
    fn enable_depth_test(&self);
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32);
    fn clear(&self, mask: ClearMask);
}
