use std::ffi::{CStr, c_void};

use glow::HasContext;

use super::api::{
    BufferTarget, BufferUsage, ClearMask, Device, DeviceError, IndexType, PrimitiveMode,
    ShaderStage, VertexAttribute,
};
use super::handle::{BufferHandle, ProgramHandle, ShaderHandle, UniformLocation, VertexArrayHandle};

type ValidateProgramFn = unsafe extern "system" fn(program: u32);
type GetProgramIvFn = unsafe extern "system" fn(program: u32, pname: u32, params: *mut i32);

/// Entry points `glow` does not wrap, loaded next to the context.
struct ValidationFns {
    validate_program: ValidateProgramFn,
    get_program_iv: GetProgramIvFn,
}

/// OpenGL implementation of [`Device`] on top of `glow`.
///
/// The context this was loaded from must stay current on the calling thread
/// for the lifetime of the device.
pub struct GlDevice {
    gl: glow::Context,
    validation: ValidationFns,
}

impl GlDevice {
    /// Loads the OpenGL function pointers through `loader`.
    ///
    /// Fails when the loader cannot resolve the entry points or when the
    /// reported context version is below 3.3.
    ///
    /// # Safety
    ///
    /// A GL context must be current on the calling thread and `loader` must
    /// return pointers valid for that context.
    pub unsafe fn from_loader<F>(mut loader: F) -> Result<Self, DeviceError>
    where
        F: FnMut(&CStr) -> *const c_void,
    {
        let validate = loader(c"glValidateProgram");
        let get_program_iv = loader(c"glGetProgramiv");
        if validate.is_null() || get_program_iv.is_null() {
            return Err(DeviceError::new(
                "function table",
                "glValidateProgram/glGetProgramiv could not be resolved",
            ));
        }

        // SAFETY: both pointers were resolved for the current context and
        // match the GL signatures declared above.
        let validation = unsafe {
            ValidationFns {
                validate_program: std::mem::transmute::<*const c_void, ValidateProgramFn>(
                    validate,
                ),
                get_program_iv: std::mem::transmute::<*const c_void, GetProgramIvFn>(
                    get_program_iv,
                ),
            }
        };

        let gl = unsafe { glow::Context::from_loader_function_cstr(|name| loader(name)) };

        let version = gl.version();
        if version.is_embedded || (version.major, version.minor) < (3, 3) {
            return Err(DeviceError::new(
                "function table",
                format!(
                    "OpenGL 3.3 core required, context reports {}.{}{}",
                    version.major,
                    version.minor,
                    if version.is_embedded { " ES" } else { "" }
                ),
            ));
        }

        log::debug!(
            "loaded OpenGL {}.{} ({})",
            version.major,
            version.minor,
            version.vendor_info
        );

        Ok(Self { gl, validation })
    }

    /// Returns the underlying `glow` context for calls not covered by [`Device`].
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }
}

fn buffer_target(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Vertex => glow::ARRAY_BUFFER,
        BufferTarget::Index => glow::ELEMENT_ARRAY_BUFFER,
    }
}

fn native_buffer(h: BufferHandle) -> glow::NativeBuffer {
    glow::NativeBuffer(h.raw())
}

fn native_vertex_array(h: VertexArrayHandle) -> glow::NativeVertexArray {
    glow::NativeVertexArray(h.raw())
}

fn native_shader(h: ShaderHandle) -> glow::NativeShader {
    glow::NativeShader(h.raw())
}

fn native_program(h: ProgramHandle) -> glow::NativeProgram {
    glow::NativeProgram(h.raw())
}

impl Device for GlDevice {
    fn create_buffer(&self) -> Result<BufferHandle, DeviceError> {
        let buffer = unsafe { self.gl.create_buffer() }.map_err(|e| DeviceError::new("buffer", e))?;
        Ok(BufferHandle::new(buffer.0))
    }

    fn delete_buffer(&self, buffer: BufferHandle) {
        unsafe { self.gl.delete_buffer(native_buffer(buffer)) }
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferHandle>) {
        unsafe {
            self.gl
                .bind_buffer(buffer_target(target), buffer.map(native_buffer))
        }
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        let usage = match usage {
            BufferUsage::Static => glow::STATIC_DRAW,
        };
        unsafe {
            self.gl
                .buffer_data_u8_slice(buffer_target(target), data, usage)
        }
    }

    fn create_vertex_array(&self) -> Result<VertexArrayHandle, DeviceError> {
        let vao = unsafe { self.gl.create_vertex_array() }
            .map_err(|e| DeviceError::new("vertex array", e))?;
        Ok(VertexArrayHandle::new(vao.0))
    }

    fn delete_vertex_array(&self, vertex_array: VertexArrayHandle) {
        unsafe { self.gl.delete_vertex_array(native_vertex_array(vertex_array)) }
    }

    fn bind_vertex_array(&self, vertex_array: Option<VertexArrayHandle>) {
        unsafe {
            self.gl
                .bind_vertex_array(vertex_array.map(native_vertex_array))
        }
    }

    fn vertex_attrib_pointer_f32(&self, attribute: VertexAttribute) {
        unsafe {
            self.gl.vertex_attrib_pointer_f32(
                attribute.slot,
                attribute.components,
                glow::FLOAT,
                attribute.normalized,
                attribute.stride,
                attribute.offset,
            )
        }
    }

    fn enable_vertex_attrib_array(&self, slot: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(slot) }
    }

    fn draw_elements(&self, mode: PrimitiveMode, count: i32, index_type: IndexType, offset: i32) {
        let mode = match mode {
            PrimitiveMode::Triangles => glow::TRIANGLES,
        };
        let index_type = match index_type {
            IndexType::U32 => glow::UNSIGNED_INT,
        };
        unsafe { self.gl.draw_elements(mode, count, index_type, offset) }
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<ShaderHandle, DeviceError> {
        let ty = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        let shader = unsafe { self.gl.create_shader(ty) }
            .map_err(|e| DeviceError::new("shader", e))?;
        Ok(ShaderHandle::new(shader.0))
    }

    fn shader_source(&self, shader: ShaderHandle, source: &str) {
        unsafe { self.gl.shader_source(native_shader(shader), source) }
    }

    fn compile_shader(&self, shader: ShaderHandle) {
        unsafe { self.gl.compile_shader(native_shader(shader)) }
    }

    fn shader_compile_status(&self, shader: ShaderHandle) -> bool {
        unsafe { self.gl.get_shader_compile_status(native_shader(shader)) }
    }

    fn shader_info_log(&self, shader: ShaderHandle) -> String {
        unsafe { self.gl.get_shader_info_log(native_shader(shader)) }
    }

    fn delete_shader(&self, shader: ShaderHandle) {
        unsafe { self.gl.delete_shader(native_shader(shader)) }
    }

    fn create_program(&self) -> Result<ProgramHandle, DeviceError> {
        let program = unsafe { self.gl.create_program() }
            .map_err(|e| DeviceError::new("program", e))?;
        Ok(ProgramHandle::new(program.0))
    }

    fn attach_shader(&self, program: ProgramHandle, shader: ShaderHandle) {
        unsafe {
            self.gl
                .attach_shader(native_program(program), native_shader(shader))
        }
    }

    fn detach_shader(&self, program: ProgramHandle, shader: ShaderHandle) {
        unsafe {
            self.gl
                .detach_shader(native_program(program), native_shader(shader))
        }
    }

    fn link_program(&self, program: ProgramHandle) {
        unsafe { self.gl.link_program(native_program(program)) }
    }

    fn program_link_status(&self, program: ProgramHandle) -> bool {
        unsafe { self.gl.get_program_link_status(native_program(program)) }
    }

    fn validate_program(&self, program: ProgramHandle) -> bool {
        let mut status = 0;
        // SAFETY: entry points resolved for this context in `from_loader`;
        // `status` outlives the call.
        unsafe {
            (self.validation.validate_program)(program.get());
            (self.validation.get_program_iv)(program.get(), glow::VALIDATE_STATUS, &mut status);
        }
        status != 0
    }

    fn program_info_log(&self, program: ProgramHandle) -> String {
        unsafe { self.gl.get_program_info_log(native_program(program)) }
    }

    fn delete_program(&self, program: ProgramHandle) {
        unsafe { self.gl.delete_program(native_program(program)) }
    }

    fn use_program(&self, program: Option<ProgramHandle>) {
        unsafe { self.gl.use_program(program.map(native_program)) }
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        unsafe { self.gl.get_uniform_location(native_program(program), name) }
            .map(|loc| UniformLocation(loc.0))
    }

    fn uniform_matrix_4_f32(&self, location: UniformLocation, value: &[f32; 16]) {
        let loc = glow::NativeUniformLocation(location.0);
        unsafe { self.gl.uniform_matrix_4_f32_slice(Some(&loc), false, value) }
    }

    fn enable_depth_test(&self) {
        unsafe { self.gl.enable(glow::DEPTH_TEST) }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) }
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        unsafe { self.gl.clear_color(r, g, b, a) }
    }

    fn clear(&self, mask: ClearMask) {
        let mut bits = 0;
        if mask.color {
            bits |= glow::COLOR_BUFFER_BIT;
        }
        if mask.depth {
            bits |= glow::DEPTH_BUFFER_BIT;
        }
        if bits != 0 {
            unsafe { self.gl.clear(bits) }
        }
    }
}
