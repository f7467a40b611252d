use std::cell::RefCell;
use std::collections::HashMap;

use super::api::{
    BufferTarget, BufferUsage, ClearMask, Device, DeviceError, IndexType, PrimitiveMode,
    ShaderStage, VertexAttribute,
};
use super::handle::{BufferHandle, ProgramHandle, ShaderHandle, UniformLocation, VertexArrayHandle};

/// Kind of object tracked by [`HeadlessDevice`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ObjectKind {
    Buffer,
    VertexArray,
    Shader,
    Program,
}

/// A recorded state-changing call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    BindBuffer(BufferTarget, Option<BufferHandle>),
    BufferData {
        target: BufferTarget,
        bytes: usize,
        usage: BufferUsage,
    },
    BindVertexArray(Option<VertexArrayHandle>),
    VertexAttribPointer(VertexAttribute),
    EnableVertexAttribArray(u32),
    DrawElements {
        mode: PrimitiveMode,
        count: i32,
        index_type: IndexType,
        vertex_array: Option<VertexArrayHandle>,
        index_buffer: Option<BufferHandle>,
    },
    UseProgram(Option<ProgramHandle>),
    UniformMatrix4 {
        program: Option<ProgramHandle>,
        location: UniformLocation,
        value: [f32; 16],
    },
    EnableDepthTest,
    Viewport {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    ClearColor([f32; 4]),
    Clear(ClearMask),
    Delete(ObjectKind, u32),
}

#[derive(Debug)]
struct ShaderRecord {
    stage: ShaderStage,
    source: String,
    /// `None` until compiled; then the uniforms it declares or the error log.
    compiled: Option<Result<Vec<String>, String>>,
}

#[derive(Debug, Default)]
struct ProgramRecord {
    attached: Vec<u32>,
    linked: bool,
    uniforms: Vec<String>,
    info_log: String,
}

#[derive(Debug, Default)]
struct State {
    next_name: u32,
    live: HashMap<u32, ObjectKind>,
    shaders: HashMap<u32, ShaderRecord>,
    programs: HashMap<u32, ProgramRecord>,

    vertex_buffer: Option<BufferHandle>,
    vertex_array: Option<VertexArrayHandle>,
    /// Element buffer bound while no vertex array is bound.
    loose_index_buffer: Option<BufferHandle>,
    /// Element buffer captured by each vertex array.
    vertex_array_index: HashMap<u32, Option<BufferHandle>>,
    program: Option<ProgramHandle>,

    calls: Vec<DeviceCall>,
    fail_validation: Option<String>,
    refuse_objects: Option<ObjectKind>,
}

impl State {
    fn allocate(&mut self, kind: ObjectKind) -> Result<u32, DeviceError> {
        if self.refuse_objects == Some(kind) {
            return Err(DeviceError::new(kind_name(kind), "out of device memory"));
        }
        self.next_name += 1;
        self.live.insert(self.next_name, kind);
        Ok(self.next_name)
    }

    fn release(&mut self, kind: ObjectKind, name: u32) {
        match self.live.get(&name) {
            Some(k) if *k == kind => {
                self.live.remove(&name);
                self.calls.push(DeviceCall::Delete(kind, name));
            }
            _ => log::warn!("headless device: delete of unknown {} {name}", kind_name(kind)),
        }
    }

    fn index_buffer(&self) -> Option<BufferHandle> {
        match self.vertex_array {
            Some(vao) => self.vertex_array_index.get(&vao.get()).copied().flatten(),
            None => self.loose_index_buffer,
        }
    }
}

fn kind_name(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Buffer => "buffer",
        ObjectKind::VertexArray => "vertex array",
        ObjectKind::Shader => "shader",
        ObjectKind::Program => "program",
    }
}

/// Recording [`Device`] that needs no GPU.
///
/// Handles come from a counter, live objects are tracked so leaks show up in
/// tests, and shader stages go through a small GLSL front-end check so that
/// compile, link and uniform lookups behave like a driver would for simple
/// programs.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    state: RefCell<State>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `validate_program` fail with `message`.
    pub fn fail_validation(&self, message: impl Into<String>) {
        self.state.borrow_mut().fail_validation = Some(message.into());
    }

    /// Makes creation of `kind` objects fail.
    pub fn refuse_objects(&self, kind: Option<ObjectKind>) {
        self.state.borrow_mut().refuse_objects = kind;
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// All recorded draw calls, in order.
    pub fn draw_calls(&self) -> Vec<DeviceCall> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| matches!(c, DeviceCall::DrawElements { .. }))
            .cloned()
            .collect()
    }

    /// Number of live objects of `kind`.
    pub fn live_count(&self, kind: ObjectKind) -> usize {
        self.state
            .borrow()
            .live
            .values()
            .filter(|k| **k == kind)
            .count()
    }

    pub fn is_live(&self, name: u32) -> bool {
        self.state.borrow().live.contains_key(&name)
    }

    pub fn current_program(&self) -> Option<ProgramHandle> {
        self.state.borrow().program
    }

    pub fn bound_vertex_array(&self) -> Option<VertexArrayHandle> {
        self.state.borrow().vertex_array
    }

    pub fn bound_buffer(&self, target: BufferTarget) -> Option<BufferHandle> {
        let state = self.state.borrow();
        match target {
            BufferTarget::Vertex => state.vertex_buffer,
            BufferTarget::Index => state.index_buffer(),
        }
    }
}

impl Device for HeadlessDevice {
    fn create_buffer(&self) -> Result<BufferHandle, DeviceError> {
        let name = self.state.borrow_mut().allocate(ObjectKind::Buffer)?;
        BufferHandle::from_raw(name).ok_or_else(|| DeviceError::new("buffer", "name space exhausted"))
    }

    fn delete_buffer(&self, buffer: BufferHandle) {
        let mut state = self.state.borrow_mut();
        state.release(ObjectKind::Buffer, buffer.get());
        if state.vertex_buffer == Some(buffer) {
            state.vertex_buffer = None;
        }
        if state.loose_index_buffer == Some(buffer) {
            state.loose_index_buffer = None;
        }
        for slot in state.vertex_array_index.values_mut() {
            if *slot == Some(buffer) {
                *slot = None;
            }
        }
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferHandle>) {
        let mut state = self.state.borrow_mut();
        match target {
            BufferTarget::Vertex => state.vertex_buffer = buffer,
            BufferTarget::Index => match state.vertex_array {
                Some(vao) => {
                    state.vertex_array_index.insert(vao.get(), buffer);
                }
                None => state.loose_index_buffer = buffer,
            },
        }
        state.calls.push(DeviceCall::BindBuffer(target, buffer));
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        let mut state = self.state.borrow_mut();
        let bound = match target {
            BufferTarget::Vertex => state.vertex_buffer,
            BufferTarget::Index => state.index_buffer(),
        };
        if bound.is_none() {
            log::warn!("headless device: buffer_data with no {target:?} buffer bound");
        }
        state.calls.push(DeviceCall::BufferData {
            target,
            bytes: data.len(),
            usage,
        });
    }

    fn create_vertex_array(&self) -> Result<VertexArrayHandle, DeviceError> {
        let name = self.state.borrow_mut().allocate(ObjectKind::VertexArray)?;
        VertexArrayHandle::from_raw(name)
            .ok_or_else(|| DeviceError::new("vertex array", "name space exhausted"))
    }

    fn delete_vertex_array(&self, vertex_array: VertexArrayHandle) {
        let mut state = self.state.borrow_mut();
        state.release(ObjectKind::VertexArray, vertex_array.get());
        state.vertex_array_index.remove(&vertex_array.get());
        if state.vertex_array == Some(vertex_array) {
            state.vertex_array = None;
        }
    }

    fn bind_vertex_array(&self, vertex_array: Option<VertexArrayHandle>) {
        let mut state = self.state.borrow_mut();
        state.vertex_array = vertex_array;
        state.calls.push(DeviceCall::BindVertexArray(vertex_array));
    }

    fn vertex_attrib_pointer_f32(&self, attribute: VertexAttribute) {
        self.state
            .borrow_mut()
            .calls
            .push(DeviceCall::VertexAttribPointer(attribute));
    }

    fn enable_vertex_attrib_array(&self, slot: u32) {
        self.state
            .borrow_mut()
            .calls
            .push(DeviceCall::EnableVertexAttribArray(slot));
    }

    fn draw_elements(&self, mode: PrimitiveMode, count: i32, index_type: IndexType, offset: i32) {
        let mut state = self.state.borrow_mut();
        debug_assert_eq!(offset % index_type.size() as i32, 0);
        let call = DeviceCall::DrawElements {
            mode,
            count,
            index_type,
            vertex_array: state.vertex_array,
            index_buffer: state.index_buffer(),
        };
        state.calls.push(call);
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<ShaderHandle, DeviceError> {
        let mut state = self.state.borrow_mut();
        let name = state.allocate(ObjectKind::Shader)?;
        state.shaders.insert(
            name,
            ShaderRecord {
                stage,
                source: String::new(),
                compiled: None,
            },
        );
        ShaderHandle::from_raw(name).ok_or_else(|| DeviceError::new("shader", "name space exhausted"))
    }

    fn shader_source(&self, shader: ShaderHandle, source: &str) {
        if let Some(rec) = self.state.borrow_mut().shaders.get_mut(&shader.get()) {
            rec.source = source.to_owned();
            rec.compiled = None;
        }
    }

    fn compile_shader(&self, shader: ShaderHandle) {
        if let Some(rec) = self.state.borrow_mut().shaders.get_mut(&shader.get()) {
            rec.compiled = Some(glsl::check(&rec.source));
        }
    }

    fn shader_compile_status(&self, shader: ShaderHandle) -> bool {
        self.state
            .borrow()
            .shaders
            .get(&shader.get())
            .is_some_and(|rec| matches!(rec.compiled, Some(Ok(_))))
    }

    fn shader_info_log(&self, shader: ShaderHandle) -> String {
        match self.state.borrow().shaders.get(&shader.get()) {
            Some(ShaderRecord {
                compiled: Some(Err(log)),
                ..
            }) => log.clone(),
            _ => String::new(),
        }
    }

    fn delete_shader(&self, shader: ShaderHandle) {
        let mut state = self.state.borrow_mut();
        state.release(ObjectKind::Shader, shader.get());
        state.shaders.remove(&shader.get());
    }

    fn create_program(&self) -> Result<ProgramHandle, DeviceError> {
        let mut state = self.state.borrow_mut();
        let name = state.allocate(ObjectKind::Program)?;
        state.programs.insert(name, ProgramRecord::default());
        ProgramHandle::from_raw(name).ok_or_else(|| DeviceError::new("program", "name space exhausted"))
    }

    fn attach_shader(&self, program: ProgramHandle, shader: ShaderHandle) {
        if let Some(rec) = self.state.borrow_mut().programs.get_mut(&program.get()) {
            if !rec.attached.contains(&shader.get()) {
                rec.attached.push(shader.get());
            }
        }
    }

    fn detach_shader(&self, program: ProgramHandle, shader: ShaderHandle) {
        if let Some(rec) = self.state.borrow_mut().programs.get_mut(&program.get()) {
            rec.attached.retain(|s| *s != shader.get());
        }
    }

    fn link_program(&self, program: ProgramHandle) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let Some(rec) = state.programs.get_mut(&program.get()) else {
            return;
        };

        let mut uniforms = Vec::new();
        let mut errors = Vec::new();
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            let unit = rec
                .attached
                .iter()
                .filter_map(|s| state.shaders.get(s))
                .find(|r| r.stage == stage);
            match unit.map(|r| &r.compiled) {
                None => errors.push(format!("no {stage} shader attached")),
                Some(Some(Ok(names))) => {
                    for n in names {
                        if !uniforms.contains(n) {
                            uniforms.push(n.clone());
                        }
                    }
                }
                Some(_) => errors.push(format!("{stage} shader is not compiled")),
            }
        }

        if errors.is_empty() {
            rec.linked = true;
            rec.uniforms = uniforms;
            rec.info_log.clear();
        } else {
            rec.linked = false;
            rec.uniforms.clear();
            rec.info_log = format!("error: linking failed: {}", errors.join("; "));
        }
    }

    fn program_link_status(&self, program: ProgramHandle) -> bool {
        self.state
            .borrow()
            .programs
            .get(&program.get())
            .is_some_and(|rec| rec.linked)
    }

    fn validate_program(&self, program: ProgramHandle) -> bool {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let Some(rec) = state.programs.get_mut(&program.get()) else {
            return false;
        };
        if !rec.linked {
            rec.info_log = "error: validation failed: program is not linked".to_owned();
            return false;
        }
        match &state.fail_validation {
            Some(message) => {
                rec.info_log = format!("error: validation failed: {message}");
                false
            }
            None => true,
        }
    }

    fn program_info_log(&self, program: ProgramHandle) -> String {
        self.state
            .borrow()
            .programs
            .get(&program.get())
            .map(|rec| rec.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&self, program: ProgramHandle) {
        let mut state = self.state.borrow_mut();
        state.release(ObjectKind::Program, program.get());
        state.programs.remove(&program.get());
        if state.program == Some(program) {
            state.program = None;
        }
    }

    fn use_program(&self, program: Option<ProgramHandle>) {
        let mut state = self.state.borrow_mut();
        state.program = program;
        state.calls.push(DeviceCall::UseProgram(program));
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let state = self.state.borrow();
        let rec = state.programs.get(&program.get()).filter(|r| r.linked)?;
        rec.uniforms
            .iter()
            .position(|u| u == name)
            .map(|i| UniformLocation(i as u32))
    }

    fn uniform_matrix_4_f32(&self, location: UniformLocation, value: &[f32; 16]) {
        let mut state = self.state.borrow_mut();
        let program = state.program;
        state.calls.push(DeviceCall::UniformMatrix4 {
            program,
            location,
            value: *value,
        });
    }

    fn enable_depth_test(&self) {
        self.state.borrow_mut().calls.push(DeviceCall::EnableDepthTest);
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.state.borrow_mut().calls.push(DeviceCall::Viewport {
            x,
            y,
            width,
            height,
        });
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.state
            .borrow_mut()
            .calls
            .push(DeviceCall::ClearColor([r, g, b, a]));
    }

    fn clear(&self, mask: ClearMask) {
        self.state.borrow_mut().calls.push(DeviceCall::Clear(mask));
    }
}

/// Just enough of a GLSL front end to tell well-formed programs from broken ones.
mod glsl {
    /// Returns the declared uniform names, or a driver-style error log.
    pub(super) fn check(source: &str) -> Result<Vec<String>, String> {
        let first = source
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with("//"));
        match first {
            None => return Err("ERROR: 0:1: '' : empty shader source".to_owned()),
            Some(line) if !line.starts_with("#version") => {
                return Err("ERROR: 0:1: '' : #version directive missing".to_owned());
            }
            _ => {}
        }

        check_delimiters(source)?;

        if !source.contains("void main") {
            return Err("ERROR: 0:0: 'main' : no entry point defined".to_owned());
        }

        Ok(uniforms(source))
    }

    fn check_delimiters(source: &str) -> Result<(), String> {
        let mut stack = Vec::new();
        for (idx, line) in source.lines().enumerate() {
            let code = line.split("//").next().unwrap_or_default();
            for ch in code.chars() {
                match ch {
                    '{' | '(' | '[' => stack.push(ch),
                    '}' | ')' | ']' => {
                        let open = match ch {
                            '}' => '{',
                            ')' => '(',
                            _ => '[',
                        };
                        if stack.pop() != Some(open) {
                            return Err(format!(
                                "ERROR: 0:{}: '{ch}' : syntax error, unexpected '{ch}'",
                                idx + 1
                            ));
                        }
                    }
                    _ => {}
                }
            }
        }
        match stack.last() {
            Some(open) => Err(format!(
                "ERROR: 0:{}: '' : syntax error, unexpected end of file, unclosed '{open}'",
                source.lines().count()
            )),
            None => Ok(()),
        }
    }

    fn uniforms(source: &str) -> Vec<String> {
        let code = source
            .lines()
            .filter(|l| !l.trim_start().starts_with('#'))
            .map(|l| l.split("//").next().unwrap_or_default())
            .collect::<Vec<_>>()
            .join(" ");

        let mut names = Vec::new();
        for stmt in code.split([';', '{', '}']) {
            let mut tokens = stmt.split_whitespace();
            if tokens.next() != Some("uniform") {
                continue;
            }
            if let Some(last) = tokens.last() {
                let name = last.split('[').next().unwrap_or(last);
                if !name.is_empty() && !names.iter().any(|n| n == name) {
                    names.push(name.to_owned());
                }
            }
        }
        names
    }

    #[cfg(test)]
    mod tests {
        use super::check;

        #[test]
        fn collects_uniform_names_in_declaration_order() {
            let src = "#version 330\nuniform mat4 model;\nuniform highp mat4 projection;\nuniform vec4 tint[2];\nvoid main() {}\n";
            assert_eq!(check(src).unwrap(), vec!["model", "projection", "tint"]);
        }

        #[test]
        fn finds_uniforms_after_directives_and_blocks() {
            let src = "#version 330\n#define SCALE 2.0\nuniform mat4 view;\nvec4 f() { return vec4(SCALE); }\nuniform mat4 model; // transform\nvoid main() {}\n";
            assert_eq!(check(src).unwrap(), vec!["view", "model"]);
        }

        #[test]
        fn rejects_unbalanced_braces() {
            let err = check("#version 330\nvoid main() {\n").unwrap_err();
            assert!(err.contains("unclosed '{'"), "{err}");
        }

        #[test]
        fn rejects_missing_version_and_main() {
            assert!(check("void main() {}").unwrap_err().contains("#version"));
            assert!(check("#version 330\n").unwrap_err().contains("entry point"));
            assert!(check("   \n").unwrap_err().contains("empty"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_buffer_binding_is_captured_by_the_vertex_array() {
        let dev = HeadlessDevice::new();
        let vao = dev.create_vertex_array().unwrap();
        let ibo = dev.create_buffer().unwrap();

        dev.bind_vertex_array(Some(vao));
        dev.bind_buffer(BufferTarget::Index, Some(ibo));
        dev.bind_vertex_array(None);
        assert_eq!(dev.bound_buffer(BufferTarget::Index), None);

        dev.bind_vertex_array(Some(vao));
        assert_eq!(dev.bound_buffer(BufferTarget::Index), Some(ibo));
    }

    #[test]
    fn refused_objects_report_the_kind() {
        let dev = HeadlessDevice::new();
        dev.refuse_objects(Some(ObjectKind::Buffer));
        let err = dev.create_buffer().unwrap_err();
        assert_eq!(err.kind, "buffer");
        assert!(dev.create_vertex_array().is_ok());
    }

    #[test]
    fn link_requires_both_compiled_stages() {
        let dev = HeadlessDevice::new();
        let program = dev.create_program().unwrap();
        let vs = dev.create_shader(ShaderStage::Vertex).unwrap();
        dev.shader_source(vs, "#version 330\nuniform mat4 model;\nvoid main() {}\n");
        dev.compile_shader(vs);
        dev.attach_shader(program, vs);
        dev.link_program(program);

        assert!(!dev.program_link_status(program));
        assert!(dev.program_info_log(program).contains("no fragment shader"));
        assert_eq!(dev.uniform_location(program, "model"), None);
    }
}
