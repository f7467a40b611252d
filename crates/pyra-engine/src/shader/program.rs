use std::path::Path;

use crate::device::{DeviceRef, ProgramHandle, ShaderHandle, ShaderStage, UniformLocation};

use super::ShaderError;
use super::source::read_source_or_empty;

pub const MODEL_UNIFORM: &str = "model";
pub const PROJECTION_UNIFORM: &str = "projection";
pub const VIEW_UNIFORM: &str = "view";

/// Build state of a [`ShaderProgram`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProgramState {
    /// Nothing built yet, or disposed.
    Empty,
    /// A build is in progress.
    Compiling,
    /// Linked and validated; uniform locations are cached.
    Ready,
    /// Compilation, link or validation failed. Not usable for drawing.
    Failed,
}

/// Cached locations of the well-known transform uniforms.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
struct TransformUniforms {
    model: Option<UniformLocation>,
    projection: Option<UniformLocation>,
    view: Option<UniformLocation>,
}

/// A vertex + fragment program on the device.
///
/// Built once through [`compile_and_link`](Self::compile_and_link) (or the
/// `create_from_*` helpers). Failures are reported through `log` and the
/// returned error; the instance then stays `Failed` and hands out no uniform
/// locations. Released on [`dispose`](Self::dispose) or drop.
pub struct ShaderProgram {
    device: DeviceRef,
    program: Option<ProgramHandle>,
    state: ProgramState,
    uniforms: TransformUniforms,
    diagnostic: Option<String>,
}

impl ShaderProgram {
    pub fn new(device: DeviceRef) -> Self {
        Self {
            device,
            program: None,
            state: ProgramState::Empty,
            uniforms: TransformUniforms::default(),
            diagnostic: None,
        }
    }

    /// Builds the program from in-memory source text.
    pub fn create_from_source(
        &mut self,
        vertex_code: &str,
        fragment_code: &str,
    ) -> Result<(), ShaderError> {
        self.compile_and_link(vertex_code, fragment_code)
    }

    /// Builds the program from two source files.
    ///
    /// An unreadable file is logged and replaced by empty source, so the
    /// error surfaces as a compilation failure of that stage.
    pub fn create_from_files(
        &mut self,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> Result<(), ShaderError> {
        let vertex = read_source_or_empty(vertex_path);
        let fragment = read_source_or_empty(fragment_path);
        self.compile_and_link(&vertex, &fragment)
    }

    /// Compiles both stages, links, validates and caches uniform locations.
    ///
    /// Only valid from the `Empty` state. A stage that fails to compile stops
    /// the build before linking.
    pub fn compile_and_link(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<(), ShaderError> {
        if self.state != ProgramState::Empty {
            return Err(ShaderError::InvalidState(self.state));
        }

        self.state = ProgramState::Compiling;
        self.diagnostic = None;

        match self.build(vertex_source, fragment_source) {
            Ok(()) => {
                self.state = ProgramState::Ready;
                log::debug!(
                    "shader program {:?} ready (model={:?} projection={:?} view={:?})",
                    self.program,
                    self.uniforms.model,
                    self.uniforms.projection,
                    self.uniforms.view
                );
                Ok(())
            }
            Err(e) => {
                log::error!("{e}");
                self.state = ProgramState::Failed;
                self.uniforms = TransformUniforms::default();
                self.diagnostic = Some(e.log().map_or_else(|| e.to_string(), str::to_owned));
                Err(e)
            }
        }
    }

    fn build(&mut self, vertex_source: &str, fragment_source: &str) -> Result<(), ShaderError> {
        let device = self.device.clone();

        let program = device
            .create_program()
            .map_err(ShaderError::ProgramCreation)?;
        self.program = Some(program);

        let vertex = self.compile_stage(program, ShaderStage::Vertex, vertex_source)?;
        let fragment = match self.compile_stage(program, ShaderStage::Fragment, fragment_source) {
            Ok(f) => f,
            Err(e) => {
                release_stage(&device, program, vertex);
                return Err(e);
            }
        };

        device.link_program(program);
        let linked = device.program_link_status(program);

        // Stage objects are no longer needed once the link has been attempted.
        release_stage(&device, program, vertex);
        release_stage(&device, program, fragment);

        if !linked {
            return Err(ShaderError::Link {
                log: device.program_info_log(program),
            });
        }

        if !device.validate_program(program) {
            return Err(ShaderError::Validation {
                log: device.program_info_log(program),
            });
        }

        self.uniforms = TransformUniforms {
            model: device.uniform_location(program, MODEL_UNIFORM),
            projection: device.uniform_location(program, PROJECTION_UNIFORM),
            view: device.uniform_location(program, VIEW_UNIFORM),
        };
        Ok(())
    }

    fn compile_stage(
        &self,
        program: ProgramHandle,
        stage: ShaderStage,
        source: &str,
    ) -> Result<ShaderHandle, ShaderError> {
        let shader = self
            .device
            .create_shader(stage)
            .map_err(ShaderError::ProgramCreation)?;

        self.device.shader_source(shader, source);
        self.device.compile_shader(shader);

        if !self.device.shader_compile_status(shader) {
            let log = self.device.shader_info_log(shader);
            self.device.delete_shader(shader);
            return Err(ShaderError::Compilation { stage, log });
        }

        self.device.attach_shader(program, shader);
        Ok(shader)
    }

    /// Makes this program current. Does nothing unless the program is `Ready`.
    pub fn activate(&self) {
        match (self.state, self.program) {
            (ProgramState::Ready, Some(program)) => self.device.use_program(Some(program)),
            (state, _) => log::trace!("activate ignored for shader program in {state:?} state"),
        }
    }

    /// Unbinds whatever program is current.
    pub fn deactivate(&self) {
        self.device.use_program(None);
    }

    /// Uploads a column-major 4x4 matrix to `location` of the current program.
    ///
    /// A missing location is skipped so shaders may omit any transform.
    pub fn set_matrix4(&self, location: Option<UniformLocation>, value: &[f32; 16]) {
        if let Some(loc) = location {
            self.device.uniform_matrix_4_f32(loc, value);
        }
    }

    pub fn model_location(&self) -> Option<UniformLocation> {
        self.uniforms.model
    }

    pub fn projection_location(&self) -> Option<UniformLocation> {
        self.uniforms.projection
    }

    pub fn view_location(&self) -> Option<UniformLocation> {
        self.uniforms.view
    }

    pub fn state(&self) -> ProgramState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ProgramState::Ready
    }

    /// Device program handle. May be set on a `Failed` program.
    pub fn handle(&self) -> Option<ProgramHandle> {
        self.program
    }

    /// Diagnostic text of the last failed build.
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    /// Releases the program and forgets cached uniform locations.
    ///
    /// Returns the instance to `Empty`. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if let Some(program) = self.program.take() {
            self.device.delete_program(program);
            log::debug!("released shader program {program:?}");
        }
        self.uniforms = TransformUniforms::default();
        self.state = ProgramState::Empty;
    }
}

fn release_stage(device: &DeviceRef, program: ProgramHandle, shader: ShaderHandle) {
    device.detach_shader(program, shader);
    device.delete_shader(shader);
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("program", &self.program)
            .field("state", &self.state)
            .field("uniforms", &self.uniforms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::device::Device;
    use crate::device::headless::{DeviceCall, HeadlessDevice, ObjectKind};

    const VERTEX: &str = "#version 330\n\
        layout (location = 0) in vec3 pos;\n\
        uniform mat4 model;\n\
        uniform mat4 projection;\n\
        void main() {\n\
            gl_Position = projection * model * vec4(pos, 1.0);\n\
        }\n";

    const FRAGMENT: &str = "#version 330\n\
        out vec4 colour;\n\
        void main() {\n\
            colour = vec4(1.0, 0.0, 0.0, 1.0);\n\
        }\n";

    const BROKEN_FRAGMENT: &str = "#version 330\n\
        out vec4 colour;\n\
        void main() {\n\
            colour = vec4(1.0, 0.0, 0.0, 1.0;\n\
        }\n";

    fn program() -> (Rc<HeadlessDevice>, ShaderProgram) {
        let dev = Rc::new(HeadlessDevice::new());
        let shared: DeviceRef = dev.clone();
        (dev, ShaderProgram::new(shared))
    }

    #[test]
    fn valid_sources_become_ready() {
        let (dev, mut shader) = program();
        assert_eq!(shader.state(), ProgramState::Empty);

        shader.create_from_source(VERTEX, FRAGMENT).unwrap();

        assert!(shader.is_ready());
        assert!(shader.model_location().is_some());
        assert!(shader.projection_location().is_some());
        assert_ne!(shader.model_location(), shader.projection_location());
        // Not declared: tolerated, not an error.
        assert_eq!(shader.view_location(), None);
        assert_eq!(shader.diagnostic(), None);
        // Stage objects do not outlive the build.
        assert_eq!(dev.live_count(ObjectKind::Shader), 0);
        assert_eq!(dev.live_count(ObjectKind::Program), 1);
    }

    #[test]
    fn uniform_right_after_version_is_located() {
        let (_dev, mut shader) = program();
        let vertex = "#version 330\n\
            uniform mat4 model;\n\
            uniform mat4 projection;\n\
            layout (location = 0) in vec3 pos;\n\
            void main() {\n\
                gl_Position = projection * model * vec4(pos, 1.0);\n\
            }\n";

        shader.compile_and_link(vertex, FRAGMENT).unwrap();

        assert_eq!(shader.state(), ProgramState::Ready);
        assert!(shader.model_location().is_some());
        assert!(shader.projection_location().is_some());
    }

    #[test]
    fn broken_fragment_fails_with_log() {
        let (dev, mut shader) = program();

        let err = shader.compile_and_link(VERTEX, BROKEN_FRAGMENT).unwrap_err();

        match &err {
            ShaderError::Compilation { stage, log } => {
                assert_eq!(*stage, ShaderStage::Fragment);
                assert!(!log.is_empty());
            }
            other => panic!("expected compilation failure, got {other:?}"),
        }
        assert_eq!(shader.state(), ProgramState::Failed);
        assert!(!shader.diagnostic().unwrap_or_default().is_empty());
        assert_eq!(shader.model_location(), None);
        assert_eq!(shader.projection_location(), None);
        assert_eq!(shader.view_location(), None);
        assert_eq!(dev.live_count(ObjectKind::Shader), 0);
    }

    #[test]
    fn stage_failure_skips_link() {
        let (dev, mut shader) = program();
        let _ = shader.compile_and_link("not glsl", FRAGMENT);

        let program = shader.handle().unwrap();
        assert!(!dev.program_link_status(program));
        assert!(dev.program_info_log(program).is_empty());
    }

    #[test]
    fn validation_failure_is_failed() {
        let (dev, mut shader) = program();
        dev.fail_validation("no vertex array object bound");

        let err = shader.compile_and_link(VERTEX, FRAGMENT).unwrap_err();

        assert!(matches!(err, ShaderError::Validation { .. }));
        assert_eq!(shader.state(), ProgramState::Failed);
        assert!(
            shader
                .diagnostic()
                .is_some_and(|d| d.contains("no vertex array object bound"))
        );
        assert_eq!(shader.model_location(), None);
    }

    #[test]
    fn activate_only_binds_ready_programs() {
        let (dev, mut shader) = program();
        shader.activate();
        assert_eq!(dev.current_program(), None);

        let _ = shader.compile_and_link(VERTEX, BROKEN_FRAGMENT);
        shader.activate();
        assert_eq!(dev.current_program(), None);

        shader.dispose();
        shader.compile_and_link(VERTEX, FRAGMENT).unwrap();
        shader.activate();
        assert_eq!(dev.current_program(), shader.handle());

        shader.deactivate();
        assert_eq!(dev.current_program(), None);
    }

    #[test]
    fn rebuilding_requires_dispose() {
        let (_, mut shader) = program();
        shader.compile_and_link(VERTEX, FRAGMENT).unwrap();

        let err = shader.compile_and_link(VERTEX, FRAGMENT).unwrap_err();
        assert!(matches!(err, ShaderError::InvalidState(ProgramState::Ready)));
        assert!(shader.is_ready());
    }

    #[test]
    fn set_matrix4_skips_missing_locations() {
        let (dev, mut shader) = program();
        shader.compile_and_link(VERTEX, FRAGMENT).unwrap();
        shader.activate();
        dev.clear_calls();

        let identity = [
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        ];
        shader.set_matrix4(shader.view_location(), &identity);
        shader.set_matrix4(shader.model_location(), &identity);

        let uploads: Vec<_> = dev
            .calls()
            .into_iter()
            .filter(|c| matches!(c, DeviceCall::UniformMatrix4 { .. }))
            .collect();
        assert_eq!(uploads.len(), 1);
    }

    #[test]
    fn dispose_is_idempotent_and_resets_locations() {
        let (dev, mut shader) = program();
        shader.compile_and_link(VERTEX, FRAGMENT).unwrap();

        shader.dispose();
        shader.dispose();

        assert_eq!(shader.handle(), None);
        assert_eq!(shader.state(), ProgramState::Empty);
        assert_eq!(shader.model_location(), None);
        assert_eq!(dev.live_count(ObjectKind::Program), 0);
    }

    #[test]
    fn missing_files_fail_soft_into_compilation() {
        let (_, mut shader) = program();

        let err = shader
            .create_from_files("/no/such/shader.vert", "/no/such/shader.frag")
            .unwrap_err();

        assert!(matches!(
            err,
            ShaderError::Compilation {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
        assert_eq!(shader.state(), ProgramState::Failed);
    }

    #[test]
    fn drop_releases_program() {
        let dev = Rc::new(HeadlessDevice::new());
        {
            let mut shader = ShaderProgram::new(dev.clone());
            shader.compile_and_link(VERTEX, FRAGMENT).unwrap();
        }
        assert_eq!(dev.live_count(ObjectKind::Program), 0);
    }
}
