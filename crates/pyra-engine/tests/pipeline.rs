//! End-to-end frame sequences against the headless platform.

use pyra_engine::device::headless::{DeviceCall, ObjectKind};
use pyra_engine::device::{IndexType, PrimitiveMode};
use pyra_engine::input::{InputEvent, Key, KeyState};
use pyra_engine::mesh::MeshBuffer;
use pyra_engine::shader::{ProgramState, ShaderProgram};
use pyra_engine::surface::{Platform, RenderSurface, SurfaceConfig};

const TETRAHEDRON_VERTICES: [f32; 12] = [
    -1.0, -1.0, 0.0, //
    0.0, -1.0, 1.0, //
    1.0, -1.0, 0.0, //
    0.0, 1.0, 0.0,
];

const TETRAHEDRON_INDICES: [u32; 12] = [0, 3, 1, 1, 3, 2, 2, 3, 0, 0, 1, 2];

const VERTEX: &str = "#version 330
layout (location = 0) in vec3 pos;
out vec4 vCol;
uniform mat4 model;
uniform mat4 projection;
uniform mat4 view;
void main() {
    gl_Position = projection * view * model * vec4(pos, 1.0);
    vCol = vec4(clamp(pos, 0.0, 1.0), 1.0);
}
";

const FRAGMENT: &str = "#version 330
in vec4 vCol;
out vec4 colour;
void main() {
    colour = vCol;
}
";

#[test]
fn tetrahedron_frame() {
    let (platform, system) = Platform::headless();
    let mut surface = RenderSurface::new(&platform, SurfaceConfig::default());
    surface.initialise().unwrap();
    assert!(surface.buffer_width() > 0 && surface.buffer_height() > 0);
    assert!(!surface.should_close());

    let device = surface.device().cloned().unwrap();
    let recorder = system.device();

    let mut mesh = MeshBuffer::new(device.clone());
    mesh.upload(&TETRAHEDRON_VERTICES, &TETRAHEDRON_INDICES).unwrap();
    assert_eq!(mesh.index_count(), 12);
    assert!(mesh.vertex_array().is_some());
    assert!(mesh.vertex_buffer().is_some());
    assert!(mesh.index_buffer().is_some());

    let mut shader = ShaderProgram::new(device.clone());
    shader.create_from_source(VERTEX, FRAGMENT).unwrap();
    assert_eq!(shader.state(), ProgramState::Ready);

    recorder.clear_calls();
    surface.poll_events();
    shader.activate();
    let identity = [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ];
    shader.set_matrix4(shader.projection_location(), &identity);
    shader.set_matrix4(shader.model_location(), &identity);
    mesh.draw().unwrap();
    shader.deactivate();
    surface.present().unwrap();

    let draws = recorder.draw_calls();
    assert_eq!(draws.len(), 1);
    assert!(matches!(
        draws[0],
        DeviceCall::DrawElements {
            mode: PrimitiveMode::Triangles,
            count: 12,
            index_type: IndexType::U32,
            vertex_array: Some(_),
            index_buffer: Some(_),
        }
    ));

    let uniform_writes = recorder
        .calls()
        .iter()
        .filter(|c| matches!(c, DeviceCall::UniformMatrix4 { program: Some(_), .. }))
        .count();
    assert_eq!(uniform_writes, 2);
    assert_eq!(recorder.current_program(), None);
    assert_eq!(system.swap_count(surface.window_id().unwrap()), 1);

    mesh.dispose();
    shader.dispose();
    assert_eq!(recorder.live_count(ObjectKind::Buffer), 0);
    assert_eq!(recorder.live_count(ObjectKind::VertexArray), 0);
    assert_eq!(recorder.live_count(ObjectKind::Program), 0);
    assert_eq!(recorder.live_count(ObjectKind::Shader), 0);

    surface.dispose();
    assert!(!platform.is_initialised());
}

#[test]
fn close_key_ends_the_loop() {
    let (platform, system) = Platform::headless();
    let mut surface = RenderSurface::new(&platform, SurfaceConfig::new(640, 480));
    surface.initialise().unwrap();
    let window = surface.window_id().unwrap();

    let mut frames = 0;
    while !surface.should_close() {
        surface.poll_events();
        frames += 1;
        if frames == 3 {
            system.push_event(window, InputEvent::key(Key::Escape, KeyState::Pressed));
        }
        surface.present().unwrap();
    }
    assert_eq!(frames, 4);
}

#[test]
fn failed_fragment_keeps_drawing_possible() {
    let (platform, _system) = Platform::headless();
    let mut surface = RenderSurface::new(&platform, SurfaceConfig::default());
    surface.initialise().unwrap();
    let device = surface.device().cloned().unwrap();

    let mut shader = ShaderProgram::new(device.clone());
    let err = shader
        .create_from_source(VERTEX, "#version 330\nvoid main() {")
        .unwrap_err();
    assert!(err.log().is_some_and(|log| !log.is_empty()));
    assert_eq!(shader.state(), ProgramState::Failed);
    assert_eq!(shader.model_location(), None);
    assert_eq!(shader.projection_location(), None);

    // Activating a failed program is a no-op; meshes still draw.
    shader.activate();
    let mesh = MeshBuffer::with_data(device, &TETRAHEDRON_VERTICES, &TETRAHEDRON_INDICES).unwrap();
    mesh.draw().unwrap();
}
