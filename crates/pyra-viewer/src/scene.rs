use glam::{Mat4, Vec3};
use pyra_engine::device::DeviceRef;
use pyra_engine::mesh::{MeshBuffer, MeshError};
use pyra_engine::shader::ShaderProgram;

const VERTEX_SHADER: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/shader.vert");
const FRAGMENT_SHADER: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/shader.frag");

/// Four corners of a tetrahedron, xyz.
#[rustfmt::skip]
pub const TETRAHEDRON_VERTICES: [f32; 12] = [
    -1.0, -1.0, 0.0,
     0.0, -1.0, 1.0,
     1.0, -1.0, 0.0,
     0.0,  1.0, 0.0,
];

#[rustfmt::skip]
pub const TETRAHEDRON_INDICES: [u32; 12] = [
    0, 3, 1,
    1, 3, 2,
    2, 3, 0,
    0, 1, 2,
];

/// A mesh and the model transform it is drawn with.
pub struct Instance {
    pub mesh: MeshBuffer,
    pub model: Mat4,
}

/// Everything the frame loop draws: one program, a fixed set of instances.
pub struct Scene {
    pub shader: ShaderProgram,
    pub instances: Vec<Instance>,
}

impl Scene {
    /// Two tetrahedra, one above the other, shaded by the bundled program.
    ///
    /// A shader that fails to build is logged and the scene is still
    /// returned; its meshes then draw with no program bound.
    pub fn tetrahedra(device: &DeviceRef) -> Result<Self, MeshError> {
        let mut shader = ShaderProgram::new(device.clone());
        if let Err(e) = shader.create_from_files(VERTEX_SHADER, FRAGMENT_SHADER) {
            log::warn!("continuing without shader program: {e}");
        }

        let offsets = [Vec3::new(0.0, 0.0, -2.5), Vec3::new(0.0, 1.0, -2.5)];
        let instances = offsets
            .into_iter()
            .map(|offset| {
                let mesh = MeshBuffer::with_data(
                    device.clone(),
                    &TETRAHEDRON_VERTICES,
                    &TETRAHEDRON_INDICES,
                )?;
                let model =
                    Mat4::from_translation(offset) * Mat4::from_scale(Vec3::new(0.4, 0.4, 1.0));
                Ok(Instance { mesh, model })
            })
            .collect::<Result<Vec<_>, MeshError>>()?;

        log::debug!("scene ready with {} instances", instances.len());
        Ok(Self { shader, instances })
    }

    /// Releases device objects. The scene must not outlive its surface.
    pub fn dispose(&mut self) {
        for instance in &mut self.instances {
            instance.mesh.dispose();
        }
        self.shader.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyra_engine::device::HeadlessDevice;
    use pyra_engine::device::headless::ObjectKind;
    use std::rc::Rc;

    #[test]
    fn bundled_shaders_build() {
        let device = Rc::new(HeadlessDevice::new());
        let device_ref: DeviceRef = device.clone();
        let mut scene = Scene::tetrahedra(&device_ref).unwrap();

        assert!(scene.shader.is_ready());
        assert!(scene.shader.model_location().is_some());
        assert!(scene.shader.projection_location().is_some());
        assert!(scene.shader.view_location().is_some());
        assert_eq!(scene.instances.len(), 2);
        assert!(scene.instances.iter().all(|i| i.mesh.index_count() == 12));

        scene.dispose();
        assert_eq!(device.live_count(ObjectKind::Buffer), 0);
        assert_eq!(device.live_count(ObjectKind::Program), 0);
    }

    #[test]
    fn second_instance_sits_above_first() {
        let device: DeviceRef = Rc::new(HeadlessDevice::new());
        let scene = Scene::tetrahedra(&device).unwrap();
        let apex = Vec3::new(0.0, 1.0, 0.0);

        let a = scene.instances[0].model.transform_point3(apex);
        let b = scene.instances[1].model.transform_point3(apex);
        assert!((a.y - 0.4).abs() < 1e-6);
        assert!((b.y - 1.4).abs() < 1e-6);
        assert_eq!(a.z, -2.5);
    }
}
