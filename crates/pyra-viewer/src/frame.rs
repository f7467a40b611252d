use glam::Mat4;
use pyra_engine::device::ClearMask;
use pyra_engine::surface::{RenderSurface, SurfaceError};

use crate::scene::Scene;

const FOV_Y_DEGREES: f32 = 45.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;

/// Perspective projection for a framebuffer of the given aspect ratio.
pub fn projection(aspect_ratio: f32) -> Mat4 {
    Mat4::perspective_rh_gl(FOV_Y_DEGREES.to_radians(), aspect_ratio, Z_NEAR, Z_FAR)
}

/// Draws one frame of `scene` and presents it.
///
/// Fails with [`SurfaceError::NotInitialised`] before the surface is up.
pub fn render(
    surface: &mut RenderSurface,
    scene: &Scene,
    projection: &Mat4,
    view: &Mat4,
) -> anyhow::Result<()> {
    let device = surface
        .device()
        .cloned()
        .ok_or(SurfaceError::NotInitialised)?;

    device.clear_color(0.0, 0.0, 0.0, 1.0);
    device.clear(ClearMask::COLOR_DEPTH);

    let shader = &scene.shader;
    shader.activate();
    shader.set_matrix4(shader.projection_location(), &projection.to_cols_array());
    shader.set_matrix4(shader.view_location(), &view.to_cols_array());

    for instance in &scene.instances {
        shader.set_matrix4(shader.model_location(), &instance.model.to_cols_array());
        instance.mesh.draw()?;
    }

    shader.deactivate();
    surface.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyra_engine::device::headless::DeviceCall;
    use pyra_engine::device::{DeviceRef, PrimitiveMode};
    use pyra_engine::surface::{Platform, SurfaceConfig};

    #[test]
    fn projection_uses_45_degree_fov() {
        let p = projection(4.0 / 3.0);
        // cot(22.5°) on the y axis, divided by aspect on x.
        let f = 1.0 / (22.5f32).to_radians().tan();
        assert!((p.y_axis.y - f).abs() < 1e-5);
        assert!((p.x_axis.x - f * 0.75).abs() < 1e-5);
    }

    #[test]
    fn frame_draws_every_instance() {
        let (platform, system) = Platform::headless();
        let mut surface = RenderSurface::new(&platform, SurfaceConfig::default());
        surface.initialise().unwrap();
        let device: DeviceRef = surface.device().cloned().unwrap();
        let mut scene = Scene::tetrahedra(&device).unwrap();

        let recorder = system.device();
        recorder.clear_calls();

        let p = projection(surface.aspect_ratio());
        render(&mut surface, &scene, &p, &Mat4::IDENTITY).unwrap();

        let calls = recorder.calls();
        assert_eq!(calls[0], DeviceCall::ClearColor([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(calls[1], DeviceCall::Clear(ClearMask::COLOR_DEPTH));

        let draws = recorder.draw_calls();
        assert_eq!(draws.len(), 2);
        for draw in &draws {
            assert!(matches!(
                draw,
                DeviceCall::DrawElements {
                    mode: PrimitiveMode::Triangles,
                    count: 12,
                    ..
                }
            ));
        }

        // projection + view once, model per instance
        let uniform_writes = calls
            .iter()
            .filter(|c| matches!(c, DeviceCall::UniformMatrix4 { .. }))
            .count();
        assert_eq!(uniform_writes, 4);
        assert_eq!(calls.last(), Some(&DeviceCall::UseProgram(None)));
        assert_eq!(system.swap_count(surface.window_id().unwrap()), 1);

        scene.dispose();
    }
}
