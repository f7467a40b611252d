//! Opens a window and draws two tetrahedra until Escape or the close button.

mod frame;
mod scene;

use anyhow::Context;
use glam::Mat4;
use pyra_engine::logging::{LoggingConfig, init_logging};
use pyra_engine::surface::{Platform, RenderSurface, SurfaceConfig};

use scene::Scene;

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let platform = Platform::desktop();
    let config = SurfaceConfig::new(800, 600).with_title("Test Window");
    let mut surface = RenderSurface::new(&platform, config);
    surface
        .initialise()
        .context("failed to bring up render surface")?;

    let device = surface
        .device()
        .cloned()
        .context("surface has no device")?;
    let mut scene = Scene::tetrahedra(&device).context("failed to upload scene")?;

    let projection = frame::projection(surface.aspect_ratio());
    let view = Mat4::IDENTITY;

    while !surface.should_close() {
        surface.poll_events();
        frame::render(&mut surface, &scene, &projection, &view)?;
    }

    scene.dispose();
    surface.dispose();
    log::info!("bye");
    Ok(())
}
