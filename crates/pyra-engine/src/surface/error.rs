use thiserror::Error;

/// Render surface failures.
///
/// The first three are initialisation failures: the surface is unusable and
/// has already torn down whatever it had created.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("window system initialisation failed: {0}")]
    WindowSystemInit(String),

    #[error("window creation failed: {0}")]
    WindowCreation(String),

    #[error("graphics function loader initialisation failed: {0}")]
    FunctionLoader(String),

    #[error("surface is already initialised")]
    AlreadyInitialised,

    #[error("surface is not initialised")]
    NotInitialised,

    #[error("failed to present frame: {0}")]
    Present(String),
}

impl SurfaceError {
    /// True for failures raised while bringing the surface up.
    pub fn is_initialisation_failure(&self) -> bool {
        matches!(
            self,
            SurfaceError::WindowSystemInit(_)
                | SurfaceError::WindowCreation(_)
                | SurfaceError::FunctionLoader(_)
        )
    }
}
