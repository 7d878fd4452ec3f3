use thiserror::Error;

/// Faults a single frame can hit; the run loop logs them and keeps going
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("render surface is {width}x{height}, nothing to draw")]
    EmptySurface { width: usize, height: usize },
}
