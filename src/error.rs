use std::collections::TryReserveError;

/// Recoverable failures surfaced by the scene drawer.
///
/// Broken level data is not in here: it panics.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A portal asked for a nested view past the configured depth.
    #[error("portal recursion depth {depth} exceeds the limit of {max}")]
    PortalDepthExceeded { depth: u32, max: u32 },

    #[error("cannot allocate {bytes} bytes for the capture buffer")]
    Allocation {
        bytes: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("capture size {width}x{height} is invalid")]
    InvalidCaptureSize { width: u32, height: u32 },

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
