//! Frame capture defaults.

/// Number of frames sampled from every upload.
pub const DEFAULT_FRAME_COUNT: usize = 12;

/// Start of the sampling window as a fraction of the clip duration.
pub const DEFAULT_WINDOW_START: f64 = 0.2;
/// End of the sampling window as a fraction of the clip duration.
pub const DEFAULT_WINDOW_END: f64 = 0.8;

/// JPEG quality for captured frames (0.0-1.0).
pub const DEFAULT_JPEG_QUALITY: f32 = 0.85;

/// MIME type of every captured frame.
pub const FRAME_MIME_TYPE: &str = "image/jpeg";
