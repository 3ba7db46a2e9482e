// Every variant states *where* things went wrong.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Creating the CPU window failed.
    #[error("window init error: {0}")]
    WindowInit(String),

    /// Pushing a buffer to the CPU window failed.
    #[error("window update error: {0}")]
    WindowUpdate(String),

    /// The GPU window or GL context could not be brought up.
    #[error("gpu init error: {0}")]
    GpuInit(String),

    /// A backend failed while drawing a frame.
    #[error("present error: {0}")]
    Present(String),

    #[error("malformed frame: {width}x{height} with {len} bytes")]
    MalformedFrame { width: u32, height: u32, len: usize },

    /// The terminal renderer worker is gone or could not start.
    #[error("headless renderer error: {0}")]
    Headless(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Opening/starting the camera failed.
    #[error("camera init error: {0}")]
    CameraInit(String),

    /// Grabbing/decoding a camera frame failed.
    #[error("camera frame error: {0}")]
    CameraFrame(String),
}
