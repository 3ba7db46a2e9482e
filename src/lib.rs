// Real-time frame viewer.
//
// A caller pushes RGB frames into a latest-wins `FrameBox` from a per-iteration
// supplier callback; the present loop shows them on one of three backends,
// chosen once at startup:
//
// * a GPU window drawing a textured quad (feature `gpu`),
// * a CPU-composited window when only a remote or software display exists,
// * truecolor/inline-image terminal output when there is no display at all.
//
// Frames are scaled to fit and centered with black bars on the other axis.

pub mod backend;
pub mod config;
pub mod cpu_window;
pub mod error;
pub mod fit;
pub mod frame_box;
#[cfg(feature = "gpu")]
pub mod gpu_window;
pub mod headless;
pub mod present;
pub mod types;
pub mod viewer;

pub use backend::Backend;
pub use config::{ConfigOverrides, TerminalProtocol, ViewerConfig};
pub use error::{Error, Result};
pub use frame_box::FrameBox;
pub use present::{ExitReason, StopHandle, Surface, SurfaceEvent};
pub use types::Frame;
pub use viewer::Viewer;
