// Demo frame source: opens a camera and hands back RGB frames for the viewer.

use glview::{Error, Frame};

// Bring in nokhwa types for camera control.
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution},
};

// A small wrapper around nokhwa::Camera so the supplier closure stays clean.
pub struct CameraCapture {
    cam: Camera,
    width: u32,
    height: u32,
}

impl CameraCapture {
    /// Open camera `index` near the requested resolution (falls back if not exact).
    pub fn new(index: u32, width: u32, height: u32) -> Result<Self, Error> {
        let idx = CameraIndex::Index(index);

        let fmt = CameraFormat::new(
            Resolution::new(width, height),
            FrameFormat::YUYV, // uncompressed; cheap to convert to RGB
            30,
        );
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        let mut cam = Camera::new(idx, req)
            .map_err(|e| Error::CameraInit(format!("create camera: {e}")))?;
        cam.open_stream()
            .map_err(|e| Error::CameraInit(format!("open stream: {e}")))?;

        // The stream might settle on a slightly different resolution.
        let actual = cam.resolution();
        Ok(Self {
            cam,
            width: actual.width(),
            height: actual.height(),
        })
    }

    /// Grab one frame (blocks until the camera has one) as RGB8.
    pub fn next_frame(&mut self) -> Result<Frame, Error> {
        let raw = self
            .cam
            .frame()
            .map_err(|e| Error::CameraFrame(format!("fetch frame: {e}")))?;
        let rgb = raw
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("decode rgb: {e}")))?;
        Ok(Frame::from(rgb))
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
