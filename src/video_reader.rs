use crate::source::FrameSource;
use opencv::{
    core,
    prelude::*,
    videoio::{self, VideoCapture},
};
use thiserror::Error;

// Defines the error types.
#[derive(Debug, Clone, Error)]
pub enum VideoReaderError {
    #[error("{0}")]
    OpenCV(String),
}

/// An open read cursor over a video file or network stream.
pub trait FrameReader {
    /// Reads the next BGR frame. Returns `Ok(None)` at the end of the stream.
    fn read_frame(&mut self) -> Result<Option<core::Mat>, VideoReaderError>;

    /// Releases the underlying handle. Further reads return `Ok(None)`.
    fn release(&mut self);
}

/// Opens a [`FrameReader`] for a frame source.
pub trait CaptureOpener {
    fn open(&self, source: &FrameSource) -> Result<Box<dyn FrameReader>, VideoReaderError>;
}

/// A struct responsible for opening a video and decoding it frame by frame.
pub struct FrameDecoder {
    cap: VideoCapture,
}

impl FrameDecoder {
    /// Creates a new FrameDecoder by opening the specified file path or stream URL.
    pub fn new(location: &str) -> Result<Self, VideoReaderError> {
        let cap = VideoCapture::from_file(location, videoio::CAP_ANY).map_err(|e| {
            VideoReaderError::OpenCV(format!("Failed to open video source: {:?}", e))
        })?;

        // Check if the video capture was actually opened successfully.
        if !cap.is_opened().unwrap_or(false) {
            return Err(VideoReaderError::OpenCV(format!(
                "Failed to open video source: {}",
                location
            )));
        }

        Ok(Self { cap })
    }

    /// Returns the frames per second (FPS) of the video.
    pub fn get_fps(&self) -> f64 {
        self.cap.get(videoio::CAP_PROP_FPS).unwrap_or(30.0)
    }

    /// Returns the width of the video frames.
    pub fn width(&self) -> u32 {
        self.cap.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as u32
    }

    /// Returns the height of the video frames.
    pub fn height(&self) -> u32 {
        self.cap.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as u32
    }
}

impl FrameReader for FrameDecoder {
    fn read_frame(&mut self) -> Result<Option<core::Mat>, VideoReaderError> {
        if !self.cap.is_opened().unwrap_or(false) {
            return Ok(None);
        }
        let mut frame = core::Mat::default();
        match self.cap.read(&mut frame) {
            Ok(true) if !frame.empty() => Ok(Some(frame)),
            // End of video
            Ok(_) => Ok(None),
            Err(e) => Err(VideoReaderError::OpenCV(format!(
                "Failed to read frame: {}",
                e
            ))),
        }
    }

    fn release(&mut self) {
        if let Err(e) = self.cap.release() {
            log::warn!("Failed to release video capture: {}", e);
        }
    }
}

/// Opens sources through OpenCV's `videoio` backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenCvOpener;

impl CaptureOpener for OpenCvOpener {
    fn open(&self, source: &FrameSource) -> Result<Box<dyn FrameReader>, VideoReaderError> {
        let decoder = FrameDecoder::new(&source.location())?;
        log::info!(
            "Opened {} ({}x{} @ {:.1} fps)",
            source,
            decoder.width(),
            decoder.height(),
            decoder.get_fps()
        );
        Ok(Box::new(decoder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{io::Write, path::PathBuf};
    use tempfile::NamedTempFile;

    /// Helper to create a temporary empty file. The handle keeps the file alive.
    fn create_empty_temp_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temporary file");
        file.write_all(b"")
            .expect("Failed to write to temporary file");
        file
    }

    #[test]
    fn test_frame_decoder_new_non_existent_file() {
        let decoder_result = FrameDecoder::new("non_existent_video_file.mp4");
        assert!(decoder_result.is_err());
        if let Err(VideoReaderError::OpenCV(msg)) = decoder_result {
            assert!(msg.contains("Failed to open video source"));
        } else {
            panic!("Expected an OpenCV error for non-existent file.");
        }
    }

    #[test]
    fn test_frame_decoder_new_empty_file() {
        let empty_file = create_empty_temp_file();
        let location = empty_file.path().to_string_lossy().into_owned();
        let decoder_result = FrameDecoder::new(&location);
        // Expecting an error because an empty file is not a valid video
        assert!(
            decoder_result.is_err(),
            "FrameDecoder::new should return an error for an empty file."
        );
    }

    #[test]
    fn test_opener_reports_missing_file() {
        let source = FrameSource::File(PathBuf::from("missing/clip.avi"));
        match OpenCvOpener.open(&source) {
            Err(VideoReaderError::OpenCV(msg)) => {
                assert!(msg.contains("Failed to open video source"))
            }
            Ok(_) => panic!("Expected opening a missing file to fail."),
        }
    }
}
