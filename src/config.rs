use crate::annotate::AnnotationStyle;
use crate::detection::PERSON_CLASS;
use crate::detection::yolo::{DEFAULT_CONFIDENCE, OnnxDetectorFactory};
use crate::session::SessionSettings;
use crate::source::{DEFAULT_STREAM_PORT, stream_url};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Runs a YOLOv8 model over a video file or phone camera stream and shows
/// the tracked people.
#[derive(Parser, Debug, Clone)]
#[command(name = "person-tracker", version)]
pub struct Args {
    /// Directory holding yolov8n.onnx and yolov8s.onnx.
    #[arg(long, env = "DETECTION_APP_MODEL_DIR", default_value = "models")]
    pub model_dir: PathBuf,

    /// Address of the phone running the camera stream.
    #[arg(long, env = "DETECTION_APP_STREAM_HOST", default_value = "127.0.0.1")]
    pub stream_host: String,

    /// Port of the phone camera stream.
    #[arg(long, env = "DETECTION_APP_STREAM_PORT", default_value_t = DEFAULT_STREAM_PORT)]
    pub stream_port: u16,

    /// Milliseconds between processed frames.
    #[arg(
        long,
        env = "DETECTION_APP_INTERVAL_MS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval_ms: u64,

    /// Minimum class score for a detection (0.0-1.0).
    #[arg(long, env = "DETECTION_APP_CONFIDENCE", default_value_t = DEFAULT_CONFIDENCE)]
    pub confidence: f64,

    /// COCO class id to display.
    #[arg(long, env = "DETECTION_APP_TARGET_CLASS", default_value_t = PERSON_CLASS)]
    pub target_class: usize,

    /// Marker drawn for each detection.
    #[arg(long, env = "DETECTION_APP_ANNOTATION", value_enum, default_value_t = AnnotationStyle::Triangle)]
    pub annotation: AnnotationStyle,

    /// Frames a lost track is kept before its id is retired.
    #[arg(long, env = "DETECTION_APP_TRACK_BUFFER", default_value_t = 30)]
    pub track_buffer: usize,
}

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub session: SessionSettings,
    pub detector: OnnxDetectorFactory,
}

impl Args {
    pub fn into_config(self) -> Result<AppConfig, String> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "confidence must be between 0.0 and 1.0, got {}",
                self.confidence
            ));
        }
        Ok(AppConfig {
            session: SessionSettings {
                stream_url: stream_url(&self.stream_host, self.stream_port),
                tick_interval: Duration::from_millis(self.interval_ms),
                annotation: self.annotation,
                target_class: self.target_class,
            },
            detector: OnnxDetectorFactory {
                model_dir: self.model_dir,
                confidence: self.confidence,
                track_buffer: self.track_buffer,
            },
        })
    }
}
