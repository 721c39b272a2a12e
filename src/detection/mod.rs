pub mod tracker;
pub mod yolo;

use crate::model::ModelChoice;
use opencv::core::Mat;
use thiserror::Error;

/// COCO class names in model output order.
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack",
    "umbrella", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
    "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair",
    "couch", "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator",
    "book", "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Class id of "person" in the COCO ordering.
pub const PERSON_CLASS: usize = 0;

#[derive(Debug, Clone, Error)]
pub enum DetectError {
    #[error("failed to load model {path}: {reason}")]
    ModelLoad { path: String, reason: String },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("unexpected model output: {0}")]
    Output(String),
}

/// A tracked object in one frame, in original frame pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// `[x1, y1, x2, y2]`
    pub bbox: [f64; 4],
    pub class_id: usize,
    pub tracker_id: u32,
}

/// A loaded detection model together with its identity tracker.
pub trait ObjectDetector {
    /// Detects and tracks objects in a BGR frame.
    fn detect(&mut self, frame: &Mat) -> Result<Vec<Detection>, DetectError>;

    /// Human readable name for a class id.
    fn class_name(&self, class_id: usize) -> &str {
        COCO_CLASSES.get(class_id).copied().unwrap_or("unknown")
    }
}

/// Loads the detector for a model choice.
pub trait DetectorFactory {
    fn load(&self, choice: ModelChoice) -> Result<Box<dyn ObjectDetector>, DetectError>;
}

/// Keeps only detections of `class_id`, preserving order.
pub fn retain_class(detections: Vec<Detection>, class_id: usize) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| d.class_id == class_id)
        .collect()
}

pub(crate) fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}
