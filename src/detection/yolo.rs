//! YOLOv8 detector running an ONNX export through ONNX Runtime.
//!
//! Frames are letterboxed to the model's square input, decoded from the
//! `[1, 4 + classes, anchors]` output, reduced with per-class NMS and handed
//! to a [`ByteTracker`] so every reported object carries a tracking id.

use std::path::{Path, PathBuf};

use ndarray::Array4;
use opencv::{core::Mat, prelude::*};

use super::tracker::{ByteTracker, Candidate};
use super::{DetectError, Detection, DetectorFactory, ObjectDetector, bbox_iou};
use crate::model::ModelChoice;

/// Square input resolution of the exported YOLOv8 models.
pub const INPUT_SIZE: usize = 640;

/// Default minimum class score for a detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// IoU above which a lower scoring box of the same class is suppressed.
const NMS_IOU: f64 = 0.7;

/// Letterbox padding value, YOLO convention.
const PAD_VALUE: f32 = 114.0 / 255.0;

pub struct OnnxYoloDetector {
    session: ort::session::Session,
    tracker: ByteTracker,
    confidence: f64,
}

impl OnnxYoloDetector {
    pub fn new(model_path: &Path, confidence: f64, tracker: ByteTracker) -> Result<Self, DetectError> {
        let load_error = |reason: String| DetectError::ModelLoad {
            path: model_path.display().to_string(),
            reason,
        };
        let session = ort::session::Session::builder()
            .map_err(|e| load_error(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| load_error(e.to_string()))?;

        log::info!("Loaded detection model from {}", model_path.display());
        Ok(Self {
            session,
            tracker,
            confidence,
        })
    }

    fn infer(&mut self, input: Array4<f32>) -> Result<(Vec<usize>, Vec<f32>), DetectError> {
        let tensor = ort::value::Tensor::from_array(input)
            .map_err(|e| DetectError::Inference(e.to_string()))?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| DetectError::Inference(e.to_string()))?;
        if outputs.len() == 0 {
            return Err(DetectError::Output("model produced no outputs".to_string()));
        }
        let array = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| DetectError::Output(e.to_string()))?;
        Ok((array.shape().to_vec(), array.iter().copied().collect()))
    }
}

impl ObjectDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Mat) -> Result<Vec<Detection>, DetectError> {
        if frame.channels() != 3 {
            return Err(DetectError::Inference(format!(
                "expected a 3-channel BGR frame, got {} channels",
                frame.channels()
            )));
        }
        let width = frame.cols() as usize;
        let height = frame.rows() as usize;
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let owned;
        let frame = if frame.is_continuous() {
            frame
        } else {
            owned = frame
                .try_clone()
                .map_err(|e| DetectError::Inference(e.to_string()))?;
            &owned
        };
        let bgr = frame
            .data_bytes()
            .map_err(|e| DetectError::Inference(e.to_string()))?;

        let (input, geometry) = letterbox(bgr, width, height, INPUT_SIZE);
        let (shape, data) = self.infer(input)?;

        let mut raw = decode_output(&shape, &data, self.confidence)?;
        for det in &mut raw {
            det.bbox = geometry.to_frame(det.bbox, width as f64, height as f64);
        }
        let kept = nms(raw, NMS_IOU);

        let candidates: Vec<Candidate> = kept
            .iter()
            .map(|d| Candidate {
                bbox: d.bbox,
                score: d.score,
            })
            .collect();
        let detections = self
            .tracker
            .update(&candidates)
            .into_iter()
            .map(|track| {
                let det = &kept[track.candidate];
                Detection {
                    bbox: det.bbox,
                    class_id: det.class_id,
                    tracker_id: track.id,
                }
            })
            .collect::<Vec<_>>();

        log::trace!(
            "{} raw boxes after NMS, {} tracked",
            kept.len(),
            detections.len()
        );
        Ok(detections)
    }
}

/// Builds [`OnnxYoloDetector`]s from `<model_dir>/<weights id>.onnx`.
#[derive(Debug, Clone)]
pub struct OnnxDetectorFactory {
    pub model_dir: PathBuf,
    pub confidence: f64,
    pub track_buffer: usize,
}

impl DetectorFactory for OnnxDetectorFactory {
    fn load(&self, choice: ModelChoice) -> Result<Box<dyn ObjectDetector>, DetectError> {
        let path = choice.weights_path(&self.model_dir);
        if !path.is_file() {
            return Err(DetectError::ModelLoad {
                path: path.display().to_string(),
                reason: "weights file not found".to_string(),
            });
        }
        let tracker = ByteTracker::new(self.track_buffer, self.confidence);
        let detector = OnnxYoloDetector::new(&path, self.confidence, tracker)?;
        Ok(Box::new(detector))
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Scale and padding applied by [`letterbox`].
#[derive(Debug, Clone, Copy, PartialEq)]
struct LetterboxGeometry {
    scale: f64,
    pad_x: f64,
    pad_y: f64,
}

impl LetterboxGeometry {
    /// Maps a box from model input coordinates back onto the frame.
    fn to_frame(self, bbox: [f64; 4], width: f64, height: f64) -> [f64; 4] {
        let x = |v: f64| ((v - self.pad_x) / self.scale).clamp(0.0, width);
        let y = |v: f64| ((v - self.pad_y) / self.scale).clamp(0.0, height);
        [x(bbox[0]), y(bbox[1]), x(bbox[2]), y(bbox[3])]
    }
}

/// Resizes a packed BGR image into a padded `target` x `target` RGB NCHW tensor.
fn letterbox(
    bgr: &[u8],
    width: usize,
    height: usize,
    target: usize,
) -> (Array4<f32>, LetterboxGeometry) {
    let scale = (target as f64 / width as f64).min(target as f64 / height as f64);
    let new_w = ((width as f64 * scale).round() as usize).min(target);
    let new_h = ((height as f64 * scale).round() as usize).min(target);
    let pad_x = (target - new_w) / 2;
    let pad_y = (target - new_h) / 2;

    let mut tensor = Array4::<f32>::from_elem((1, 3, target, target), PAD_VALUE);
    for y in 0..new_h {
        let src_y = ((y as f64 / scale) as usize).min(height - 1);
        for x in 0..new_w {
            let src_x = ((x as f64 / scale) as usize).min(width - 1);
            let px = (src_y * width + src_x) * 3;
            for c in 0..3 {
                // BGR in, RGB out
                tensor[[0, c, pad_y + y, pad_x + x]] = bgr[px + 2 - c] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        LetterboxGeometry {
            scale,
            pad_x: pad_x as f64,
            pad_y: pad_y as f64,
        },
    )
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
struct RawDetection {
    bbox: [f64; 4],
    class_id: usize,
    score: f64,
}

/// Decodes a YOLOv8 output tensor. Accepts both `[1, features, anchors]` and
/// `[1, anchors, features]`, where `features = 4 + classes`.
fn decode_output(
    shape: &[usize],
    data: &[f32],
    confidence: f64,
) -> Result<Vec<RawDetection>, DetectError> {
    if shape.len() != 3 {
        return Err(DetectError::Output(format!("unexpected shape {shape:?}")));
    }
    let transposed = shape[1] < shape[2];
    let (anchors, features) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if features <= 4 || data.len() < anchors * features {
        return Err(DetectError::Output(format!(
            "shape {shape:?} does not hold box and class scores"
        )));
    }
    let value = |anchor: usize, feature: usize| -> f64 {
        let idx = if transposed {
            feature * anchors + anchor
        } else {
            anchor * features + feature
        };
        data[idx] as f64
    };

    let mut detections = Vec::new();
    for i in 0..anchors {
        let (class_id, score) = (4..features)
            .map(|f| (f - 4, value(i, f)))
            .fold((0, f64::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        if score < confidence {
            continue;
        }
        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        detections.push(RawDetection {
            bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
            class_id,
            score,
        });
    }
    Ok(detections)
}

/// Greedy per-class NMS, highest score first.
fn nms(mut dets: Vec<RawDetection>, iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<RawDetection> = Vec::new();
    for det in dets {
        let suppressed = keep
            .iter()
            .any(|k| k.class_id == det.class_id && bbox_iou(&k.bbox, &det.bbox) > iou_thresh);
        if !suppressed {
            keep.push(det);
        }
    }
    keep
}
