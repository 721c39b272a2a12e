use crate::annotate::{Annotator, to_rgb_bitmap};
use crate::detection::{DetectError, Detection, ObjectDetector, retain_class};
use crate::surface::Surface;
use crate::video_reader::FrameReader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error("failed to draw frame: {0}")]
    Draw(#[from] opencv::Error),
}

/// What one tick produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A frame was annotated and rendered with these labels.
    Rendered { labels: Vec<String> },
    /// The source has no more frames, or reading failed.
    EndOfStream,
}

/// Turns one captured frame into one displayed bitmap.
pub struct FramePipeline {
    detector: Box<dyn ObjectDetector>,
    annotator: Annotator,
    target_class: usize,
}

impl FramePipeline {
    pub fn new(detector: Box<dyn ObjectDetector>, annotator: Annotator, target_class: usize) -> Self {
        Self {
            detector,
            annotator,
            target_class,
        }
    }

    pub fn run_tick(
        &mut self,
        reader: &mut dyn FrameReader,
        surface: &mut dyn Surface,
    ) -> Result<TickOutcome, PipelineError> {
        let frame = match reader.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(TickOutcome::EndOfStream),
            Err(e) => {
                log::warn!("Frame read failed: {}", e);
                return Ok(TickOutcome::EndOfStream);
            }
        };

        let detections = self.detector.detect(&frame)?;
        let detections = retain_class(detections, self.target_class);
        let labels = self.labels(&detections);

        let annotated = self.annotator.annotate(&frame, &detections, &labels)?;
        let bitmap = to_rgb_bitmap(&annotated)?;
        surface.render(bitmap);

        log::debug!("Rendered frame with {} detections", detections.len());
        Ok(TickOutcome::Rendered { labels })
    }

    fn labels(&self, detections: &[Detection]) -> Vec<String> {
        detections
            .iter()
            .map(|d| format!("#{} {}", d.tracker_id, self.detector.class_name(d.class_id)))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted collaborators shared by the pipeline and session tests.
    use super::*;
    use crate::command::Command;
    use crate::video_reader::VideoReaderError;
    use opencv::core::{self, Mat, Scalar};
    use std::collections::VecDeque;

    pub fn blank_frame() -> Mat {
        Mat::new_rows_cols_with_default(48, 64, core::CV_8UC3, Scalar::all(0.0))
            .expect("blank frame")
    }

    /// Yields `frames` blank frames, then end of stream, or a read error when
    /// `fail_after` is set.
    pub struct ScriptedReader {
        pub frames: usize,
        pub fail_after: bool,
    }

    impl FrameReader for ScriptedReader {
        fn read_frame(&mut self) -> Result<Option<Mat>, VideoReaderError> {
            if self.frames > 0 {
                self.frames -= 1;
                Ok(Some(blank_frame()))
            } else if self.fail_after {
                Err(VideoReaderError::OpenCV("stream disconnected".to_string()))
            } else {
                Ok(None)
            }
        }

        fn release(&mut self) {
            self.frames = 0;
        }
    }

    /// Returns the same detections for every frame.
    pub struct FixedDetector(pub Vec<Detection>);

    impl ObjectDetector for FixedDetector {
        fn detect(&mut self, _frame: &Mat) -> Result<Vec<Detection>, DetectError> {
            Ok(self.0.clone())
        }
    }

    pub struct FailingDetector;

    impl ObjectDetector for FailingDetector {
        fn detect(&mut self, _frame: &Mat) -> Result<Vec<Detection>, DetectError> {
            Err(DetectError::Inference("session crashed".to_string()))
        }
    }

    #[derive(Default)]
    pub struct RecordingSurface {
        pub rendered: Vec<image::RgbImage>,
        pub clears: usize,
        pub commands: VecDeque<Command>,
    }

    impl Surface for RecordingSurface {
        fn render(&mut self, bitmap: image::RgbImage) {
            self.rendered.push(bitmap);
        }

        fn clear(&mut self) {
            self.clears += 1;
        }

        fn next_command(&mut self) -> Option<Command> {
            self.commands.pop_front()
        }
    }

    pub fn detection(class_id: usize, tracker_id: u32) -> Detection {
        let offset = tracker_id as f64 * 12.0;
        Detection {
            bbox: [offset, 20.0, offset + 10.0, 40.0],
            class_id,
            tracker_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::annotate::AnnotationStyle;
    use crate::detection::PERSON_CLASS;

    fn pipeline(detector: Box<dyn ObjectDetector>) -> FramePipeline {
        FramePipeline::new(
            detector,
            Annotator::new(AnnotationStyle::Triangle),
            PERSON_CLASS,
        )
    }

    #[test]
    fn test_only_target_class_is_labelled() {
        let detector = FixedDetector(vec![detection(0, 1), detection(1, 2), detection(2, 3)]);
        let mut pipeline = pipeline(Box::new(detector));
        let mut reader = ScriptedReader {
            frames: 1,
            fail_after: false,
        };
        let mut surface = RecordingSurface::default();

        let outcome = pipeline.run_tick(&mut reader, &mut surface).expect("tick");
        assert_eq!(
            outcome,
            TickOutcome::Rendered {
                labels: vec!["#1 person".to_string()]
            }
        );
        assert_eq!(surface.rendered.len(), 1);
        assert_eq!(surface.rendered[0].dimensions(), (64, 48));
    }

    #[test]
    fn test_end_of_stream_renders_nothing() {
        let mut pipeline = pipeline(Box::new(FixedDetector(Vec::new())));
        let mut reader = ScriptedReader {
            frames: 0,
            fail_after: false,
        };
        let mut surface = RecordingSurface::default();

        let outcome = pipeline.run_tick(&mut reader, &mut surface).expect("tick");
        assert_eq!(outcome, TickOutcome::EndOfStream);
        assert!(surface.rendered.is_empty());
    }

    #[test]
    fn test_read_error_counts_as_end_of_stream() {
        let mut pipeline = pipeline(Box::new(FixedDetector(Vec::new())));
        let mut reader = ScriptedReader {
            frames: 0,
            fail_after: true,
        };
        let mut surface = RecordingSurface::default();

        let outcome = pipeline.run_tick(&mut reader, &mut surface).expect("tick");
        assert_eq!(outcome, TickOutcome::EndOfStream);
    }

    #[test]
    fn test_inference_error_propagates() {
        let mut pipeline = pipeline(Box::new(FailingDetector));
        let mut reader = ScriptedReader {
            frames: 1,
            fail_after: false,
        };
        let mut surface = RecordingSurface::default();

        let result = pipeline.run_tick(&mut reader, &mut surface);
        assert!(matches!(result, Err(PipelineError::Detect(_))));
        assert!(surface.rendered.is_empty());
    }
}
