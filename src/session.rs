use crate::annotate::{AnnotationStyle, Annotator};
use crate::command::{Command, Event};
use crate::detection::{DetectError, DetectorFactory};
use crate::model::ModelChoice;
use crate::pipeline::{FramePipeline, PipelineError, TickOutcome};
use crate::scheduler::PeriodicTimer;
use crate::source::FrameSource;
use crate::surface::Surface;
use crate::video_reader::{CaptureOpener, FrameReader, VideoReaderError};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no video file or stream selected")]
    NoSourceSelected,
    #[error("failed to open source: {0}")]
    SourceOpen(#[from] VideoReaderError),
    #[error("failed to load model: {0}")]
    ModelLoad(#[from] DetectError),
    #[error("frame processing failed: {0}")]
    Pipeline(#[from] PipelineError),
}

// Enum to manage the detection run state.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    // Nothing is running.
    Idle,
    // Ticks are being processed.
    Running,
    // The source ran out of frames.
    Finished,
    // The last command or tick failed.
    Failed(String),
}

/// Fixed parameters of a session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub stream_url: String,
    pub tick_interval: Duration,
    pub annotation: AnnotationStyle,
    pub target_class: usize,
}

/// Owns the pending source, the capture handle and the detection pipeline,
/// and reacts to user commands and timer ticks.
pub struct Session {
    settings: SessionSettings,
    opener: Box<dyn CaptureOpener>,
    factory: Box<dyn DetectorFactory>,
    source: Option<FrameSource>,
    // Source of the active run; `source` may change while it plays.
    active: Option<FrameSource>,
    // Present exactly while a run is active.
    capture: Option<Box<dyn FrameReader>>,
    pipeline: Option<FramePipeline>,
    timer: PeriodicTimer,
    status: SessionStatus,
    frames_rendered: u64,
}

impl Session {
    pub fn new(
        settings: SessionSettings,
        opener: Box<dyn CaptureOpener>,
        factory: Box<dyn DetectorFactory>,
    ) -> Self {
        let timer = PeriodicTimer::new(settings.tick_interval);
        Self {
            settings,
            opener,
            factory,
            source: None,
            active: None,
            capture: None,
            pipeline: None,
            timer,
            status: SessionStatus::Idle,
            frames_rendered: 0,
        }
    }

    /// Dispatches one event. Failures are also recorded in [`Session::status`].
    pub fn handle(
        &mut self,
        event: Event,
        surface: &mut dyn Surface,
        now: Instant,
    ) -> Result<(), SessionError> {
        let result = match event {
            Event::Command(Command::SelectSource(path)) => {
                self.select_source(path);
                Ok(())
            }
            Event::Command(Command::SelectStream) => {
                self.select_stream();
                Ok(())
            }
            Event::Command(Command::Start(choice)) => self.start(choice, now),
            Event::Command(Command::Stop) => {
                self.stop(surface);
                Ok(())
            }
            Event::Tick => self.tick(surface),
        };
        if let Err(e) = &result {
            self.status = SessionStatus::Failed(e.to_string());
        }
        result
    }

    pub fn select_source(&mut self, path: PathBuf) {
        log::info!("Selected video file {}", path.display());
        self.source = Some(FrameSource::File(path));
    }

    pub fn select_stream(&mut self) {
        log::info!("Selected stream {}", self.settings.stream_url);
        self.source = Some(FrameSource::Stream(self.settings.stream_url.clone()));
    }

    /// Loads the model, opens the pending source and arms the tick timer.
    /// A run that is already active is ended first.
    pub fn start(&mut self, choice: ModelChoice, now: Instant) -> Result<(), SessionError> {
        let source = self.source.clone().ok_or(SessionError::NoSourceSelected)?;
        self.end_run();

        let detector = self.factory.load(choice)?;
        let capture = self.opener.open(&source)?;

        self.pipeline = Some(FramePipeline::new(
            detector,
            Annotator::new(self.settings.annotation),
            self.settings.target_class,
        ));
        self.capture = Some(capture);
        self.active = Some(source.clone());
        self.timer.arm(now);
        self.status = SessionStatus::Running;
        self.frames_rendered = 0;
        log::info!(
            "Started {} on {} every {:?}",
            choice,
            source,
            self.timer.interval()
        );
        Ok(())
    }

    /// Ends the run and clears the display. Safe to call in any state.
    pub fn stop(&mut self, surface: &mut dyn Surface) {
        if self.capture.is_some() {
            log::info!("Stopped after {} frames", self.frames_rendered);
        }
        self.end_run();
        surface.clear();
        self.status = SessionStatus::Idle;
    }

    /// Runs the pipeline once if a run is active.
    pub fn tick(&mut self, surface: &mut dyn Surface) -> Result<(), SessionError> {
        let (Some(capture), Some(pipeline)) = (self.capture.as_mut(), self.pipeline.as_mut())
        else {
            return Ok(());
        };

        match pipeline.run_tick(capture.as_mut(), surface) {
            Ok(TickOutcome::Rendered { labels }) => {
                self.frames_rendered += 1;
                log::trace!("Frame {}: {:?}", self.frames_rendered, labels);
                Ok(())
            }
            Ok(TickOutcome::EndOfStream) => {
                log::info!("End of stream after {} frames", self.frames_rendered);
                self.end_run();
                self.status = SessionStatus::Finished;
                Ok(())
            }
            Err(e) => {
                self.end_run();
                Err(e.into())
            }
        }
    }

    fn end_run(&mut self) {
        self.timer.disarm();
        if let Some(mut capture) = self.capture.take() {
            capture.release();
        }
        self.pipeline = None;
        self.active = None;
    }

    pub fn source(&self) -> Option<&FrameSource> {
        self.source.as_ref()
    }

    /// The source being played, while a run is active.
    pub fn active_source(&self) -> Option<&FrameSource> {
        self.active.as_ref()
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn is_running(&self) -> bool {
        self.capture.is_some()
    }

    pub fn timer(&self) -> &PeriodicTimer {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut PeriodicTimer {
        &mut self.timer
    }
}
