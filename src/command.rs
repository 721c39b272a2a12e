use crate::model::ModelChoice;
use std::path::PathBuf;

/// Enum representing the user commands accepted by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SelectSource(PathBuf),
    SelectStream,
    Start(ModelChoice),
    Stop,
}

/// Everything the run loop can dispatch to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Command(Command),
    Tick,
}

