use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::protocol::{Frame, ProgressFrame};

/// Status label before any job has reported.
pub const STATUS_IDLE: &str = "Idle";
/// Status used when a progress frame carries no label.
pub const STATUS_PROCESSING: &str = "Processing";
/// Status after a `complete` frame.
pub const STATUS_COMPLETE: &str = "Complete";
/// Status latched by an error-looking log line.
pub const STATUS_ERROR: &str = "Error";

/// Lifecycle of the progress socket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        }
    }
}

/// How a backend log line bears on the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

/// Classify a log line.
///
/// The backend has no structured failure frame, so job failure is inferred
/// from the text: any line containing `failed`, `error:` or `exception`
/// (case-insensitive) counts as an error. Swap this function for a
/// structured signal when the backend grows one.
pub fn classify_log(message: &str) -> LogLevel {
    let lower = message.to_lowercase();
    if lower.contains("failed") || lower.contains("error:") || lower.contains("exception") {
        LogLevel::Error
    } else {
        LogLevel::Info
    }
}

/// Most recent log lines, oldest evicted first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LogBuffer {
    /// An empty buffer holding at most `capacity` lines (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&str> {
        self.lines.back().map(String::as_str)
    }

    /// Lines in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Snapshot of a processing session as seen through the progress socket.
///
/// Snapshots are values: every inbound frame produces a new one via
/// [`apply`](Self::apply) and the old one is left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub connection: ConnectionStatus,
    pub logs: LogBuffer,
    /// Percentage, 0–100.
    pub progress: u8,
    pub status: String,
    /// Latched by an error log line; cleared by the next progress or
    /// complete frame, or by a reset.
    pub error: bool,
    pub current_frame: u64,
    pub total_frames: u64,
    /// Frames per second, advisory.
    pub speed: f64,
    pub execution_providers: String,
    pub output_path: Option<String>,
    pub is_complete: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(LogBuffer::default().capacity())
    }
}

fn clamp_percent(value: f64) -> u8 {
    if value.is_nan() {
        0
    } else {
        value.round().clamp(0.0, 100.0) as u8
    }
}

impl SessionState {
    /// Idle, disconnected state keeping at most `log_capacity` log lines.
    pub fn new(log_capacity: usize) -> Self {
        Self {
            connection: ConnectionStatus::Disconnected,
            logs: LogBuffer::new(log_capacity),
            progress: 0,
            status: STATUS_IDLE.to_string(),
            error: false,
            current_frame: 0,
            total_frames: 0,
            speed: 0.0,
            execution_providers: String::new(),
            output_path: None,
            is_complete: false,
        }
    }

    /// The state after `frame` has been received.
    pub fn apply(&self, frame: &Frame) -> SessionState {
        let mut next = self.clone();
        match frame {
            Frame::Log { message } if !message.is_empty() => {
                next.logs.push(message.as_str());
                if classify_log(message) == LogLevel::Error {
                    next.error = true;
                    next.status = STATUS_ERROR.to_string();
                }
            }
            Frame::Log { .. } => {}
            Frame::Progress(progress) => next.apply_progress(progress),
            Frame::Complete { output_path } => {
                next.is_complete = true;
                next.error = false;
                next.progress = 100;
                next.status = STATUS_COMPLETE.to_string();
                next.output_path = output_path.clone();
            }
            Frame::Pong => {}
        }
        next
    }

    fn apply_progress(&mut self, frame: &ProgressFrame) {
        self.progress = clamp_percent(frame.progress.unwrap_or(0.0));
        self.status = frame
            .status
            .clone()
            .unwrap_or_else(|| STATUS_PROCESSING.to_string());
        self.current_frame = frame.current_frame.unwrap_or(0);
        self.total_frames = frame.total_frames.unwrap_or(0);
        self.speed = frame.speed.filter(|s| s.is_finite()).unwrap_or(0.0).max(0.0);
        self.execution_providers = frame.execution_providers.clone().unwrap_or_default();
        self.is_complete = false;
        self.error = false;
    }

    /// The same state with a different connection indicator.
    pub fn with_connection(&self, connection: ConnectionStatus) -> SessionState {
        SessionState {
            connection,
            ..self.clone()
        }
    }

    /// Fresh idle state for a new run. The connection indicator is kept.
    pub fn reset(&self) -> SessionState {
        SessionState {
            connection: self.connection,
            ..SessionState::new(self.logs.capacity())
        }
    }

    /// A job is reporting progress and has neither finished nor failed.
    pub fn is_running(&self) -> bool {
        !self.is_complete && !self.error && self.status != STATUS_IDLE
    }
}
