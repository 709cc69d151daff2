use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::Result;
use crate::selection::{PreviewKey, Selection};
use crate::types::{FaceDetection, PreviewFrame, UploadResponse, VideoInfo};
use crate::Backend;

/// A rendered preview and the inputs it was rendered from.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewImage {
    pub image: Vec<u8>,
    pub frame: u32,
    pub face_index: usize,
    pub has_face_swap: bool,
}

/// What the preview pane should show.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviewState {
    /// Inputs of the latest submitted selection, or `None` while it is not
    /// eligible for a preview.
    pub key: Option<PreviewKey>,
    /// Latest preview matching `key`, if any.
    pub image: Option<PreviewImage>,
    /// A request is scheduled or in flight.
    pub pending: bool,
    /// Requests sent to the backend so far.
    pub requests_issued: u64,
    /// Responses dropped because the selection had moved on.
    pub stale_discarded: u64,
}

enum Command {
    Submit(Option<PreviewKey>),
    Reset,
    Shutdown,
}

type Completion = (PreviewKey, Result<PreviewFrame>);

struct Actor<B> {
    backend: Arc<B>,
    debounce: Duration,
    live: Option<PreviewKey>,
    deadline: Option<Instant>,
    in_flight: usize,
    state: Arc<watch::Sender<PreviewState>>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl<B: Backend> Actor<B> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        loop {
            let deadline = self.deadline;
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Submit(key)) => self.on_selection(key),
                    Some(Command::Reset) => self.on_reset(),
                    Some(Command::Shutdown) | None => break,
                },
                Some((key, result)) = completions.recv() => self.on_completion(key, result),
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.issue();
                }
            }
        }
        tracing::debug!("preview orchestrator stopped");
    }

    fn publish(&self, update: impl FnOnce(&mut PreviewState)) {
        let pending = self.deadline.is_some() || self.in_flight > 0;
        self.state.send_modify(|state| {
            update(state);
            state.pending = pending;
        });
    }

    fn on_selection(&mut self, key: Option<PreviewKey>) {
        match key {
            None => {
                self.live = None;
                self.deadline = None;
                self.publish(|_| {});
            }
            Some(key) if self.live.as_ref() == Some(&key) => {}
            Some(key) => {
                self.live = Some(key);
                self.deadline = Some(Instant::now() + self.debounce);
                self.publish(|_| {});
            }
        }
    }

    fn on_reset(&mut self) {
        self.live = None;
        self.deadline = None;
        self.publish(|_| {});
    }

    fn issue(&mut self) {
        self.deadline = None;
        let Some(key) = self.live.clone() else {
            return;
        };

        tracing::debug!(frame = key.frame, face = key.face_index, "requesting preview");
        self.in_flight += 1;
        self.publish(|state| state.requests_issued += 1);

        let backend = Arc::clone(&self.backend);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = backend.preview_frame(key.frame, key.face_index).await;
            let _ = completions.send((key, result));
        });
    }

    // Staleness is checked against the published key, which submit()
    // updates before the command reaches this task.
    fn on_completion(&mut self, key: PreviewKey, result: Result<PreviewFrame>) {
        self.in_flight = self.in_flight.saturating_sub(1);

        self.publish(|state| {
            if state.key.as_ref() != Some(&key) {
                tracing::debug!(frame = key.frame, face = key.face_index, "discarding stale preview");
                state.stale_discarded += 1;
                return;
            }
            state.image = match result {
                Ok(frame) => Some(PreviewImage {
                    image: frame.image,
                    frame: key.frame,
                    face_index: key.face_index,
                    has_face_swap: frame.has_face_swap,
                }),
                Err(e) => {
                    tracing::warn!(error = %e, frame = key.frame, face = key.face_index, "preview request failed");
                    None
                }
            };
        });
    }
}

/// Turns a stream of [`Selection`] snapshots into at most one preview
/// request per quiet period, and shows only responses that still match
/// the latest snapshot.
///
/// Scheduling runs on a single background task, in the order commands and
/// responses arrive. [`submit`](Self::submit) and [`reset`](Self::reset)
/// publish the new key themselves, so an ineligible selection never shows an
/// old image. In-flight requests are never cancelled; their responses are
/// checked against the published key on arrival and dropped if stale.
pub struct PreviewOrchestrator {
    commands: mpsc::UnboundedSender<Command>,
    state: Arc<watch::Sender<PreviewState>>,
    task: Option<JoinHandle<()>>,
}

impl PreviewOrchestrator {
    /// Start the orchestrator task. Must be called from within a tokio
    /// runtime.
    pub fn spawn<B: Backend>(backend: Arc<B>, debounce: Duration) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (completions, completion_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(PreviewState::default());
        let state = Arc::new(state);

        let actor = Actor {
            backend,
            debounce,
            live: None,
            deadline: None,
            in_flight: 0,
            state: Arc::clone(&state),
            completions,
        };
        let task = tokio::spawn(actor.run(command_rx, completion_rx));

        Self {
            commands,
            state,
            task: Some(task),
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("preview orchestrator already stopped");
        }
    }

    /// Hand over the latest selection.
    ///
    /// A changed frame, face or upload restarts the quiet period. A
    /// selection without both uploads and detected faces clears the preview
    /// before this returns.
    pub fn submit(&self, selection: &Selection) {
        let key = selection.preview_key();
        self.state.send_if_modified(|state| {
            if state.key == key {
                return false;
            }
            if key.is_none() {
                state.image = None;
            }
            state.key = key.clone();
            true
        });
        self.send(Command::Submit(key));
    }

    /// Clear the preview and cancel any scheduled request.
    pub fn reset(&self) {
        self.state.send_modify(|state| {
            state.key = None;
            state.image = None;
        });
        self.send(Command::Reset);
    }

    /// Current snapshot.
    pub fn state(&self) -> PreviewState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every preview state change.
    pub fn subscribe(&self) -> watch::Receiver<PreviewState> {
        self.state.subscribe()
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "preview orchestrator ended abnormally");
            }
        }
    }
}

impl Drop for PreviewOrchestrator {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Results of the once-per-upload analysis of a new target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetAnalysis {
    /// Faces found in frame 0, or `None` if detection failed.
    pub detection: Option<FaceDetection>,
    /// Video metadata, or `None` for images or if the call failed.
    pub video: Option<VideoInfo>,
}

impl TargetAnalysis {
    /// Install the results into `selection` if `target_id` is still the
    /// current target. Failed parts leave their derived state empty.
    pub fn apply(self, selection: &mut Selection, target_id: &str) -> bool {
        if selection.target().map(|t| t.file_id.as_str()) != Some(target_id) {
            return false;
        }
        if let Some(detection) = self.detection {
            selection.apply_detection(target_id, detection);
        }
        if let Some(info) = self.video {
            selection.apply_video_info(target_id, info);
        }
        true
    }
}

/// Detect faces in frame 0 of a freshly uploaded target and, for videos,
/// fetch its metadata. Both calls run concurrently and fail independently.
pub async fn analyze_target<B: Backend>(backend: &B, target: &UploadResponse) -> TargetAnalysis {
    let detect = async {
        match backend.detect_faces(0).await {
            Ok(detection) => {
                tracing::debug!(faces = detection.faces.len(), "detected faces in target");
                Some(detection)
            }
            Err(e) => {
                tracing::warn!(error = %e, target = %target.filename, "face detection failed");
                None
            }
        }
    };

    let info = async {
        if !target.is_video {
            return None;
        }
        match backend.video_info().await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(error = %e, target = %target.filename, "video info request failed");
                None
            }
        }
    };

    let (detection, video) = tokio::join!(detect, info);
    TargetAnalysis { detection, video }
}
