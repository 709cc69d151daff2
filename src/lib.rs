//! # faceswap-session
//!
//! Async Rust session client for a face-swap rendering backend.
//!
//! Two cooperating pieces sit on top of a typed REST client:
//!
//! - **[`SessionSocket`]** keeps one WebSocket to the backend alive,
//!   reconnecting on a fixed delay forever, and folds `log` / `progress` /
//!   `complete` frames into an immutable [`SessionState`] snapshot.
//! - **[`PreviewOrchestrator`]** debounces changes to the chosen frame and
//!   reference face, issues one preview request per quiet period, and only
//!   ever shows the response that matches the live [`Selection`].
//!
//! [`Studio`] wires both to a [`FaceFusionClient`] the way the web
//! dashboard does: upload, detect faces, scrub, trim, start, watch.
//!
//! ## Quick Start
//!
//! ```no_run
//! use faceswap_session::{SessionConfig, Studio};
//!
//! # async fn example() -> faceswap_session::Result<()> {
//! let mut studio = Studio::new(SessionConfig::default())?;
//!
//! studio.upload_source_file("face.jpg").await?;
//! studio.upload_target_file("clip.mp4").await?;
//! studio.set_frame(120);
//! studio.set_trim_start(100);
//!
//! studio.start_processing(Default::default()).await?;
//! let mut session = studio.session().subscribe();
//! while session.changed().await.is_ok() {
//!     let state = session.borrow_and_update().clone();
//!     println!("{}% {}", state.progress, state.status);
//!     if state.is_complete || state.error {
//!         break;
//!     }
//! }
//! studio.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod preview;
pub mod protocol;
pub mod selection;
pub mod socket;
pub mod state;
pub mod studio;
pub mod types;

pub use client::FaceFusionClient;
pub use config::{SessionConfig, SessionConfigBuilder};
pub use error::{Result, SessionError};
pub use preview::{analyze_target, PreviewImage, PreviewOrchestrator, PreviewState, TargetAnalysis};
pub use protocol::{parse_frame, Frame, ProgressFrame};
pub use selection::{format_timecode, PreviewKey, Selection, TrimRange};
pub use socket::{Connector, InboundStream, Message, SessionEvent, SessionSocket, WsConnector};
pub use state::{classify_log, ConnectionStatus, LogBuffer, LogLevel, SessionState};
pub use studio::Studio;
pub use types::{
    BackendState, DetectedFace, FaceDetection, PreviewFrame, ProcessRequest, ProcessResponse,
    UploadKind, UploadResponse, VideoInfo,
};

use std::future::Future;

/// The backend calls the session pipeline depends on.
///
/// [`FaceFusionClient`] is the HTTP implementation. Implement it yourself to
/// drive a [`Studio`] or [`PreviewOrchestrator`] against another transport
/// or a fake.
///
/// # Example
///
/// ```ignore
/// struct Canned;
///
/// impl Backend for Canned {
///     async fn upload(&self, kind: UploadKind, filename: String, bytes: Vec<u8>) -> Result<UploadResponse> { ... }
///     async fn detect_faces(&self, frame_number: u32) -> Result<FaceDetection> { ... }
///     async fn video_info(&self) -> Result<VideoInfo> { ... }
///     async fn preview_frame(&self, frame: u32, face: usize) -> Result<PreviewFrame> { ... }
///     async fn start_process(&self, request: &ProcessRequest) -> Result<ProcessResponse> { ... }
/// }
/// ```
pub trait Backend: Send + Sync + 'static {
    /// Store a source or target file on the backend.
    fn upload(
        &self,
        kind: UploadKind,
        filename: String,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<UploadResponse>> + Send;

    /// Detect faces in one frame of the current target.
    fn detect_faces(&self, frame_number: u32) -> impl Future<Output = Result<FaceDetection>> + Send;

    /// Metadata of the current video target.
    fn video_info(&self) -> impl Future<Output = Result<VideoInfo>> + Send;

    /// Render one frame with the face at `reference_face_position` swapped.
    fn preview_frame(
        &self,
        frame_number: u32,
        reference_face_position: usize,
    ) -> impl Future<Output = Result<PreviewFrame>> + Send;

    /// Start a render run.
    fn start_process(
        &self,
        request: &ProcessRequest,
    ) -> impl Future<Output = Result<ProcessResponse>> + Send;
}

impl Backend for FaceFusionClient {
    fn upload(
        &self,
        kind: UploadKind,
        filename: String,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<UploadResponse>> + Send {
        FaceFusionClient::upload(self, kind, filename, bytes)
    }

    fn detect_faces(&self, frame_number: u32) -> impl Future<Output = Result<FaceDetection>> + Send {
        FaceFusionClient::detect_faces(self, frame_number)
    }

    fn video_info(&self) -> impl Future<Output = Result<VideoInfo>> + Send {
        FaceFusionClient::video_info(self)
    }

    fn preview_frame(
        &self,
        frame_number: u32,
        reference_face_position: usize,
    ) -> impl Future<Output = Result<PreviewFrame>> + Send {
        FaceFusionClient::preview_frame(self, frame_number, reference_face_position)
    }

    fn start_process(
        &self,
        request: &ProcessRequest,
    ) -> impl Future<Output = Result<ProcessResponse>> + Send {
        FaceFusionClient::start_process(self, request)
    }
}
