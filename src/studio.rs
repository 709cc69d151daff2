use std::path::Path;
use std::sync::Arc;

use crate::client::{read_upload, FaceFusionClient};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::preview::{analyze_target, PreviewOrchestrator};
use crate::selection::Selection;
use crate::socket::{Connector, SessionSocket, WsConnector};
use crate::types::{ProcessRequest, ProcessResponse, UploadKind};
use crate::Backend;

/// One dashboard's worth of state: uploads and choices, the live session
/// socket, and the preview pipeline.
///
/// `Studio` is the only writer of its [`Selection`]; every change is handed
/// to the [`PreviewOrchestrator`] as a snapshot. The [`SessionSocket`] owns
/// the job progress state on its own. Create one per window and drop or
/// [`close`](Self::close) it to release the connection.
pub struct Studio<B: Backend = FaceFusionClient, C: Connector = WsConnector> {
    backend: Arc<B>,
    socket: SessionSocket<C>,
    preview: PreviewOrchestrator,
    selection: Selection,
    processing: bool,
}

impl Studio<FaceFusionClient, WsConnector> {
    /// Connect to the backend named in `config` over HTTP and WebSocket.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let backend = FaceFusionClient::from_config(&config);
        Self::with_parts(&config, backend, WsConnector)
    }
}

impl<B: Backend, C: Connector> Studio<B, C> {
    /// Build from explicit parts and start the session socket.
    pub fn with_parts(config: &SessionConfig, backend: B, connector: C) -> Result<Self> {
        let backend = Arc::new(backend);
        let socket = SessionSocket::with_connector(config, connector);
        socket.connect()?;
        let preview = PreviewOrchestrator::spawn(Arc::clone(&backend), config.preview_debounce);
        Ok(Self {
            backend,
            socket,
            preview,
            selection: Selection::new(),
            processing: false,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn session(&self) -> &SessionSocket<C> {
        &self.socket
    }

    pub fn preview(&self) -> &PreviewOrchestrator {
        &self.preview
    }

    fn sync_preview(&self) {
        self.preview.submit(&self.selection);
    }

    /// Upload the face to swap in. On failure the previous source stays.
    pub async fn upload_source(&mut self, filename: impl Into<String>, bytes: Vec<u8>) -> Result<()> {
        let upload = self
            .backend
            .upload(UploadKind::Source, filename.into(), bytes)
            .await?;
        tracing::info!(file = %upload.filename, "source uploaded");
        self.selection.set_source(upload);
        self.sync_preview();
        Ok(())
    }

    /// Upload a new target, then detect its faces and, for videos, fetch
    /// its metadata.
    ///
    /// Everything derived from the previous target is dropped as soon as
    /// the upload succeeds. A failed detection or metadata call leaves the
    /// corresponding state empty without failing the upload.
    pub async fn upload_target(&mut self, filename: impl Into<String>, bytes: Vec<u8>) -> Result<()> {
        let upload = self
            .backend
            .upload(UploadKind::Target, filename.into(), bytes)
            .await?;
        tracing::info!(file = %upload.filename, video = upload.is_video, "target uploaded");

        let target_id = upload.file_id.clone();
        self.selection.set_target(upload.clone());
        self.sync_preview();

        let analysis = analyze_target(self.backend.as_ref(), &upload).await;
        analysis.apply(&mut self.selection, &target_id);
        self.sync_preview();
        Ok(())
    }

    /// Read a local file and upload it as the source.
    pub async fn upload_source_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let (filename, bytes) = read_upload(path.as_ref()).await?;
        self.upload_source(filename, bytes).await
    }

    /// Read a local file and upload it as the target.
    pub async fn upload_target_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let (filename, bytes) = read_upload(path.as_ref()).await?;
        self.upload_target(filename, bytes).await
    }

    pub fn clear_source(&mut self) {
        self.selection.clear_source();
        self.sync_preview();
    }

    /// Drop the target together with its faces, frame position and trim.
    pub fn clear_target(&mut self) {
        self.selection.clear_target();
        self.sync_preview();
    }

    /// Choose the reference face. Returns `false` if out of range.
    pub fn select_face(&mut self, position: usize) -> bool {
        let accepted = self.selection.select_face(position);
        if accepted {
            self.sync_preview();
        }
        accepted
    }

    /// Move the preview to another frame. Returns `false` if out of range.
    pub fn set_frame(&mut self, frame: u32) -> bool {
        let accepted = self.selection.set_frame(frame);
        if accepted {
            self.sync_preview();
        }
        accepted
    }

    pub fn set_trim_start(&mut self, start: u32) -> bool {
        self.selection.set_trim_start(start)
    }

    pub fn set_trim_end(&mut self, end: u32) -> bool {
        self.selection.set_trim_end(end)
    }

    /// Start a render of the current uploads.
    ///
    /// The session state is reset for the new run. The selection is still
    /// valid, so the preview is left as it is. For video targets the trim
    /// range is sent unless the request already carries one.
    pub async fn start_processing(&mut self, request: ProcessRequest) -> Result<ProcessResponse> {
        if self.selection.source().is_none() {
            return Err(SessionError::MissingUpload("source"));
        }
        if self.selection.target().is_none() {
            return Err(SessionError::MissingUpload("target"));
        }

        let mut request = request;
        if let Some(trim) = self.selection.trim() {
            if request.trim_frame_start.is_none() && request.trim_frame_end.is_none() {
                request = request.trim(trim.start(), trim.end());
            }
        }

        self.socket.reset();
        self.processing = true;

        match self.backend.start_process(&request).await {
            Ok(response) => {
                tracing::info!(status = %response.status, output = ?response.output_path, "processing started");
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to start processing");
                self.processing = false;
                Err(e)
            }
        }
    }

    /// A started run has not yet completed or failed.
    pub fn is_processing(&self) -> bool {
        if !self.processing {
            return false;
        }
        let state = self.socket.state();
        !state.is_complete && !state.error
    }

    /// Forget uploads, preview and job state. The socket stays connected.
    pub fn reset(&mut self) {
        self.selection.clear();
        self.preview.reset();
        self.socket.reset();
        self.processing = false;
    }

    /// Close the socket and stop the preview task.
    pub async fn close(self) {
        let Studio { socket, preview, .. } = self;
        socket.close().await;
        preview.shutdown().await;
    }
}
