use base64::Engine;
use reqwest::{multipart, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;

use crate::config::{normalize, SessionConfig};
use crate::error::{Result, SessionError};
use crate::types::*;

/// Decode a base64 image, tolerating a `data:<mime>;base64,` prefix.
pub(crate) fn decode_image(data: &str) -> Result<Vec<u8>> {
    let payload = match data.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, b64)| b64).unwrap_or(rest),
        None => data,
    };
    Ok(base64::engine::general_purpose::STANDARD.decode(payload.trim())?)
}

/// Last path component of an output path, splitting on `/` and `\`.
fn output_filename(output_path: &str) -> &str {
    output_path
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("output")
}

/// Async client for the face-swap backend's REST API.
///
/// Covers uploads, face detection, preview rendering, video metadata,
/// job start and output download.
///
/// # Example
/// ```no_run
/// use faceswap_session::FaceFusionClient;
///
/// # async fn example() -> faceswap_session::Result<()> {
/// let client = FaceFusionClient::new("http://127.0.0.1:8000");
/// let target = client.upload_target_file("clip.mp4").await?;
/// if target.is_video {
///     let info = client.video_info().await?;
///     println!("{} frames at {} fps", info.frame_count, info.fps);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FaceFusionClient {
    http: Client,
    endpoint: String,
    request_timeout: Duration,
    upload_timeout: Duration,
}

impl FaceFusionClient {
    /// Create a new client pointing at the given backend endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let defaults = SessionConfig::default();
        Self {
            http: Client::new(),
            endpoint: normalize(endpoint.into()),
            request_timeout: defaults.request_timeout,
            upload_timeout: defaults.upload_timeout,
        }
    }

    /// Create a client using the endpoint and timeouts of a session config.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            http: Client::new(),
            endpoint: normalize(config.endpoint.clone()),
            request_timeout: config.request_timeout,
            upload_timeout: config.upload_timeout,
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Returns the configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let resp = request.send().await.map_err(|e| SessionError::Network {
            context: format!(
                "Cannot reach backend at {} for {} \u{2014} is the service running?",
                self.endpoint, what
            ),
            source: e,
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(SessionError::Http { status, body });
        }

        resp.json().await.map_err(|e| SessionError::Network {
            context: format!("Failed to parse {} response", what),
            source: e,
        })
    }

    // ── Health ──────────────────────────────────────────────────────

    /// Check whether the backend answers `/health` with `ok`.
    pub async fn health(&self) -> Result<bool> {
        let url = format!("{}/health", self.endpoint);
        let resp: HealthResponse = self
            .send(self.http.get(&url).timeout(Duration::from_secs(5)), "health")
            .await?;
        Ok(resp.status == "ok")
    }

    /// Fetch the backend's current source/target/output configuration.
    pub async fn state(&self) -> Result<BackendState> {
        let url = format!("{}/state", self.endpoint);
        self.send(self.http.get(&url).timeout(self.request_timeout), "state")
            .await
    }

    // ── Uploads ─────────────────────────────────────────────────────

    /// Upload the face to swap in. Returns the backend's file record.
    pub async fn upload_source(
        &self,
        filename: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse> {
        self.upload(UploadKind::Source, filename.into(), bytes).await
    }

    /// Upload the image or video to swap faces in.
    pub async fn upload_target(
        &self,
        filename: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse> {
        self.upload(UploadKind::Target, filename.into(), bytes).await
    }

    /// Read a local file and upload it as the source.
    pub async fn upload_source_file(&self, path: impl AsRef<Path>) -> Result<UploadResponse> {
        let (filename, bytes) = read_upload(path.as_ref()).await?;
        self.upload(UploadKind::Source, filename, bytes).await
    }

    /// Read a local file and upload it as the target.
    pub async fn upload_target_file(&self, path: impl AsRef<Path>) -> Result<UploadResponse> {
        let (filename, bytes) = read_upload(path.as_ref()).await?;
        self.upload(UploadKind::Target, filename, bytes).await
    }

    /// Upload into the given slot.
    pub async fn upload(
        &self,
        kind: UploadKind,
        filename: String,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse> {
        let url = format!("{}/upload/{}", self.endpoint, kind.as_str());
        tracing::debug!(kind = kind.as_str(), filename = %filename, size = bytes.len(), "uploading file");
        let form = multipart::Form::new().part("file", multipart::Part::bytes(bytes).file_name(filename));
        self.send(
            self.http.post(&url).timeout(self.upload_timeout).multipart(form),
            &format!("{} upload", kind.as_str()),
        )
        .await
    }

    // ── Analysis ────────────────────────────────────────────────────

    /// Detect faces in the given frame of the current target.
    pub async fn detect_faces(&self, frame_number: u32) -> Result<FaceDetection> {
        let url = format!("{}/detect-faces", self.endpoint);
        let body = serde_json::json!({ "frame_number": frame_number });
        let raw: RawFaceDetection = self
            .send(
                self.http.post(&url).timeout(self.request_timeout).json(&body),
                "face detection",
            )
            .await?;

        let mut faces = Vec::with_capacity(raw.faces.len());
        for face in raw.faces {
            let bounding_box: [f32; 4] = face.bounding_box.as_slice().try_into().map_err(|_| {
                SessionError::InvalidResponse(format!(
                    "Face {} has a {}-value bounding box, expected 4",
                    face.index,
                    face.bounding_box.len()
                ))
            })?;
            faces.push(DetectedFace {
                index: face.index,
                bounding_box,
                thumbnail: decode_image(&face.image_base64)?,
            });
        }

        let total_faces = raw.total_faces.max(faces.len());
        Ok(FaceDetection {
            faces,
            frame_number: raw.frame_number,
            total_faces,
        })
    }

    /// Render a face-swapped preview of one frame using the given
    /// reference face.
    pub async fn preview_frame(
        &self,
        frame_number: u32,
        reference_face_position: usize,
    ) -> Result<PreviewFrame> {
        let url = format!("{}/preview-frame", self.endpoint);
        let body = serde_json::json!({
            "frame_number": frame_number,
            "reference_face_position": reference_face_position,
        });
        let raw: RawPreviewFrame = self
            .send(
                self.http.post(&url).timeout(self.request_timeout).json(&body),
                "preview",
            )
            .await?;
        Ok(PreviewFrame {
            image: decode_image(&raw.image_base64)?,
            frame_number: raw.frame_number,
            has_face_swap: raw.has_face_swap,
        })
    }

    /// Frame count, rate and dimensions of the current video target.
    pub async fn video_info(&self) -> Result<VideoInfo> {
        let url = format!("{}/video-info", self.endpoint);
        self.send(self.http.get(&url).timeout(self.request_timeout), "video info")
            .await
    }

    // ── Processing ──────────────────────────────────────────────────

    /// Start a render. Progress arrives over the session socket.
    pub async fn start_process(&self, request: &ProcessRequest) -> Result<ProcessResponse> {
        let url = format!("{}/process/start", self.endpoint);
        self.send(
            self.http.post(&url).timeout(self.request_timeout).json(request),
            "process start",
        )
        .await
    }

    /// URL at which a finished output can be downloaded or streamed.
    pub fn output_url(&self, output_path: &str) -> String {
        format!("{}/output/{}", self.endpoint, output_filename(output_path))
    }

    /// Download a finished output. Returns raw media bytes.
    pub async fn output(&self, output_path: &str) -> Result<Vec<u8>> {
        let url = self.output_url(output_path);
        let resp = self
            .http
            .get(&url)
            .timeout(self.upload_timeout)
            .send()
            .await
            .map_err(|e| SessionError::Network {
                context: format!("Failed to fetch output {}", output_filename(output_path)),
                source: e,
            })?;

        if !resp.status().is_success() {
            return Err(SessionError::Http {
                status: resp.status().as_u16(),
                body: format!("Failed to fetch output {}", output_filename(output_path)),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| SessionError::Network {
            context: "Failed to read output bytes".into(),
            source: e,
        })?;
        Ok(bytes.to_vec())
    }
}

pub(crate) async fn read_upload(path: &Path) -> Result<(String, Vec<u8>)> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    let bytes = tokio::fs::read(path).await?;
    Ok((filename, bytes))
}
