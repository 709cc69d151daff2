use serde::{Deserialize, Serialize};

/// Which slot an upload fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    /// The face to swap in.
    Source,
    /// The image or video to swap faces in.
    Target,
}

impl UploadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Source => "source",
            UploadKind::Target => "target",
        }
    }
}

/// Response to `POST /upload/source` and `POST /upload/target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_id: String,
    pub filename: String,
    pub path: String,
    pub is_image: bool,
    pub is_video: bool,
}

/// Face as sent by `/detect-faces`, thumbnail still base64-encoded.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawDetectedFace {
    pub index: usize,
    pub bounding_box: Vec<f32>,
    pub image_base64: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawFaceDetection {
    pub faces: Vec<RawDetectedFace>,
    pub frame_number: u32,
    #[serde(default)]
    pub total_faces: usize,
}

/// A face found in the target, with its decoded crop.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub index: usize,
    /// `[x1, y1, x2, y2]` in target pixels.
    pub bounding_box: [f32; 4],
    /// Encoded image bytes of the cropped face.
    pub thumbnail: Vec<u8>,
}

/// Decoded `/detect-faces` response.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceDetection {
    pub faces: Vec<DetectedFace>,
    pub frame_number: u32,
    pub total_faces: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawPreviewFrame {
    pub image_base64: String,
    pub frame_number: u32,
    #[serde(default)]
    pub has_face_swap: bool,
}

/// Decoded `/preview-frame` response.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewFrame {
    pub image: Vec<u8>,
    pub frame_number: u32,
    pub has_face_swap: bool,
}

/// Response to `GET /video-info`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub frame_count: u32,
    pub fps: f64,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

/// Body of `POST /process/start`. Unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim_frame_start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim_frame_end: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modal: Option<bool>,
}

impl ProcessRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the result to this path instead of a backend-generated one.
    pub fn output_path(mut self, path: impl Into<String>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Select the processors to run, e.g. `face_swapper`, `face_enhancer`.
    pub fn processors<I, S>(mut self, processors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.processors = Some(processors.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict a video run to `[start, end)`.
    pub fn trim(mut self, start: u32, end: u32) -> Self {
        self.trim_frame_start = Some(start);
        self.trim_frame_end = Some(end);
        self
    }

    /// Run on the remote worker pool.
    pub fn modal(mut self, modal: bool) -> Self {
        self.modal = Some(modal);
        self
    }
}

/// Response to `POST /process/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub status: String,
    pub output_path: Option<String>,
}

/// Response to `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Response to `GET /state`: what the backend currently has configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendState {
    #[serde(default)]
    pub source_paths: Vec<String>,
    pub target_path: Option<String>,
    pub output_path: Option<String>,
    #[serde(default)]
    pub processors: Vec<String>,
    #[serde(default)]
    pub modal: bool,
}
