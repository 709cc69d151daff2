#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use faceswap_session::*;
use tokio::sync::mpsc;
use tokio::time::Instant;

pub const DEFAULT_LATENCY: Duration = Duration::from_millis(50);

pub fn upload(id: &str, is_video: bool) -> UploadResponse {
    UploadResponse {
        file_id: id.into(),
        filename: format!("{}.{}", id, if is_video { "mp4" } else { "jpg" }),
        path: format!("/tmp/api_uploads/{}", id),
        is_image: !is_video,
        is_video,
    }
}

pub fn faces(n: usize) -> FaceDetection {
    FaceDetection {
        faces: (0..n)
            .map(|index| DetectedFace {
                index,
                bounding_box: [10.0, 10.0, 60.0, 60.0],
                thumbnail: vec![0xff, index as u8],
            })
            .collect(),
        frame_number: 0,
        total_faces: n,
    }
}

pub fn video(frame_count: u32) -> VideoInfo {
    VideoInfo {
        frame_count,
        fps: 30.0,
        duration: frame_count as f64 / 30.0,
        width: 1920,
        height: 1080,
    }
}

/// Selection over a 300-frame video with two faces, ready to preview.
pub fn ready_selection() -> Selection {
    let mut selection = Selection::new();
    selection.set_source(upload("src", false));
    selection.set_target(upload("tgt", true));
    selection.apply_detection("tgt", faces(2));
    selection.apply_video_info("tgt", video(300));
    selection
}

pub fn config() -> SessionConfig {
    SessionConfig::builder()
        .with_endpoint("http://backend.test")
        .build()
        .unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewCall {
    pub at: Instant,
    pub frame: u32,
    pub face: usize,
}

/// In-memory backend with configurable latency and failures.
pub struct FakeBackend {
    pub previews: Mutex<Vec<PreviewCall>>,
    pub processed: Mutex<Vec<ProcessRequest>>,
    frame_latency: Mutex<HashMap<u32, Duration>>,
    uploads: AtomicUsize,
    face_count: usize,
    frame_count: u32,
    pub fail_previews: AtomicBool,
    pub fail_detection: AtomicBool,
    pub fail_process: AtomicBool,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            previews: Mutex::new(Vec::new()),
            processed: Mutex::new(Vec::new()),
            frame_latency: Mutex::new(HashMap::new()),
            uploads: AtomicUsize::new(0),
            face_count: 2,
            frame_count: 300,
            fail_previews: AtomicBool::new(false),
            fail_detection: AtomicBool::new(false),
            fail_process: AtomicBool::new(false),
        }
    }

    pub fn with_latency(self, frame: u32, latency: Duration) -> Self {
        self.frame_latency.lock().unwrap().insert(frame, latency);
        self
    }

    pub fn preview_calls(&self) -> Vec<PreviewCall> {
        self.previews.lock().unwrap().clone()
    }

    pub fn process_requests(&self) -> Vec<ProcessRequest> {
        self.processed.lock().unwrap().clone()
    }
}

impl Backend for FakeBackend {
    async fn upload(&self, kind: UploadKind, filename: String, _bytes: Vec<u8>) -> Result<UploadResponse> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        let is_video = filename.ends_with(".mp4");
        Ok(UploadResponse {
            file_id: format!("{}-{}", kind.as_str(), n),
            path: format!("/tmp/api_uploads/{}", filename),
            filename,
            is_image: !is_video,
            is_video,
        })
    }

    async fn detect_faces(&self, _frame_number: u32) -> Result<FaceDetection> {
        tokio::time::sleep(DEFAULT_LATENCY).await;
        if self.fail_detection.load(Ordering::SeqCst) {
            return Err(SessionError::Http {
                status: 500,
                body: "detector crashed".into(),
            });
        }
        Ok(faces(self.face_count))
    }

    async fn video_info(&self) -> Result<VideoInfo> {
        tokio::time::sleep(DEFAULT_LATENCY).await;
        Ok(video(self.frame_count))
    }

    async fn preview_frame(&self, frame_number: u32, reference_face_position: usize) -> Result<PreviewFrame> {
        self.previews.lock().unwrap().push(PreviewCall {
            at: Instant::now(),
            frame: frame_number,
            face: reference_face_position,
        });
        let latency = self
            .frame_latency
            .lock()
            .unwrap()
            .get(&frame_number)
            .copied()
            .unwrap_or(DEFAULT_LATENCY);
        tokio::time::sleep(latency).await;

        if self.fail_previews.load(Ordering::SeqCst) {
            return Err(SessionError::Http {
                status: 500,
                body: "render failed".into(),
            });
        }
        Ok(PreviewFrame {
            image: vec![frame_number as u8, reference_face_position as u8],
            frame_number,
            has_face_swap: true,
        })
    }

    async fn start_process(&self, request: &ProcessRequest) -> Result<ProcessResponse> {
        self.processed.lock().unwrap().push(request.clone());
        if self.fail_process.load(Ordering::SeqCst) {
            return Err(SessionError::Http {
                status: 400,
                body: "No source file uploaded".into(),
            });
        }
        Ok(ProcessResponse {
            status: "processing".into(),
            output_path: Some("/tmp/output/result.mp4".into()),
        })
    }
}

pub type Feed = mpsc::UnboundedSender<Result<Message>>;

/// Connector that refuses every attempt unless a connection was queued
/// with [`ScriptedConnector::open_next`].
pub struct ScriptedConnector {
    attempts: Mutex<Vec<Instant>>,
    queued: Mutex<VecDeque<mpsc::UnboundedReceiver<Result<Message>>>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self {
            attempts: Mutex::new(Vec::new()),
            queued: Mutex::new(VecDeque::new()),
        }
    }

    /// Let the next attempt succeed. Frames sent on the returned feed are
    /// delivered in order; dropping it ends the connection.
    pub fn open_next(&self) -> Feed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.queued.lock().unwrap().push_back(rx);
        tx
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }
}

impl Connector for ScriptedConnector {
    async fn connect(&self, _url: &str) -> Result<InboundStream> {
        self.attempts.lock().unwrap().push(Instant::now());
        let next = self.queued.lock().unwrap().pop_front();
        match next {
            Some(rx) => {
                let stream = futures_util::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                });
                Ok(Box::pin(stream))
            }
            None => Err(SessionError::InvalidResponse("connection refused".into())),
        }
    }
}

/// Connector shared with the test through an `Arc`.
pub struct Shared(pub std::sync::Arc<ScriptedConnector>);

impl Connector for Shared {
    async fn connect(&self, url: &str) -> Result<InboundStream> {
        self.0.connect(url).await
    }
}

pub fn text(json: &str) -> Result<Message> {
    Ok(Message::text(json))
}

/// Let spawned tasks run without moving the paused clock far.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
