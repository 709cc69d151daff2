use crate::types::{DetectedFace, FaceDetection, UploadResponse, VideoInfo};

const FALLBACK_FPS: f64 = 30.0;

/// Render a frame count as `m:ss` at the given rate.
///
/// Non-positive or non-finite rates fall back to 30 fps.
pub fn format_timecode(frames: u32, fps: f64) -> String {
    let fps = if fps.is_finite() && fps > 0.0 {
        fps
    } else {
        FALLBACK_FPS
    };
    let total_seconds = (frames as f64 / fps).floor() as u64;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Frame range `[start, end)` of a video to process.
///
/// `start < end` always holds. Changes that would break it are rejected,
/// never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimRange {
    start: u32,
    end: u32,
}

impl TrimRange {
    /// `[start, end)`, or `None` if the range is empty.
    pub fn new(start: u32, end: u32) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// The whole of a `frame_count`-frame video, or `None` for zero frames.
    pub fn full(frame_count: u32) -> Option<Self> {
        Self::new(0, frame_count)
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of frames selected.
    pub fn frames(&self) -> u32 {
        self.end - self.start
    }

    /// Move the start. Accepted only if it stays before the end.
    pub fn set_start(&mut self, start: u32) -> bool {
        if start < self.end {
            self.start = start;
            true
        } else {
            false
        }
    }

    /// Move the end. Accepted only if it stays after the start.
    pub fn set_end(&mut self, end: u32) -> bool {
        if end > self.start {
            self.end = end;
            true
        } else {
            false
        }
    }

    /// Selected length as `m:ss`.
    pub fn duration_label(&self, fps: f64) -> String {
        format_timecode(self.frames(), fps)
    }
}

/// Inputs a preview was computed from. A response whose key differs from
/// the live selection's is stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewKey {
    pub source_id: String,
    pub target_id: String,
    pub frame: u32,
    pub face_index: usize,
}

/// The user's current choices: uploads, reference face, frame, trim range.
///
/// Face list, frame position, video metadata and trim range are derived
/// from the target and are discarded whenever the target is replaced or
/// cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    source: Option<UploadResponse>,
    target: Option<UploadResponse>,
    faces: Vec<DetectedFace>,
    selected_face: usize,
    current_frame: u32,
    video: Option<VideoInfo>,
    trim: Option<TrimRange>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self) -> Option<&UploadResponse> {
        self.source.as_ref()
    }

    pub fn target(&self) -> Option<&UploadResponse> {
        self.target.as_ref()
    }

    pub fn faces(&self) -> &[DetectedFace] {
        &self.faces
    }

    /// Position of the reference face in [`faces`](Self::faces).
    pub fn selected_face(&self) -> usize {
        self.selected_face
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    pub fn video_info(&self) -> Option<&VideoInfo> {
        self.video.as_ref()
    }

    /// Frames in the target video; 0 for images or before metadata arrives.
    pub fn frame_count(&self) -> u32 {
        self.video.map(|v| v.frame_count).unwrap_or(0)
    }

    pub fn fps(&self) -> Option<f64> {
        self.video.map(|v| v.fps)
    }

    pub fn trim(&self) -> Option<TrimRange> {
        self.trim
    }

    pub fn is_video(&self) -> bool {
        self.target.as_ref().is_some_and(|t| t.is_video)
    }

    /// Both uploads are present.
    pub fn is_ready(&self) -> bool {
        self.source.is_some() && self.target.is_some()
    }

    pub fn set_source(&mut self, upload: UploadResponse) {
        self.source = Some(upload);
    }

    pub fn clear_source(&mut self) {
        self.source = None;
    }

    /// Replace the target, discarding everything derived from the old one.
    pub fn set_target(&mut self, upload: UploadResponse) {
        self.discard_derived();
        self.target = Some(upload);
    }

    /// Remove the target and everything derived from it.
    pub fn clear_target(&mut self) {
        self.discard_derived();
        self.target = None;
    }

    /// Forget both uploads and all derived state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn discard_derived(&mut self) {
        self.faces.clear();
        self.selected_face = 0;
        self.current_frame = 0;
        self.video = None;
        self.trim = None;
    }

    fn is_current_target(&self, target_id: &str) -> bool {
        self.target.as_ref().is_some_and(|t| t.file_id == target_id)
    }

    /// Install detected faces for `target_id` and select the first one.
    ///
    /// Ignored (returns `false`) if the target has since changed.
    pub fn apply_detection(&mut self, target_id: &str, detection: FaceDetection) -> bool {
        if !self.is_current_target(target_id) {
            return false;
        }
        self.faces = detection.faces;
        self.selected_face = 0;
        true
    }

    /// Install video metadata for `target_id`, resetting the frame position
    /// and trimming to the whole video.
    ///
    /// Ignored (returns `false`) if the target has since changed.
    pub fn apply_video_info(&mut self, target_id: &str, info: VideoInfo) -> bool {
        if !self.is_current_target(target_id) {
            return false;
        }
        self.video = Some(info);
        self.current_frame = 0;
        self.trim = TrimRange::full(info.frame_count);
        true
    }

    /// Choose the reference face by position. Out-of-range positions are
    /// rejected.
    pub fn select_face(&mut self, position: usize) -> bool {
        if position < self.faces.len() {
            self.selected_face = position;
            true
        } else {
            false
        }
    }

    /// Move to `frame`, which must lie in `[0, frame_count)`. Frame 0 is
    /// always accepted, so image targets and videos without metadata yet
    /// stay at the start.
    pub fn set_frame(&mut self, frame: u32) -> bool {
        let accepted = frame == 0 || (self.is_video() && frame < self.frame_count());
        if accepted {
            self.current_frame = frame;
        }
        accepted
    }

    /// Move the trim start; rejected unless it stays before the end.
    pub fn set_trim_start(&mut self, start: u32) -> bool {
        match self.trim.as_mut() {
            Some(trim) => trim.set_start(start),
            None => false,
        }
    }

    /// Move the trim end; rejected unless it stays after the start and
    /// within the video.
    pub fn set_trim_end(&mut self, end: u32) -> bool {
        let frame_count = self.frame_count();
        match self.trim.as_mut() {
            Some(trim) if end <= frame_count => trim.set_end(end),
            _ => false,
        }
    }

    /// The preview this selection calls for, or `None` while uploads or
    /// detected faces are missing.
    pub fn preview_key(&self) -> Option<PreviewKey> {
        let source = self.source.as_ref()?;
        let target = self.target.as_ref()?;
        if self.faces.is_empty() {
            return None;
        }
        Some(PreviewKey {
            source_id: source.file_id.clone(),
            target_id: target.file_id.clone(),
            frame: self.current_frame,
            face_index: self.selected_face,
        })
    }
}
