//! Deterministic frame sampling.
//!
//! A clip is sampled at evenly spaced timestamps inside a window covering
//! the middle of its duration (20%-80% by default), where the swing is
//! expected to be. Captures run strictly in order against a single
//! [`MediaSource`]: one playback position, one seek at a time.
//!
//! Extraction is all-or-nothing. [`FrameSampler::extract`] returns exactly
//! the requested number of frames or an [`ExtractionError`]; partial
//! sequences are dropped.

use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use tpro_models::capture::{
    DEFAULT_FRAME_COUNT, DEFAULT_JPEG_QUALITY, DEFAULT_WINDOW_END, DEFAULT_WINDOW_START,
};
use tpro_models::SampledFrame;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{ExtractionError, MediaError, MediaResult};
use crate::source::MediaSource;

/// Number of frames to sample. Always at least 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCount(usize);

const _: () = assert!(DEFAULT_FRAME_COUNT >= 2);

impl FrameCount {
    /// The fixed count used for every upload.
    pub const DEFAULT: FrameCount = FrameCount(DEFAULT_FRAME_COUNT);

    pub fn new(count: usize) -> Result<Self, ExtractionError> {
        if count < 2 {
            return Err(ExtractionError::InvalidFrameCount(count));
        }
        Ok(Self(count))
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for FrameCount {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<usize> for FrameCount {
    type Error = ExtractionError;

    fn try_from(count: usize) -> Result<Self, Self::Error> {
        Self::new(count)
    }
}

/// Portion of the clip to sample, as fractions of its duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingWindow {
    start: f64,
    end: f64,
}

impl SamplingWindow {
    /// Requires `0 <= start < end < 1`. A seek to the very end of a clip
    /// decodes no frame, so the window cannot reach it.
    pub fn new(start: f64, end: f64) -> Result<Self, ExtractionError> {
        let valid = start.is_finite() && end.is_finite() && 0.0 <= start && start < end && end < 1.0;
        if !valid {
            return Err(ExtractionError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }
}

impl Default for SamplingWindow {
    fn default() -> Self {
        Self {
            start: DEFAULT_WINDOW_START,
            end: DEFAULT_WINDOW_END,
        }
    }
}

/// Timestamps to capture for a clip of a given duration.
///
/// `t_i = start + i * (end - start) / (n - 1)`, with the last timestamp
/// pinned to `end`.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingPlan {
    start: f64,
    end: f64,
    interval: f64,
    timestamps: Vec<f64>,
}

impl SamplingPlan {
    pub fn new(
        duration: f64,
        frame_count: FrameCount,
        window: SamplingWindow,
    ) -> Result<Self, ExtractionError> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(ExtractionError::source_unreadable(format!(
                "invalid duration {}",
                duration
            )));
        }

        let count = frame_count.get();
        let start = duration * window.start();
        let end = duration * window.end();
        let interval = (end - start) / (count - 1) as f64;

        let timestamps = (0..count)
            .map(|i| {
                if i == count - 1 {
                    end
                } else {
                    start + i as f64 * interval
                }
            })
            .collect();

        Ok(Self {
            start,
            end,
            interval,
            timestamps,
        })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Sampler configuration.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub window: SamplingWindow,
    /// JPEG quality (0.0-1.0)
    pub jpeg_quality: f32,
    /// How long to wait for a clip's metadata
    pub probe_timeout: Duration,
    /// How long a single seek-and-capture may take
    pub capture_timeout: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            window: SamplingWindow::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            probe_timeout: Duration::from_secs(30),
            capture_timeout: Duration::from_secs(30),
        }
    }
}

impl SamplerConfig {
    /// Create config from environment variables.
    ///
    /// An invalid window falls back to the default with a warning.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let start = env_parse("SAMPLE_WINDOW_START").unwrap_or(DEFAULT_WINDOW_START);
        let end = env_parse("SAMPLE_WINDOW_END").unwrap_or(DEFAULT_WINDOW_END);
        let window = SamplingWindow::new(start, end).unwrap_or_else(|e| {
            warn!("{}, using default window", e);
            SamplingWindow::default()
        });

        Self {
            window,
            jpeg_quality: env_parse("SAMPLE_JPEG_QUALITY").unwrap_or(defaults.jpeg_quality),
            probe_timeout: env_parse("PROBE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.probe_timeout),
            capture_timeout: env_parse("CAPTURE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.capture_timeout),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Opens clips and encodes the frame visible at a seek position.
#[async_trait]
pub trait FrameCapture: Send + Sync {
    /// Resolve `path` into a source with known duration and dimensions.
    async fn open(&self, path: &Path) -> Result<MediaSource, ExtractionError>;

    /// Capture the frame at `timestamp` seconds as JPEG bytes.
    async fn capture(
        &self,
        source: &MediaSource,
        timestamp: f64,
        ordinal: usize,
    ) -> MediaResult<Vec<u8>>;
}

/// [`FrameCapture`] backed by one FFmpeg invocation per frame.
#[derive(Debug, Clone)]
pub struct FfmpegCapture {
    jpeg_quality: f32,
    probe_timeout: Duration,
    timeout: Duration,
}

impl FfmpegCapture {
    pub fn new(config: &SamplerConfig) -> Self {
        Self {
            jpeg_quality: config.jpeg_quality,
            probe_timeout: config.probe_timeout,
            timeout: config.capture_timeout,
        }
    }
}

#[async_trait]
impl FrameCapture for FfmpegCapture {
    async fn open(&self, path: &Path) -> Result<MediaSource, ExtractionError> {
        MediaSource::open(path, self.probe_timeout).await
    }

    async fn capture(
        &self,
        source: &MediaSource,
        timestamp: f64,
        ordinal: usize,
    ) -> MediaResult<Vec<u8>> {
        let output = source.surface_path(ordinal);

        // No scale filter: frames keep the source's native size
        let cmd = FfmpegCommand::new(source.path(), &output)
            .seek(timestamp)
            .single_frame()
            .jpeg_still(self.jpeg_quality)
            .log_level("error");

        FfmpegRunner::new().with_timeout(self.timeout).run(&cmd).await?;

        let bytes = tokio::fs::read(&output).await?;
        if let Err(e) = tokio::fs::remove_file(&output).await {
            debug!("Failed to remove capture {}: {}", output.display(), e);
        }

        if bytes.is_empty() {
            return Err(MediaError::invalid_video(format!(
                "no frame decoded at {:.3}s",
                timestamp
            )));
        }

        Ok(bytes)
    }
}

/// Lazy, finite stream of captured frames.
///
/// Owns the [`MediaSource`] and releases it once the last frame is
/// captured, on the first error, or when the stream is dropped. Yields at
/// most one error, after which it ends. It cannot be restarted.
pub struct FrameStream {
    inner: BoxStream<'static, Result<SampledFrame, ExtractionError>>,
    expected: usize,
}

impl FrameStream {
    /// Number of frames the stream will yield if no capture fails.
    pub fn expected(&self) -> usize {
        self.expected
    }
}

impl Stream for FrameStream {
    type Item = Result<SampledFrame, ExtractionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.expected))
    }
}

/// Samples a fixed number of frames from a clip.
pub struct FrameSampler<C: ?Sized> {
    capture: Arc<C>,
    window: SamplingWindow,
}

impl FrameSampler<FfmpegCapture> {
    /// Sampler that captures with FFmpeg.
    pub fn ffmpeg(config: &SamplerConfig) -> Self {
        Self::new(FfmpegCapture::new(config), config.window)
    }
}

impl<C: FrameCapture + 'static> FrameSampler<C> {
    pub fn new(capture: C, window: SamplingWindow) -> Self {
        Self::from_arc(Arc::new(capture), window)
    }
}

impl<C: FrameCapture + ?Sized + 'static> FrameSampler<C> {
    /// Sampler over a shared (possibly type-erased) capture backend.
    pub fn from_arc(capture: Arc<C>, window: SamplingWindow) -> Self {
        Self { capture, window }
    }

    pub fn window(&self) -> SamplingWindow {
        self.window
    }

    /// Open a clip for sampling.
    pub async fn open(&self, path: &Path) -> Result<MediaSource, ExtractionError> {
        self.capture.open(path).await
    }

    /// Timestamps that would be captured from `source`.
    pub fn plan(
        &self,
        source: &MediaSource,
        frame_count: FrameCount,
    ) -> Result<SamplingPlan, ExtractionError> {
        SamplingPlan::new(source.duration(), frame_count, self.window)
    }

    /// Stream captures for `plan`, taking ownership of `source`.
    pub fn stream(&self, source: MediaSource, plan: &SamplingPlan) -> FrameStream {
        let capture = Arc::clone(&self.capture);
        let targets = plan.timestamps().to_vec().into_iter().enumerate();
        let expected = plan.len();

        let inner = stream::try_unfold(
            (capture, source, targets),
            |(capture, source, mut targets)| async move {
                let Some((index, timestamp)) = targets.next() else {
                    source.release();
                    return Ok(None);
                };
                let ordinal = index + 1;

                let jpeg = capture
                    .capture(&source, timestamp, ordinal)
                    .await
                    .map_err(|e| {
                        ExtractionError::capture_failed(format!(
                            "frame {} at {:.3}s: {}",
                            ordinal,
                            timestamp,
                            e.detail()
                        ))
                    })?;

                debug!(ordinal, timestamp, bytes = jpeg.len(), "Captured frame");
                let frame = SampledFrame::new(ordinal, timestamp, jpeg);
                Ok(Some((frame, (capture, source, targets))))
            },
        )
        .boxed();

        FrameStream { inner, expected }
    }

    /// Capture exactly `frame_count` frames from `source`.
    ///
    /// The source is released before this returns, on success or failure.
    pub async fn extract(
        &self,
        source: MediaSource,
        frame_count: FrameCount,
    ) -> Result<Vec<SampledFrame>, ExtractionError> {
        let started = Instant::now();
        let plan = self.plan(&source, frame_count)?;

        info!(
            frames = plan.len(),
            start = plan.start(),
            end = plan.end(),
            interval = plan.interval(),
            "Sampling frames"
        );

        let frames: Vec<SampledFrame> = self.stream(source, &plan).try_collect().await?;

        if frames.len() != plan.len() {
            return Err(ExtractionError::capture_failed(format!(
                "captured {} of {} frames",
                frames.len(),
                plan.len()
            )));
        }

        info!(
            frames = frames.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Frame sampling complete"
        );

        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::VideoInfo;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn source(duration: f64) -> MediaSource {
        MediaSource::with_info(
            "swing.mp4",
            VideoInfo {
                duration,
                width: 640,
                height: 360,
                fps: 30.0,
                codec: "h264".to_string(),
            },
        )
        .unwrap()
    }

    /// Records every capture; fails at `fail_at` if set.
    #[derive(Default)]
    struct RecordingCapture {
        calls: Mutex<Vec<(usize, f64)>>,
        surfaces: Mutex<Vec<PathBuf>>,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl FrameCapture for RecordingCapture {
        async fn open(&self, path: &Path) -> Result<MediaSource, ExtractionError> {
            MediaSource::with_info(
                path,
                VideoInfo {
                    duration: 10.0,
                    width: 640,
                    height: 360,
                    fps: 30.0,
                    codec: "h264".to_string(),
                },
            )
            .map_err(|e| ExtractionError::source_unreadable(e.to_string()))
        }

        async fn capture(
            &self,
            source: &MediaSource,
            timestamp: f64,
            ordinal: usize,
        ) -> MediaResult<Vec<u8>> {
            self.calls.lock().unwrap().push((ordinal, timestamp));
            self.surfaces
                .lock()
                .unwrap()
                .push(source.surface_path(ordinal));
            if self.fail_at == Some(ordinal) {
                return Err(MediaError::ffmpeg_failed("seek failed", None, Some(1)));
            }
            Ok(vec![0xFF, 0xD8, ordinal as u8])
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-3,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_frame_count_minimum() {
        assert!(FrameCount::new(0).is_err());
        assert!(matches!(
            FrameCount::try_from(1),
            Err(ExtractionError::InvalidFrameCount(1))
        ));
        assert_eq!(FrameCount::new(2).unwrap().get(), 2);
    }

    #[test]
    fn test_default_frame_count() {
        assert_eq!(FrameCount::default().get(), 12);
        assert_eq!(FrameCount::DEFAULT, FrameCount::new(12).unwrap());
    }

    #[tokio::test]
    async fn test_type_erased_sampler() {
        let capture: Arc<dyn FrameCapture> = Arc::new(RecordingCapture::default());
        let sampler = FrameSampler::from_arc(capture, SamplingWindow::default());

        let src = sampler.open(Path::new("swing.mp4")).await.unwrap();
        let frames = sampler.extract(src, FrameCount::DEFAULT).await.unwrap();
        assert_eq!(frames.len(), 12);
    }

    #[test]
    fn test_window_validation() {
        assert!(SamplingWindow::new(0.2, 0.8).is_ok());
        assert!(SamplingWindow::new(0.0, 0.99).is_ok());
        // The last capture would land on the final instant of the clip
        assert!(SamplingWindow::new(0.0, 1.0).is_err());
        assert!(SamplingWindow::new(0.8, 0.2).is_err());
        assert!(SamplingWindow::new(0.5, 0.5).is_err());
        assert!(SamplingWindow::new(-0.1, 0.5).is_err());
        assert!(SamplingWindow::new(0.1, 1.5).is_err());
        assert!(SamplingWindow::new(f64::NAN, 0.5).is_err());
    }

    #[test]
    fn test_plan_ten_second_clip() {
        let plan = SamplingPlan::new(10.0, FrameCount::new(12).unwrap(), SamplingWindow::default())
            .unwrap();

        assert_eq!(plan.len(), 12);
        assert_close(plan.start(), 2.0);
        assert_close(plan.end(), 8.0);
        assert_close(plan.interval(), 0.545);

        let ts = plan.timestamps();
        assert_eq!(ts[0], 2.0);
        assert_close(ts[1], 2.545);
        assert_close(ts[2], 3.091);
        assert_eq!(ts[11], 8.0);
    }

    #[test]
    fn test_plan_properties_hold_for_many_shapes() {
        for duration in [0.5, 3.0, 10.0, 37.25, 600.0] {
            for count in 2..=30 {
                let plan = SamplingPlan::new(
                    duration,
                    FrameCount::new(count).unwrap(),
                    SamplingWindow::default(),
                )
                .unwrap();
                let ts = plan.timestamps();

                assert_eq!(ts.len(), count);
                assert_eq!(ts[0], 0.2 * duration);
                assert_eq!(ts[count - 1], 0.8 * duration);

                for pair in ts.windows(2) {
                    assert!(pair[1] > pair[0]);
                    assert!((pair[1] - pair[0] - plan.interval()).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_plan_is_idempotent() {
        let count = FrameCount::new(12).unwrap();
        let a = SamplingPlan::new(7.3, count, SamplingWindow::default()).unwrap();
        let b = SamplingPlan::new(7.3, count, SamplingWindow::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_plan_rejects_bad_duration() {
        let count = FrameCount::new(12).unwrap();
        for duration in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                SamplingPlan::new(duration, count, SamplingWindow::default()),
                Err(ExtractionError::SourceUnreadable(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_extract_returns_every_frame_in_order() {
        let sampler = FrameSampler::new(RecordingCapture::default(), SamplingWindow::default());
        let src = source(10.0);
        let surface = src.surface_path(1).parent().unwrap().to_path_buf();

        let frames = sampler
            .extract(src, FrameCount::new(12).unwrap())
            .await
            .unwrap();

        assert_eq!(frames.len(), 12);
        let ordinals: Vec<usize> = frames.iter().map(|f| f.ordinal).collect();
        assert_eq!(ordinals, (1..=12).collect::<Vec<_>>());
        assert_eq!(frames[0].timestamp, 2.0);
        assert_eq!(frames[11].timestamp, 8.0);
        assert_eq!(frames[4].jpeg(), &[0xFF, 0xD8, 5]);

        let calls = sampler.capture.calls.lock().unwrap().clone();
        assert!(calls.windows(2).all(|w| w[1].1 > w[0].1));

        // Source released after extraction
        assert!(!surface.exists());
    }

    #[tokio::test]
    async fn test_extract_failure_discards_partial_frames() {
        let capture = RecordingCapture {
            fail_at: Some(5),
            ..Default::default()
        };
        let sampler = FrameSampler::new(capture, SamplingWindow::default());
        let src = source(10.0);
        let surface = src.surface_path(1).parent().unwrap().to_path_buf();

        let err = sampler
            .extract(src, FrameCount::new(12).unwrap())
            .await
            .unwrap_err();

        match err {
            ExtractionError::CaptureFailed(message) => {
                assert!(message.contains("frame 5"), "{message}");
                assert!(message.contains("seek failed"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Nothing captured after the failure, source released
        assert_eq!(sampler.capture.calls.lock().unwrap().len(), 5);
        assert!(!surface.exists());
    }

    #[tokio::test]
    async fn test_stream_is_lazy_and_ends_after_error() {
        let capture = RecordingCapture {
            fail_at: Some(2),
            ..Default::default()
        };
        let sampler = FrameSampler::new(capture, SamplingWindow::default());
        let src = source(4.0);
        let plan = sampler.plan(&src, FrameCount::new(4).unwrap()).unwrap();

        let mut stream = sampler.stream(src, &plan);
        assert_eq!(stream.expected(), 4);
        assert!(sampler.capture.calls.lock().unwrap().is_empty());

        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
        assert_eq!(sampler.capture.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_dropping_stream_releases_source() {
        let sampler = FrameSampler::new(RecordingCapture::default(), SamplingWindow::default());
        let src = source(4.0);
        let surface = src.surface_path(1).parent().unwrap().to_path_buf();
        let plan = sampler.plan(&src, FrameCount::new(3).unwrap()).unwrap();

        let mut stream = sampler.stream(src, &plan);
        stream.next().await.unwrap().unwrap();
        drop(stream);

        assert!(!surface.exists());
    }

    #[tokio::test]
    async fn test_captures_use_the_source_surface() {
        let sampler = FrameSampler::new(RecordingCapture::default(), SamplingWindow::default());
        let src = source(4.0);
        let surface = src.surface_path(1).parent().unwrap().to_path_buf();

        sampler
            .extract(src, FrameCount::new(2).unwrap())
            .await
            .unwrap();

        let surfaces = sampler.capture.surfaces.lock().unwrap().clone();
        assert_eq!(surfaces.len(), 2);
        assert!(surfaces.iter().all(|p| p.starts_with(&surface)));
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg and a sample clip at TPRO_SAMPLE_VIDEO"]
    async fn test_ffmpeg_capture_real_clip() {
        let path = std::env::var("TPRO_SAMPLE_VIDEO").expect("TPRO_SAMPLE_VIDEO not set");
        let config = SamplerConfig::default();
        let src = MediaSource::open(&path, config.probe_timeout).await.unwrap();

        let frames = FrameSampler::ffmpeg(&config)
            .extract(src, FrameCount::new(12).unwrap())
            .await
            .unwrap();

        assert_eq!(frames.len(), 12);
        assert!(frames.iter().all(|f| f.jpeg().starts_with(&[0xFF, 0xD8])));
    }
}
