#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for swing frame sampling.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with timeouts
//! - FFprobe metadata resolution for uploaded clips
//! - Deterministic frame sampling over the middle of a clip
//! - Preview handles for uploaded media with guaranteed release

pub mod command;
pub mod error;
pub mod preview;
pub mod probe;
pub mod sampler;
pub mod source;


pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{ExtractionError, MediaError, MediaResult};
pub use preview::PreviewHandle;
pub use probe::{probe_video, probe_video_with, VideoInfo};
pub use sampler::{
    FfmpegCapture, FrameCapture, FrameCount, FrameSampler, FrameStream, SamplerConfig,
    SamplingPlan, SamplingWindow,
};
pub use source::MediaSource;
