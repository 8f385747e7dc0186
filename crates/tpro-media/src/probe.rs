//! FFprobe video information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Video file information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Display width in pixels (after rotation)
    pub width: u32,
    /// Display height in pixels (after rotation)
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Video codec
    pub codec: String,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    #[serde(default)]
    tags: Option<StreamTags>,
    #[serde(default)]
    side_data_list: Vec<SideData>,
}

#[derive(Debug, Deserialize)]
struct StreamTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SideData {
    rotation: Option<f64>,
}

impl FfprobeStream {
    /// Rotation in degrees from either the legacy tag or display matrix.
    fn rotation(&self) -> i64 {
        let from_tag = self
            .tags
            .as_ref()
            .and_then(|t| t.rotate.as_ref())
            .and_then(|r| r.parse::<f64>().ok());
        let from_side_data = self.side_data_list.iter().find_map(|s| s.rotation);

        from_tag.or(from_side_data).unwrap_or(0.0).round() as i64
    }
}

/// Probe a video file, failing if FFprobe does not answer within `timeout`.
pub async fn probe_video(path: impl AsRef<Path>, timeout: Duration) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let program = check_ffprobe()?;
    probe_video_with(&program, path, timeout).await
}

/// Probe with an explicit FFprobe executable.
pub async fn probe_video_with(
    program: &Path,
    path: &Path,
    timeout: Duration,
) -> MediaResult<VideoInfo> {
    let child = Command::new(program)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| MediaError::Timeout(timeout))??;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

/// Parse FFprobe's JSON into [`VideoInfo`].
///
/// Fails when there is no video stream or no usable duration.
pub fn parse_probe_output(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::invalid_video("No video stream found"))?;

    // Container duration first, stream duration as fallback
    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_seconds)
        .or_else(|| video_stream.duration.as_deref().and_then(parse_seconds))
        .ok_or_else(|| MediaError::invalid_video("Video duration is unknown"))?;

    let (width, height) = match (video_stream.width, video_stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(MediaError::invalid_video("Video dimensions are unknown")),
    };

    // Quarter turns swap the displayed dimensions
    let (width, height) = if video_stream.rotation().rem_euclid(180) == 90 {
        (height, width)
    } else {
        (width, height)
    };

    let fps = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(30.0);

    Ok(VideoInfo {
        duration,
        width,
        height,
        fps,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
    })
}

fn parse_seconds(s: &str) -> Option<f64> {
    s.parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok().filter(|fps: &f64| *fps > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{
            "streams": [
                { "codec_type": "audio", "codec_name": "aac" },
                { "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
                  "avg_frame_rate": "60/1" }
            ],
            "format": { "duration": "10.000000" }
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.duration, 10.0);
        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(info.fps, 60.0);
        assert_eq!(info.codec, "h264");
    }

    #[test]
    fn test_rotated_phone_clip_swaps_dimensions() {
        let json = br#"{
            "streams": [
                { "codec_type": "video", "codec_name": "hevc", "width": 1920, "height": 1080,
                  "duration": "4.2", "side_data_list": [ { "rotation": -90 } ] }
            ],
            "format": {}
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!((info.width, info.height), (1080, 1920));
        assert_eq!(info.duration, 4.2);
    }

    #[test]
    fn test_unreadable_probe_output() {
        let audio_only = br#"{ "streams": [ { "codec_type": "audio" } ], "format": { "duration": "3.0" } }"#;
        assert!(matches!(
            parse_probe_output(audio_only),
            Err(MediaError::InvalidVideo(_))
        ));

        let no_duration = br#"{ "streams": [ { "codec_type": "video", "width": 640, "height": 480 } ],
                               "format": { "duration": "N/A" } }"#;
        assert!(parse_probe_output(no_duration).is_err());

        assert!(matches!(
            parse_probe_output(b"not json"),
            Err(MediaError::JsonParse(_))
        ));
    }
}
