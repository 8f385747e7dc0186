//! Captured still frames.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::capture::FRAME_MIME_TYPE;

/// A JPEG-encoded still captured from the uploaded clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledFrame {
    /// 1-based position in the sampled sequence
    pub ordinal: usize,
    /// Capture position in seconds
    pub timestamp: f64,
    /// Encoded JPEG bytes
    #[serde(skip)]
    jpeg: Vec<u8>,
}

impl SampledFrame {
    pub fn new(ordinal: usize, timestamp: f64, jpeg: Vec<u8>) -> Self {
        Self {
            ordinal,
            timestamp,
            jpeg,
        }
    }

    /// Encoded image bytes.
    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    pub fn len(&self) -> usize {
        self.jpeg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }

    /// Bare base64 payload, as sent in inline image parts.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.jpeg)
    }

    /// `data:` URI suitable for an `<img src>`.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", FRAME_MIME_TYPE, self.to_base64())
    }
}
