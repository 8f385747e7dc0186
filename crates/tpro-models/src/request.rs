//! Request submitted to the scoring service.

use crate::frame::SampledFrame;
use crate::stroke::StrokeType;

/// Ordered frames plus the stroke the player declared.
///
/// Built once per upload and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    frames: Vec<SampledFrame>,
    stroke: StrokeType,
}

impl AnalysisRequest {
    pub fn new(frames: Vec<SampledFrame>, stroke: StrokeType) -> Self {
        Self { frames, stroke }
    }

    pub fn frames(&self) -> &[SampledFrame] {
        &self.frames
    }

    pub fn stroke(&self) -> StrokeType {
        self.stroke
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_keeps_order() {
        let frames = (1..=3)
            .map(|i| SampledFrame::new(i, i as f64, vec![i as u8]))
            .collect();
        let request = AnalysisRequest::new(frames, StrokeType::Volley);

        assert_eq!(request.frame_count(), 3);
        assert_eq!(request.stroke(), StrokeType::Volley);
        let ordinals: Vec<usize> = request.frames().iter().map(|f| f.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
    }
}
