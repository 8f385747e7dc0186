//! Stroke categories a player can declare for an upload.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stroke or movement the uploaded clip is believed to show.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum StrokeType {
    /// Forehand drive
    #[default]
    ForehandDrive,
    Backhand,
    Serve,
    Volley,
    Smash,
    /// Court movement and footwork rather than a single stroke
    FootworkMovement,
}

impl StrokeType {
    /// All strokes, in the order they are offered to the user.
    pub const ALL: &'static [StrokeType] = &[
        StrokeType::ForehandDrive,
        StrokeType::Backhand,
        StrokeType::Serve,
        StrokeType::Volley,
        StrokeType::Smash,
        StrokeType::FootworkMovement,
    ];

    /// Stable identifier used in requests and URLs.
    pub fn id(&self) -> &'static str {
        match self {
            StrokeType::ForehandDrive => "forehand-drive",
            StrokeType::Backhand => "backhand",
            StrokeType::Serve => "serve",
            StrokeType::Volley => "volley",
            StrokeType::Smash => "smash",
            StrokeType::FootworkMovement => "footwork-movement",
        }
    }

    /// Human-readable label, also the text sent to the scoring service.
    pub fn label(&self) -> &'static str {
        match self {
            StrokeType::ForehandDrive => "Drive (Forehand)",
            StrokeType::Backhand => "Backhand",
            StrokeType::Serve => "Serve",
            StrokeType::Volley => "Volley",
            StrokeType::Smash => "Smash",
            StrokeType::FootworkMovement => "Court Movement",
        }
    }
}

impl fmt::Display for StrokeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for StrokeType {
    type Err = StrokeParseError;

    /// Accepts either the id or the display label, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        StrokeType::ALL
            .iter()
            .copied()
            .find(|stroke| {
                stroke.id().eq_ignore_ascii_case(needle)
                    || stroke.label().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| StrokeParseError(s.to_string()))
    }
}

#[derive(Debug, Error)]
#[error("Unknown stroke: {0}")]
pub struct StrokeParseError(String);
