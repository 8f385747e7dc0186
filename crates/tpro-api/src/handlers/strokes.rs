//! Stroke catalogue.

use axum::Json;
use serde::Serialize;

use tpro_models::StrokeType;

/// One selectable stroke.
#[derive(Debug, Serialize)]
pub struct StrokeOption {
    pub id: &'static str,
    pub label: &'static str,
}

/// List the strokes a player can declare, in display order.
pub async fn list_strokes() -> Json<Vec<StrokeOption>> {
    Json(
        StrokeType::ALL
            .iter()
            .map(|s| StrokeOption {
                id: s.id(),
                label: s.label(),
            })
            .collect(),
    )
}
