use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Oracle,
    Artwork,
    Conversion,
    Publish,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Oracle => "oracle",
            Stage::Artwork => "artwork",
            Stage::Conversion => "conversion",
            Stage::Publish => "publish",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors raised by the watcher's collaborators. None of them are fatal to the loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Auction oracle unreachable, timed out, or returned something undecodable.
    #[error("auction read failed: {0}")]
    TransientFetch(String),

    /// Token metadata missing or malformed.
    #[error("artwork fetch for item {item_id} failed: {reason}")]
    ArtworkFetch { item_id: u64, reason: String },

    /// SVG could not be rasterized.
    #[error("svg conversion failed: {0}")]
    Conversion(String),

    /// Upload or post rejected (auth, rate limit, network).
    #[error("publish failed: {0}")]
    Publish(String),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::TransientFetch(_) => Stage::Oracle,
            PipelineError::ArtworkFetch { .. } => Stage::Artwork,
            PipelineError::Conversion(_) => Stage::Conversion,
            PipelineError::Publish(_) => Stage::Publish,
        }
    }

    pub fn artwork(item_id: u64, reason: impl std::fmt::Display) -> Self {
        PipelineError::ArtworkFetch {
            item_id,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_matches_variant() {
        assert_eq!(PipelineError::TransientFetch("x".into()).stage(), Stage::Oracle);
        assert_eq!(PipelineError::artwork(3, "x").stage(), Stage::Artwork);
        assert_eq!(PipelineError::Conversion("x".into()).stage(), Stage::Conversion);
        assert_eq!(PipelineError::Publish("x".into()).stage(), Stage::Publish);
    }

    #[test]
    fn artwork_message_names_item() {
        let err = PipelineError::artwork(42, "no image field");
        assert_eq!(
            err.to_string(),
            "artwork fetch for item 42 failed: no image field"
        );
    }

    #[test]
    fn stage_serializes_snake_case() {
        let json = serde_json::to_string(&Stage::Conversion).unwrap();
        assert_eq!(json, "\"conversion\"");
    }
}
