//! Machine-readable output on stdout. Human-oriented logs go to stderr via `tracing`.

use crate::types::{ExitSummary, ItemReport};

/// Serialize an item report as one JSON line (no trailing newline).
pub fn item_line(report: &ItemReport) -> Option<String> {
    serde_json::to_string(report).ok()
}

/// Emit an item report as a single JSON line to stdout.
pub fn report_item(report: &ItemReport) {
    if let Some(line) = item_line(report) {
        println!("{line}");
    }
}

/// Emit the exit summary as pretty-printed JSON to stdout.
pub fn report_exit_summary(summary: &ExitSummary) {
    if let Ok(json) = serde_json::to_string_pretty(summary) {
        println!("{json}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;
    use crate::types::{ItemOutcome, PublishReceipt};
    use serde_json::{Value, json};

    #[test]
    fn published_line_shape() {
        let report = ItemReport {
            timestamp: "2024-01-01T00:00:00+00:00".into(),
            item_id: 7,
            caption: "New Boun minted! #7".into(),
            outcome: ItemOutcome::Published {
                receipt: PublishReceipt {
                    media_id: Some("m1".into()),
                    post_id: Some("p1".into()),
                    mock: false,
                },
            },
        };
        let line = item_line(&report).unwrap();
        assert!(!line.contains('\n'));
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["status"], "published");
        assert_eq!(value["item_id"], 7);
        assert_eq!(value["receipt"]["post_id"], "p1");
    }

    #[test]
    fn failed_line_names_stage() {
        let report = ItemReport {
            timestamp: String::new(),
            item_id: 6,
            caption: String::new(),
            outcome: ItemOutcome::Failed {
                stage: Stage::Artwork,
                error: "missing image".into(),
            },
        };
        let value: Value = serde_json::from_str(&item_line(&report).unwrap()).unwrap();
        assert_eq!(value["status"], json!("failed"));
        assert_eq!(value["stage"], json!("artwork"));
        assert_eq!(value["error"], json!("missing image"));
    }
}
