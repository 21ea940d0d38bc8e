//! Change notification for connected observers.
//!
//! Every successful upload or delete pushes the complete current listing
//! to each subscriber. Pushes carry no deltas, so a subscriber that misses
//! one converges on the next.

mod notifier;

pub use notifier::{ChangeNotifier, Subscription, SUBSCRIBER_BUFFER};

use serde::{Deserialize, Serialize};

use crate::file::FileSummary;

/// Messages pushed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
    /// The full current file listing.
    FileUpdate {
        /// All stored files.
        files: Vec<FileSummary>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_file_update_serialization() {
        let msg = Notification::FileUpdate {
            files: vec![FileSummary {
                id: "abc".to_string(),
                name: "a.txt".to_string(),
                size: 10,
                modified: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            }],
        };

        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "file-update");
        assert_eq!(json["files"][0]["id"], "abc");
        assert_eq!(json["files"][0]["name"], "a.txt");
        assert_eq!(json["files"][0]["size"], 10);
        assert_eq!(json["files"][0]["modified"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_empty_listing_serialization() {
        let msg = Notification::FileUpdate { files: vec![] };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"file-update","files":[]}"#);
    }
}
