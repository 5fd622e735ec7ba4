use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// One entry of the station's recording listing.
///
/// Only the presigned content path is interpreted; everything else the
/// station reports is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    #[serde(rename = "presignedContentUrl")]
    pub presigned_content_url: String,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Recording {
    /// Path to hand to `download_recording`
    pub fn path(&self) -> &str {
        &self.presigned_content_url
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecordingListing {
    pub data: Option<Vec<Recording>>,
}

/// Where a downloaded recording ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedRecording {
    pub path: PathBuf,
    pub bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_passes_through() {
        let listing: RecordingListing = serde_json::from_str(
            r#"{"data":[{"presignedContentUrl":"a/b.mp4","duration":12,"camera":"cam1"}]}"#,
        )
        .unwrap();

        let data = listing.data.unwrap();
        let rec = &data[0];
        assert_eq!(rec.path(), "a/b.mp4");
        assert_eq!(rec.metadata["duration"], 12);
        assert_eq!(rec.metadata["camera"], "cam1");

        let back = serde_json::to_value(rec).unwrap();
        assert_eq!(back["presignedContentUrl"], "a/b.mp4");
        assert_eq!(back["camera"], "cam1");
    }

    #[test]
    fn refusal_body_has_no_listing() {
        let listing: RecordingListing =
            serde_json::from_str(r#"{"success":false,"reason":"bad range"}"#).unwrap();
        assert!(listing.data.is_none());
    }

    #[test]
    fn entry_without_path_is_rejected() {
        let result: Result<RecordingListing, _> =
            serde_json::from_str(r#"{"data":[{"duration":12}]}"#);
        assert!(result.is_err());
    }
}
