//! Request and response DTOs

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Response to a batch submission: orchestration continues in the background.
#[derive(Serialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub folder: String,
}

fn default_include_merged() -> bool {
    true
}

/// Browser clients send the flag as `0`/`1`; accept the boolean spellings too.
fn flag_from_query<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(serde::de::Error::invalid_value(
            serde::de::Unexpected::Str(other),
            &"0, 1, true or false",
        )),
    }
}

/// Query parameters for the archive download.
#[derive(Deserialize)]
pub struct DownloadQuery {
    /// When false, the combined-document entry is stripped from the archive.
    #[serde(
        default = "default_include_merged",
        deserialize_with = "flag_from_query"
    )]
    pub include_merged: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::Uri;

    fn parse(uri: &str) -> Result<DownloadQuery, ()> {
        let uri: Uri = uri.parse().unwrap();
        Query::<DownloadQuery>::try_from_uri(&uri)
            .map(|Query(query)| query)
            .map_err(|_| ())
    }

    #[test]
    fn test_include_merged_accepts_numeric_flags() {
        assert!(!parse("/download?include_merged=0").unwrap().include_merged);
        assert!(parse("/download?include_merged=1").unwrap().include_merged);
    }

    #[test]
    fn test_include_merged_accepts_boolean_spellings() {
        assert!(!parse("/download?include_merged=false").unwrap().include_merged);
        assert!(parse("/download?include_merged=true").unwrap().include_merged);
    }

    #[test]
    fn test_include_merged_defaults_to_true() {
        assert!(parse("/download").unwrap().include_merged);
    }

    #[test]
    fn test_include_merged_rejects_other_values() {
        assert!(parse("/download?include_merged=maybe").is_err());
    }
}
