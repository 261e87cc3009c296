// src/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open range of log offsets `[start, end)` fetched together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchRange {
    pub start: u64,
    pub end: u64,
}

impl BatchRange {
    /// Range of `size` offsets beginning at `start`
    pub fn new(start: u64, size: u64) -> Self {
        Self {
            start,
            end: start.saturating_add(size),
        }
    }

    /// Number of offsets covered by this range
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Remainder of this range after the first `consumed` offsets
    pub fn remainder(&self, consumed: u64) -> Option<BatchRange> {
        let start = self.start.saturating_add(consumed);
        (start < self.end).then_some(BatchRange {
            start,
            end: self.end,
        })
    }
}

impl fmt::Display for BatchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Single entry from a CT log's get-entries endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLogEntry {
    /// base64-encoded leaf payload
    #[serde(rename = "leaf_input")]
    pub encoded_leaf: String,
    /// base64-encoded certificate chain, kept for traceability
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extra_data: String,
}

impl RawLogEntry {
    pub fn new(encoded_leaf: impl Into<String>) -> Self {
        Self {
            encoded_leaf: encoded_leaf.into(),
            extra_data: String::new(),
        }
    }
}

/// Response wrapper for get-entries endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct GetEntriesResponse {
    pub entries: Vec<RawLogEntry>,
}

/// Response from CT log's get-sth endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTreeHead {
    pub tree_size: u64,
    pub timestamp: u64,
    pub sha256_root_hash: String,
    #[serde(default)]
    pub tree_head_signature: String,
}

/// Identity fields pulled out of a successfully parsed certificate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedIdentity {
    pub common_name: String,
    pub subject_alt_names: Vec<String>,
    /// SHA-256 of the certificate payload, hex encoded
    #[serde(default)]
    pub fingerprint: String,
}

impl DecodedIdentity {
    pub fn new(common_name: impl Into<String>, subject_alt_names: Vec<String>) -> Self {
        Self {
            common_name: common_name.into(),
            subject_alt_names,
            fingerprint: String::new(),
        }
    }

    /// Common name first, then alternative names, in certificate order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.common_name.as_str())
            .filter(|cn| !cn.is_empty())
            .chain(self.subject_alt_names.iter().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.common_name.is_empty() && self.subject_alt_names.is_empty()
    }
}

/// A log entry whose identity matched at least one watched zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Absolute log index of the entry
    pub index: u64,

    /// Names from the certificate that matched a zone (never empty)
    pub matched_names: Vec<String>,

    pub common_name: String,

    pub subject_alt_names: Vec<String>,

    pub fingerprint: String,

    /// Unix timestamp when the match was produced
    pub discovered_at: i64,

    pub source_entry: RawLogEntry,
}

impl MatchResult {
    /// Build a result, or `None` when nothing matched
    pub fn new(
        index: u64,
        source_entry: RawLogEntry,
        identity: DecodedIdentity,
        matched_names: Vec<String>,
    ) -> Option<Self> {
        if matched_names.is_empty() {
            return None;
        }

        Some(Self {
            index,
            matched_names,
            common_name: identity.common_name,
            subject_alt_names: identity.subject_alt_names,
            fingerprint: identity.fingerprint,
            discovered_at: chrono::Utc::now().timestamp(),
            source_entry,
        })
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[+] Match at {}: {}", self.index, self.matched_names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_range_new_and_len() {
        let range = BatchRange::new(1000, 500);
        assert_eq!(range.start, 1000);
        assert_eq!(range.end, 1500);
        assert_eq!(range.len(), 500);
        assert!(!range.is_empty());
        assert_eq!(range.to_string(), "[1000, 1500)");
    }

    #[test]
    fn test_batch_range_remainder() {
        let range = BatchRange::new(0, 100);
        assert_eq!(range.remainder(40), Some(BatchRange { start: 40, end: 100 }));
        assert_eq!(range.remainder(100), None);
        assert_eq!(range.remainder(250), None);
    }

    #[test]
    fn test_deserialize_get_entries_response() {
        let json = r#"{
            "entries": [
                {"leaf_input": "AAAA", "extra_data": "BBBB"},
                {"leaf_input": "CCCC"}
            ]
        }"#;

        let response: GetEntriesResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.entries.len(), 2);
        assert_eq!(response.entries[0].encoded_leaf, "AAAA");
        assert_eq!(response.entries[0].extra_data, "BBBB");
        assert_eq!(response.entries[1].extra_data, "");
    }

    #[test]
    fn test_deserialize_entries_missing_leaf_is_error() {
        let json = r#"{"entries": [{"extra_data": "BBBB"}]}"#;
        let result: Result<GetEntriesResponse, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_identity_names_order() {
        let identity = DecodedIdentity::new(
            "www.example.com",
            vec!["example.com".to_string(), "api.example.org".to_string()],
        );

        let names: Vec<&str> = identity.names().collect();
        assert_eq!(names, vec!["www.example.com", "example.com", "api.example.org"]);
    }

    #[test]
    fn test_identity_names_skip_empty_cn() {
        let identity = DecodedIdentity::new("", vec!["example.com".to_string()]);
        let names: Vec<&str> = identity.names().collect();
        assert_eq!(names, vec!["example.com"]);
        assert!(!identity.is_empty());
        assert!(DecodedIdentity::default().is_empty());
    }

    #[test]
    fn test_match_result_requires_names() {
        let entry = RawLogEntry::new("AAAA");
        let identity = DecodedIdentity::new("example.com", vec![]);

        assert!(MatchResult::new(7, entry.clone(), identity.clone(), vec![]).is_none());

        let result = MatchResult::new(7, entry, identity, vec!["example.com".to_string()]).unwrap();
        assert_eq!(result.index, 7);
        assert_eq!(result.to_string(), "[+] Match at 7: example.com");
    }
}
