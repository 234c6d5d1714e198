use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// RFC 3339 timestamp newtype used for every wire-visible instant.
///
/// Ordering delegates to the inner [`DateTime<Utc>`], which is what the
/// pagination cursor and the client-side merge rely on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// Current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_serialization() {
        let dt = Utc.with_ymd_and_hms(2025, 3, 8, 14, 30, 0).unwrap();
        let timestamp = Timestamp(dt);
        let serialized = serde_json::to_string(&timestamp).unwrap();

        assert_eq!(serialized, "\"2025-03-08T14:30:00Z\"");
    }

    #[test]
    fn test_timestamp_deserialization() {
        let json_str = "\"2025-03-08T14:30:00Z\"";
        let deserialized: Timestamp = serde_json::from_str(json_str).unwrap();

        let expected_dt = Utc.with_ymd_and_hms(2025, 3, 8, 14, 30, 0).unwrap();
        assert_eq!(deserialized.0, expected_dt);
    }

    #[test]
    fn test_timestamp_ordering() {
        let earlier = Timestamp(Utc.with_ymd_and_hms(2025, 3, 8, 14, 30, 0).unwrap());
        let later = Timestamp(Utc.with_ymd_and_hms(2025, 3, 8, 14, 30, 1).unwrap());

        assert!(earlier < later);
        assert_eq!(earlier, earlier.clone());
    }
}
