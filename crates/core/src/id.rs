//! Stream identity used across the domain.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identity of an event stream: an opaque, type-prefixed entity key.
///
/// The canonical form is `<entity_type>-<entity_key>`, e.g. `car-1` or
/// `spot-l2-17`. The entity type is everything before the first `-`; the key
/// is everything after it and may itself contain dashes.
///
/// One stream holds the ordered, append-only event history of exactly one
/// aggregate instance, so this type doubles as the aggregate identity in
/// envelopes, checkpoints, and per-stream locks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamName(String);

impl StreamName {
    /// Build a stream name from its entity type and entity key.
    pub fn from_parts(entity_type: &str, entity_key: &str) -> Result<Self, DomainError> {
        if entity_type.is_empty() {
            return Err(DomainError::invalid_id("entity type must not be empty"));
        }
        if entity_type.contains('-') || entity_type.contains(char::is_whitespace) {
            return Err(DomainError::invalid_id(format!(
                "entity type '{entity_type}' must not contain dashes or whitespace"
            )));
        }
        if entity_key.is_empty() || entity_key.contains(char::is_whitespace) {
            return Err(DomainError::invalid_id(
                "entity key must be non-empty and free of whitespace",
            ));
        }
        Ok(Self(format!("{entity_type}-{entity_key}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The type prefix (`car` for `car-1`).
    pub fn entity_type(&self) -> &str {
        match self.0.split_once('-') {
            Some((prefix, _)) => prefix,
            None => &self.0,
        }
    }

    /// The entity key (`1` for `car-1`).
    pub fn entity_key(&self) -> &str {
        match self.0.split_once('-') {
            Some((_, key)) => key,
            None => "",
        }
    }
}

impl core::fmt::Display for StreamName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for StreamName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (entity_type, entity_key) = s
            .split_once('-')
            .ok_or_else(|| DomainError::invalid_id(format!("'{s}' is not type-prefixed")))?;
        Self::from_parts(entity_type, entity_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_builds_canonical_form() {
        let stream = StreamName::from_parts("car", "1").unwrap();
        assert_eq!(stream.as_str(), "car-1");
        assert_eq!(stream.entity_type(), "car");
        assert_eq!(stream.entity_key(), "1");
    }

    #[test]
    fn entity_key_may_contain_dashes() {
        let stream = StreamName::from_parts("spot", "l2-17").unwrap();
        assert_eq!(stream.entity_type(), "spot");
        assert_eq!(stream.entity_key(), "l2-17");
    }

    #[test]
    fn rejects_empty_or_malformed_parts() {
        assert!(StreamName::from_parts("", "1").is_err());
        assert!(StreamName::from_parts("car", "").is_err());
        assert!(StreamName::from_parts("parking-spot", "1").is_err());
        assert!(StreamName::from_parts("car", "a key").is_err());
    }

    #[test]
    fn parses_round_trip() {
        let stream: StreamName = "car-42".parse().unwrap();
        assert_eq!(stream, StreamName::from_parts("car", "42").unwrap());
        assert!("car".parse::<StreamName>().is_err());
    }
}
