//! Temporal slices: validity intervals for entity property sets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Snapshot of an entity's properties over a validity interval.
/// `valid_until = None` marks the current (open) slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalSlice {
    pub entity_uri: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub properties: BTreeMap<String, Value>,
}

impl TemporalSlice {
    pub fn is_current(&self) -> bool {
        self.valid_until.is_none()
    }

    /// Two slices overlap iff they describe the same entity and their
    /// validity intervals intersect. Open slices extend to infinity.
    pub fn overlaps(&self, other: &TemporalSlice) -> bool {
        if self.entity_uri != other.entity_uri {
            return false;
        }
        let self_ends_before = match self.valid_until {
            Some(end) => end <= other.valid_from,
            None => false,
        };
        let other_ends_before = match other.valid_until {
            Some(end) => end <= self.valid_from,
            None => false,
        };
        !self_ends_before && !other_ends_before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn slice(entity: &str, from_h: i64, until_h: Option<i64>) -> TemporalSlice {
        let base = Utc::now();
        TemporalSlice {
            entity_uri: entity.to_string(),
            valid_from: base + Duration::hours(from_h),
            valid_until: until_h.map(|h| base + Duration::hours(h)),
            properties: BTreeMap::new(),
        }
    }

    #[test]
    fn open_slice_is_current() {
        assert!(slice("entity:1", 0, None).is_current());
        assert!(!slice("entity:1", 0, Some(1)).is_current());
    }

    #[test]
    fn overlapping_intervals_detected() {
        let a = slice("entity:1", 0, Some(2));
        let b = slice("entity:1", 1, Some(3));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn disjoint_intervals_do_not_overlap() {
        let a = slice("entity:1", 0, Some(1));
        let b = slice("entity:1", 2, Some(3));
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn different_entities_never_overlap() {
        let a = slice("entity:1", 0, Some(2));
        let b = slice("entity:2", 0, Some(2));
        assert!(!a.overlaps(&b));
    }
}
