use crate::host::PageContext;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// When an entry stops being readable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    /// Unbounded lifetime
    #[default]
    Never,
    /// Expires at this epoch millisecond
    At(i64),
}

impl Expiry {
    /// Expiry `ttl` after `now_millis`
    pub fn after(now_millis: i64, ttl: Duration) -> Self {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self::At(now_millis.saturating_add(ttl_ms))
    }

    /// Live only while the expiration is strictly in the future
    pub fn is_live_at(&self, now_millis: i64) -> bool {
        match self {
            Self::Never => true,
            Self::At(at) => *at > now_millis,
        }
    }

    /// Milliseconds left, `None` for entries that never expire
    pub fn remaining_ms(&self, now_millis: i64) -> Option<i64> {
        match self {
            Self::Never => None,
            Self::At(at) => Some((*at - now_millis).max(0)),
        }
    }
}

// Never is stored as the largest finite double so index blobs stay
// compatible with writers that used it as the unbounded sentinel.
impl Serialize for Expiry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Never => serializer.serialize_f64(f64::MAX),
            Self::At(at) => serializer.serialize_i64(*at),
        }
    }
}

impl<'de> Deserialize<'de> for Expiry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<f64>::deserialize(deserializer)?;
        Ok(match raw {
            None => Self::At(0),
            Some(v) if v.is_nan() => Self::At(0),
            Some(v) if v >= i64::MAX as f64 => Self::Never,
            Some(v) => Self::At(v as i64),
        })
    }
}

/// Fully namespaced key as written to the backend:
/// `origin + path + '#' + fragment + '@' + logical key`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey(String);

impl CompositeKey {
    /// Namespace `logical_key` under the page, with an optional fragment
    /// override. An empty override falls back to the page fragment.
    pub fn new(page: &PageContext, fragment: Option<&str>, logical_key: &str) -> Self {
        let fragment = fragment
            .filter(|f| !f.is_empty())
            .unwrap_or(&page.fragment);
        Self(format!(
            "{}{}#{}@{}",
            page.origin, page.path, fragment, logical_key
        ))
    }

    /// Wrap an already composed key
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Logical key portion, everything after the last `@`
    pub fn logical_key(&self) -> &str {
        logical_key_of(&self.0)
    }
}

/// Logical key portion of a raw composite key
pub fn logical_key_of(composite: &str) -> &str {
    composite
        .rsplit_once('@')
        .map_or(composite, |(_, logical)| logical)
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Statistics for a store
#[derive(Debug, Default, Clone, Serialize)]
pub struct StashStats {
    /// Number of GET operations
    pub gets: u64,
    /// Number of SET operations
    pub sets: u64,
    /// Number of REMOVE operations
    pub removes: u64,
    /// Reads that returned a live value
    pub hits: u64,
    /// Reads that found nothing
    pub misses: u64,
    /// Reads that found an expired entry
    pub expired: u64,
}

impl StashStats {
    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_strictly_greater() {
        assert!(Expiry::At(1001).is_live_at(1000));
        assert!(!Expiry::At(1000).is_live_at(1000));
        assert!(!Expiry::At(999).is_live_at(1000));
        assert!(Expiry::Never.is_live_at(i64::MAX));
    }

    #[test]
    fn test_expiry_after_and_remaining() {
        let expiry = Expiry::after(1_000, Duration::from_secs(10));
        assert_eq!(expiry, Expiry::At(11_000));
        assert_eq!(expiry.remaining_ms(4_000), Some(7_000));
        assert_eq!(expiry.remaining_ms(20_000), Some(0));
        assert_eq!(Expiry::Never.remaining_ms(0), None);
    }

    #[test]
    fn test_expiry_wire_format() {
        assert_eq!(serde_json::to_string(&Expiry::At(42)).unwrap(), "42");
        assert_eq!(
            serde_json::to_string(&Expiry::Never).unwrap(),
            "1.7976931348623157e+308"
        );

        let never: Expiry = serde_json::from_str("1.7976931348623157e+308").unwrap();
        assert_eq!(never, Expiry::Never);

        let never: Expiry = serde_json::from_str("1.7976931348623157e308").unwrap();
        assert_eq!(never, Expiry::Never);
        let at: Expiry = serde_json::from_str("1700000000000").unwrap();
        assert_eq!(at, Expiry::At(1_700_000_000_000));
        let null: Expiry = serde_json::from_str("null").unwrap();
        assert!(!null.is_live_at(0));
    }

    #[test]
    fn test_composite_key_layout() {
        let page = PageContext::new("example.com", "/app", "main");
        let key = CompositeKey::new(&page, None, "theme");
        assert_eq!(key.as_str(), "example.com/app#main@theme");
        assert_eq!(key.logical_key(), "theme");

        let other = CompositeKey::new(&page, Some("sidebar"), "theme");
        assert_eq!(other.as_str(), "example.com/app#sidebar@theme");

        let fallback = CompositeKey::new(&page, Some(""), "theme");
        assert_eq!(fallback, key);
    }

    #[test]
    fn test_logical_key_after_last_at() {
        assert_eq!(logical_key_of("h/p#f@user@mail"), "mail");
        assert_eq!(logical_key_of("no-delimiter"), "no-delimiter");
    }

    #[test]
    fn test_hit_rate() {
        let stats = StashStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(StashStats::default().hit_rate(), 0.0);
    }
}
