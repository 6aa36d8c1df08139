//! Host environment
//!
//! The page location and wall clock the store namespaces and expires
//! against, injected so the store runs without a real browser host.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use url::Url;

/// Location of the page the store serves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    /// Hostname, without scheme or port
    pub origin: String,
    /// Path, starting with `/`
    pub path: String,
    /// Fragment identifier without the leading `#`
    pub fragment: String,
}

impl PageContext {
    pub fn new(
        origin: impl Into<String>,
        path: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        Self {
            origin: origin.into(),
            path: path.into(),
            fragment: fragment.into(),
        }
    }

    /// Build from a page URL such as `https://example.com/app/#settings`
    pub fn from_url(url: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(url)?;
        Ok(Self {
            origin: parsed.host_str().unwrap_or_default().to_string(),
            path: parsed.path().to_string(),
            fragment: parsed.fragment().unwrap_or_default().to_string(),
        })
    }

    /// Same page, different fragment
    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = fragment.into();
        self
    }
}

/// Wall clock in epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// System time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let by_ms = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(by_ms))
            });
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
