//! Coordinator options.
//!
//! Nothing is required. Unknown keys are kept in [`Options::extra`] and passed
//! through untouched.
//!
//! ```rust
//! use std::time::Duration;
//! use murmur::Options;
//!
//! let from_code = Options::new().timeout(Duration::from_secs(2)).batch_concurrency(8);
//! let from_json = Options::from_json(r#"{"timeout_ms": 2000, "batch_concurrency": 8}"#).unwrap();
//! assert_eq!(from_code, from_json);
//! ```

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Options {
    /// Per-dispatch stall limit. Unset means a stalled chain waits forever.
    #[serde(rename = "timeout_ms", deserialize_with = "millis")]
    timeout: Option<Duration>,

    /// Cap on in-flight items of one batch. Unset means all at once.
    batch_concurrency: Option<NonZeroUsize>,

    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// `0` lifts the cap.
    pub fn batch_concurrency(mut self, limit: usize) -> Self {
        self.batch_concurrency = NonZeroUsize::new(limit);
        self
    }

    /// Stores an arbitrary key for whoever reads the options later.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn timeout_limit(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn concurrency_limit(&self) -> Option<NonZeroUsize> {
        self.batch_concurrency
    }

    pub fn extras(&self) -> &Map<String, Value> {
        &self.extra
    }
}

fn millis<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
    Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
}
