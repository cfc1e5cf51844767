//! Shared value types for the request pipeline.
//!
//! ## Overview
//!
//! [`Params`] carries the declared parameter shape of an endpoint, which is
//! also exposed as prefetch metadata. [`TransportKind`] is the closed set of
//! configurable transports; [`TransportRoute`] is the concrete backend a
//! descriptor is bound to once it has been finalized.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ConfigError;

/// A JSON object, used for arguments, option bags, and payloads.
pub type JsonMap = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Declared parameters
// ---------------------------------------------------------------------------

/// The parameter shape declared for an endpoint.
///
/// `List` names the accepted arguments; each defaults to an empty string.
/// `Map` pairs each argument with a default value. A default of the form
/// `{"required": true}` marks the argument as mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    /// Ordered sequence of parameter names.
    List(Vec<String>),
    /// Keyed mapping of parameter name to default value.
    Map(JsonMap),
}

impl Default for Params {
    fn default() -> Self {
        Self::Map(JsonMap::new())
    }
}

impl Params {
    /// Merges the `params` returned by a pre-hook into the declared shape.
    ///
    /// A declared list is replaced wholesale. A declared map is shallow-merged
    /// with the hook's keys taking precedence; when the hook returns a list,
    /// its names are added with an empty-string default unless already declared.
    pub fn merge_hook(&self, hook: Params) -> Params {
        match (self, hook) {
            (Params::List(_), hook) => hook,
            (Params::Map(declared), Params::Map(overrides)) => {
                let mut merged = declared.clone();
                merged.extend(overrides);
                Params::Map(merged)
            }
            (Params::Map(declared), Params::List(names)) => {
                let mut merged = declared.clone();
                for name in names {
                    merged
                        .entry(name)
                        .or_insert_with(|| Value::String(String::new()));
                }
                Params::Map(merged)
            }
        }
    }

    /// Default values for every non-required parameter.
    pub fn defaults(&self) -> JsonMap {
        match self {
            Params::List(names) => names
                .iter()
                .map(|name| (name.clone(), Value::String(String::new())))
                .collect(),
            Params::Map(map) => map
                .iter()
                .filter(|(_, value)| !is_required(value))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    /// Names of the parameters marked `{"required": true}`.
    pub fn required(&self) -> Vec<&str> {
        match self {
            Params::List(_) => Vec::new(),
            Params::Map(map) => map
                .iter()
                .filter(|(_, value)| is_required(value))
                .map(|(name, _)| name.as_str())
                .collect(),
        }
    }
}

fn is_required(value: &Value) -> bool {
    value.get("required").and_then(Value::as_bool) == Some(true)
}

// ---------------------------------------------------------------------------
// Transport selection
// ---------------------------------------------------------------------------

/// Transport names accepted in configuration.
pub const VALID_REQ_TYPES: &[&str] = &["platform", "wx", "http", "axios", "jsonp", "auto"];

/// The configurable transport kind of a client or endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// The host platform's native request API.
    Platform,
    /// A generic promise-style HTTP client.
    Http,
    /// POST over HTTP, every other verb over JSONP.
    Jsonp,
    /// Platform when a platform transport is registered, HTTP otherwise.
    /// An explicit `"auto"` never selects the JSONP route.
    Auto,
}

impl TransportKind {
    /// Binds this kind to a concrete route.
    ///
    /// `platform_available` decides what [`TransportKind::Auto`] becomes.
    pub fn resolve(self, platform_available: bool) -> TransportRoute {
        match self {
            TransportKind::Platform => TransportRoute::Platform,
            TransportKind::Http => TransportRoute::Http,
            TransportKind::Jsonp => TransportRoute::JsonpFallback,
            TransportKind::Auto if platform_available => TransportRoute::Platform,
            TransportKind::Auto => TransportRoute::Http,
        }
    }
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "platform" | "wx" => Ok(TransportKind::Platform),
            "http" | "axios" => Ok(TransportKind::Http),
            "jsonp" => Ok(TransportKind::Jsonp),
            "auto" => Ok(TransportKind::Auto),
            other => Err(ConfigError::InvalidReqType {
                req_type: other.to_string(),
            }),
        }
    }
}

/// The backend a finalized descriptor dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportRoute {
    /// Delegate to the platform transport.
    Platform,
    /// Delegate to the HTTP transport.
    Http,
    /// POST to the HTTP transport, everything else to the JSONP transport.
    JsonpFallback,
}

impl TransportRoute {
    /// Short name used in logs and errors.
    pub fn as_str(self) -> &'static str {
        match self {
            TransportRoute::Platform => "platform",
            TransportRoute::Http => "http",
            TransportRoute::JsonpFallback => "jsonp",
        }
    }
}

impl std::fmt::Display for TransportRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Time elapsed between `earlier` and `self`, clamped at zero when the
    /// wall clock moved backwards.
    pub fn duration_since(self, earlier: Timestamp) -> Duration {
        self.0
            .signed_duration_since(earlier.0)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
