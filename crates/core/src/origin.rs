//! Origin validation for inbound cross-frame messages.
//!
//! An origin is the `scheme://host[:port]` triple a browser attaches to every
//! `postMessage` event. Validation is a whitelist lookup: a message is accepted
//! only when its declared origin is allowed for the activity being embedded and
//! the deployment has not explicitly distrusted it. Each message is judged on
//! its own; a rejection never taints later messages from the same frame.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::{Activity, ActivityId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OriginError {
    #[error("origin is empty")]
    Empty,

    #[error("invalid origin {raw:?}: {reason}")]
    Invalid { raw: String, reason: String },

    #[error("origin {0:?} is opaque and can never be trusted")]
    Opaque(String),
}

/// Why an inbound message was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OriginRejection {
    #[error("declared origin could not be parsed: {0}")]
    Unparseable(#[source] OriginError),

    #[error("origin {0} is distrusted by this deployment")]
    Distrusted(Origin),

    #[error("origin {origin} is not allowed to embed activity {activity}")]
    NotAllowed { origin: Origin, activity: ActivityId },
}

//
// ─── ORIGIN ────────────────────────────────────────────────────────────────────
//

/// A normalized web origin, e.g. `https://content.example.org`.
///
/// Default ports are dropped and the host is lowercased, so two spellings of
/// the same origin compare equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Origin(String);

impl Origin {
    /// Parse and normalize an origin string.
    ///
    /// # Errors
    ///
    /// Returns `OriginError` when the input is empty, not a URL, or has an
    /// opaque origin (`null`, `data:`, `file:`).
    pub fn parse(raw: &str) -> Result<Self, OriginError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(OriginError::Empty);
        }

        let url = Url::parse(trimmed).map_err(|e| OriginError::Invalid {
            raw: trimmed.to_owned(),
            reason: e.to_string(),
        })?;

        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(OriginError::Opaque(trimmed.to_owned()));
        }

        Ok(Self(origin.ascii_serialization()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Origin({})", self.0)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Origin {
    type Error = OriginError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Origin> for String {
    fn from(value: Origin) -> Self {
        value.0
    }
}

//
// ─── POLICY ────────────────────────────────────────────────────────────────────
//

/// Deployment-wide origin table: `origin -> trust-for-embedding`.
///
/// Activities that list their own allowed origins are checked against that
/// list; activities with an empty list fall back to every origin trusted here.
/// An origin mapped to `false` is refused even when an activity lists it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginPolicy {
    trust: BTreeMap<Origin, bool>,
}

impl OriginPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a policy from already-parsed entries.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (Origin, bool)>) -> Self {
        Self {
            trust: entries.into_iter().collect(),
        }
    }

    /// Record whether `origin` may embed content.
    #[must_use]
    pub fn with(mut self, origin: Origin, trusted: bool) -> Self {
        self.trust.insert(origin, trusted);
        self
    }

    /// Origins this deployment trusts for embedding.
    pub fn trusted(&self) -> impl Iterator<Item = &Origin> {
        self.trust
            .iter()
            .filter_map(|(origin, trusted)| trusted.then_some(origin))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trust.is_empty()
    }

    /// Judge a single inbound message's declared origin against `activity`.
    ///
    /// # Errors
    ///
    /// Returns `OriginRejection` when the message must be dropped.
    pub fn validate(&self, declared: &str, activity: &Activity) -> Result<Origin, OriginRejection> {
        let origin = Origin::parse(declared).map_err(OriginRejection::Unparseable)?;

        match self.trust.get(&origin) {
            Some(false) => return Err(OriginRejection::Distrusted(origin)),
            Some(true) if activity.allowed_origins().is_empty() => return Ok(origin),
            _ => {}
        }

        if activity.allowed_origins().contains(&origin) {
            Ok(origin)
        } else {
            Err(OriginRejection::NotAllowed {
                origin,
                activity: activity.id(),
            })
        }
    }
}
