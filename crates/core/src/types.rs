//! Identifiers shared by the hub and its HTTP surface.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Separator between the client id and the disambiguator in a rendered
/// [`SubscriptionId`].
pub const SUBSCRIPTION_ID_SEPARATOR: char = '_';

// ---------------------------------------------------------------------------
// ClientId
// ---------------------------------------------------------------------------

/// Opaque name of a logical subscriber.
///
/// One client may hold several open streams at once (one per browser tab).
/// The name must not be blank and must not contain line breaks or NUL,
/// since it ends up inside event stream `id:` lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientId(String);

impl ClientId {
    pub fn new(raw: impl Into<String>) -> Result<Self, CoreError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(CoreError::Validation("client id must not be empty".into()));
        }
        if raw.contains(|c: char| matches!(c, '\r' | '\n' | '\0')) {
            return Err(CoreError::Validation(
                "client id must not contain line breaks or NUL".into(),
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ClientId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClientId> for String {
    fn from(id: ClientId) -> Self {
        id.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// SubscriptionId
// ---------------------------------------------------------------------------

/// Identifier of one open stream: the owning client plus an increasing
/// disambiguator.
///
/// Rendered as `<client>_<disambiguator>` (e.g. `u1_1000`). Ordering is
/// structural: by client first, then numerically by disambiguator, so it
/// follows connection order for a given client regardless of digit count.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId {
    client_id: ClientId,
    disambiguator: u64,
}

impl SubscriptionId {
    pub fn new(client_id: ClientId, disambiguator: u64) -> Self {
        Self {
            client_id,
            disambiguator,
        }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn disambiguator(&self) -> u64 {
        self.disambiguator
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.client_id, SUBSCRIPTION_ID_SEPARATOR, self.disambiguator
        )
    }
}

impl FromStr for SubscriptionId {
    type Err = CoreError;

    /// Split on the last separator so client ids may themselves contain `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (client, suffix) = s.rsplit_once(SUBSCRIPTION_ID_SEPARATOR).ok_or_else(|| {
            CoreError::Validation(format!("subscription id '{s}' has no disambiguator"))
        })?;

        let disambiguator = suffix.parse::<u64>().map_err(|_| {
            CoreError::Validation(format!(
                "subscription id '{s}' has a non-numeric disambiguator"
            ))
        })?;

        Ok(Self::new(ClientId::new(client)?, disambiguator))
    }
}

impl Serialize for SubscriptionId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SubscriptionId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
