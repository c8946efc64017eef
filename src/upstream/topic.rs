//! The fixed upstream topic

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::error::TopicError;

/// Longest topic name the MQTT wire format can carry
const MAX_TOPIC_LEN: usize = 65_535;

/// Name of the broker topic carrying telemetry.
///
/// Validated once at construction and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic(Arc<str>);

impl Topic {
    pub fn new(name: impl Into<String>) -> Result<Self, TopicError> {
        let name = name.into();

        if name.is_empty() {
            return Err(TopicError::Empty);
        }
        if name.len() > MAX_TOPIC_LEN {
            return Err(TopicError::TooLong(name.len()));
        }
        if name.contains(['+', '#']) {
            return Err(TopicError::Wildcard(name));
        }
        if name.contains('\0') {
            return Err(TopicError::Nul(name));
        }

        Ok(Self(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Topic {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::new(s)
    }
}
