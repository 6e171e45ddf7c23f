//! Correlation ID tracking and per-request context.

use std::fmt;
use std::str::FromStr;

use sigilforge_domain::UserId;
use uuid::Uuid;

/// Correlation ID for tracking requests across the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a new correlation ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Short format (first 8 characters) for logging.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl serde::Serialize for CorrelationId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for CorrelationId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        Ok(Self(Uuid::deserialize(deserializer)?))
    }
}

/// Who asked, and under which correlation id.
///
/// Passed explicitly into every use case call; nothing reads it from
/// task-local or global state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub correlation_id: CorrelationId,
    pub user_id: Option<UserId>,
}

impl RequestContext {
    pub fn new(correlation_id: CorrelationId, user_id: Option<UserId>) -> Self {
        Self {
            correlation_id,
            user_id,
        }
    }

    /// Context for work the engine starts on its own.
    pub fn system() -> Self {
        Self::default()
    }

    /// User id for log fields; `-` when anonymous.
    pub fn user_label(&self) -> String {
        self.user_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = CorrelationId::new();
        let id2 = CorrelationId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_short_format_is_8_chars() {
        let id = CorrelationId::new();
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn test_parse_round_trips_display() {
        let id = CorrelationId::new();
        let parsed: CorrelationId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<CorrelationId>().is_err());
    }

    #[test]
    fn test_serialize_deserialize() {
        let id1 = CorrelationId::new();
        let serialized = serde_json::to_string(&id1).unwrap();
        let id2: CorrelationId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_user_label() {
        assert_eq!(RequestContext::system().user_label(), "-");
        let user = UserId::new();
        let ctx = RequestContext::new(CorrelationId::new(), Some(user));
        assert_eq!(ctx.user_label(), user.to_string());
    }
}
