use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Kind of business a subscription belongs to
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    /// restaurant, receives orders
    Restaurante,
    /// lodging, receives reservations
    Hospedaje,
}

impl EntityType {
    /// wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restaurante => "RESTAURANTE",
            Self::Hospedaje => "HOSPEDAJE",
        }
    }
}

impl Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tenant's event stream a connection receives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    /// business id
    pub entity_id: String,
    /// business type
    pub entity_type: EntityType,
}

impl SubscriptionKey {
    /// Create a subscription key
    pub fn new<S: Into<String>>(entity_id: S, entity_type: EntityType) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_type,
        }
    }
}

impl Display for SubscriptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.entity_type, self.entity_id)
    }
}
