//! Capability traits shared by entities and events.

use common::EntityId;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Trait for persisted entities.
///
/// An entity has an identity and can be turned into a plain JSON record and
/// back. Repositories store the record as a document keyed by [`Entity::id`].
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    /// Returns the entity type name, used in error messages.
    fn entity_type() -> &'static str;

    /// Returns the entity's unique identifier.
    fn id(&self) -> EntityId;

    /// Serializes the entity to a plain record.
    fn to_record(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Rebuilds the entity from a plain record.
    fn from_record(record: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(record)
    }
}

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the dotted event name, e.g. `order.drafted`.
    fn event_type(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: EntityId,
        name: String,
    }

    impl Entity for Widget {
        fn entity_type() -> &'static str {
            "Widget"
        }

        fn id(&self) -> EntityId {
            self.id
        }
    }

    #[test]
    fn test_record_round_trip() {
        let widget = Widget {
            id: EntityId::new(),
            name: "gear".to_string(),
        };
        let record = widget.to_record().unwrap();
        assert_eq!(record["name"], "gear");
        assert_eq!(Widget::from_record(record).unwrap(), widget);
    }
}
