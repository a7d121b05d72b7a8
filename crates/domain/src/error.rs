//! Domain error types.

use document_store::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::order::OrderError;

/// Error category shared by every layer, from repositories up to HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// A referenced customer, host, order or item does not exist.
    EntityNotFound,
    /// Persistence failures and business rejections such as an unserviceable route.
    InternalError,
    /// Malformed input.
    ValidationError,
    /// The entity is not in a state that allows the operation.
    Conflict,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::EntityNotFound => "ENTITY_NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::Conflict => "CONFLICT",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured error propagated by repositories, ports and use cases.
///
/// `context` carries machine-readable details such as the IDs involved.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[error("{code}: {message}")]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub context: Value,
}

impl DomainError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: Value::Null,
        }
    }

    /// Attaches machine-readable context.
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EntityNotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::EntityNotFound
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::WriteConflict { collection, id } => {
                DomainError::conflict(err.to_string())
                    .with_context(json!({ "collection": collection, "id": id }))
            }
            StoreError::DuplicateKey { collection, id } => DomainError::internal(err.to_string())
                .with_context(json!({ "collection": collection, "id": id })),
            _ => DomainError::internal(err.to_string()),
        }
    }
}

impl From<OrderError> for DomainError {
    fn from(err: OrderError) -> Self {
        let code = match &err {
            OrderError::ItemNotFound { .. } => ErrorCode::EntityNotFound,
            OrderError::NoItems | OrderError::InvalidWeight { .. } => ErrorCode::ValidationError,
            _ => ErrorCode::Conflict,
        };
        let context = match &err {
            OrderError::ItemNotFound { item_id } | OrderError::ItemAlreadyReceived { item_id } => {
                json!({ "item_id": item_id })
            }
            _ => Value::Null,
        };
        DomainError::new(code, err.to_string()).with_context(context)
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::internal(format!("Serialization error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use common::EntityId;

    use super::*;
    use crate::OrderStatus;

    #[test]
    fn test_error_code_serializes_screaming_snake_case() {
        assert_eq!(
            serde_json::to_value(ErrorCode::EntityNotFound).unwrap(),
            json!("ENTITY_NOT_FOUND")
        );
        assert_eq!(ErrorCode::InternalError.to_string(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_display_includes_code_and_message() {
        let err = DomainError::not_found("Customer (id: 1) not found");
        assert_eq!(err.to_string(), "ENTITY_NOT_FOUND: Customer (id: 1) not found");
    }

    #[test]
    fn test_write_conflict_maps_to_conflict() {
        let id = EntityId::new();
        let err: DomainError = StoreError::WriteConflict {
            collection: "orders".to_string(),
            id,
        }
        .into();
        assert_eq!(err.code, ErrorCode::Conflict);
        assert_eq!(err.context["id"], json!(id));
    }

    #[test]
    fn test_other_store_errors_are_internal() {
        let err: DomainError = StoreError::SessionClosed.into();
        assert_eq!(err.code, ErrorCode::InternalError);
    }

    #[test]
    fn test_order_error_mapping() {
        let item_id = EntityId::new();
        let err: DomainError = OrderError::ItemNotFound { item_id }.into();
        assert_eq!(err.code, ErrorCode::EntityNotFound);
        assert_eq!(err.context["item_id"], json!(item_id));

        let err: DomainError = OrderError::InvalidStateTransition {
            current_status: OrderStatus::Paid,
            action: "confirm",
        }
        .into();
        assert_eq!(err.code, ErrorCode::Conflict);

        let err: DomainError = OrderError::NoItems.into();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
