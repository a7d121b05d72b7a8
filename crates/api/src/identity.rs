//! Caller identity extracted from request headers.
//!
//! Authentication happens upstream; this service trusts the identity headers
//! set by the gateway in front of it.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::EntityId;

use crate::error::ApiError;

pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";
pub const HOST_ID_HEADER: &str = "x-host-id";
pub const HOST_VERIFIED_HEADER: &str = "x-host-verified";

/// The customer making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomerIdentity(pub EntityId);

/// A host whose account has been verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedHostIdentity(pub EntityId);

impl<S: Send + Sync> FromRequestParts<S> for CustomerIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_id(parts, CUSTOMER_ID_HEADER).map(Self)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for VerifiedHostIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let host_id = header_id(parts, HOST_ID_HEADER)?;
        let verified = parts
            .headers
            .get(HOST_VERIFIED_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
        if !verified {
            return Err(ApiError::Unauthorized(format!(
                "Host (id: {host_id}) is not verified"
            )));
        }
        Ok(Self(host_id))
    }
}

fn header_id(parts: &Parts, name: &str) -> Result<EntityId, ApiError> {
    let value = parts
        .headers
        .get(name)
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {name} header")))?;
    value
        .to_str()
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .ok_or_else(|| ApiError::Unauthorized(format!("Invalid {name} header")))
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/order");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_customer_identity_from_header() {
        let id = EntityId::new();
        let mut parts = parts(&[(CUSTOMER_ID_HEADER, id.to_string().as_str())]);
        let identity = CustomerIdentity::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(identity, CustomerIdentity(id));
    }

    #[tokio::test]
    async fn test_customer_identity_rejects_missing_or_invalid() {
        let mut missing = parts(&[]);
        assert!(matches!(
            CustomerIdentity::from_request_parts(&mut missing, &()).await,
            Err(ApiError::Unauthorized(_))
        ));

        let mut invalid = parts(&[(CUSTOMER_ID_HEADER, "jane")]);
        assert!(matches!(
            CustomerIdentity::from_request_parts(&mut invalid, &()).await,
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_host_identity_requires_verification() {
        let id = EntityId::new().to_string();

        let mut unverified = parts(&[(HOST_ID_HEADER, id.as_str())]);
        assert!(
            VerifiedHostIdentity::from_request_parts(&mut unverified, &())
                .await
                .is_err()
        );

        let mut verified = parts(&[(HOST_ID_HEADER, id.as_str()), (HOST_VERIFIED_HEADER, "true")]);
        let identity = VerifiedHostIdentity::from_request_parts(&mut verified, &())
            .await
            .unwrap();
        assert_eq!(identity.0.to_string(), id);
    }
}
