use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::{client::ClientError, session_store::SessionError};
use crate::{db::DbError, security_access::AccessDenied};

/// Errors raised by the SAML provider.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The protocol library rejected the SAML response
    #[error("Error while processing authentication response: {}", .0.join(", "))]
    ProcessAuthenticationResponse(Vec<String>),

    /// The SAML response is valid but the user is not authenticated
    #[error("User not authenticated")]
    UserNotAuthenticated,

    /// SP metadata failed self-validation
    #[error("Invalid SP metadata: {}", .0.join(", "))]
    InvalidMetadata(Vec<String>),

    /// The protocol library rejected the logout response
    #[error("Error while processing logout response: {}", .0.join(", "))]
    ProcessLogoutResponse(Vec<String>),

    #[error("SAML client error: {0}")]
    Client(#[from] ClientError),

    /// Roles mapping rejected the user
    #[error("ACL conditions not met: {0}")]
    AclConditions(String),

    /// Authentication conditions or groups mapping rejected the user
    #[error("Authentication conditions not met: {0}")]
    AuthenticationConditions(String),

    #[error("Invalid argument provided: {0}")]
    InvalidArgumentProvided(String),

    /// The configured user id attribute is missing or unusable
    #[error("Invalid user id attribute: {0}")]
    InvalidUserIdAttribute(String),

    #[error("Repository error: {0}")]
    Repository(#[from] DbError),

    #[error(transparent)]
    SsoAuthentication(#[from] SsoAuthenticationError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// User resolution failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SsoAuthenticationError {
    #[error("User '{0}' not found")]
    AliasNotFound(String),
}

impl From<AccessDenied> for AuthError {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::AuthenticationConditions(msg) => AuthError::AuthenticationConditions(msg),
            AccessDenied::AclConditions(msg) => AuthError::AclConditions(msg),
        }
    }
}

impl AuthError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::ProcessAuthenticationResponse(_) => "process_authentication_response",
            AuthError::UserNotAuthenticated => "user_not_authenticated",
            AuthError::InvalidMetadata(_) => "invalid_metadata",
            AuthError::ProcessLogoutResponse(_) => "process_logout_response",
            AuthError::Client(_) => "saml_client_error",
            AuthError::AclConditions(_) => "acl_conditions",
            AuthError::AuthenticationConditions(_) => "authentication_conditions",
            AuthError::InvalidArgumentProvided(_) => "invalid_argument_provided",
            AuthError::InvalidUserIdAttribute(_) => "invalid_user_id_attribute",
            AuthError::Repository(_) => "repository_error",
            AuthError::SsoAuthentication(_) => "sso_authentication",
            AuthError::Session(_) => "session_error",
            AuthError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::ProcessAuthenticationResponse(_)
            | AuthError::UserNotAuthenticated
            | AuthError::ProcessLogoutResponse(_)
            | AuthError::SsoAuthentication(_) => StatusCode::UNAUTHORIZED,
            AuthError::AclConditions(_) | AuthError::AuthenticationConditions(_) => {
                StatusCode::FORBIDDEN
            }
            AuthError::InvalidMetadata(_)
            | AuthError::Client(_)
            | AuthError::InvalidArgumentProvided(_)
            | AuthError::InvalidUserIdAttribute(_)
            | AuthError::Repository(_)
            | AuthError::Session(_)
            | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self.status() {
            StatusCode::UNAUTHORIZED => "authentication_error",
            StatusCode::FORBIDDEN => "permission_error",
            _ => "server_error",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

#[derive(Debug, Serialize)]
struct ErrorInfo {
    #[serde(rename = "type")]
    error_type: &'static str,
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Server-side details stay in the logs
        let message = if status.is_server_error() {
            "Authentication failed due to an internal error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            error: ErrorInfo {
                error_type: self.error_type(),
                code: self.code(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::not_authenticated(AuthError::UserNotAuthenticated, StatusCode::UNAUTHORIZED)]
    #[case::alias_not_found(
        AuthError::SsoAuthentication(SsoAuthenticationError::AliasNotFound("jdoe".into())),
        StatusCode::UNAUTHORIZED
    )]
    #[case::acl(AuthError::AclConditions("no role".into()), StatusCode::FORBIDDEN)]
    #[case::conditions(
        AuthError::AuthenticationConditions("no value".into()),
        StatusCode::FORBIDDEN
    )]
    #[case::repository(
        AuthError::Repository(DbError::Internal("down".into())),
        StatusCode::INTERNAL_SERVER_ERROR
    )]
    #[case::user_id(
        AuthError::InvalidUserIdAttribute("uid".into()),
        StatusCode::INTERNAL_SERVER_ERROR
    )]
    fn test_status_mapping(#[case] error: AuthError, #[case] status: StatusCode) {
        assert_eq!(error.into_response().status(), status);
    }

    #[test]
    fn test_display_joins_protocol_errors() {
        let error = AuthError::ProcessAuthenticationResponse(vec![
            "invalid_response".into(),
            "Signature validation failed".into(),
        ]);
        assert_eq!(
            error.to_string(),
            "Error while processing authentication response: invalid_response, Signature validation failed"
        );
    }

    #[test]
    fn test_alias_not_found_display() {
        let error: AuthError = SsoAuthenticationError::AliasNotFound("jdoe".into()).into();
        assert_eq!(error.to_string(), "User 'jdoe' not found");
        assert_eq!(error.code(), "sso_authentication");
    }

    #[test]
    fn test_access_denied_conversion() {
        let error: AuthError = AccessDenied::AclConditions("no role".into()).into();
        assert!(matches!(error, AuthError::AclConditions(msg) if msg == "no role"));
    }
}
