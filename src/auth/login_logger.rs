//! Login audit trail.

use serde_json::Value as JsonValue;

/// Messages recorded in the login audit trail.
pub mod login_events {
    pub const AUTH_RESPONSE_ERROR: &str = "Error while processing SAML authentication response";
    pub const USER_NOT_AUTHENTICATED: &str = "User not authenticated";
    pub const INVALID_METADATA: &str = "Invalid SP metadata";
    pub const USER_INFORMATION: &str = "User information";
    pub const USER_ID_ATTRIBUTE_MISSING: &str = "User id attribute not found in SAML attributes";
    pub const AUTHENTICATION_CONDITIONS: &str = "Authentication conditions not met";
    pub const ACL_CONDITIONS: &str = "ACL conditions not met";
    pub const AUTHENTICATED: &str = "Authenticated successfully";
    pub const AUTO_IMPORT: &str = "Start auto import";
    pub const AUTO_IMPORT_DONE: &str = "User imported";
    pub const LOGOUT: &str = "Logout requested";
    pub const LOGOUT_RESPONSE_ERROR: &str = "Error while processing SAML logout response";
}

/// Sink for login audit records.
pub trait LoginLogger: Send + Sync {
    fn info(&self, provider: &str, message: &str, context: Option<&JsonValue>);

    fn error(&self, provider: &str, message: &str, context: Option<&JsonValue>);
}

/// Emits login records as `tracing` events on the `login` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLoginLogger;

impl LoginLogger for TracingLoginLogger {
    fn info(&self, provider: &str, message: &str, context: Option<&JsonValue>) {
        match context {
            Some(context) => {
                tracing::info!(target: "login", provider, context = %context, "{message}")
            }
            None => tracing::info!(target: "login", provider, "{message}"),
        }
    }

    fn error(&self, provider: &str, message: &str, context: Option<&JsonValue>) {
        match context {
            Some(context) => {
                tracing::error!(target: "login", provider, context = %context, "{message}")
            }
            None => tracing::error!(target: "login", provider, "{message}"),
        }
    }
}
