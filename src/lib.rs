//! SAML 2.0 single-sign-on authentication provider.
//!
//! The provider consumes IdP authentication responses, enforces the
//! claim-based access policy, resolves or auto-imports the local user and
//! produces the session the legacy web application expects. Single logout
//! through the IdP is supported in both directions.

pub mod auth;
pub mod config;
pub mod db;
pub mod models;
#[cfg(feature = "cli")]
pub mod observability;
pub mod security_access;

#[cfg(test)]
mod tests;
