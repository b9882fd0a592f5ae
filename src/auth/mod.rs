//! SAML authentication: protocol client, provider and session plumbing.

mod claims;
pub mod client;
mod error;
mod legacy_session;
pub mod login_logger;
mod provider;
#[cfg(feature = "saml")]
pub mod saml;
pub mod session_store;
mod token;

pub use claims::Claims;
pub use client::{SamlClient, SamlClientFactory, SamlSettingsFormatter, SettingsFormatter};
pub use error::{AuthError, SsoAuthenticationError};
pub use legacy_session::{LegacySession, SessionUserInfo};
pub use login_logger::{LoginLogger, TracingLoginLogger};
pub use provider::{
    CompletedLogin, LOGOUT_RETURN_TO, LoginRequest, LogoutCallback, ProviderAuthentication,
    ProviderState, Redirect, SamlProvider,
};
#[cfg(feature = "saml")]
pub use saml::SamaelClientFactory;
pub use session_store::{MemorySessionStore, SamlSessionState, SessionError, SessionStore};
pub use token::{AuthenticationTokens, NewProviderToken, PROVIDER_TOKEN_LIFETIME_MINUTES};
