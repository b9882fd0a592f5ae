//! Protocol client seam.
//!
//! The provider never talks to the SAML library directly: it formats its
//! configuration into [`ClientSettings`] and asks a [`SamlClientFactory`]
//! for a fresh [`SamlClient`] per operation.

use chrono::{DateTime, Utc};

use super::claims::Claims;
use crate::config::{AuthnContextComparison, SamlCustomConfiguration};

/// Path of the SP metadata endpoint, relative to the SP base URL.
pub const SP_METADATA_PATH: &str = "/api/latest/saml/metadata";
/// Path of the Assertion Consumer Service, relative to the SP base URL.
pub const SP_ACS_PATH: &str = "/api/latest/saml/acs";
/// Path of the Single Logout Service, relative to the SP base URL.
pub const SP_SLS_PATH: &str = "/api/latest/saml/sls";

const DEFAULT_NAME_ID_FORMAT: &str = "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid client settings: {0}")]
    Settings(String),

    #[error("Invalid metadata: {0}")]
    Metadata(String),

    #[error("Failed to sign request: {0}")]
    Signing(String),

    #[error("Failed to encode request: {0}")]
    Encoding(String),
}

/// Settings handed to the protocol library.
#[derive(Clone)]
pub struct ClientSettings {
    pub idp_entity_id: String,
    pub idp_sso_url: String,
    pub idp_slo_url: Option<String>,
    /// IdP certificate (PEM or bare base64)
    pub idp_certificate: String,
    pub sp_entity_id: String,
    pub sp_acs_url: String,
    pub sp_sls_url: String,
    pub sp_private_key: Option<String>,
    pub sp_certificate: Option<String>,
    pub sign_requests: bool,
    pub name_id_format: String,
    pub requested_authn_context: Option<RequestedAuthnContextSettings>,
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("idp_entity_id", &self.idp_entity_id)
            .field("idp_sso_url", &self.idp_sso_url)
            .field("idp_slo_url", &self.idp_slo_url)
            .field("sp_entity_id", &self.sp_entity_id)
            .field("sp_acs_url", &self.sp_acs_url)
            .field("sp_sls_url", &self.sp_sls_url)
            .field("sp_private_key", &self.sp_private_key.as_ref().map(|_| "****"))
            .field("sign_requests", &self.sign_requests)
            .field("name_id_format", &self.name_id_format)
            .field("requested_authn_context", &self.requested_authn_context)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedAuthnContextSettings {
    pub class_ref: String,
    pub comparison: AuthnContextComparison,
}

/// Turns the provider configuration into client settings.
pub trait SettingsFormatter: Send + Sync {
    fn format(&self, config: &SamlCustomConfiguration) -> Result<ClientSettings, ClientError>;
}

/// Derives SP endpoints from `sp_base_url`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SamlSettingsFormatter;

impl SettingsFormatter for SamlSettingsFormatter {
    fn format(&self, config: &SamlCustomConfiguration) -> Result<ClientSettings, ClientError> {
        let base = url::Url::parse(&config.sp_base_url)
            .map_err(|e| ClientError::Settings(format!("sp_base_url: {e}")))?;
        let base = base.as_str().trim_end_matches('/');

        Ok(ClientSettings {
            idp_entity_id: config.entity_id_url.clone(),
            idp_sso_url: config.remote_login_url.clone(),
            idp_slo_url: config.idp_logout_url().map(str::to_string),
            idp_certificate: config.certificate.clone(),
            sp_entity_id: format!("{base}{SP_METADATA_PATH}"),
            sp_acs_url: format!("{base}{SP_ACS_PATH}"),
            sp_sls_url: format!("{base}{SP_SLS_PATH}"),
            sp_private_key: config.sp_private_key.clone(),
            sp_certificate: config.sp_certificate.clone(),
            sign_requests: config.sign_requests,
            name_id_format: config
                .name_id_format
                .clone()
                .unwrap_or_else(|| DEFAULT_NAME_ID_FORMAT.to_string()),
            requested_authn_context: config.requested_authn_context.then(|| {
                RequestedAuthnContextSettings {
                    class_ref: config.requested_authn_context_class.clone(),
                    comparison: config.requested_authn_context_comparison,
                }
            }),
        })
    }
}

/// Outcome of a processed authentication response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthnResponse {
    pub authenticated: bool,
    pub name_id: Option<String>,
    pub session_index: Option<String>,
    pub authn_instant: Option<DateTime<Utc>>,
    pub attributes: Claims,
}

/// Redirect to the IdP carrying an AuthnRequest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    pub url: String,
    pub request_id: String,
}

/// Redirect for a logout. `request_id` is `None` when the IdP has no
/// logout endpoint and the redirect goes straight to the return target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutRedirect {
    pub url: String,
    pub request_id: Option<String>,
}

/// SAML protocol operations.
///
/// Response processing reports failures as the list of protocol errors.
pub trait SamlClient: Send {
    fn process_response(
        &self,
        saml_response: &str,
        request_id: Option<&str>,
    ) -> Result<AuthnResponse, Vec<String>>;

    /// Validate the SP metadata built from the settings. Empty means valid.
    fn validate_sp_metadata(&self) -> Vec<String>;

    fn sp_metadata(&self) -> Result<String, ClientError>;

    fn login(&self, return_to: Option<&str>) -> Result<LoginRedirect, ClientError>;

    fn logout(
        &self,
        return_to: &str,
        name_id: Option<&str>,
        session_index: Option<&str>,
    ) -> Result<LogoutRedirect, ClientError>;

    fn process_logout_response(
        &self,
        saml_response: &str,
        request_id: Option<&str>,
    ) -> Result<(), Vec<String>>;
}

pub trait SamlClientFactory: Send + Sync {
    fn build_client(&self, settings: ClientSettings) -> Result<Box<dyn SamlClient>, ClientError>;
}
