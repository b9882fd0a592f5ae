use serde::{Deserialize, Serialize};

use super::{AclConditions, AuthenticationConditions, ConfigError, GroupsMapping};
use crate::models::ContactTemplate;

/// Provider type string used in audit logs and legacy sessions.
pub const SAML_PROVIDER_TYPE: &str = "saml";

/// Provider configuration as stored by the hosting application.
///
/// The generic part (id, name, activation flags) wraps the SAML-specific
/// [`SamlCustomConfiguration`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfiguration {
    /// Configuration identifier.
    #[serde(default = "default_provider_id")]
    pub id: i64,

    /// Display name of the provider.
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Whether SAML login is offered.
    #[serde(default)]
    pub is_active: bool,

    /// Whether SAML is the only login method.
    #[serde(default)]
    pub is_forced: bool,

    /// SAML-specific settings.
    pub custom: SamlCustomConfiguration,
}

fn default_provider_id() -> i64 {
    1
}

fn default_provider_name() -> String {
    SAML_PROVIDER_TYPE.to_string()
}

impl ProviderConfiguration {
    pub fn new(custom: SamlCustomConfiguration) -> Self {
        Self {
            id: default_provider_id(),
            name: default_provider_name(),
            is_active: true,
            is_forced: false,
            custom,
        }
    }

    /// Provider type, always `saml`.
    pub fn provider_type(&self) -> &'static str {
        SAML_PROVIDER_TYPE
    }

    pub fn custom(&self) -> &SamlCustomConfiguration {
        &self.custom
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "provider.name cannot be empty".into(),
            ));
        }
        if self.is_forced && !self.is_active {
            return Err(ConfigError::Validation(
                "provider.is_forced requires provider.is_active".into(),
            ));
        }
        if self.is_active {
            self.custom.validate()?;
        }
        Ok(())
    }
}

/// SAML settings: IdP endpoints, SP identity, attribute bindings and
/// security access rules.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamlCustomConfiguration {
    /// IdP entity identifier.
    pub entity_id_url: String,

    /// IdP Single Sign-On service URL.
    pub remote_login_url: String,

    /// IdP X.509 certificate for signature verification (PEM format).
    pub certificate: String,

    /// Whether logout is propagated to the IdP (Single Logout).
    #[serde(default = "default_true")]
    pub logout_from: bool,

    /// IdP Single Logout service URL.
    #[serde(default)]
    pub logout_from_url: Option<String>,

    /// Public base URL of the application, e.g. `https://monitoring.example.com/centreon`.
    /// The SP entity id and endpoint URLs are derived from it.
    pub sp_base_url: String,

    /// SP private key for signing requests (PEM format).
    #[serde(default)]
    pub sp_private_key: Option<String>,

    /// SP certificate published in SP metadata (PEM format).
    #[serde(default)]
    pub sp_certificate: Option<String>,

    /// Sign AuthnRequests and LogoutRequests.
    #[serde(default)]
    pub sign_requests: bool,

    /// NameID format to request.
    #[serde(default)]
    pub name_id_format: Option<String>,

    /// Attribute holding the login of the user.
    pub user_id_attribute: String,

    /// Whether to send a RequestedAuthnContext.
    #[serde(default)]
    pub requested_authn_context: bool,

    /// Class reference sent with the RequestedAuthnContext.
    #[serde(default = "default_authn_context_class")]
    pub requested_authn_context_class: String,

    /// Comparison method sent with the RequestedAuthnContext.
    #[serde(default)]
    pub requested_authn_context_comparison: AuthnContextComparison,

    /// Create unknown users on first login.
    #[serde(default)]
    pub auto_import: bool,

    /// Template applied to auto-imported users.
    #[serde(default)]
    pub contact_template: Option<ContactTemplate>,

    /// Attribute holding the email of an auto-imported user.
    #[serde(default)]
    pub email_bind_attribute: Option<String>,

    /// Attribute holding the full name of an auto-imported user.
    #[serde(default)]
    pub fullname_bind_attribute: Option<String>,

    /// Claim-based conditions a user must meet to log in.
    #[serde(default)]
    pub authentication_conditions: AuthenticationConditions,

    /// Claim value to access group rules.
    #[serde(default)]
    pub roles_mapping: AclConditions,

    /// Claim value to contact group rules.
    #[serde(default)]
    pub groups_mapping: GroupsMapping,
}

fn default_true() -> bool {
    true
}

fn default_authn_context_class() -> String {
    "urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport".to_string()
}

impl std::fmt::Debug for SamlCustomConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamlCustomConfiguration")
            .field("entity_id_url", &self.entity_id_url)
            .field("remote_login_url", &self.remote_login_url)
            .field("logout_from", &self.logout_from)
            .field("logout_from_url", &self.logout_from_url)
            .field("sp_base_url", &self.sp_base_url)
            .field("sp_private_key", &self.sp_private_key.as_ref().map(|_| "****"))
            .field("sign_requests", &self.sign_requests)
            .field("user_id_attribute", &self.user_id_attribute)
            .field("auto_import", &self.auto_import)
            .field("contact_template", &self.contact_template)
            .field("email_bind_attribute", &self.email_bind_attribute)
            .field("fullname_bind_attribute", &self.fullname_bind_attribute)
            .field("authentication_conditions", &self.authentication_conditions)
            .field("roles_mapping", &self.roles_mapping)
            .field("groups_mapping", &self.groups_mapping)
            .finish()
    }
}

impl SamlCustomConfiguration {
    /// Create a configuration with the required fields and defaults for the rest.
    pub fn new(
        entity_id_url: impl Into<String>,
        remote_login_url: impl Into<String>,
        certificate: impl Into<String>,
        sp_base_url: impl Into<String>,
        user_id_attribute: impl Into<String>,
    ) -> Self {
        Self {
            entity_id_url: entity_id_url.into(),
            remote_login_url: remote_login_url.into(),
            certificate: certificate.into(),
            logout_from: true,
            logout_from_url: None,
            sp_base_url: sp_base_url.into(),
            sp_private_key: None,
            sp_certificate: None,
            sign_requests: false,
            name_id_format: None,
            user_id_attribute: user_id_attribute.into(),
            requested_authn_context: false,
            requested_authn_context_class: default_authn_context_class(),
            requested_authn_context_comparison: AuthnContextComparison::default(),
            auto_import: false,
            contact_template: None,
            email_bind_attribute: None,
            fullname_bind_attribute: None,
            authentication_conditions: AuthenticationConditions::default(),
            roles_mapping: AclConditions::default(),
            groups_mapping: GroupsMapping::default(),
        }
    }

    pub fn is_auto_import_enabled(&self) -> bool {
        self.auto_import
    }

    /// IdP logout URL, if logout is propagated to the IdP.
    pub fn idp_logout_url(&self) -> Option<&str> {
        if self.logout_from {
            self.logout_from_url.as_deref()
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("entity_id_url", &self.entity_id_url),
            ("remote_login_url", &self.remote_login_url),
            ("certificate", &self.certificate),
            ("sp_base_url", &self.sp_base_url),
            ("user_id_attribute", &self.user_id_attribute),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "provider.custom.{field} cannot be empty"
                )));
            }
        }

        for (field, value) in [
            ("remote_login_url", Some(&self.remote_login_url)),
            ("sp_base_url", Some(&self.sp_base_url)),
            ("logout_from_url", self.logout_from_url.as_ref()),
        ] {
            if let Some(value) = value
                && url::Url::parse(value).is_err()
            {
                return Err(ConfigError::Validation(format!(
                    "provider.custom.{field} is not a valid URL: {value}"
                )));
            }
        }

        if self.logout_from && self.logout_from_url.is_none() {
            tracing::warn!(
                "provider.custom.logout_from is enabled without logout_from_url; \
                 logout will only end the local session"
            );
        }

        if self.sign_requests && self.sp_private_key.is_none() {
            return Err(ConfigError::Validation(
                "provider.custom.sign_requests requires sp_private_key".into(),
            ));
        }

        if self.auto_import {
            let missing = [
                ("email_bind_attribute", self.email_bind_attribute.is_none()),
                (
                    "fullname_bind_attribute",
                    self.fullname_bind_attribute.is_none(),
                ),
                ("contact_template", self.contact_template.is_none()),
            ]
            .into_iter()
            .filter_map(|(field, missing)| missing.then_some(field))
            .collect::<Vec<_>>();

            if !missing.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "provider.custom.auto_import requires {}",
                    missing.join(", ")
                )));
            }
        }

        self.authentication_conditions.validate()?;
        self.roles_mapping.validate()?;
        self.groups_mapping.validate()?;

        Ok(())
    }
}

/// Comparison method of a RequestedAuthnContext.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthnContextComparison {
    #[default]
    Exact,
    Minimum,
    Maximum,
    Better,
}
