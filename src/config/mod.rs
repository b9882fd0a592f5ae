//! Configuration module for the SAML provider.
//!
//! The provider is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [observability.logging]
//! level = "info"
//!
//! [provider]
//! is_active = true
//!
//! [provider.custom]
//! entity_id_url = "https://idp.example.com"
//! remote_login_url = "https://idp.example.com/sso"
//! certificate = "${IDP_CERT}"
//! sp_base_url = "https://monitoring.example.com/centreon"
//! user_id_attribute = "uid"
//! ```

mod observability;
mod saml;
mod security_access;

use std::path::Path;

pub use observability::*;
pub use saml::*;
pub use security_access::*;
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Observability configuration (logging).
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// SAML provider configuration.
    pub provider: ProviderConfiguration,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: AppConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.provider.validate()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Validation(format!("invalid env var pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            // Skip if this variable is inside a comment
            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const MINIMAL: &str = r#"
        [provider]
        is_active = true

        [provider.custom]
        entity_id_url = "https://idp.example.com"
        remote_login_url = "https://idp.example.com/sso"
        certificate = "MIIC"
        sp_base_url = "https://monitoring.example.com/centreon"
        user_id_attribute = "uid"
    "#;

    #[test]
    fn test_minimal_config() {
        let config = AppConfig::from_str(MINIMAL).unwrap();

        assert_eq!(config.provider.name, "saml");
        assert_eq!(config.provider.provider_type(), "saml");
        assert!(config.provider.is_active);
        assert!(config.provider.custom.logout_from);
        assert!(!config.provider.custom.auto_import);
        assert_eq!(config.observability.logging.level, LogLevel::Info);
        assert_eq!(config.observability.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_full_config() {
        let config = AppConfig::from_str(
            r#"
            [observability.logging]
            level = "debug"
            format = "json"

            [provider]
            name = "saml"
            is_active = true
            is_forced = true

            [provider.custom]
            entity_id_url = "https://idp.example.com"
            remote_login_url = "https://idp.example.com/sso"
            logout_from_url = "https://idp.example.com/slo"
            certificate = "MIIC"
            sp_base_url = "https://monitoring.example.com/centreon"
            user_id_attribute = "uid"
            auto_import = true
            email_bind_attribute = "email"
            fullname_bind_attribute = "displayName"
            contact_template = { id = 19, name = "contact_template" }

            [provider.custom.authentication_conditions]
            is_enabled = true
            attribute_path = "memberOf"
            authorized_values = ["monitoring"]
            trusted_client_addresses = ["10.0.0.0/8"]

            [provider.custom.roles_mapping]
            is_enabled = true
            apply_only_first_role = true
            attribute_path = "role"
            relations = [
                { claim_value = "admin", access_group = { id = 1, name = "ALL" }, priority = 1 },
                { claim_value = "ops", access_group = { id = 2, name = "Operators" }, priority = 2 },
            ]

            [provider.custom.groups_mapping]
            is_enabled = true
            attribute_path = "groups"
            relations = [
                { group_value = "ops", contact_group = { id = 7, name = "Ops" } },
            ]
        "#,
        )
        .unwrap();

        let custom = &config.provider.custom;
        assert!(config.provider.is_forced);
        assert_eq!(
            custom.idp_logout_url(),
            Some("https://idp.example.com/slo")
        );
        assert_eq!(custom.contact_template.as_ref().map(|t| t.id), Some(19));
        assert_eq!(custom.roles_mapping.relations.len(), 2);
        assert_eq!(custom.groups_mapping.relations[0].contact_group.id, 7);
        assert_eq!(
            custom.authentication_conditions.parsed_trusted_addresses().len(),
            1
        );
        assert_eq!(config.observability.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let input = MINIMAL.replace("user_id_attribute", "user_attribute");
        assert!(matches!(
            AppConfig::from_str(&input),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_auto_import_requires_bind_attributes() {
        let input = format!("{MINIMAL}\n        auto_import = true\n");
        let err = AppConfig::from_str(&input).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("email_bind_attribute"));
        assert!(message.contains("fullname_bind_attribute"));
        assert!(message.contains("contact_template"));
    }

    #[test]
    fn test_sign_requests_requires_private_key() {
        let input = format!("{MINIMAL}\n        sign_requests = true\n");
        assert!(matches!(
            AppConfig::from_str(&input),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_inactive_provider_skips_custom_validation() {
        let input = MINIMAL
            .replace("is_active = true", "is_active = false")
            .replace("\"uid\"", "\"\"");
        assert!(AppConfig::from_str(&input).is_ok());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let input = MINIMAL.replace("https://idp.example.com/sso", "not a url");
        let err = AppConfig::from_str(&input).unwrap_err();
        assert!(err.to_string().contains("remote_login_url"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.provider.custom.user_id_attribute, "uid");
    }

    #[test]
    fn test_from_missing_file() {
        let err = AppConfig::from_file("/nonexistent/saml.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, _)));
    }

    #[test]
    fn test_certificate_from_env() {
        let input = MINIMAL.replace("\"MIIC\"", "\"${TEST_IDP_CERT}\"");
        temp_env::with_var("TEST_IDP_CERT", Some("MIIDfromenv"), || {
            let config = AppConfig::from_str(&input).unwrap();
            assert_eq!(config.provider.custom.certificate, "MIIDfromenv");
        });
    }

    #[test]
    fn test_missing_env_var() {
        let input = MINIMAL.replace("\"MIIC\"", "\"${TEST_MISSING_IDP_CERT}\"");
        temp_env::with_var_unset("TEST_MISSING_IDP_CERT", || {
            let err = AppConfig::from_str(&input).unwrap_err();
            assert!(matches!(
                err,
                ConfigError::EnvVarNotFound(name) if name == "TEST_MISSING_IDP_CERT"
            ));
        });
    }

    #[test]
    fn test_env_var_expansion() {
        temp_env::with_var("TEST_SP_KEY", Some("secret"), || {
            let result = expand_env_vars("key = \"${TEST_SP_KEY}\"").unwrap();
            assert_eq!(result, "key = \"secret\"");
        });
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let result = expand_env_vars("# certificate = \"${NONEXISTENT_VAR}\"").unwrap();
        assert_eq!(result, "# certificate = \"${NONEXISTENT_VAR}\"");
    }

    #[test]
    fn test_env_var_after_comment_ignored() {
        let result = expand_env_vars("key = \"value\" # ${NONEXISTENT_VAR}").unwrap();
        assert_eq!(result, "key = \"value\" # ${NONEXISTENT_VAR}");
    }

    #[test]
    fn test_multiline_with_comments() {
        temp_env::with_var("TEST_MULTI", Some("value1"), || {
            let input = r#"key1 = "${TEST_MULTI}"
# key2 = "${NONEXISTENT}"
key3 = "literal""#;
            let result = expand_env_vars(input).unwrap();
            assert_eq!(
                result,
                r#"key1 = "value1"
# key2 = "${NONEXISTENT}"
key3 = "literal""#
            );
        });
    }
}
