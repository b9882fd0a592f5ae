use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::models::{AccessGroup, ContactGroup};

/// Conditions a user must meet to be allowed to log in.
///
/// When enabled, the claim at `attribute_path` must carry at least one of
/// `authorized_values`. Client address lists apply independently of
/// `is_enabled`: a blacklisted address is always rejected, and a non-empty
/// trusted list rejects every address outside it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthenticationConditions {
    #[serde(default)]
    pub is_enabled: bool,

    /// Claim holding the values to check.
    #[serde(default)]
    pub attribute_path: String,

    #[serde(default)]
    pub authorized_values: Vec<String>,

    /// Client addresses or CIDR ranges allowed to log in (e.g., "10.0.0.0/8").
    #[serde(default)]
    pub trusted_client_addresses: Vec<String>,

    /// Client addresses or CIDR ranges never allowed to log in.
    #[serde(default)]
    pub blacklist_client_addresses: Vec<String>,
}

impl AuthenticationConditions {
    pub fn parsed_trusted_addresses(&self) -> Vec<IpNet> {
        parse_networks(&self.trusted_client_addresses, "trusted_client_addresses")
    }

    pub fn parsed_blacklist_addresses(&self) -> Vec<IpNet> {
        parse_networks(
            &self.blacklist_client_addresses,
            "blacklist_client_addresses",
        )
    }

    pub fn has_address_rules(&self) -> bool {
        !self.trusted_client_addresses.is_empty() || !self.blacklist_client_addresses.is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_enabled {
            if self.attribute_path.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "authentication_conditions.attribute_path is required when enabled".into(),
                ));
            }
            if self.authorized_values.is_empty() {
                return Err(ConfigError::Validation(
                    "authentication_conditions.authorized_values cannot be empty when enabled"
                        .into(),
                ));
            }
        }

        for (field, entries) in [
            ("trusted_client_addresses", &self.trusted_client_addresses),
            ("blacklist_client_addresses", &self.blacklist_client_addresses),
        ] {
            if let Some(invalid) = entries.iter().find(|e| parse_network(e).is_none()) {
                return Err(ConfigError::Validation(format!(
                    "authentication_conditions.{field} contains an invalid address: {invalid}"
                )));
            }
        }

        Ok(())
    }
}

/// Parse an address or CIDR range. A bare address becomes a host network.
fn parse_network(value: &str) -> Option<IpNet> {
    let value = value.trim();
    value
        .parse::<IpNet>()
        .ok()
        .or_else(|| value.parse::<IpAddr>().ok().map(IpNet::from))
}

fn parse_networks(values: &[String], field: &str) -> Vec<IpNet> {
    values
        .iter()
        .filter_map(|value| {
            parse_network(value).or_else(|| {
                tracing::warn!(
                    address = %value,
                    field,
                    "Invalid client address in authentication conditions, skipping"
                );
                None
            })
        })
        .collect()
}

/// Roles mapping: claim values granting access groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AclConditions {
    #[serde(default)]
    pub is_enabled: bool,

    /// Keep only the first matching rule (by priority).
    #[serde(default)]
    pub apply_only_first_role: bool,

    /// Claim holding the role values.
    #[serde(default)]
    pub attribute_path: String,

    #[serde(default)]
    pub relations: Vec<AuthorizationRule>,
}

impl AclConditions {
    /// Rules sorted by ascending priority. Rules sharing a priority keep
    /// their configured order.
    pub fn ordered_relations(&self) -> Vec<&AuthorizationRule> {
        let mut relations = self.relations.iter().collect::<Vec<_>>();
        relations.sort_by_key(|rule| rule.priority);
        relations
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_enabled && self.attribute_path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "roles_mapping.attribute_path is required when enabled".into(),
            ));
        }
        if let Some(rule) = self
            .relations
            .iter()
            .find(|rule| rule.claim_value.is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "roles_mapping relation for access group '{}' has an empty claim_value",
                rule.access_group.name
            )));
        }
        Ok(())
    }
}

/// Associates a claim value with an access group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationRule {
    pub claim_value: String,
    pub access_group: AccessGroup,
    #[serde(default)]
    pub priority: i32,
}

impl AuthorizationRule {
    pub fn new(claim_value: impl Into<String>, access_group: AccessGroup, priority: i32) -> Self {
        Self {
            claim_value: claim_value.into(),
            access_group,
            priority,
        }
    }
}

/// Groups mapping: claim values granting contact groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupsMapping {
    #[serde(default)]
    pub is_enabled: bool,

    #[serde(default)]
    pub attribute_path: String,

    #[serde(default)]
    pub relations: Vec<ContactGroupRelation>,
}

impl GroupsMapping {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_enabled && self.attribute_path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "groups_mapping.attribute_path is required when enabled".into(),
            ));
        }
        Ok(())
    }
}

/// Associates a claim value with a contact group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactGroupRelation {
    pub group_value: String,
    pub contact_group: ContactGroup,
}

impl ContactGroupRelation {
    pub fn new(group_value: impl Into<String>, contact_group: ContactGroup) -> Self {
        Self {
            group_value: group_value.into(),
            contact_group,
        }
    }
}
