//! Claim-based access policy.
//!
//! Three validators run in sequence on the claim set of an authenticated
//! user: authentication conditions, roles mapping and groups mapping. Any
//! rejection short-circuits the login before user resolution.

mod conditions;
mod groups_mapping;
mod roles_mapping;

use std::{collections::BTreeMap, net::IpAddr};

pub use conditions::validate_authentication_conditions;
pub use groups_mapping::resolve_contact_groups;
pub use roles_mapping::match_roles;

use crate::{
    auth::Claims,
    config::{AuthorizationRule, SamlCustomConfiguration},
    models::{AccessGroup, ContactGroup},
};

/// Why a user was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("{0}")]
    AuthenticationConditions(String),

    #[error("{0}")]
    AclConditions(String),
}

/// Outcome of a successful policy evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessDecision {
    /// Claim values that matched a roles-mapping rule, in priority order.
    pub role_matches: Vec<String>,
    /// Contact groups granted by the groups mapping, unique by id.
    pub contact_groups: Vec<ContactGroup>,
}

/// Run every validator against the claims of the user.
pub fn evaluate(
    config: &SamlCustomConfiguration,
    claims: &Claims,
    client_ip: Option<IpAddr>,
) -> Result<AccessDecision, AccessDenied> {
    validate_authentication_conditions(&config.authentication_conditions, claims, client_ip)?;
    let role_matches = match_roles(&config.roles_mapping, claims)?;
    let contact_groups = resolve_contact_groups(&config.groups_mapping, claims)?;

    Ok(AccessDecision {
        role_matches,
        contact_groups,
    })
}

/// Access groups granted by `claim_values`, unique by id.
///
/// A rule contributes its access group when its claim value is one of
/// `claim_values`. The result does not depend on rule order.
pub fn get_user_access_groups_from_claims(
    relations: &[AuthorizationRule],
    claim_values: &[String],
) -> Vec<AccessGroup> {
    let mut groups: BTreeMap<i64, AccessGroup> = BTreeMap::new();

    for rule in relations {
        if !claim_values.contains(&rule.claim_value) {
            tracing::info!(
                claim_value = %rule.claim_value,
                access_group = %rule.access_group.name,
                "Configured claim value not found in user claims"
            );
            continue;
        }
        groups
            .entry(rule.access_group.id)
            .or_insert_with(|| rule.access_group.clone());
    }

    groups.into_values().collect()
}
