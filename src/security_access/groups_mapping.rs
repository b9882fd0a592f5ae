use std::collections::HashSet;

use super::AccessDenied;
use crate::{auth::Claims, config::GroupsMapping, models::ContactGroup};

/// Contact groups granted by the claims, unique by id, in relation order.
///
/// A missing claim is a hard failure; no matching relation is not.
pub fn resolve_contact_groups(
    mapping: &GroupsMapping,
    claims: &Claims,
) -> Result<Vec<ContactGroup>, AccessDenied> {
    if !mapping.is_enabled {
        return Ok(Vec::new());
    }

    let Some(values) = claims.values(&mapping.attribute_path) else {
        tracing::error!(
            attribute_path = %mapping.attribute_path,
            "Groups mapping attribute not found in claims"
        );
        return Err(AccessDenied::AuthenticationConditions(format!(
            "groups mapping attribute '{}' not found",
            mapping.attribute_path
        )));
    };

    let mut seen: HashSet<i64> = HashSet::new();
    let groups: Vec<ContactGroup> = mapping
        .relations
        .iter()
        .filter(|relation| values.contains(&relation.group_value))
        .filter(|relation| seen.insert(relation.contact_group.id))
        .map(|relation| relation.contact_group.clone())
        .collect();

    if groups.is_empty() {
        tracing::info!(
            attribute_path = %mapping.attribute_path,
            "No contact group matches the user claims"
        );
    }

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContactGroupRelation;

    fn mapping() -> GroupsMapping {
        GroupsMapping {
            is_enabled: true,
            attribute_path: "groups".into(),
            relations: vec![
                ContactGroupRelation::new("ops", ContactGroup::new(7, "Ops")),
                ContactGroupRelation::new("noc", ContactGroup::new(7, "Ops")),
                ContactGroupRelation::new("finance", ContactGroup::new(8, "Finance")),
            ],
        }
    }

    #[test]
    fn test_groups_deduplicated_by_id() {
        let claims: Claims = [("groups", vec!["ops", "noc"])].into_iter().collect();
        let groups = resolve_contact_groups(&mapping(), &claims).unwrap();
        assert_eq!(groups, vec![ContactGroup::new(7, "Ops")]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let claims: Claims = [("groups", vec!["sales"])].into_iter().collect();
        assert!(resolve_contact_groups(&mapping(), &claims).unwrap().is_empty());
    }

    #[test]
    fn test_missing_attribute_denied() {
        let claims: Claims = [("memberOf", vec!["ops"])].into_iter().collect();
        assert!(matches!(
            resolve_contact_groups(&mapping(), &claims),
            Err(AccessDenied::AuthenticationConditions(_))
        ));
    }
}
