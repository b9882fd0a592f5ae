use super::AccessDenied;
use crate::{auth::Claims, config::AclConditions};

/// Claim values matching a roles-mapping rule, in rule priority order.
///
/// With `apply_only_first_role`, only the claim value of the first matching
/// rule is kept.
pub fn match_roles(acl: &AclConditions, claims: &Claims) -> Result<Vec<String>, AccessDenied> {
    if !acl.is_enabled {
        return Ok(Vec::new());
    }

    let Some(values) = claims.values(&acl.attribute_path) else {
        tracing::error!(
            attribute_path = %acl.attribute_path,
            "Roles mapping attribute not found in claims"
        );
        return Err(AccessDenied::AclConditions(format!(
            "attribute '{}' not found",
            acl.attribute_path
        )));
    };

    let mut matches: Vec<String> = Vec::new();
    for rule in acl.ordered_relations() {
        if !values.contains(&rule.claim_value) || matches.contains(&rule.claim_value) {
            continue;
        }
        matches.push(rule.claim_value.clone());
        if acl.apply_only_first_role {
            break;
        }
    }

    if matches.is_empty() {
        tracing::error!(
            attribute_path = %acl.attribute_path,
            values = ?values,
            "No roles mapping rule matches the user claims"
        );
        return Err(AccessDenied::AclConditions(format!(
            "no role found in attribute '{}'",
            acl.attribute_path
        )));
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{config::AuthorizationRule, models::AccessGroup};

    fn acl(apply_only_first_role: bool) -> AclConditions {
        AclConditions {
            is_enabled: true,
            apply_only_first_role,
            attribute_path: "role".into(),
            relations: vec![
                AuthorizationRule::new("viewer", AccessGroup::new(3, "Viewers"), 3),
                AuthorizationRule::new("admin", AccessGroup::new(1, "ALL"), 1),
                AuthorizationRule::new("ops", AccessGroup::new(2, "Operators"), 2),
            ],
        }
    }

    #[rstest]
    #[case::all_matches(false, vec!["viewer", "ops"], vec!["ops", "viewer"])]
    #[case::first_only(true, vec!["viewer", "ops"], vec!["ops"])]
    #[case::first_only_highest(true, vec!["viewer", "admin", "ops"], vec!["admin"])]
    fn test_matches(
        #[case] first_only: bool,
        #[case] values: Vec<&str>,
        #[case] expected: Vec<&str>,
    ) {
        let claims: Claims = [("role", values)].into_iter().collect();
        let matches = match_roles(&acl(first_only), &claims).unwrap();
        assert_eq!(matches, expected);
    }

    #[test]
    fn test_no_match_denied() {
        let claims: Claims = [("role", vec!["guest"])].into_iter().collect();
        assert!(matches!(
            match_roles(&acl(false), &claims),
            Err(AccessDenied::AclConditions(_))
        ));
    }

    #[test]
    fn test_missing_attribute_denied() {
        let claims: Claims = [("groups", vec!["admin"])].into_iter().collect();
        assert!(matches!(
            match_roles(&acl(false), &claims),
            Err(AccessDenied::AclConditions(msg)) if msg.contains("not found")
        ));
    }

    #[test]
    fn test_disabled_returns_nothing() {
        let mut acl = acl(false);
        acl.is_enabled = false;
        assert!(match_roles(&acl, &Claims::new()).unwrap().is_empty());
    }
}
