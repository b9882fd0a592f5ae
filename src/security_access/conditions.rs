use std::net::IpAddr;

use super::AccessDenied;
use crate::{auth::Claims, config::AuthenticationConditions};

/// Check client address rules, then the authorized claim values.
pub fn validate_authentication_conditions(
    conditions: &AuthenticationConditions,
    claims: &Claims,
    client_ip: Option<IpAddr>,
) -> Result<(), AccessDenied> {
    if conditions.has_address_rules() {
        validate_client_address(conditions, client_ip)?;
    }

    if !conditions.is_enabled {
        return Ok(());
    }

    let Some(values) = claims.values(&conditions.attribute_path) else {
        tracing::error!(
            attribute_path = %conditions.attribute_path,
            "Authentication conditions attribute not found in claims"
        );
        return Err(AccessDenied::AuthenticationConditions(format!(
            "attribute '{}' not found",
            conditions.attribute_path
        )));
    };

    let matched = values
        .iter()
        .any(|value| conditions.authorized_values.contains(value));
    if !matched {
        tracing::error!(
            attribute_path = %conditions.attribute_path,
            values = ?values,
            authorized_values = ?conditions.authorized_values,
            "No authorized value found in claims"
        );
        return Err(AccessDenied::AuthenticationConditions(format!(
            "no authorized value found in attribute '{}'",
            conditions.attribute_path
        )));
    }

    Ok(())
}

fn validate_client_address(
    conditions: &AuthenticationConditions,
    client_ip: Option<IpAddr>,
) -> Result<(), AccessDenied> {
    let Some(ip) = client_ip else {
        tracing::error!("Client address rules configured but client address is unknown");
        return Err(AccessDenied::AuthenticationConditions(
            "client address unknown".to_string(),
        ));
    };

    if conditions
        .parsed_blacklist_addresses()
        .iter()
        .any(|net| net.contains(&ip))
    {
        tracing::error!(client_ip = %ip, "Client address is blacklisted");
        return Err(AccessDenied::AuthenticationConditions(format!(
            "client address {ip} is blacklisted"
        )));
    }

    let trusted = conditions.parsed_trusted_addresses();
    if !trusted.is_empty() && !trusted.iter().any(|net| net.contains(&ip)) {
        tracing::error!(client_ip = %ip, "Client address is not trusted");
        return Err(AccessDenied::AuthenticationConditions(format!(
            "client address {ip} is not trusted"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn conditions() -> AuthenticationConditions {
        AuthenticationConditions {
            is_enabled: true,
            attribute_path: "memberOf".into(),
            authorized_values: vec!["monitoring".into(), "admins".into()],
            ..Default::default()
        }
    }

    #[rstest]
    #[case::authorized(vec!["users", "admins"], true)]
    #[case::unauthorized(vec!["users"], false)]
    #[case::no_values(vec![], false)]
    fn test_authorized_values(#[case] values: Vec<&str>, #[case] allowed: bool) {
        let claims: Claims = [("memberOf", values)].into_iter().collect();
        assert_eq!(
            validate_authentication_conditions(&conditions(), &claims, None).is_ok(),
            allowed
        );
    }

    #[test]
    fn test_missing_attribute() {
        let claims: Claims = [("groups", vec!["admins"])].into_iter().collect();
        let err = validate_authentication_conditions(&conditions(), &claims, None).unwrap_err();
        assert_eq!(
            err,
            AccessDenied::AuthenticationConditions("attribute 'memberOf' not found".into())
        );
    }

    #[test]
    fn test_disabled_ignores_claims() {
        let conditions = AuthenticationConditions::default();
        assert!(validate_authentication_conditions(&conditions, &Claims::new(), None).is_ok());
    }

    #[rstest]
    #[case::trusted("10.1.2.3", true)]
    #[case::blacklisted_inside_trusted("10.6.6.6", false)]
    #[case::outside_trusted("192.168.1.1", false)]
    fn test_client_addresses(#[case] ip: &str, #[case] allowed: bool) {
        let conditions = AuthenticationConditions {
            trusted_client_addresses: vec!["10.0.0.0/8".into()],
            blacklist_client_addresses: vec!["10.6.6.6".into()],
            ..Default::default()
        };
        let result = validate_authentication_conditions(
            &conditions,
            &Claims::new(),
            Some(ip.parse().unwrap()),
        );
        assert_eq!(result.is_ok(), allowed);
    }

    #[test]
    fn test_client_address_required_when_rules_exist() {
        let conditions = AuthenticationConditions {
            blacklist_client_addresses: vec!["10.6.6.6".into()],
            ..Default::default()
        };
        assert!(validate_authentication_conditions(&conditions, &Claims::new(), None).is_err());
    }
}
