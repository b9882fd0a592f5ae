use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// SAML attributes of an authenticated user: attribute name to ordered values.
///
/// Non-textual attribute values are normalized to the empty string when the
/// protocol client builds the claim set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(BTreeMap<String, Vec<String>>);

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value to an attribute, creating it if needed.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(name.into()).or_default().push(value.into());
    }

    /// Ensure an attribute exists, even without values.
    pub fn declare(&mut self, name: impl Into<String>) {
        self.0.entry(name.into()).or_default();
    }

    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.0.get(name).map(Vec::as_slice)
    }

    /// First value of an attribute.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.values(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Whether any attribute carries `value`.
    pub fn contains_value(&self, value: &str) -> bool {
        self.0.values().flatten().any(|v| v == value)
    }

    pub fn contains_attribute(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.0
    }

    /// JSON form used in login audit records.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or_default()
    }
}

impl From<BTreeMap<String, Vec<String>>> for Claims {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        Self(map)
    }
}

impl<K, V> FromIterator<(K, V)> for Claims
where
    K: Into<String>,
    V: IntoIterator,
    V::Item: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_value() {
        let claims: Claims = [("uid", vec!["jdoe", "other"]), ("empty", vec![])]
            .into_iter()
            .collect();

        assert_eq!(claims.first_value("uid"), Some("jdoe"));
        assert_eq!(claims.first_value("empty"), None);
        assert_eq!(claims.first_value("missing"), None);
        assert!(claims.contains_attribute("empty"));
    }

    #[test]
    fn test_contains_value_searches_all_attributes() {
        let mut claims = Claims::new();
        claims.push("group", "ops");
        claims.push("role", "admin");

        assert!(claims.contains_value("admin"));
        assert!(claims.contains_value("ops"));
        assert!(!claims.contains_value("finance"));
    }

    #[test]
    fn test_json_shape() {
        let mut claims = Claims::new();
        claims.push("mail", "jane@x.com");
        claims.declare("memberOf");

        assert_eq!(
            claims.to_json(),
            serde_json::json!({"mail": ["jane@x.com"], "memberOf": []})
        );
    }
}
