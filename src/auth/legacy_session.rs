//! Session payload consumed by the legacy web application.

use serde::{Deserialize, Serialize};

use crate::{config::SAML_PROVIDER_TYPE, models::Contact};

const DEFAULT_THEME: &str = "light";

/// User snapshot stored in the legacy session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUserInfo {
    pub contact_id: i64,
    pub contact_name: String,
    pub contact_alias: String,
    pub contact_email: String,
    pub contact_lang: String,
    pub contact_passwd: String,
    pub contact_autologin_key: String,
    /// `"1"` for administrators, `"0"` otherwise
    pub contact_admin: String,
    pub default_page: Option<i64>,
    pub contact_location: String,
    pub show_deprecated_pages: bool,
    pub reach_api: u8,
    pub reach_api_rt: u8,
    pub contact_theme: String,
    pub auth_type: String,
}

impl SessionUserInfo {
    pub fn from_contact(contact: &Contact) -> Self {
        Self {
            contact_id: contact.id,
            contact_name: contact.name.clone(),
            contact_alias: contact.alias.clone(),
            contact_email: contact.email.clone(),
            contact_lang: contact.lang.clone(),
            contact_passwd: contact.encoded_password.clone().unwrap_or_default(),
            contact_autologin_key: String::new(),
            contact_admin: if contact.is_admin { "1" } else { "0" }.to_string(),
            default_page: contact.default_page,
            contact_location: contact
                .timezone_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            show_deprecated_pages: contact.use_deprecated_pages,
            reach_api: u8::from(contact.can_reach_configuration_api),
            reach_api_rt: u8::from(contact.can_reach_realtime_api),
            contact_theme: contact
                .theme
                .clone()
                .unwrap_or_else(|| DEFAULT_THEME.to_string()),
            auth_type: SAML_PROVIDER_TYPE.to_string(),
        }
    }
}

/// Legacy session of a SAML-authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacySession {
    pub user: SessionUserInfo,
}

impl LegacySession {
    pub fn new(contact: &Contact) -> Self {
        Self {
            user: SessionUserInfo::from_contact(contact),
        }
    }

    pub fn user_id(&self) -> i64 {
        self.user.contact_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;

    #[test]
    fn test_user_info_defaults() {
        let contact = Contact::from_new_user(5, &NewUser::new("jdoe", "Jane Doe", "jane@x.com"));
        let info = SessionUserInfo::from_contact(&contact);

        assert_eq!(info.contact_id, 5);
        assert_eq!(info.contact_alias, "jdoe");
        assert_eq!(info.contact_admin, "0");
        assert_eq!(info.contact_autologin_key, "");
        assert_eq!(info.contact_passwd, "");
        assert_eq!(info.contact_theme, "light");
        assert_eq!(info.auth_type, "saml");
        assert_eq!(info.contact_location, "");
    }

    #[test]
    fn test_user_info_from_admin() {
        let mut contact =
            Contact::from_new_user(1, &NewUser::new("admin", "Administrator", "admin@x.com"));
        contact.is_admin = true;
        contact.theme = Some("dark".into());
        contact.timezone_id = Some(42);
        contact.can_reach_configuration_api = true;
        contact.can_reach_realtime_api = true;

        let info = SessionUserInfo::from_contact(&contact);
        assert_eq!(info.contact_admin, "1");
        assert_eq!(info.contact_theme, "dark");
        assert_eq!(info.contact_location, "42");
        assert_eq!((info.reach_api, info.reach_api_rt), (1, 1));
    }
}
