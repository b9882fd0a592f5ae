use serde::{Deserialize, Serialize};
use validator::Validate;

/// A user of the monitoring application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    /// Full name
    pub name: String,
    /// Login
    pub alias: String,
    pub email: String,
    /// Locale, e.g. `en_US`
    pub lang: String,
    /// Encoded local password, if any
    pub encoded_password: Option<String>,
    pub is_admin: bool,
    /// Topology page opened after login
    pub default_page: Option<i64>,
    pub timezone_id: Option<i64>,
    pub use_deprecated_pages: bool,
    pub can_reach_frontend: bool,
    /// Access to the configuration API
    pub can_reach_configuration_api: bool,
    /// Access to the real-time API
    pub can_reach_realtime_api: bool,
    pub theme: Option<String>,
    /// Template applied when the contact was imported
    pub contact_template: Option<ContactTemplate>,
}

impl Contact {
    /// Build a contact from a creation request, with defaults for
    /// everything the request does not carry.
    pub fn from_new_user(id: i64, user: &NewUser) -> Self {
        Self {
            id,
            name: user.name.clone(),
            alias: user.alias.clone(),
            email: user.email.clone(),
            lang: "browser".to_string(),
            encoded_password: None,
            is_admin: false,
            default_page: None,
            timezone_id: None,
            use_deprecated_pages: false,
            can_reach_frontend: user.can_reach_frontend,
            can_reach_configuration_api: false,
            can_reach_realtime_api: user.can_reach_realtime_api,
            theme: None,
            contact_template: user.contact_template.clone(),
        }
    }
}

/// Template whose settings are copied onto auto-imported users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactTemplate {
    pub id: i64,
    pub name: String,
}

impl ContactTemplate {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Request to create a user from SSO attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 255))]
    pub alias: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub can_reach_frontend: bool,
    pub can_reach_realtime_api: bool,
    pub contact_template: Option<ContactTemplate>,
}

impl NewUser {
    /// New users can reach the frontend and nothing else.
    pub fn new(
        alias: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            name: name.into(),
            email: email.into(),
            can_reach_frontend: true,
            can_reach_realtime_api: false,
            contact_template: None,
        }
    }

    pub fn set_can_reach_realtime_api(&mut self, can_reach: bool) {
        self.can_reach_realtime_api = can_reach;
    }

    pub fn set_contact_template(&mut self, template: Option<ContactTemplate>) {
        self.contact_template = template;
    }
}
