//! Test doubles for the provider flows.

use std::sync::{Arc, Mutex};

use serde_json::Value as JsonValue;

use crate::{
    auth::{
        Claims, LoginLogger, MemorySessionStore, SamlClient, SamlClientFactory, SamlProvider,
        client::{AuthnResponse, ClientError, ClientSettings, LoginRedirect, LogoutRedirect},
    },
    config::{ProviderConfiguration, SamlCustomConfiguration},
    db::{DbPool, memory::MemoryContactStore},
    models::{Contact, NewUser},
};

pub const LOGIN_REQUEST_ID: &str = "ONELOGIN_4fee3b046395c4e751011e97f8900b5273d56685";
pub const LOGOUT_REQUEST_ID: &str = "ONELOGIN_21df91a89767879fc0f7df6a1490c6000c81644d";

/// What the scripted client answers, and what it was asked.
pub struct Script {
    pub response: Mutex<Result<AuthnResponse, Vec<String>>>,
    pub metadata_errors: Mutex<Vec<String>>,
    pub logout_response: Mutex<Result<(), Vec<String>>>,
    pub seen_request_ids: Mutex<Vec<Option<String>>>,
    pub logout_calls: Mutex<Vec<(String, Option<String>, Option<String>)>>,
}

impl Script {
    pub fn new(attributes: Claims) -> Self {
        Self {
            response: Mutex::new(Ok(AuthnResponse {
                authenticated: true,
                name_id: Some("jdoe@example.com".into()),
                session_index: Some("_be9967abd904ddcae3c0eb4189adbe3f71e327cf93".into()),
                authn_instant: None,
                attributes,
            })),
            metadata_errors: Mutex::new(Vec::new()),
            logout_response: Mutex::new(Ok(())),
            seen_request_ids: Mutex::new(Vec::new()),
            logout_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_response(&self, errors: &[&str]) {
        *self.response.lock().unwrap() = Err(errors.iter().map(|e| e.to_string()).collect());
    }

    pub fn unauthenticated(&self) {
        if let Ok(response) = self.response.lock().unwrap().as_mut() {
            response.authenticated = false;
        }
    }

    pub fn fail_metadata(&self, errors: &[&str]) {
        *self.metadata_errors.lock().unwrap() = errors.iter().map(|e| e.to_string()).collect();
    }

    pub fn fail_logout_response(&self, errors: &[&str]) {
        *self.logout_response.lock().unwrap() = Err(errors.iter().map(|e| e.to_string()).collect());
    }
}

struct ScriptedClient {
    script: Arc<Script>,
    has_slo: bool,
}

impl SamlClient for ScriptedClient {
    fn process_response(
        &self,
        _saml_response: &str,
        request_id: Option<&str>,
    ) -> Result<AuthnResponse, Vec<String>> {
        self.script
            .seen_request_ids
            .lock()
            .unwrap()
            .push(request_id.map(str::to_string));
        self.script.response.lock().unwrap().clone()
    }

    fn validate_sp_metadata(&self) -> Vec<String> {
        self.script.metadata_errors.lock().unwrap().clone()
    }

    fn sp_metadata(&self) -> Result<String, ClientError> {
        Ok("<md:EntityDescriptor/>".into())
    }

    fn login(&self, return_to: Option<&str>) -> Result<LoginRedirect, ClientError> {
        Ok(LoginRedirect {
            url: format!(
                "https://idp.example.com/sso?SAMLRequest=x&RelayState={}",
                return_to.unwrap_or_default()
            ),
            request_id: LOGIN_REQUEST_ID.into(),
        })
    }

    fn logout(
        &self,
        return_to: &str,
        name_id: Option<&str>,
        session_index: Option<&str>,
    ) -> Result<LogoutRedirect, ClientError> {
        self.script.logout_calls.lock().unwrap().push((
            return_to.to_string(),
            name_id.map(str::to_string),
            session_index.map(str::to_string),
        ));

        if !self.has_slo {
            return Ok(LogoutRedirect {
                url: return_to.to_string(),
                request_id: None,
            });
        }
        Ok(LogoutRedirect {
            url: "https://idp.example.com/slo?SAMLRequest=y".into(),
            request_id: Some(LOGOUT_REQUEST_ID.into()),
        })
    }

    fn process_logout_response(
        &self,
        _saml_response: &str,
        request_id: Option<&str>,
    ) -> Result<(), Vec<String>> {
        self.script
            .seen_request_ids
            .lock()
            .unwrap()
            .push(request_id.map(str::to_string));
        self.script.logout_response.lock().unwrap().clone()
    }
}

pub struct ScriptedClientFactory {
    pub script: Arc<Script>,
}

impl SamlClientFactory for ScriptedClientFactory {
    fn build_client(&self, settings: ClientSettings) -> Result<Box<dyn SamlClient>, ClientError> {
        Ok(Box::new(ScriptedClient {
            script: Arc::clone(&self.script),
            has_slo: settings.idp_slo_url.is_some(),
        }))
    }
}

/// Records login audit messages.
#[derive(Default)]
pub struct RecordingLoginLogger {
    pub records: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingLoginLogger {
    pub fn contains(&self, level: &str, message: &str) -> bool {
        self.records
            .lock()
            .unwrap()
            .iter()
            .any(|(l, m)| *l == level && m == message)
    }
}

impl LoginLogger for RecordingLoginLogger {
    fn info(&self, _provider: &str, message: &str, _context: Option<&JsonValue>) {
        self.records.lock().unwrap().push(("info", message.to_string()));
    }

    fn error(&self, _provider: &str, message: &str, _context: Option<&JsonValue>) {
        self.records.lock().unwrap().push(("error", message.to_string()));
    }
}

pub fn custom_config() -> SamlCustomConfiguration {
    let mut custom = SamlCustomConfiguration::new(
        "https://idp.example.com/realms/centreon",
        "https://idp.example.com/realms/centreon/protocol/saml",
        "MIICsDCCAZgCCQD",
        "https://monitoring.example.com/centreon",
        "uid",
    );
    custom.logout_from_url = Some("https://idp.example.com/realms/centreon/protocol/saml".into());
    custom
}

pub fn claims<const N: usize>(pairs: [(&str, Vec<&str>); N]) -> Claims {
    pairs.into_iter().collect()
}

pub fn jdoe_claims() -> Claims {
    claims([
        ("uid", vec!["jdoe"]),
        ("mail", vec!["jdoe@example.com"]),
        ("displayName", vec!["John Doe"]),
        ("role", vec!["ops", "viewer"]),
        ("groups", vec!["noc"]),
    ])
}

pub fn jdoe_contact(id: i64) -> Contact {
    Contact::from_new_user(id, &NewUser::new("jdoe", "John Doe", "jdoe@example.com"))
}

/// Everything a provider test needs, with handles kept for assertions.
pub struct Harness {
    pub script: Arc<Script>,
    pub contacts: Arc<MemoryContactStore>,
    pub session: Arc<MemorySessionStore>,
    pub logger: Arc<RecordingLoginLogger>,
    pub custom: SamlCustomConfiguration,
}

impl Harness {
    pub fn new(custom: SamlCustomConfiguration, contacts: Vec<Contact>) -> Self {
        Self {
            script: Arc::new(Script::new(jdoe_claims())),
            contacts: Arc::new(MemoryContactStore::with_contacts(contacts)),
            session: Arc::new(MemorySessionStore::new()),
            logger: Arc::new(RecordingLoginLogger::default()),
            custom,
        }
    }

    /// Replace the attributes of the scripted authentication response.
    pub fn set_attributes(&self, attributes: Claims) {
        if let Ok(response) = self.script.response.lock().unwrap().as_mut() {
            response.attributes = attributes;
        }
    }

    pub fn db(&self) -> DbPool {
        DbPool::from_memory(Arc::clone(&self.contacts))
    }

    pub fn provider(&self) -> SamlProvider {
        SamlProvider::new(
            ProviderConfiguration::new(self.custom.clone()),
            self.db(),
            self.session.clone(),
            Arc::new(ScriptedClientFactory {
                script: Arc::clone(&self.script),
            }),
            self.logger.clone(),
        )
    }
}
