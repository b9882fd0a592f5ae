//! SAML authentication provider.
//!
//! A [`SamlProvider`] is built per request. The login flow runs
//! `authenticate_or_fail → import_user → get_legacy_session`; logout is a
//! separate flow ending in the IdP callback.

use std::{net::IpAddr, sync::Arc};

use async_trait::async_trait;
use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Map as JsonMap, Value as JsonValue, json};
use uuid::Uuid;
use validator::Validate;

use super::{
    claims::Claims,
    client::{SamlClient, SamlClientFactory, SamlSettingsFormatter, SettingsFormatter},
    error::{AuthError, SsoAuthenticationError},
    legacy_session::LegacySession,
    login_logger::{LoginLogger, login_events},
    session_store::{
        AUTHN_REQUEST_ID_KEY, LOGOUT_REQUEST_ID_KEY, SAML_SESSION_KEY, SamlSessionState,
        SessionStore, get_typed, set_typed,
    },
    token::{AuthenticationTokens, NewProviderToken},
};
use crate::{
    config::ProviderConfiguration,
    db::{ContactRepository, DbPool},
    models::{AccessGroup, Contact, ContactGroup, NewUser},
    security_access::{self, AccessDecision},
};

/// Where the IdP sends the user back after a logout.
pub const LOGOUT_RETURN_TO: &str = "/centreon/login";

/// Inbound authentication response.
#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    /// Base64 `SAMLResponse` form field
    pub saml_response: String,
    pub relay_state: Option<String>,
    pub client_ip: Option<IpAddr>,
}

/// Inbound logout response.
#[derive(Debug, Clone, Default)]
pub struct LogoutCallback {
    pub saml_response: String,
    pub relay_state: Option<String>,
    /// URL of the endpoint receiving the callback
    pub self_url: String,
}

/// A browser redirect (302).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    location: String,
}

impl Redirect {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        (StatusCode::FOUND, [(header::LOCATION, self.location)]).into_response()
    }
}

/// Session and token produced by a completed login.
#[derive(Debug, Clone)]
pub struct CompletedLogin {
    pub session: LegacySession,
    pub token: NewProviderToken,
}

/// Progress of a provider instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderState {
    #[default]
    Idle,
    Authenticating,
    AccessValidated,
    UserResolved,
    SessionEstablished,
    /// Holds the error code of the failure
    Failed(&'static str),
    LoggedOut,
}

/// Capabilities of an authentication provider.
#[async_trait]
pub trait ProviderAuthentication: Send {
    /// Validate the IdP response and the access policy.
    async fn authenticate_or_fail(&mut self, request: &LoginRequest) -> Result<(), AuthError>;

    /// Look the user up by email, then by name.
    async fn find_user_or_fail(&self) -> Result<Contact, AuthError>;

    /// Look the user up by name, then by email.
    async fn get_user(&self) -> Result<Option<Contact>, AuthError>;

    async fn import_user(&mut self) -> Result<(), AuthError>;

    async fn update_user(&mut self) -> Result<(), AuthError>;

    async fn get_legacy_session(&mut self, db: &DbPool) -> Result<LegacySession, AuthError>;

    fn get_provider_token(&self, token: Option<&str>) -> NewProviderToken;

    fn get_provider_refresh_token(&self) -> Option<NewProviderToken>;

    fn can_refresh_token(&self) -> bool;

    async fn refresh_token(&self, tokens: AuthenticationTokens) -> Option<AuthenticationTokens>;

    fn get_configuration(&self) -> &ProviderConfiguration;

    fn set_configuration(&mut self, configuration: ProviderConfiguration);

    fn is_auto_import_enabled(&self) -> bool;

    fn get_username(&self) -> Option<&str>;

    fn get_authenticated_user(&self) -> Option<&Contact>;

    fn is_update_acl_supported(&self) -> bool;

    fn get_user_information(&self) -> JsonMap<String, JsonValue>;

    fn get_id_token_payload(&self) -> JsonMap<String, JsonValue>;

    fn get_acl_conditions_matches(&self) -> &[String];

    fn get_user_access_groups_from_claims(&self, claim_values: &[String]) -> Vec<AccessGroup>;

    fn get_user_contact_groups(&self) -> &[ContactGroup];
}

pub struct SamlProvider {
    configuration: ProviderConfiguration,
    db: DbPool,
    session: Arc<dyn SessionStore>,
    formatter: Arc<dyn SettingsFormatter>,
    client_factory: Arc<dyn SamlClientFactory>,
    login_logger: Arc<dyn LoginLogger>,
    username: Option<String>,
    claims: Claims,
    authenticated_user: Option<Contact>,
    access: AccessDecision,
    state: ProviderState,
}

impl SamlProvider {
    pub fn new(
        configuration: ProviderConfiguration,
        db: DbPool,
        session: Arc<dyn SessionStore>,
        client_factory: Arc<dyn SamlClientFactory>,
        login_logger: Arc<dyn LoginLogger>,
    ) -> Self {
        Self {
            configuration,
            db,
            session,
            formatter: Arc::new(SamlSettingsFormatter),
            client_factory,
            login_logger,
            username: None,
            claims: Claims::default(),
            authenticated_user: None,
            access: AccessDecision::default(),
            state: ProviderState::Idle,
        }
    }

    pub fn with_settings_formatter(mut self, formatter: Arc<dyn SettingsFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn state(&self) -> ProviderState {
        self.state
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    fn provider_type(&self) -> &'static str {
        self.configuration.provider_type()
    }

    /// Build a fresh protocol client from the current configuration.
    fn client(&self) -> Result<Box<dyn SamlClient>, AuthError> {
        let settings = self.formatter.format(self.configuration.custom())?;
        Ok(self.client_factory.build_client(settings)?)
    }

    fn fail(&mut self, error: AuthError) -> AuthError {
        self.state = ProviderState::Failed(error.code());
        error
    }

    fn info(&self, message: &str, context: Option<&JsonValue>) {
        self.login_logger.info(self.provider_type(), message, context);
    }

    fn error(&self, message: &str, context: Option<&JsonValue>) {
        self.login_logger.error(self.provider_type(), message, context);
    }

    fn require_username(&self) -> Result<&str, AuthError> {
        self.username
            .as_deref()
            .ok_or_else(|| AuthError::Internal("no authenticated SAML user".to_string()))
    }

    async fn find_user_in(&self, contacts: &dyn ContactRepository) -> Result<Contact, AuthError> {
        let username = self.require_username()?;

        if let Some(user) = contacts.find_by_email(username).await? {
            return Ok(user);
        }
        if let Some(user) = contacts.find_by_name(username).await? {
            return Ok(user);
        }

        self.error("User not found", Some(&json!({ "username": username })));
        Err(SsoAuthenticationError::AliasNotFound(username.to_string()).into())
    }

    /// Non-empty first value of a bind attribute.
    fn bound_value(&self, attribute: Option<&str>) -> Option<&str> {
        attribute
            .and_then(|name| self.claims.first_value(name))
            .filter(|value| !value.is_empty())
    }

    async fn create_user(&self) -> Result<Contact, AuthError> {
        let username = self.require_username()?;
        let custom = self.configuration.custom();

        let (Some(full_name), Some(email)) = (
            self.bound_value(custom.fullname_bind_attribute.as_deref()),
            self.bound_value(custom.email_bind_attribute.as_deref()),
        ) else {
            self.error(
                "Invalid bind attributes",
                Some(&json!({
                    "fullname_bind_attribute": custom.fullname_bind_attribute,
                    "email_bind_attribute": custom.email_bind_attribute,
                })),
            );
            return Err(AuthError::InvalidArgumentProvided(
                "invalid bind attributes provided for auto import".to_string(),
            ));
        };

        let mut user = NewUser::new(username, full_name, email);
        if user.can_reach_frontend {
            user.set_can_reach_realtime_api(true);
        }
        user.set_contact_template(custom.contact_template.clone());
        user.validate()
            .map_err(|e| AuthError::InvalidArgumentProvided(e.to_string()))?;

        tracing::info!(
            alias = %user.alias,
            email = %user.email,
            "Creating user from SAML attributes"
        );
        let created = self.db.users().create(user).await?;
        Ok(created)
    }

    /// Run the whole login flow: authenticate, import, build the session.
    pub async fn complete_login(
        &mut self,
        request: &LoginRequest,
    ) -> Result<CompletedLogin, AuthError> {
        self.authenticate_or_fail(request).await?;
        self.import_user().await?;

        let db = self.db.clone();
        let session = self.get_legacy_session(&db).await?;
        let session_token = Uuid::new_v4().simple().to_string();
        let token = self.get_provider_token(Some(&session_token));

        Ok(CompletedLogin { session, token })
    }

    /// Redirect to the IdP with a new AuthnRequest.
    pub async fn login(&self, return_to: &str) -> Result<Redirect, AuthError> {
        let client = self.client()?;
        let redirect = client.login((!return_to.is_empty()).then_some(return_to))?;

        self.session
            .set(AUTHN_REQUEST_ID_KEY, JsonValue::String(redirect.request_id))
            .await?;

        tracing::debug!(return_to, "Redirecting to SAML IdP for login");
        Ok(Redirect::to(redirect.url))
    }

    /// Start a logout. Without an IdP logout endpoint the local session ends
    /// here and the redirect goes straight to the login page.
    pub async fn logout(&mut self) -> Result<Redirect, AuthError> {
        let saml_state: Option<SamlSessionState> =
            get_typed(self.session.as_ref(), SAML_SESSION_KEY).await?;
        let (name_id, session_index) = saml_state
            .map(|state| (state.name_id, state.session_index))
            .unwrap_or_default();

        self.info(
            login_events::LOGOUT,
            Some(&json!({ "name_id": name_id, "session_index": session_index })),
        );

        let client = self.client()?;
        let redirect = client.logout(
            LOGOUT_RETURN_TO,
            name_id.as_deref(),
            session_index.as_deref(),
        )?;

        match redirect.request_id {
            Some(request_id) => {
                self.session
                    .set(LOGOUT_REQUEST_ID_KEY, JsonValue::String(request_id))
                    .await?;
            }
            None => {
                self.session.invalidate().await?;
                self.state = ProviderState::LoggedOut;
            }
        }

        Ok(Redirect::to(redirect.url))
    }

    /// Process the IdP LogoutResponse. Returns a redirect only when the
    /// RelayState points somewhere other than the callback endpoint.
    pub async fn handle_callback_logout_response(
        &mut self,
        callback: &LogoutCallback,
    ) -> Result<Option<Redirect>, AuthError> {
        let client = self.client()?;
        let request_id: Option<String> =
            get_typed(self.session.as_ref(), LOGOUT_REQUEST_ID_KEY).await?;

        if let Err(errors) =
            client.process_logout_response(&callback.saml_response, request_id.as_deref())
        {
            self.error(
                login_events::LOGOUT_RESPONSE_ERROR,
                Some(&json!({ "errors": errors })),
            );
            return Err(self.fail(AuthError::ProcessLogoutResponse(errors)));
        }

        self.session.invalidate().await?;
        self.state = ProviderState::LoggedOut;
        tracing::info!("SAML single logout completed");

        Ok(callback
            .relay_state
            .as_deref()
            .filter(|relay_state| *relay_state != callback.self_url)
            .map(Redirect::to))
    }
}

#[async_trait]
impl ProviderAuthentication for SamlProvider {
    async fn authenticate_or_fail(&mut self, request: &LoginRequest) -> Result<(), AuthError> {
        self.state = ProviderState::Authenticating;

        let client = match self.client() {
            Ok(client) => client,
            Err(e) => return Err(self.fail(e)),
        };
        let request_id: Option<String> =
            match get_typed(self.session.as_ref(), AUTHN_REQUEST_ID_KEY).await {
                Ok(id) => id,
                Err(e) => return Err(self.fail(e.into())),
            };

        let response = match client.process_response(&request.saml_response, request_id.as_deref())
        {
            Ok(response) => response,
            Err(errors) => {
                tracing::error!(errors = ?errors, "SAML authentication response rejected");
                self.error(
                    login_events::AUTH_RESPONSE_ERROR,
                    Some(&json!({ "errors": errors })),
                );
                return Err(self.fail(AuthError::ProcessAuthenticationResponse(errors)));
            }
        };

        if !response.authenticated {
            self.error(login_events::USER_NOT_AUTHENTICATED, None);
            return Err(self.fail(AuthError::UserNotAuthenticated));
        }

        let metadata_errors = client.validate_sp_metadata();
        if !metadata_errors.is_empty() {
            self.info(
                login_events::INVALID_METADATA,
                Some(&json!({ "errors": metadata_errors })),
            );
            return Err(self.fail(AuthError::InvalidMetadata(metadata_errors)));
        }

        let attributes = response.attributes.to_json();
        tracing::info!(attributes = %attributes, "SAML attributes received");
        self.info(login_events::USER_INFORMATION, Some(&attributes));

        let user_id_attribute = self.configuration.custom().user_id_attribute.clone();
        let Some(username) = response
            .attributes
            .first_value(&user_id_attribute)
            .map(str::to_string)
        else {
            self.error(
                login_events::USER_ID_ATTRIBUTE_MISSING,
                Some(&json!({ "user_id_attribute": user_id_attribute })),
            );
            return Err(self.fail(AuthError::InvalidUserIdAttribute(user_id_attribute)));
        };

        let saml_state = SamlSessionState {
            session_index: response.session_index.clone(),
            name_id: response.name_id.clone(),
        };
        if let Err(e) = set_typed(self.session.as_ref(), SAML_SESSION_KEY, &saml_state).await {
            return Err(self.fail(e.into()));
        }

        self.username = Some(username);
        self.claims = response.attributes;

        let decision = security_access::evaluate(
            self.configuration.custom(),
            &self.claims,
            request.client_ip,
        );
        match decision {
            Ok(access) => {
                tracing::debug!(
                    username = ?self.username,
                    roles = ?access.role_matches,
                    contact_groups = access.contact_groups.len(),
                    "Access policy satisfied"
                );
                self.access = access;
                self.state = ProviderState::AccessValidated;
                Ok(())
            }
            Err(denied) => {
                let message = match &denied {
                    security_access::AccessDenied::AuthenticationConditions(_) => {
                        login_events::AUTHENTICATION_CONDITIONS
                    }
                    security_access::AccessDenied::AclConditions(_) => {
                        login_events::ACL_CONDITIONS
                    }
                };
                self.error(message, Some(&json!({ "reason": denied.to_string() })));
                Err(self.fail(denied.into()))
            }
        }
    }

    async fn find_user_or_fail(&self) -> Result<Contact, AuthError> {
        let contacts = self.db.contacts();
        self.find_user_in(contacts.as_ref()).await
    }

    async fn get_user(&self) -> Result<Option<Contact>, AuthError> {
        let username = self.require_username()?;
        let contacts = self.db.contacts();

        if let Some(user) = contacts.find_by_name(username).await? {
            return Ok(Some(user));
        }
        Ok(contacts.find_by_email(username).await?)
    }

    async fn import_user(&mut self) -> Result<(), AuthError> {
        let existing = match self.get_user().await {
            Ok(user) => user,
            Err(e) => return Err(self.fail(e)),
        };

        let user = match existing {
            Some(user) => Some(user),
            None if self.is_auto_import_enabled() => {
                self.info(
                    login_events::AUTO_IMPORT,
                    Some(&json!({ "username": self.username })),
                );
                let imported = async {
                    self.create_user().await?;
                    self.find_user_or_fail().await
                }
                .await;
                match imported {
                    Ok(user) => {
                        self.info(
                            login_events::AUTO_IMPORT_DONE,
                            Some(&json!({ "alias": user.alias, "email": user.email })),
                        );
                        Some(user)
                    }
                    Err(e) => return Err(self.fail(e)),
                }
            }
            None => None,
        };

        if let Some(user) = user {
            self.authenticated_user = Some(user);
            self.state = ProviderState::UserResolved;
        }
        Ok(())
    }

    async fn update_user(&mut self) -> Result<(), AuthError> {
        if !self.is_auto_import_enabled() || self.authenticated_user.is_some() {
            return Ok(());
        }

        self.info(
            login_events::AUTO_IMPORT,
            Some(&json!({ "username": self.username })),
        );
        let imported = async {
            self.create_user().await?;
            self.find_user_or_fail().await
        }
        .await;

        match imported {
            Ok(user) => {
                self.info(
                    login_events::AUTO_IMPORT_DONE,
                    Some(&json!({ "alias": user.alias, "email": user.email })),
                );
                self.authenticated_user = Some(user);
                self.state = ProviderState::UserResolved;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn get_legacy_session(&mut self, db: &DbPool) -> Result<LegacySession, AuthError> {
        let contacts = db.contacts();
        let user = match self.find_user_in(contacts.as_ref()).await {
            Ok(user) => user,
            Err(e) => return Err(self.fail(e)),
        };

        let session = LegacySession::new(&user);
        self.info(
            login_events::AUTHENTICATED,
            Some(&json!({ "contact_id": user.id, "alias": user.alias })),
        );
        tracing::info!(contact_id = user.id, alias = %user.alias, "SAML user authenticated");

        self.authenticated_user = Some(user);
        self.state = ProviderState::SessionEstablished;
        Ok(session)
    }

    fn get_provider_token(&self, token: Option<&str>) -> NewProviderToken {
        NewProviderToken::new(token.unwrap_or_default())
    }

    fn get_provider_refresh_token(&self) -> Option<NewProviderToken> {
        None
    }

    fn can_refresh_token(&self) -> bool {
        false
    }

    async fn refresh_token(&self, _tokens: AuthenticationTokens) -> Option<AuthenticationTokens> {
        None
    }

    fn get_configuration(&self) -> &ProviderConfiguration {
        &self.configuration
    }

    fn set_configuration(&mut self, configuration: ProviderConfiguration) {
        self.configuration = configuration;
    }

    fn is_auto_import_enabled(&self) -> bool {
        self.configuration.custom().is_auto_import_enabled()
    }

    fn get_username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    fn get_authenticated_user(&self) -> Option<&Contact> {
        self.authenticated_user.as_ref()
    }

    fn is_update_acl_supported(&self) -> bool {
        true
    }

    fn get_user_information(&self) -> JsonMap<String, JsonValue> {
        JsonMap::new()
    }

    fn get_id_token_payload(&self) -> JsonMap<String, JsonValue> {
        JsonMap::new()
    }

    fn get_acl_conditions_matches(&self) -> &[String] {
        &self.access.role_matches
    }

    fn get_user_access_groups_from_claims(&self, claim_values: &[String]) -> Vec<AccessGroup> {
        security_access::get_user_access_groups_from_claims(
            &self.configuration.custom().roles_mapping.relations,
            claim_values,
        )
    }

    fn get_user_contact_groups(&self) -> &[ContactGroup] {
        &self.access.contact_groups
    }
}
