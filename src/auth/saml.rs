//! SAML 2.0 protocol client backed by `samael`.
//!
//! Handles:
//! - AuthnRequest generation and signing (HTTP-Redirect binding)
//! - Response/Assertion parsing and validation
//! - Attribute extraction into [`Claims`]
//! - LogoutRequest generation and LogoutResponse checks
//! - SP metadata generation and self-validation

use std::io::{Read, Write};

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;
use flate2::{Compression, read::DeflateDecoder, write::DeflateEncoder};
use openssl::pkey::{PKey, Private};
use samael::{
    metadata::EntityDescriptor,
    schema::{AuthnContextClassRef, RequestedAuthnContext},
    service_provider::{ServiceProvider, ServiceProviderBuilder},
};
use uuid::Uuid;

use super::{
    claims::Claims,
    client::{
        AuthnResponse, ClientError, ClientSettings, LoginRedirect, LogoutRedirect, SamlClient,
        SamlClientFactory,
    },
};
use crate::config::AuthnContextComparison;

const STATUS_SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

/// Upper bound for an inflated LogoutResponse.
const MAX_DECOMPRESSED_SIZE: u64 = 64 * 1024;

/// Builds [`SamaelClient`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SamaelClientFactory;

impl SamlClientFactory for SamaelClientFactory {
    fn build_client(&self, settings: ClientSettings) -> Result<Box<dyn SamlClient>, ClientError> {
        Ok(Box::new(SamaelClient::new(settings)?))
    }
}

pub struct SamaelClient {
    settings: ClientSettings,
    idp_metadata: EntityDescriptor,
}

impl SamaelClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ClientError> {
        let idp_metadata = build_idp_metadata(&settings)?;
        Ok(Self {
            settings,
            idp_metadata,
        })
    }

    fn service_provider(&self) -> Result<ServiceProvider, ClientError> {
        ServiceProviderBuilder::default()
            .entity_id(self.settings.sp_entity_id.clone())
            .acs_url(self.settings.sp_acs_url.clone())
            .idp_metadata(self.idp_metadata.clone())
            .authn_name_id_format(self.settings.name_id_format.clone())
            .build()
            .map_err(|e| ClientError::Settings(format!("Failed to build ServiceProvider: {e}")))
    }

    /// Load the SP private key. PEM format (PKCS#8 or PKCS#1).
    fn load_private_key(&self) -> Result<PKey<Private>, ClientError> {
        let private_key_pem = self.settings.sp_private_key.as_ref().ok_or_else(|| {
            ClientError::Signing(
                "sign_requests is enabled but sp_private_key is not configured".to_string(),
            )
        })?;

        PKey::private_key_from_pem(private_key_pem.as_bytes()).map_err(|e| {
            ClientError::Signing(format!(
                "Failed to parse SP private key (expected PEM format): {e}"
            ))
        })
    }

    /// Sign a redirect URL for the HTTP-Redirect binding.
    ///
    /// The signature covers `SAMLRequest`, `RelayState` and `SigAlg` as they
    /// appear in the query string.
    fn sign_redirect_url(&self, mut url: url::Url) -> Result<url::Url, ClientError> {
        use openssl::{hash::MessageDigest, sign::Signer};

        let private_key = self.load_private_key()?;

        let sig_alg = if private_key.ec_key().is_ok() {
            "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256"
        } else {
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"
        };

        url.query_pairs_mut().append_pair("SigAlg", sig_alg);

        let query_string = url
            .query()
            .ok_or_else(|| ClientError::Signing("No query string to sign".to_string()))?;

        let mut signer = Signer::new(MessageDigest::sha256(), &private_key)
            .map_err(|e| ClientError::Signing(format!("Failed to create signer: {e}")))?;
        signer
            .update(query_string.as_bytes())
            .map_err(|e| ClientError::Signing(format!("Failed to update signer: {e}")))?;
        let signature = signer
            .sign_to_vec()
            .map_err(|e| ClientError::Signing(format!("Failed to sign: {e}")))?;

        let signature_b64 = STANDARD.encode(&signature);
        url.query_pairs_mut().append_pair("Signature", &signature_b64);

        Ok(url)
    }

    fn build_logout_request(
        &self,
        destination: &str,
        name_id: Option<&str>,
        session_index: Option<&str>,
    ) -> samael::schema::LogoutRequest {
        use samael::schema::{Issuer, LogoutRequest, NameID};

        LogoutRequest {
            id: Some(format!("_logout_{}", Uuid::new_v4())),
            version: Some("2.0".to_string()),
            issue_instant: Some(Utc::now()),
            destination: Some(destination.to_string()),
            issuer: Some(Issuer {
                value: Some(self.settings.sp_entity_id.clone()),
                ..Default::default()
            }),
            name_id: name_id.map(|value| NameID {
                value: value.to_string(),
                format: Some(self.settings.name_id_format.clone()),
            }),
            session_index: session_index.map(str::to_string),
            signature: None,
        }
    }

    fn check_logout_response(&self, xml: &str, request_id: Option<&str>) -> Vec<String> {
        let mut errors = Vec::new();

        let root = match capture(r"<(?:\w+:)?LogoutResponse\b([^>]*)>", xml) {
            Ok(Some(root)) => root,
            Ok(None) => return vec!["invalid_logout_response: not a LogoutResponse".to_string()],
            Err(e) => return vec![e],
        };

        match (request_id, xml_attribute(&root, "InResponseTo")) {
            (Some(expected), Some(actual)) if expected != actual => errors.push(format!(
                "invalid_logout_response: InResponseTo {actual} does not match request {expected}"
            )),
            (Some(expected), None) => errors.push(format!(
                "invalid_logout_response: missing InResponseTo for request {expected}"
            )),
            _ => {}
        }

        if let Some(destination) = xml_attribute(&root, "Destination")
            && destination != self.settings.sp_sls_url
        {
            errors.push(format!(
                "invalid_logout_response: unexpected Destination {destination}"
            ));
        }

        match capture(r"<(?:\w+:)?Issuer\b[^>]*>\s*([^<\s]+)\s*<", xml) {
            Ok(Some(issuer)) if issuer != self.settings.idp_entity_id => errors.push(format!(
                "invalid_issuer: {issuer} does not match {}",
                self.settings.idp_entity_id
            )),
            Ok(_) => {}
            Err(e) => errors.push(e),
        }

        match capture(
            r#"<(?:\w+:)?StatusCode\b[^>]*\bValue\s*=\s*(?:"([^"]*)"|'([^']*)')"#,
            xml,
        ) {
            Ok(Some(status)) if status == STATUS_SUCCESS => {}
            Ok(Some(status)) => errors.push(format!("logout_not_success: {status}")),
            Ok(None) => errors.push("invalid_logout_response: missing StatusCode".to_string()),
            Err(e) => errors.push(e),
        }

        errors
    }
}

impl SamlClient for SamaelClient {
    fn process_response(
        &self,
        saml_response: &str,
        request_id: Option<&str>,
    ) -> Result<AuthnResponse, Vec<String>> {
        let sp = self.service_provider().map_err(|e| vec![e.to_string()])?;

        // IdP-initiated responses carry no request id to correlate
        let possible_request_ids: Vec<&str> = request_id.into_iter().collect();
        let expected_ids =
            (!possible_request_ids.is_empty()).then_some(possible_request_ids.as_slice());
        let assertion = sp
            .parse_base64_response(saml_response.trim(), expected_ids)
            .map_err(|e| {
                tracing::debug!(error = %e, "SAML response validation failed");
                vec![format!("invalid_response: {e}")]
            })?;

        let name_id = assertion
            .subject
            .as_ref()
            .and_then(|s| s.name_id.as_ref())
            .map(|n| n.value.clone());

        let first_statement = assertion
            .authn_statements
            .as_ref()
            .and_then(|stmts| stmts.first());
        let session_index = first_statement.and_then(|stmt| stmt.session_index.clone());
        let authn_instant = first_statement.and_then(|stmt| stmt.authn_instant);

        Ok(AuthnResponse {
            authenticated: true,
            name_id,
            session_index,
            authn_instant,
            attributes: extract_claims(&assertion),
        })
    }

    fn validate_sp_metadata(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let metadata = match self.sp_metadata() {
            Ok(metadata) => metadata,
            Err(e) => return vec![e.to_string()],
        };

        match samael::metadata::de::from_str::<EntityDescriptor>(&metadata) {
            Ok(descriptor) => {
                if descriptor.entity_id.as_deref() != Some(self.settings.sp_entity_id.as_str()) {
                    errors.push("sp_entity_id_mismatch".to_string());
                }
                let has_acs = descriptor.sp_sso_descriptors.as_ref().is_some_and(|sps| {
                    sps.iter().any(|sp| {
                        sp.assertion_consumer_services
                            .iter()
                            .any(|acs| acs.location == self.settings.sp_acs_url)
                    })
                });
                if !has_acs {
                    errors.push("sp_acs_not_found".to_string());
                }
            }
            Err(e) => errors.push(format!("invalid_xml: {e}")),
        }

        if let Some(cert) = &self.settings.sp_certificate
            && openssl::x509::X509::from_pem(cert.as_bytes()).is_err()
        {
            errors.push("sp_cert_not_found_and_required".to_string());
        }

        if self.settings.sign_requests && self.load_private_key().is_err() {
            errors.push("sp_private_key_invalid".to_string());
        }

        errors
    }

    fn sp_metadata(&self) -> Result<String, ClientError> {
        let settings = &self.settings;
        let mut xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="{}">
  <md:SPSSODescriptor AuthnRequestsSigned="{}" WantAssertionsSigned="true" protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">"#,
            xml_escape(&settings.sp_entity_id),
            settings.sign_requests
        );

        if let Some(sp_cert) = &settings.sp_certificate {
            xml.push_str(&format!(
                r#"
    <md:KeyDescriptor use="signing">
      <ds:KeyInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
        <ds:X509Data>
          <ds:X509Certificate>{}</ds:X509Certificate>
        </ds:X509Data>
      </ds:KeyInfo>
    </md:KeyDescriptor>"#,
                xml_escape(&strip_pem_headers(sp_cert))
            ));
        }

        xml.push_str(&format!(
            r#"
    <md:SingleLogoutService
        Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect"
        Location="{}"/>
    <md:NameIDFormat>{}</md:NameIDFormat>
    <md:AssertionConsumerService
        Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST"
        Location="{}"
        index="0"/>
  </md:SPSSODescriptor>
</md:EntityDescriptor>"#,
            xml_escape(&settings.sp_sls_url),
            xml_escape(&settings.name_id_format),
            xml_escape(&settings.sp_acs_url)
        ));

        Ok(xml)
    }

    fn login(&self, return_to: Option<&str>) -> Result<LoginRedirect, ClientError> {
        let sp = self.service_provider()?;

        let mut authn_request = sp
            .make_authentication_request(&self.settings.idp_sso_url)
            .map_err(|e| ClientError::Encoding(format!("Failed to create AuthnRequest: {e}")))?;

        if let Some(context) = &self.settings.requested_authn_context {
            authn_request.requested_authn_context = Some(RequestedAuthnContext {
                authn_context_class_refs: Some(vec![AuthnContextClassRef {
                    value: Some(context.class_ref.clone()),
                }]),
                authn_context_decl_refs: None,
                comparison: Some(samael_comparison(context.comparison)),
            });
        }

        let request_id = authn_request.id.clone();
        let relay_state = return_to.unwrap_or_default();

        let url = if self.settings.sign_requests {
            let private_key = self.load_private_key()?;
            authn_request
                .signed_redirect(relay_state, private_key)
                .map_err(|e| ClientError::Signing(format!("Failed to sign AuthnRequest: {e}")))?
                .ok_or_else(|| {
                    ClientError::Encoding("AuthnRequest has no destination".to_string())
                })?
        } else {
            authn_request
                .redirect(relay_state)
                .map_err(|e| ClientError::Encoding(format!("Failed to encode AuthnRequest: {e}")))?
                .ok_or_else(|| {
                    ClientError::Encoding("AuthnRequest has no destination".to_string())
                })?
        };

        Ok(LoginRedirect {
            url: url.to_string(),
            request_id,
        })
    }

    fn logout(
        &self,
        return_to: &str,
        name_id: Option<&str>,
        session_index: Option<&str>,
    ) -> Result<LogoutRedirect, ClientError> {
        use samael::traits::ToXml;

        let Some(idp_slo_url) = &self.settings.idp_slo_url else {
            return Ok(LogoutRedirect {
                url: return_to.to_string(),
                request_id: None,
            });
        };

        let logout_request = self.build_logout_request(idp_slo_url, name_id, session_index);
        let request_id = logout_request.id.clone();

        let xml = logout_request
            .to_string()
            .map_err(|e| {
                ClientError::Encoding(format!("Failed to serialize LogoutRequest: {e:?}"))
            })?;

        let mut compressed_buf = vec![];
        {
            let mut encoder = DeflateEncoder::new(&mut compressed_buf, Compression::default());
            encoder.write_all(xml.as_bytes()).map_err(|e| {
                ClientError::Encoding(format!("Failed to compress LogoutRequest: {e}"))
            })?;
        }
        let encoded = STANDARD.encode(&compressed_buf);

        let mut url = url::Url::parse(idp_slo_url)
            .map_err(|e| ClientError::Settings(format!("Failed to parse IdP SLO URL: {e}")))?;
        url.query_pairs_mut().append_pair("SAMLRequest", &encoded);
        if !return_to.is_empty() {
            url.query_pairs_mut().append_pair("RelayState", return_to);
        }

        let url = if self.settings.sign_requests {
            self.sign_redirect_url(url)?
        } else {
            url
        };

        tracing::debug!(
            idp_slo_url = %idp_slo_url,
            signed = self.settings.sign_requests,
            "Generated SAML LogoutRequest URL"
        );

        Ok(LogoutRedirect {
            url: url.to_string(),
            request_id,
        })
    }

    fn process_logout_response(
        &self,
        saml_response: &str,
        request_id: Option<&str>,
    ) -> Result<(), Vec<String>> {
        let xml = decode_redirect_message(saml_response)?;
        let errors = self.check_logout_response(&xml, request_id);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Build an EntityDescriptor for the IdP from the settings.
fn build_idp_metadata(settings: &ClientSettings) -> Result<EntityDescriptor, ClientError> {
    let slo_service = settings
        .idp_slo_url
        .as_ref()
        .map(|url| {
            format!(
                r#"<md:SingleLogoutService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="{}"/>"#,
                xml_escape(url)
            )
        })
        .unwrap_or_default();
    let xml = format!(
        r#"<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="{}">
    <md:IDPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
        <md:KeyDescriptor use="signing">
            <ds:KeyInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
                <ds:X509Data>
                    <ds:X509Certificate>{}</ds:X509Certificate>
                </ds:X509Data>
            </ds:KeyInfo>
        </md:KeyDescriptor>
        <md:SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="{}"/>
        {}
    </md:IDPSSODescriptor>
</md:EntityDescriptor>"#,
        xml_escape(&settings.idp_entity_id),
        xml_escape(&strip_pem_headers(&settings.idp_certificate)),
        xml_escape(&settings.idp_sso_url),
        slo_service
    );

    samael::metadata::de::from_str(&xml).map_err(|e| {
        tracing::error!(error = %e, "Failed to build IdP metadata from settings");
        ClientError::Metadata(format!("Failed to build IdP metadata: {e}"))
    })
}

/// Strip PEM headers and line breaks from a certificate.
fn strip_pem_headers(pem: &str) -> String {
    pem.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("-----BEGIN") && !line.starts_with("-----END"))
        .collect::<Vec<_>>()
        .join("")
}

/// Collect every assertion attribute. Attributes are keyed by name, or by
/// friendly name when unnamed; non-textual values become `""`.
fn extract_claims(assertion: &samael::schema::Assertion) -> Claims {
    let mut claims = Claims::new();

    for statement in assertion.attribute_statements.iter().flatten() {
        for attr in &statement.attributes {
            let Some(name) = attr.name.as_ref().or(attr.friendly_name.as_ref()) else {
                continue;
            };
            claims.declare(name.clone());
            for value in &attr.values {
                claims.push(name.clone(), value.value.clone().unwrap_or_default());
            }
        }
    }

    claims
}

fn samael_comparison(comparison: AuthnContextComparison) -> samael::schema::AuthnContextComparison {
    use samael::schema::AuthnContextComparison as Samael;

    match comparison {
        AuthnContextComparison::Exact => Samael::Exact,
        AuthnContextComparison::Minimum => Samael::Minimum,
        AuthnContextComparison::Maximum => Samael::Maximum,
        AuthnContextComparison::Better => Samael::Better,
    }
}

/// Decode a message received through the HTTP-Redirect (deflated) or
/// HTTP-POST (plain) binding.
fn decode_redirect_message(encoded: &str) -> Result<String, Vec<String>> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let decoded = STANDARD
        .decode(compact)
        .map_err(|e| vec![format!("invalid_logout_response: base64 decode failed: {e}")])?;

    if decoded.trim_ascii_start().starts_with(b"<") {
        return String::from_utf8(decoded)
            .map_err(|e| vec![format!("invalid_logout_response: not UTF-8: {e}")]);
    }

    let mut inflated = String::new();
    let inflate = DeflateDecoder::new(&decoded[..])
        .take(MAX_DECOMPRESSED_SIZE + 1)
        .read_to_string(&mut inflated);
    match inflate {
        Ok(read) if read as u64 > MAX_DECOMPRESSED_SIZE => Err(vec![format!(
            "invalid_logout_response: message exceeds {MAX_DECOMPRESSED_SIZE} bytes"
        )]),
        Ok(_) if !inflated.is_empty() => Ok(inflated),
        Ok(_) => Err(vec!["invalid_logout_response: empty message".to_string()]),
        Err(e) => Err(vec![format!("invalid_logout_response: inflate failed: {e}")]),
    }
}

/// First participating capture group of `pattern` in `haystack`.
fn capture(pattern: &str, haystack: &str) -> Result<Option<String>, String> {
    let re = regex::Regex::new(pattern).map_err(|e| format!("internal_error: {e}"))?;
    Ok(re.captures(haystack).and_then(|c| {
        c.iter()
            .skip(1)
            .flatten()
            .next()
            .map(|m| m.as_str().to_string())
    }))
}

/// Read `name="value"` or `name='value'` from an element's attribute list.
fn xml_attribute(attributes: &str, name: &str) -> Option<String> {
    let pattern = format!(
        r#"(?:^|\s){}\s*=\s*(?:"([^"]*)"|'([^']*)')"#,
        regex::escape(name)
    );
    capture(&pattern, attributes)
        .ok()
        .flatten()
        .map(|value| xml_unescape(&value))
}

fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Escape text for use in XML content and attribute values.
fn xml_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            _ => result.push(c),
        }
    }
    result
}
