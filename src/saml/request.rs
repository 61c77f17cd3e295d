//! SAML AuthnRequest for the HTTP-Redirect binding.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use std::io::Write;
use tracing::debug;

use crate::config::PresetConfig;
use crate::error::SsoResult;
use crate::timestamp::format_utc;

const PROTOCOL_NS: &str = "urn:oasis:names:tc:SAML:2.0:protocol";
const ASSERTION_NS: &str = "urn:oasis:names:tc:SAML:2.0:assertion";
const HTTP_POST_BINDING: &str = "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST";
const PASSWORD_PROTECTED_TRANSPORT: &str =
    "urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport";

/// An AuthnRequest for one login attempt.
///
/// `id` and `issue_instant` are fixed at construction, so two builds never
/// produce the same request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthnRequest {
    pub id: String,
    pub issue_instant: String,
    pub acs_url: String,
    pub issuer: String,
    pub name_id_format: String,
    pub idp_sso_url: String,
}

impl AuthnRequest {
    /// Build a request from a resolved preset.
    pub fn build(config: &PresetConfig) -> SsoResult<Self> {
        config.require_sso_urls()?;

        // XML IDs may not start with a digit.
        let id = format!("_{}", uuid::Uuid::new_v4());

        Ok(Self {
            id,
            issue_instant: format_utc(&Utc::now()),
            acs_url: config.acs_url.clone(),
            issuer: config.issuer.clone(),
            name_id_format: config.name_id_format.clone(),
            idp_sso_url: config.idp_sso_url.clone(),
        })
    }

    /// Serialize to the AuthnRequest document (no XML declaration).
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(768);
        xml.push_str("<samlp:AuthnRequest xmlns:samlp=\"");
        xml.push_str(PROTOCOL_NS);
        xml.push_str("\" xmlns:saml=\"");
        xml.push_str(ASSERTION_NS);
        xml.push_str("\" ID=\"");
        xml.push_str(&xml_escape(&self.id));
        xml.push_str("\" Version=\"2.0\" IssueInstant=\"");
        xml.push_str(&self.issue_instant);
        xml.push_str("\" ProtocolBinding=\"");
        xml.push_str(HTTP_POST_BINDING);
        xml.push_str("\" AssertionConsumerServiceURL=\"");
        xml.push_str(&xml_escape(&self.acs_url));
        xml.push_str("\"><saml:Issuer>");
        xml.push_str(&xml_escape(&self.issuer));
        xml.push_str("</saml:Issuer><samlp:NameIDPolicy Format=\"");
        xml.push_str(&xml_escape(&self.name_id_format));
        xml.push_str("\" AllowCreate=\"true\"/>");
        xml.push_str("<samlp:RequestedAuthnContext Comparison=\"exact\"><saml:AuthnContextClassRef>");
        xml.push_str(PASSWORD_PROTECTED_TRANSPORT);
        xml.push_str("</saml:AuthnContextClassRef></samlp:RequestedAuthnContext>");
        xml.push_str("</samlp:AuthnRequest>");
        xml
    }

    /// Raw DEFLATE then base64, as the redirect binding requires.
    pub fn encoded(&self) -> SsoResult<String> {
        deflate_and_encode(&self.to_xml())
    }

    /// Redirect URL to the IdP, with extra query parameters appended in order.
    pub fn redirect_url<K, V>(&self, extra_params: &[(K, V)]) -> SsoResult<String>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let encoded = self.encoded()?;

        let mut url = format!(
            "{}?SAMLRequest={}",
            self.idp_sso_url,
            urlencoding::encode(&encoded)
        );

        for (key, value) in extra_params {
            url.push('&');
            url.push_str(key.as_ref());
            url.push('=');
            url.push_str(&urlencoding::encode(value.as_ref()));
        }

        debug!(request_id = %self.id, idp = %self.idp_sso_url, "Created SAML AuthnRequest redirect");
        Ok(url)
    }
}

/// Deflate and base64 encode for SAML redirect binding.
fn deflate_and_encode(xml: &str) -> SsoResult<String> {
    let mut encoder =
        flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(xml.as_bytes())?;
    let compressed = encoder.finish()?;
    Ok(BASE64.encode(compressed))
}

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
