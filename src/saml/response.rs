//! Consumption of the SAML response the IdP posts to the ACS URL.
//!
//! Signature verification is not performed here; callers hand in responses
//! that a signature-verifying layer has already accepted.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::attributes::AttributeSet;
use crate::error::{SsoError, SsoResult};

const STATUS_SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

/// Result of consuming a SAML response.
#[derive(Debug, Clone)]
pub struct ConsumedResponse {
    pub assertion_id: String,
    pub issuer: String,
    pub name_id: Option<String>,
    pub attributes: AttributeSet,
}

impl ConsumedResponse {
    /// Decode and parse a base64 `SAMLResponse` form value.
    pub fn from_base64(encoded: &str, clock_skew_secs: i64) -> SsoResult<Self> {
        // Form posts may wrap the value across lines.
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();

        let response_xml = BASE64
            .decode(compact.as_bytes())
            .map_err(|e| SsoError::InvalidResponse(format!("not valid base64: {}", e)))?;
        let response_str = String::from_utf8(response_xml)
            .map_err(|_| SsoError::InvalidResponse("not valid UTF-8".to_string()))?;

        Self::from_xml(&response_str, clock_skew_secs)
    }

    /// Parse a SAML response document.
    pub fn from_xml(xml: &str, clock_skew_secs: i64) -> SsoResult<Self> {
        debug!("Processing SAML response");

        let response: samael::schema::Response = xml
            .parse()
            .map_err(|e| SsoError::InvalidResponse(format!("failed to parse: {}", e)))?;

        if let Some(ref status) = response.status {
            let status_value = status.status_code.value.as_deref();
            if status_value != Some(STATUS_SUCCESS) {
                let message = status
                    .status_message
                    .as_ref()
                    .and_then(|m| m.value.clone())
                    .unwrap_or_else(|| "Unknown error".to_string());
                return Err(SsoError::InvalidResponse(format!(
                    "authentication failed: {}",
                    message
                )));
            }
        }

        let assertion = response
            .assertion
            .as_ref()
            .ok_or_else(|| SsoError::InvalidResponse("response contains no assertion".to_string()))?;

        let skew = Duration::try_seconds(clock_skew_secs)
            .filter(|skew| *skew >= Duration::zero())
            .ok_or_else(|| {
                SsoError::Configuration(format!("invalid clock skew: {}s", clock_skew_secs))
            })?;
        let now = Utc::now();

        if let Some(ref conditions) = assertion.conditions {
            // Bounds saturate at the representable range.
            if let Some(not_before) = conditions.not_before {
                let earliest = not_before
                    .checked_sub_signed(skew)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                if now < earliest {
                    return Err(SsoError::InvalidResponse("assertion not yet valid".to_string()));
                }
            }
            if let Some(not_on_or_after) = conditions.not_on_or_after {
                let latest = not_on_or_after
                    .checked_add_signed(skew)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                if now >= latest {
                    return Err(SsoError::InvalidResponse("assertion has expired".to_string()));
                }
            }
        }

        let name_id = assertion
            .subject
            .as_ref()
            .and_then(|s| s.name_id.as_ref())
            .map(|n| n.value.clone());

        let issuer = assertion
            .issuer
            .value
            .clone()
            .unwrap_or_else(|| "unknown".to_string());

        let attributes = AttributeSet::from_source(assertion);

        info!(
            assertion_id = %assertion.id,
            idp = %issuer,
            attributes = attributes.len(),
            "SAML assertion consumed"
        );

        Ok(Self {
            assertion_id: assertion.id.clone(),
            issuer,
            name_id,
            attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sso::identity::{Identity, Membership};
    use crate::timestamp::format_utc;

    const SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

    /// Minimal IdP response with the assertion spliced in verbatim.
    fn response_xml(status: &str, assertion: &str) -> String {
        format!(
            r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_r1" Version="2.0" IssueInstant="2014-06-22T01:00:00Z">
  <saml:Issuer>https://idp.example.com</saml:Issuer>
  <samlp:Status>
    <samlp:StatusCode Value="{}"/>
  </samlp:Status>
  {}
</samlp:Response>"#,
            status, assertion
        )
    }

    fn assertion_xml(conditions: &str) -> String {
        format!(
            r#"<saml:Assertion xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xs="http://www.w3.org/2001/XMLSchema" ID="_a1" Version="2.0" IssueInstant="2014-06-22T01:00:00Z">
    <saml:Issuer>https://idp.example.com</saml:Issuer>
    <saml:Subject>
      <saml:NameID Format="urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified">usr-1</saml:NameID>
    </saml:Subject>
    {}
    <saml:AttributeStatement>
      <saml:Attribute Name="uid">
        <saml:AttributeValue xsi:type="xs:string">usr-1</saml:AttributeValue>
      </saml:Attribute>
      <saml:Attribute Name="group_uid">
        <saml:AttributeValue xsi:type="xs:string">cld-1</saml:AttributeValue>
      </saml:Attribute>
      <saml:Attribute Name="group_role">
        <saml:AttributeValue xsi:type="xs:string">Admin</saml:AttributeValue>
        <saml:AttributeValue xsi:type="xs:string">Member</saml:AttributeValue>
      </saml:Attribute>
      <saml:Attribute Name="mno_session">
        <saml:AttributeValue xsi:type="xs:string">sessiontoken</saml:AttributeValue>
      </saml:Attribute>
      <saml:Attribute Name="mno_session_recheck">
        <saml:AttributeValue xsi:type="xs:string">2030-01-01T00:00:00Z</saml:AttributeValue>
      </saml:Attribute>
    </saml:AttributeStatement>
  </saml:Assertion>"#,
            conditions
        )
    }

    fn conditions_xml(not_before: DateTime<Utc>, not_on_or_after: DateTime<Utc>) -> String {
        format!(
            r#"<saml:Conditions NotBefore="{}" NotOnOrAfter="{}"/>"#,
            format_utc(&not_before),
            format_utc(&not_on_or_after)
        )
    }

    #[test]
    fn test_consumes_success_response() {
        let now = Utc::now();
        let conditions = conditions_xml(now - Duration::minutes(1), now + Duration::minutes(5));
        let xml = response_xml(SUCCESS, &assertion_xml(&conditions));

        let consumed = ConsumedResponse::from_base64(&BASE64.encode(&xml), 300).unwrap();
        assert_eq!(consumed.assertion_id, "_a1");
        assert_eq!(consumed.issuer, "https://idp.example.com");
        assert_eq!(consumed.name_id.as_deref(), Some("usr-1"));
        assert_eq!(consumed.attributes.len(), 5);
        assert_eq!(consumed.attributes.value("group_role"), "Admin");

        let identity = Identity::from_attributes(&consumed.attributes);
        assert_eq!(identity.uid, "usr-1");
        assert_eq!(identity.group_uid, "cld-1");
        assert_eq!(identity.session_token, "sessiontoken");
        assert_eq!(format_utc(&identity.session_recheck), "2030-01-01T00:00:00Z");

        let membership = Membership::from_attributes(&consumed.attributes);
        assert_eq!(membership.user_uid, "usr-1");
        assert_eq!(membership.group_uid, "cld-1");
        assert_eq!(membership.role, "Admin");
    }

    #[test]
    fn test_accepts_assertion_without_conditions() {
        let xml = response_xml(SUCCESS, &assertion_xml(""));
        let consumed = ConsumedResponse::from_xml(&xml, 0).unwrap();
        assert_eq!(consumed.attributes.value("uid"), "usr-1");
    }

    #[test]
    fn test_validity_window_honours_clock_skew() {
        let now = Utc::now();

        let expired = conditions_xml(now - Duration::hours(1), now - Duration::minutes(1));
        let xml = response_xml(SUCCESS, &assertion_xml(&expired));
        assert!(ConsumedResponse::from_xml(&xml, 300).is_ok());
        let err = ConsumedResponse::from_xml(&xml, 0).unwrap_err();
        assert!(matches!(err, SsoError::InvalidResponse(msg) if msg == "assertion has expired"));

        let early = conditions_xml(now + Duration::minutes(1), now + Duration::hours(1));
        let xml = response_xml(SUCCESS, &assertion_xml(&early));
        assert!(ConsumedResponse::from_xml(&xml, 300).is_ok());
        let err = ConsumedResponse::from_xml(&xml, 0).unwrap_err();
        assert!(matches!(err, SsoError::InvalidResponse(msg) if msg == "assertion not yet valid"));
    }

    #[test]
    fn test_rejects_out_of_range_skew() {
        let now = Utc::now();
        let conditions = conditions_xml(now - Duration::minutes(1), now + Duration::minutes(5));
        let xml = response_xml(SUCCESS, &assertion_xml(&conditions));

        for skew in [i64::MAX, i64::MIN, -1] {
            let err = ConsumedResponse::from_xml(&xml, skew).unwrap_err();
            assert!(matches!(err, SsoError::Configuration(_)), "skew {}", skew);
        }
    }

    #[test]
    fn test_rejects_failed_status() {
        let xml = response_xml(
            "urn:oasis:names:tc:SAML:2.0:status:Requester",
            &assertion_xml(""),
        );
        let err = ConsumedResponse::from_xml(&xml, 300).unwrap_err();
        assert!(matches!(err, SsoError::InvalidResponse(msg) if msg.starts_with("authentication failed")));
    }

    #[test]
    fn test_rejects_missing_assertion() {
        let xml = response_xml(SUCCESS, "");
        let err = ConsumedResponse::from_xml(&xml, 300).unwrap_err();
        assert!(matches!(err, SsoError::InvalidResponse(msg) if msg.contains("no assertion")));
    }

    #[test]
    fn test_rejects_bad_base64() {
        let err = ConsumedResponse::from_base64("not base64 !!!", 300).unwrap_err();
        assert!(matches!(err, SsoError::InvalidResponse(msg) if msg.contains("base64")));
    }

    #[test]
    fn test_rejects_non_utf8() {
        let encoded = BASE64.encode([0xffu8, 0xfe, 0xfd]);
        let err = ConsumedResponse::from_base64(&encoded, 300).unwrap_err();
        assert!(matches!(err, SsoError::InvalidResponse(msg) if msg.contains("UTF-8")));
    }

    #[test]
    fn test_rejects_non_saml_xml() {
        let encoded = BASE64.encode("<html><body>login failed</body></html>");
        let err = ConsumedResponse::from_base64(&encoded, 300).unwrap_err();
        assert!(matches!(err, SsoError::InvalidResponse(_)));
    }
}
