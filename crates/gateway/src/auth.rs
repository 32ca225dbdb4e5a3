//! Basic-Auth pass-through.
//!
//! The gateway holds no users of its own. Whatever the operator sends is
//! decoded and forwarded to vSphere.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use vmfish_common::Credential;

use crate::error::ApiError;

/// Decode an `Authorization: Basic ...` header value.
///
/// The scheme is matched case-insensitively and the decoded payload is split
/// on the first colon, so passwords may contain colons.
pub fn parse_basic_auth(header_value: Option<&str>) -> Result<Credential, ApiError> {
    let value = header_value
        .filter(|v| {
            v.get(..6)
                .map(|scheme| scheme.eq_ignore_ascii_case("basic "))
                .unwrap_or(false)
        })
        .ok_or_else(|| ApiError::Authentication("Missing or invalid Authorization header".to_string()))?;

    let invalid = || ApiError::Authentication("Invalid Basic Auth format".to_string());

    let encoded = value[6..].trim();
    let decoded = STANDARD.decode(encoded).map_err(|_| invalid())?;
    let decoded = String::from_utf8(decoded).map_err(|_| invalid())?;
    let (username, password) = decoded.split_once(':').ok_or_else(invalid)?;

    Ok(Credential::new(username, password))
}

/// Extractor for endpoints that need platform credentials
pub struct BasicAuth(pub Credential);

#[async_trait]
impl<S> FromRequestParts<S> for BasicAuth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        parse_basic_auth(header_value).map(BasicAuth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(payload: &str) -> String {
        format!("Basic {}", STANDARD.encode(payload))
    }

    #[test]
    fn test_parse_valid_header() {
        let cred = parse_basic_auth(Some(&basic("administrator@vsphere.local:pw"))).unwrap();
        assert_eq!(cred.username, "administrator@vsphere.local");
        assert_eq!(cred.password, "pw");
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        let header = format!("bAsIc {}", STANDARD.encode("root:pw"));
        let cred = parse_basic_auth(Some(&header)).unwrap();
        assert_eq!(cred.username, "root");
    }

    #[test]
    fn test_password_may_contain_colons() {
        let cred = parse_basic_auth(Some(&basic("root:a:b::c"))).unwrap();
        assert_eq!(cred.username, "root");
        assert_eq!(cred.password, "a:b::c");
    }

    #[test]
    fn test_empty_password() {
        let cred = parse_basic_auth(Some(&basic("root:"))).unwrap();
        assert_eq!(cred.password, "");
    }

    #[test]
    fn test_missing_or_wrong_scheme() {
        for header in [None, Some(""), Some("Bearer abc"), Some("Basic"), Some("Basicxyz")] {
            match parse_basic_auth(header) {
                Err(ApiError::Authentication(msg)) => {
                    assert_eq!(msg, "Missing or invalid Authorization header")
                }
                other => panic!("unexpected result for {:?}: {:?}", header, other),
            }
        }
    }

    #[test]
    fn test_garbled_payload() {
        let no_colon = basic("rootpw");
        let not_utf8 = format!("Basic {}", STANDARD.encode([0xff, 0xfe, b':', b'x']));
        for header in ["Basic !!!notbase64!!!", no_colon.as_str(), not_utf8.as_str()] {
            match parse_basic_auth(Some(header)) {
                Err(ApiError::Authentication(msg)) => assert_eq!(msg, "Invalid Basic Auth format"),
                other => panic!("unexpected result for {}: {:?}", header, other),
            }
        }
    }
}
