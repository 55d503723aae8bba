//! Construction of the validation endpoints.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// CAS protocol generation spoken with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// CAS 1.0, `validate` endpoint with a plain text response.
    Cas1,
    /// CAS 2.0 and 3.0, `serviceValidate` endpoint with an XML response.
    Cas2,
}

impl Protocol {
    pub const fn path_segment(self) -> &'static str {
        match self {
            Protocol::Cas1 => "validate",
            Protocol::Cas2 => "serviceValidate",
        }
    }

    /// Protocol to try next when the endpoint for `self` doesn't exist on the server.
    pub const fn fallback(self) -> Option<Protocol> {
        match self {
            Protocol::Cas2 => Some(Protocol::Cas1),
            Protocol::Cas1 => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Cas1 => write!(f, "CAS 1.0"),
            Protocol::Cas2 => write!(f, "CAS 2.0/3.0"),
        }
    }
}

/// Base URL of a CAS server, such as `https://cas.example.org/cas`.
///
/// The validation endpoints are resolved under its path, so servers mounted under a sub-path work as
/// expected. Any query or fragment is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Url", into = "Url")]
pub struct CasServerUrl {
    url: Url,
    /// Path of `url` with a trailing slash.
    prefix: String,
}

impl CasServerUrl {
    pub fn new(url: Url) -> Result<Self, ConfigError> {
        if url.cannot_be_a_base() {
            return Err(ConfigError::CannotBeABase { url });
        }

        if !matches!(url.scheme(), "http" | "https") {
            let scheme = url.scheme().to_owned();
            return Err(ConfigError::UnsupportedScheme { url, scheme });
        }

        let mut prefix = url.path().to_owned();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }

        Ok(Self { url, prefix })
    }

    pub fn as_url(&self) -> &Url {
        &self.url
    }

    /// Builds the validation endpoint of `protocol` for the given service and ticket.
    ///
    /// The service URL is sent without its fragment. Both parameters are form-urlencoded exactly once.
    pub fn endpoint(&self, protocol: Protocol, service: &Url, ticket: &str) -> Url {
        let mut service = service.clone();
        service.set_fragment(None);

        let mut endpoint = self.url.clone();
        endpoint.set_fragment(None);
        endpoint.set_query(None);
        endpoint.set_path(&format!("{}{}", self.prefix, protocol.path_segment()));
        endpoint
            .query_pairs_mut()
            .append_pair("service", service.as_str())
            .append_pair("ticket", ticket);

        endpoint
    }

    pub fn service_validate_url(&self, service: &Url, ticket: &str) -> Url {
        self.endpoint(Protocol::Cas2, service, ticket)
    }

    pub fn validate_url(&self, service: &Url, ticket: &str) -> Url {
        self.endpoint(Protocol::Cas1, service, ticket)
    }
}

impl TryFrom<Url> for CasServerUrl {
    type Error = ConfigError;

    fn try_from(url: Url) -> Result<Self, Self::Error> {
        Self::new(url)
    }
}

impl From<CasServerUrl> for Url {
    fn from(value: CasServerUrl) -> Self {
        value.url
    }
}

impl FromStr for CasServerUrl {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(Url::parse(s)?)
    }
}

impl fmt::Display for CasServerUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.url, f)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use rstest::rstest;

    use super::*;

    fn service() -> Url {
        Url::parse("https://app.example.org/cb").unwrap()
    }

    #[test]
    fn service_validate_url_example() {
        let cas: CasServerUrl = "https://cas.example.org/cas".parse().unwrap();
        let url = cas.service_validate_url(&service(), "ST-123");
        assert_eq!(
            url.as_str(),
            "https://cas.example.org/cas/serviceValidate?service=https%3A%2F%2Fapp.example.org%2Fcb&ticket=ST-123"
        );
    }

    #[rstest]
    #[case("https://cas.example.org", "/serviceValidate")]
    #[case("https://cas.example.org/", "/serviceValidate")]
    #[case("https://cas.example.org/cas", "/cas/serviceValidate")]
    #[case("https://cas.example.org/cas/", "/cas/serviceValidate")]
    #[case("https://cas.example.org/sso/cas", "/sso/cas/serviceValidate")]
    #[case("https://cas.example.org/cas?locale=en#top", "/cas/serviceValidate")]
    fn path_prefix_is_preserved(#[case] base: &str, #[case] expected_path: &str) {
        let cas: CasServerUrl = base.parse().unwrap();
        let url = cas.service_validate_url(&service(), "ST-1");
        assert_eq!(url.path(), expected_path);
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query_pairs().count(), 2);
    }

    #[test]
    fn validate_url_uses_cas1_segment() {
        let cas: CasServerUrl = "http://localhost:8080/cas".parse().unwrap();
        let url = cas.validate_url(&service(), "ST-1");
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/cas/validate?service=https%3A%2F%2Fapp.example.org%2Fcb&ticket=ST-1"
        );
    }

    #[test]
    fn fragment_is_stripped_from_service() {
        let cas: CasServerUrl = "https://cas.example.org/cas".parse().unwrap();
        let service = Url::parse("https://app.example.org/cb?next=%2Fhome#section").unwrap();
        let url = cas.service_validate_url(&service, "ST-1");

        let (_, sent) = url.query_pairs().find(|(k, _)| k == "service").unwrap();
        assert_eq!(sent, "https://app.example.org/cb?next=%2Fhome");
        assert!(!url.as_str().contains("section"));
    }

    #[test]
    fn ticket_is_encoded() {
        let cas: CasServerUrl = "https://cas.example.org".parse().unwrap();
        let url = cas.service_validate_url(&service(), "ST-1&admin=true");
        assert_eq!(url.query(), Some("service=https%3A%2F%2Fapp.example.org%2Fcb&ticket=ST-1%26admin%3Dtrue"));
    }

    #[rstest]
    #[case("mailto:cas@example.org")]
    #[case("ftp://cas.example.org/cas")]
    #[case("not a url")]
    fn invalid_base_is_rejected(#[case] base: &str) {
        assert!(base.parse::<CasServerUrl>().is_err());
    }

    #[test]
    fn fallback_chain() {
        assert_eq!(Protocol::Cas2.fallback(), Some(Protocol::Cas1));
        assert_eq!(Protocol::Cas1.fallback(), None);
    }
}
