//! Validator configuration file.
//!
//! ```json
//! {
//!     "CasUrl": "https://cas.example.org/cas",
//!     "UserAgent": "my-app/1.0",
//!     "TimeoutSecs": 10,
//!     "Proxy": { "Manual": "http://proxy.corp:8080" }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::endpoint::CasServerUrl;
use crate::validator::ServiceTicketValidator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ValidatorConf {
    /// Base URL of the CAS server
    pub cas_url: CasServerUrl,

    /// Value of the User-Agent header sent to the CAS server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Overall timeout of each validation request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// How the CAS server is reached
    #[serde(default, skip_serializing_if = "ProxyMode::is_system")]
    pub proxy: ProxyMode,
}

/// Proxy selection for the validation requests.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProxyMode {
    /// Never use a proxy, ignore environment variables.
    Off,
    /// Use the HTTP_PROXY, HTTPS_PROXY and NO_PROXY environment variables.
    #[default]
    System,
    /// Send every request through this proxy.
    Manual(Url),
}

impl ProxyMode {
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }
}

impl ValidatorConf {
    pub fn new(cas_url: CasServerUrl) -> Self {
        Self {
            cas_url,
            user_agent: None,
            timeout_secs: None,
            proxy: ProxyMode::System,
        }
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid validator configuration")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file at {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("failed to load {}", path.display()))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Builds the HTTP client described by this configuration.
    pub fn build_client(&self) -> anyhow::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();

        if let Some(timeout) = self.timeout() {
            builder = builder.timeout(timeout);
        }

        match &self.proxy {
            ProxyMode::Off => builder = builder.no_proxy(),
            ProxyMode::System => {}
            ProxyMode::Manual(proxy_url) => {
                let proxy = reqwest::Proxy::all(proxy_url.clone()).inspect_err(|error| {
                    warn!(%proxy_url, %error, "Failed to configure proxy");
                })?;
                builder = builder.proxy(proxy);
            }
        }

        builder.build().context("failed to build HTTP client")
    }

    pub fn build_validator(&self) -> anyhow::Result<ServiceTicketValidator<reqwest::Client>> {
        let client = self.build_client()?;

        let mut validator = ServiceTicketValidator::new(client, self.cas_url.clone());

        if let Some(user_agent) = &self.user_agent {
            validator = validator.with_user_agent(user_agent.clone());
        }

        Ok(validator)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn minimal_conf() {
        let conf = ValidatorConf::from_json(r#"{ "CasUrl": "https://cas.example.org/cas" }"#).unwrap();
        assert_eq!(conf.cas_url.as_url().as_str(), "https://cas.example.org/cas");
        assert_eq!(conf.user_agent, None);
        assert_eq!(conf.timeout(), None);
        assert_eq!(conf.proxy, ProxyMode::System);
    }

    #[test]
    fn full_conf() {
        let conf = ValidatorConf::from_json(
            r#"{
                "CasUrl": "https://cas.example.org/cas",
                "UserAgent": "my-app/1.0",
                "TimeoutSecs": 10,
                "Proxy": { "Manual": "http://proxy.corp:8080" }
            }"#,
        )
        .unwrap();

        assert_eq!(conf.user_agent.as_deref(), Some("my-app/1.0"));
        assert_eq!(conf.timeout(), Some(Duration::from_secs(10)));
        assert_eq!(
            conf.proxy,
            ProxyMode::Manual(Url::parse("http://proxy.corp:8080").unwrap())
        );
    }

    #[test]
    fn invalid_cas_url_is_rejected() {
        assert!(ValidatorConf::from_json(r#"{ "CasUrl": "mailto:cas@example.org" }"#).is_err());
        assert!(ValidatorConf::from_json(r#"{ "CasUrl": "not a url" }"#).is_err());
        assert!(ValidatorConf::from_json("{}").is_err());
    }

    #[test]
    fn proxy_off() {
        let conf =
            ValidatorConf::from_json(r#"{ "CasUrl": "https://cas.example.org/cas", "Proxy": "Off" }"#).unwrap();
        assert_eq!(conf.proxy, ProxyMode::Off);
        assert!(conf.build_client().is_ok());
    }

    #[test]
    fn serialization_omits_defaults() {
        let conf = ValidatorConf::new("https://cas.example.org/".parse().unwrap());
        let json = serde_json::to_string(&conf).unwrap();
        assert_eq!(json, r#"{"CasUrl":"https://cas.example.org/"}"#);
    }

    #[test]
    fn builds_validator() {
        let mut conf = ValidatorConf::new("https://cas.example.org/cas".parse().unwrap());
        conf.user_agent = Some("my-app/1.0".to_owned());
        conf.timeout_secs = Some(5);

        let validator = conf.build_validator().unwrap();
        assert_eq!(validator.user_agent(), "my-app/1.0");
        assert_eq!(validator.cas_url(), &conf.cas_url);
    }
}
