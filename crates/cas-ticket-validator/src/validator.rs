use std::sync::Arc;

use reqwest::StatusCode;
use url::Url;

use crate::endpoint::{CasServerUrl, Protocol};
use crate::error::{ParseError, ValidateError};
use crate::observer::{TracingObserver, ValidationObserver};
use crate::response::{TicketValidation, parse_service_response, parse_validate_response, sanitize_service_response};
use crate::transport::HttpClient;

pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Validates service tickets against one CAS server.
///
/// `serviceValidate` (CAS 2.0/3.0) is tried first. When the server answers 404, the ticket is
/// validated once more through `validate` (CAS 1.0). Nothing is cached: tickets are single-use.
///
/// The validator holds no mutable state and can be shared between tasks as long as the client can.
pub struct ServiceTicketValidator<C = reqwest::Client> {
    client: C,
    cas_url: CasServerUrl,
    user_agent: String,
    observer: Arc<dyn ValidationObserver>,
}

impl<C> ServiceTicketValidator<C>
where
    C: HttpClient,
{
    pub fn new(client: C, cas_url: CasServerUrl) -> Self {
        Self {
            client,
            cas_url,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            observer: Arc::new(TracingObserver),
        }
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ValidationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn cas_url(&self) -> &CasServerUrl {
        &self.cas_url
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// CAS 2.0/3.0 validation endpoint for `service` and `ticket`.
    pub fn service_validate_url(&self, service: &Url, ticket: &str) -> Url {
        self.cas_url.service_validate_url(service, ticket)
    }

    /// CAS 1.0 validation endpoint for `service` and `ticket`.
    pub fn validate_url(&self, service: &Url, ticket: &str) -> Url {
        self.cas_url.validate_url(service, ticket)
    }

    /// Asks the CAS server whether `ticket` was issued for `service`.
    ///
    /// A refused ticket is reported as `Ok(TicketValidation::Rejected)` (CAS 2.0/3.0) or
    /// `Ok(TicketValidation::NotAuthenticated)` (CAS 1.0). Errors mean the question could not be
    /// answered: transport failure, unexpected HTTP status, or a response that can't be parsed.
    #[instrument(skip_all, fields(service = %service))]
    pub async fn validate_ticket(&self, service: &Url, ticket: &str) -> Result<TicketValidation, ValidateError> {
        let mut protocol = Protocol::Cas2;

        loop {
            let endpoint = self.cas_url.endpoint(protocol, service, ticket);

            self.observer.request_issued(protocol, &endpoint);

            let response = match self.client.fetch(&endpoint, &self.user_agent).await {
                Ok(response) => response,
                Err(source) => return Err(ValidateError::Transport { url: endpoint, source }),
            };

            self.observer.response_received(protocol, response.status);

            if response.status == StatusCode::NOT_FOUND
                && let Some(next) = protocol.fallback()
            {
                self.observer.fallback_triggered(protocol, next);
                protocol = next;
                continue;
            }

            if response.status != StatusCode::OK {
                return Err(ValidateError::UnexpectedStatus {
                    url: endpoint,
                    status: response.status,
                    body: response.body,
                });
            }

            let outcome = parse_body(protocol, &response.body);

            self.observer.response_parsed(protocol, outcome.as_ref());

            return outcome.map_err(|source| ValidateError::Parse { protocol, source });
        }
    }
}

fn parse_body(protocol: Protocol, body: &str) -> Result<TicketValidation, ParseError> {
    match protocol {
        Protocol::Cas2 => parse_service_response(&sanitize_service_response(body)),
        Protocol::Cas1 => parse_validate_response(body),
    }
}

impl<C> core::fmt::Debug for ServiceTicketValidator<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServiceTicketValidator")
            .field("cas_url", &self.cas_url)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn default_user_agent_names_the_crate() {
        assert!(DEFAULT_USER_AGENT.starts_with("cas-ticket-validator/"));
    }

    #[test]
    fn parse_body_selects_grammar() {
        assert!(parse_body(Protocol::Cas1, "no\n\n").is_ok());
        assert!(parse_body(Protocol::Cas2, "no\n\n").is_err());
    }

    #[test]
    fn parse_body_sanitizes_cas2_only() {
        let body = "<cas:serviceResponse xmlns:cas='http://www.yale.edu/tp/cas'>\
            <cas:authenticationSuccess><cas:user>jdoe</cas:user><cas:attributes>\
            <cas:authenticationDate>2015-09-28T11:53:14Z[Etc/UTC]</cas:authenticationDate>\
            </cas:attributes></cas:authenticationSuccess></cas:serviceResponse>";
        let validation = parse_body(Protocol::Cas2, body).unwrap();
        assert_eq!(validation.user(), Some("jdoe"));
    }
}
