//! Hooks notified while a ticket is being validated.

use reqwest::StatusCode;
use url::Url;

use crate::endpoint::Protocol;
use crate::error::ParseError;
use crate::response::TicketValidation;

/// Receives the significant events of a validation.
///
/// All methods default to doing nothing.
pub trait ValidationObserver: Send + Sync {
    fn request_issued(&self, _protocol: Protocol, _endpoint: &Url) {}

    fn response_received(&self, _protocol: Protocol, _status: StatusCode) {}

    fn fallback_triggered(&self, _from: Protocol, _to: Protocol) {}

    fn response_parsed(&self, _protocol: Protocol, _outcome: Result<&TicketValidation, &ParseError>) {}
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ValidationObserver for NoopObserver {}

/// Reports events through `tracing`. This is the validator default.
///
/// The query string holding the ticket is only logged at `TRACE` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ValidationObserver for TracingObserver {
    fn request_issued(&self, protocol: Protocol, endpoint: &Url) {
        debug!(%protocol, endpoint = &endpoint[..url::Position::AfterPath], "Attempting ticket validation");
        trace!(%endpoint, "Validation request");
    }

    fn response_received(&self, protocol: Protocol, status: StatusCode) {
        debug!(%protocol, %status, "CAS server responded");
    }

    fn fallback_triggered(&self, from: Protocol, to: Protocol) {
        debug!(%from, %to, "Validation endpoint not found, falling back");
    }

    fn response_parsed(&self, protocol: Protocol, outcome: Result<&TicketValidation, &ParseError>) {
        match outcome {
            Ok(TicketValidation::Authenticated(response)) => {
                debug!(%protocol, user = %response.user, "Ticket validated");
            }
            Ok(TicketValidation::Rejected(failure)) => {
                debug!(%protocol, code = %failure.code, description = %failure.description, "Ticket rejected");
            }
            Ok(TicketValidation::NotAuthenticated) => {
                debug!(%protocol, "Ticket rejected");
            }
            Err(error) => {
                warn!(%protocol, %error, "Malformed validation response");
            }
        }
    }
}
