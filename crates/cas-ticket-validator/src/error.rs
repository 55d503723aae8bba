use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::endpoint::Protocol;

/// The CAS server URL can't be used to build validation endpoints.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid CAS server URL")]
    InvalidUrl(#[from] url::ParseError),
    #[error("CAS server URL `{url}` can't be used as a base URL")]
    CannotBeABase { url: Url },
    #[error("CAS server URL `{url}` uses unsupported scheme `{scheme}` (expected http or https)")]
    UnsupportedScheme { url: Url, scheme: String },
}

/// The response body doesn't match the grammar of the protocol that was used.
///
/// This is not the same thing as a rejected ticket: the server answer could not be understood at all.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed XML")]
    Xml(#[from] quick_xml::Error),
    #[error("response body contains no XML element")]
    NoRootElement,
    #[error("unexpected root element `{name}` (expected `serviceResponse`)")]
    UnexpectedRoot { name: String },
    #[error("`serviceResponse` contains neither `authenticationSuccess` nor `authenticationFailure`")]
    MissingOutcome,
    #[error("`serviceResponse` contains more than one authentication outcome")]
    DuplicateOutcome,
    #[error("`{name}` appears more than once in `authenticationSuccess`")]
    DuplicateElement { name: String },
    #[error("`authenticationSuccess` has no `user` element")]
    MissingUser,
    #[error("`authenticationFailure` has no `code` attribute")]
    MissingFailureCode,
    #[error("text found outside of the root element")]
    TextOutsideRoot,
    #[error("element `{name}` is not closed")]
    UnclosedElement { name: String },
    #[error("attribute `{name}` has an invalid value: `{value}`")]
    InvalidAttribute { name: &'static str, value: String },
    #[error("CAS 1.0 response is neither `yes\\n<user>\\n` nor `no\\n\\n`")]
    Cas1Body,
}

/// Error returned by [`ServiceTicketValidator::validate_ticket`](crate::ServiceTicketValidator::validate_ticket).
///
/// A ticket refused by the server is not an error, see [`TicketValidation`](crate::TicketValidation).
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("validation request to `{}` failed", redacted(.url))]
    Transport {
        url: Url,
        #[source]
        source: anyhow::Error,
    },
    #[error("CAS server responded to `{}` with {status}: {body}", redacted(.url))]
    UnexpectedStatus { url: Url, status: StatusCode, body: String },
    #[error("failed to parse {protocol} validation response")]
    Parse {
        protocol: Protocol,
        #[source]
        source: ParseError,
    },
}

impl ValidateError {
    /// HTTP status of the failed exchange, when the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::Transport { .. } | Self::Parse { .. } => None,
        }
    }
}

/// Endpoint without its query, tickets are single-use secrets.
fn redacted(url: &Url) -> &str {
    &url[..url::Position::AfterPath]
}
