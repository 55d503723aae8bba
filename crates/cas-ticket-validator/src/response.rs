//! Validation outcomes and the two response grammars.
//!
//! - CAS 2.0/3.0 answer `serviceValidate` with an XML document rooted at `cas:serviceResponse`.
//! - CAS 1.0 answers `validate` with either `yes\n<user>\n` or `no\n\n`.

use core::fmt;
use std::borrow::Cow;
use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::{Serialize, Serializer};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::ParseError;

/// Result of a validation exchange that the server answered in a well-formed way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TicketValidation {
    /// The ticket is valid for the service.
    Authenticated(AuthenticationResponse),
    /// The server refused the ticket (CAS 2.0/3.0 `authenticationFailure`).
    Rejected(ValidationFailure),
    /// The server refused the ticket without further detail (CAS 1.0 `no`).
    NotAuthenticated,
}

impl TicketValidation {
    pub fn user(&self) -> Option<&str> {
        match self {
            Self::Authenticated(response) => Some(&response.user),
            Self::Rejected(_) | Self::NotAuthenticated => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn into_authenticated(self) -> Option<AuthenticationResponse> {
        match self {
            Self::Authenticated(response) => Some(response),
            Self::Rejected(_) | Self::NotAuthenticated => None,
        }
    }
}

/// Principal and metadata returned for a valid ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticationResponse {
    pub user: String,
    /// Released attributes, values kept in document order. Always empty with CAS 1.0.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Vec<String>>,
    /// Proxy-granting ticket IOU, present when a proxy callback was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_granting_ticket: Option<String>,
    /// Proxies the ticket went through, most recent first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub proxies: Vec<String>,
    #[serde(with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub authentication_date: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new_login: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_remembered_login: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub member_of: Vec<String>,
}

impl AuthenticationResponse {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            attributes: BTreeMap::new(),
            proxy_granting_ticket: None,
            proxies: Vec::new(),
            authentication_date: None,
            is_new_login: None,
            is_remembered_login: None,
            member_of: Vec::new(),
        }
    }

    /// First value of the attribute `name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(|values| values.first()).map(String::as_str)
    }
}

/// Refusal reported by a CAS 2.0/3.0 server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    pub code: FailureCode,
    pub description: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.description)
        }
    }
}

/// `code` attribute of `cas:authenticationFailure`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailureCode {
    InvalidRequest,
    InvalidTicketSpec,
    UnauthorizedServiceProxy,
    InvalidProxyCallback,
    InvalidTicket,
    InvalidService,
    InternalError,
    /// Code not defined by the protocol.
    Other(String),
}

impl FailureCode {
    pub fn from_code(code: &str) -> Self {
        match code {
            "INVALID_REQUEST" => Self::InvalidRequest,
            "INVALID_TICKET_SPEC" => Self::InvalidTicketSpec,
            "UNAUTHORIZED_SERVICE_PROXY" => Self::UnauthorizedServiceProxy,
            "INVALID_PROXY_CALLBACK" => Self::InvalidProxyCallback,
            "INVALID_TICKET" => Self::InvalidTicket,
            "INVALID_SERVICE" => Self::InvalidService,
            "INTERNAL_ERROR" => Self::InternalError,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InvalidTicketSpec => "INVALID_TICKET_SPEC",
            Self::UnauthorizedServiceProxy => "UNAUTHORIZED_SERVICE_PROXY",
            Self::InvalidProxyCallback => "INVALID_PROXY_CALLBACK",
            Self::InvalidTicket => "INVALID_TICKET",
            Self::InvalidService => "INVALID_SERVICE",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FailureCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Zone suffix some CAS server versions append to `authenticationDate`.
const TIMEZONE_ARTIFACT: &str = "[Etc/UTC]";

/// Removes the `[Etc/UTC]` token emitted by some CAS servers after RFC 3339 timestamps.
///
/// This is a patch for that one server quirk only.
pub fn sanitize_service_response(body: &str) -> Cow<'_, str> {
    if body.contains(TIMEZONE_ARTIFACT) {
        Cow::Owned(body.replace(TIMEZONE_ARTIFACT, ""))
    } else {
        Cow::Borrowed(body)
    }
}

const SERVICE_RESPONSE: &str = "serviceResponse";
const AUTHENTICATION_SUCCESS: &str = "authenticationSuccess";
const AUTHENTICATION_FAILURE: &str = "authenticationFailure";

/// Parses a CAS 2.0/3.0 `serviceValidate` response body.
///
/// Namespace prefixes are ignored.
pub fn parse_service_response(body: &str) -> Result<TicketValidation, ParseError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut parser = ServiceResponseParser::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => parser.open(&e)?,
            Event::Empty(e) => {
                parser.open(&e)?;
                parser.close()?;
            }
            Event::End(_) => parser.close()?,
            Event::Text(e) => parser.text(&e.unescape()?)?,
            Event::CData(e) => parser.text(&String::from_utf8_lossy(&e))?,
            Event::Eof => break,
            _ => {}
        }
    }

    parser.finish()
}

/// Parses a CAS 1.0 `validate` response body.
pub fn parse_validate_response(body: &str) -> Result<TicketValidation, ParseError> {
    let lines: Vec<&str> = body.lines().collect();

    match lines.as_slice() {
        ["no"] | ["no", ""] => Ok(TicketValidation::NotAuthenticated),
        ["yes", user] if !user.trim().is_empty() => Ok(TicketValidation::Authenticated(AuthenticationResponse::new(
            user.trim(),
        ))),
        _ => Err(ParseError::Cas1Body),
    }
}

enum Outcome {
    Success(SuccessFields),
    Failure { code: Option<String>, description: String },
}

#[derive(Default)]
struct SuccessFields {
    user: Option<String>,
    proxy_granting_ticket: Option<String>,
    proxies: Vec<String>,
    attributes: BTreeMap<String, Vec<String>>,
}

#[derive(Default)]
struct ServiceResponseParser {
    /// Local names of the currently open elements.
    path: Vec<String>,
    text: String,
    seen_root: bool,
    outcome: Option<Outcome>,
    /// Depth of the open `<cas:attribute name=".." value=".."/>` element, already recorded.
    inline_attribute: Option<usize>,
}

impl ServiceResponseParser {
    fn open(&mut self, e: &BytesStart<'_>) -> Result<(), ParseError> {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

        if self.path.is_empty() {
            if self.seen_root || name != SERVICE_RESPONSE {
                return Err(ParseError::UnexpectedRoot { name });
            }
            self.seen_root = true;
        } else if self.under(&[SERVICE_RESPONSE]) && (name == AUTHENTICATION_SUCCESS || name == AUTHENTICATION_FAILURE) {
            if self.outcome.is_some() {
                return Err(ParseError::DuplicateOutcome);
            }

            self.outcome = Some(if name == AUTHENTICATION_SUCCESS {
                Outcome::Success(SuccessFields::default())
            } else {
                Outcome::Failure {
                    code: attribute_value(e, "code")?,
                    description: String::new(),
                }
            });
        } else if name == "attribute" && self.under(&[SERVICE_RESPONSE, AUTHENTICATION_SUCCESS, "attributes"]) {
            if let (Some(key), Some(value)) = (attribute_value(e, "name")?, attribute_value(e, "value")?) {
                if let Some(Outcome::Success(fields)) = &mut self.outcome {
                    fields.attributes.entry(key).or_default().push(value);
                }
                self.inline_attribute = Some(self.path.len() + 1);
            }
        }

        self.path.push(name);
        self.text.clear();

        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), ParseError> {
        if self.path.is_empty() && !text.trim().is_empty() {
            return Err(ParseError::TextOutsideRoot);
        }

        self.text.push_str(text);

        Ok(())
    }

    fn close(&mut self) -> Result<(), ParseError> {
        let depth = self.path.len();
        let Some(name) = self.path.pop() else {
            return Ok(());
        };
        let text = core::mem::take(&mut self.text);

        if self.inline_attribute == Some(depth) {
            self.inline_attribute = None;
            return Ok(());
        }

        let in_success = self.under(&[SERVICE_RESPONSE, AUTHENTICATION_SUCCESS]);
        let in_proxies = self.under(&[SERVICE_RESPONSE, AUTHENTICATION_SUCCESS, "proxies"]);
        let in_attributes = self.under(&[SERVICE_RESPONSE, AUTHENTICATION_SUCCESS, "attributes"]);
        let in_root = self.under(&[SERVICE_RESPONSE]);

        match &mut self.outcome {
            Some(Outcome::Success(fields)) => {
                if in_success && name == "user" {
                    if fields.user.is_some() {
                        return Err(ParseError::DuplicateElement { name });
                    }
                    fields.user = Some(text.trim().to_owned());
                } else if in_success && name == "proxyGrantingTicket" {
                    if fields.proxy_granting_ticket.is_some() {
                        return Err(ParseError::DuplicateElement { name });
                    }
                    fields.proxy_granting_ticket = Some(text.trim().to_owned());
                } else if in_proxies && name == "proxy" {
                    fields.proxies.push(text.trim().to_owned());
                } else if in_attributes {
                    fields.attributes.entry(name).or_default().push(text);
                }
            }
            Some(Outcome::Failure { description, .. }) => {
                if in_root && name == AUTHENTICATION_FAILURE {
                    *description = text.trim().to_owned();
                }
            }
            None => {}
        }

        Ok(())
    }

    fn under(&self, expected: &[&str]) -> bool {
        self.path.iter().map(String::as_str).eq(expected.iter().copied())
    }

    fn finish(self) -> Result<TicketValidation, ParseError> {
        if let Some(name) = self.path.last() {
            return Err(ParseError::UnclosedElement { name: name.clone() });
        }

        if !self.seen_root {
            return Err(ParseError::NoRootElement);
        }

        match self.outcome {
            None => Err(ParseError::MissingOutcome),
            Some(Outcome::Failure { code, description }) => {
                let code = code.ok_or(ParseError::MissingFailureCode)?;
                Ok(TicketValidation::Rejected(ValidationFailure {
                    code: FailureCode::from_code(code.trim()),
                    description,
                }))
            }
            Some(Outcome::Success(fields)) => fields.into_response().map(TicketValidation::Authenticated),
        }
    }
}

impl SuccessFields {
    fn into_response(mut self) -> Result<AuthenticationResponse, ParseError> {
        let user = self.user.take().filter(|user| !user.is_empty()).ok_or(ParseError::MissingUser)?;

        let authentication_date = self
            .take_single("authenticationDate")
            .map(|value| {
                OffsetDateTime::parse(value.trim(), &Rfc3339).map_err(|_| ParseError::InvalidAttribute {
                    name: "authenticationDate",
                    value,
                })
            })
            .transpose()?;
        let is_new_login = self.take_bool("isFromNewLogin")?;
        let is_remembered_login = self.take_bool("longTermAuthenticationRequestTokenUsed")?;
        let member_of = self.attributes.remove("memberOf").unwrap_or_default();

        Ok(AuthenticationResponse {
            user,
            attributes: self.attributes,
            proxy_granting_ticket: self.proxy_granting_ticket,
            proxies: self.proxies,
            authentication_date,
            is_new_login,
            is_remembered_login,
            member_of,
        })
    }

    fn take_single(&mut self, name: &str) -> Option<String> {
        self.attributes.remove(name).and_then(|values| values.into_iter().next())
    }

    fn take_bool(&mut self, name: &'static str) -> Result<Option<bool>, ParseError> {
        self.take_single(name)
            .map(|value| {
                let flag = match value.trim() {
                    "true" => Some(true),
                    "false" => Some(false),
                    _ => None,
                };
                flag.ok_or(ParseError::InvalidAttribute { name, value })
            })
            .transpose()
    }
}

/// Unescaped value of the XML attribute `name` (local name, prefix ignored).
fn attribute_value(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, ParseError> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }

    Ok(None)
}
