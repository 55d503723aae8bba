//! Client side validation of CAS (Central Authentication Service) service tickets.
//!
//! [`ServiceTicketValidator`] asks the CAS server whether a ticket obtained from the login
//! redirect is valid for a given service. It speaks CAS 2.0/3.0 (`serviceValidate`, XML
//! responses) and falls back to CAS 1.0 (`validate`, plain text responses) when the server
//! does not expose the newer endpoint.
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use cas_ticket_validator::{CasServerUrl, ServiceTicketValidator, TicketValidation};
//!
//! let cas_url: CasServerUrl = "https://cas.example.org/cas".parse()?;
//! let validator = ServiceTicketValidator::new(reqwest::Client::new(), cas_url);
//!
//! let service = url::Url::parse("https://app.example.org/callback")?;
//! match validator.validate_ticket(&service, "ST-1-abc").await? {
//!     TicketValidation::Authenticated(response) => println!("hello {}", response.user),
//!     TicketValidation::Rejected(failure) => println!("rejected: {failure}"),
//!     TicketValidation::NotAuthenticated => println!("not logged in"),
//! }
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate tracing;

pub mod config;
pub mod endpoint;
pub mod error;
pub mod observer;
pub mod response;
pub mod transport;
pub mod validator;

pub use config::{ProxyMode, ValidatorConf};
pub use endpoint::{CasServerUrl, Protocol};
pub use error::{ConfigError, ParseError, ValidateError};
pub use observer::{NoopObserver, TracingObserver, ValidationObserver};
pub use response::{AuthenticationResponse, FailureCode, TicketValidation, ValidationFailure};
pub use transport::{HttpClient, HttpResponse};
pub use validator::{DEFAULT_USER_AGENT, ServiceTicketValidator};
