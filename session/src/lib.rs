//! # Streckenheld Session
//!
//! Session and authentication state for the Streckenheld client, built on
//! the reducer/effect architecture of `streckenheld-core`.
//!
//! ## Features
//!
//! - **Hosted OIDC sign-in**: authorization code flow with PKCE (S256)
//! - **Validated tokens**: RS256 signatures checked against the issuer's JWKS
//!   before anything is persisted
//! - **Exclusive operations**: login, registration, logout, and checks never
//!   overlap
//! - **Testable**: every external dependency sits behind a trait with a mock
//!
//! ## Architecture
//!
//! ```text
//! SessionManager ─► Store ─► SessionReducer ─► Effects (flow, storage)
//!        ▲                                          │
//!        └───────────── terminal events ◄───────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use streckenheld_session::*;
//!
//! let manager = SessionManager::new(&config, environment, accounts)?;
//! manager.start().await?;
//!
//! let user = manager.login().await?;
//! println!("Signed in as {}", user.display_name());
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod accounts;
pub mod actions;
pub mod config;
pub mod constants;
pub mod environment;
pub mod error;
pub mod flow;
pub mod manager;
pub mod providers;
pub mod redirect;
pub mod reducers;
pub mod routing;
pub mod state;
pub mod tokens;

#[cfg(feature = "test-utils")]
pub mod mocks;

// Re-export main types for convenience
pub use accounts::{AccountsApi, DeleteAccountResponse, HttpAccountsApi};
pub use actions::SessionAction;
pub use config::{ProviderConfig, SessionConfig};
pub use environment::SessionEnvironment;
pub use error::{ConfigError, Result, SessionError};
pub use manager::SessionManager;
pub use redirect::{Platform, make_redirect_uri};
pub use reducers::SessionReducer;
pub use routing::{OnboardingStatus, Route, resolve_route};
pub use state::{ColorScheme, DarkMode, Prompt, Session, SessionOperation, UserProfile};
