//! Client-side session layer for the Barbearia back-office API.
//!
//! Holds the user's bearer credentials, attaches them to every request and
//! recovers from access-token expiry with a single shared refresh call.
//!
//! # Example
//!
//! ```no_run
//! use barbearia_session::{GuardDecision, Result, SessionClient};
//!
//! # async fn example() -> Result<()> {
//! let client = SessionClient::builder()
//!     .base_url("http://localhost:8080/api")
//!     .build()?;
//!
//! client.auth().login("ana@example.com", "secret").await?;
//!
//! // Requests are retried once, transparently, if the token has expired.
//! let me = client.profile().get().await?;
//! println!("Signed in as {}", me.name);
//!
//! // Check a role-gated destination before opening it.
//! match client.guards().evaluate("/usuarios", &["DEV", "ADMIN"]).await {
//!     GuardDecision::Allow => println!("ok"),
//!     GuardDecision::Redirect { to, .. } => println!("go to {}", to),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! - [`store`]: token persistence with a legacy-key fallback
//! - [`codec`]: unverified claim decoding (expiry, subject, roles)
//! - [`state`]: read-through session facts for guards and UI
//! - [`coordinator`]: bearer attachment and single-flight refresh
//! - [`guards`]: auth and role navigation guards
//! - [`api`]: typed auth, profile and invite endpoints

pub mod api;
pub mod client;
pub mod codec;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod guards;
pub mod state;
pub mod store;
pub mod transport;
pub mod types;

pub use client::{ClientBuilder, SessionClient};
pub use codec::{Claims, decode_claims, is_expired};
pub use coordinator::{CoordinatorConfig, RefreshCoordinator};
pub use error::{DecodeError, Result, SessionError};
pub use events::{SessionEvent, SessionEvents};
pub use guards::{GuardConfig, GuardDecision, Notice, RouteGuards};
pub use state::SessionState;
pub use store::{FileStorage, MemoryStorage, Storage, TokenStore};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
pub use types::*;
