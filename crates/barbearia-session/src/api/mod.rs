//! API endpoint implementations.

mod auth;
mod invites;
mod profile;

pub use auth::AuthApi;
pub use invites::InvitesApi;
pub use profile::ProfileApi;
