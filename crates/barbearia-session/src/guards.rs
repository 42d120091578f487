//! Navigation guards.
//!
//! Guards decide whether a destination may load. They return a
//! [`GuardDecision`] and leave the actual navigation to the caller.

use crate::client::SessionClient;
use crate::error::{Result, SessionError};
use crate::types::User;

/// Notice to show alongside a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The session is valid but the role may not open the destination.
    AccessDenied,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::AccessDenied => "Acesso negado.",
        }
    }
}

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect { to: String, notice: Option<Notice> },
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }

    fn redirect(to: &str) -> Self {
        GuardDecision::Redirect {
            to: to.to_string(),
            notice: None,
        }
    }
}

/// Route table settings used by the guards.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Paths reachable without a session.
    pub public_routes: Vec<String>,
    /// Unauthenticated entry point.
    pub login_route: String,
    /// Default page for signed-in users.
    pub landing_route: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            public_routes: ["/login", "/not-found", "/recuperar-senha", "/setup-conta"]
                .into_iter()
                .map(String::from)
                .collect(),
            login_route: "/login".to_string(),
            landing_route: "/dashboard".to_string(),
        }
    }
}

impl GuardConfig {
    /// Whether a URL is public. Query string and fragment are ignored.
    pub fn is_public(&self, url: &str) -> bool {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        self.public_routes.iter().any(|route| route == path)
    }
}

/// Session and role guards.
#[derive(Debug, Clone)]
pub struct RouteGuards {
    client: SessionClient,
    config: GuardConfig,
}

impl RouteGuards {
    pub fn new(client: SessionClient, config: GuardConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Allow public URLs; otherwise require an unexpired session.
    pub fn auth_guard(&self, url: &str) -> GuardDecision {
        if self.config.is_public(url) {
            return GuardDecision::Allow;
        }

        if self.client.state().has_session() {
            GuardDecision::Allow
        } else {
            tracing::debug!(url, "No session, redirecting to login");
            GuardDecision::redirect(&self.config.login_route)
        }
    }

    /// Require a session whose server-side role is one of `allowed_roles`.
    ///
    /// The role comes from a fresh profile fetch, not the token claims.
    pub async fn role_guard(&self, allowed_roles: &[&str]) -> GuardDecision {
        if !self.client.state().has_session() {
            return GuardDecision::redirect(&self.config.login_route);
        }

        match self.check_role(allowed_roles).await {
            Ok(_) => GuardDecision::Allow,
            Err(SessionError::AccessDenied { role }) => {
                tracing::info!(role = %role, "Access denied");
                GuardDecision::Redirect {
                    to: self.config.landing_route.clone(),
                    notice: Some(Notice::AccessDenied),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Profile fetch failed, treating session as invalid");
                GuardDecision::redirect(&self.config.login_route)
            }
        }
    }

    /// Fetch the profile and check its role against `allowed_roles`
    /// (case-insensitive).
    pub async fn check_role(&self, allowed_roles: &[&str]) -> Result<User> {
        let user = self.client.profile().get().await?;
        let role = user.role.trim().to_uppercase();

        if allowed_roles.iter().any(|r| r.trim().to_uppercase() == role) {
            Ok(user)
        } else {
            Err(SessionError::AccessDenied { role: user.role })
        }
    }

    /// Run the guards a route declares: the auth guard, then the role guard
    /// when `required_roles` is non-empty.
    pub async fn evaluate(&self, url: &str, required_roles: &[&str]) -> GuardDecision {
        let decision = self.auth_guard(url);
        if !decision.is_allowed() || required_roles.is_empty() {
            return decision;
        }
        self.role_guard(required_roles).await
    }
}
