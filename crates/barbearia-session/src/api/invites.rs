//! Public invite API (account setup).

use crate::client::SessionClient;
use crate::error::Result;
use crate::types::{ApiEnvelope, CompleteInviteRequest, InviteValidation, User};

/// Invite API client.
///
/// Note: these endpoints are public; any stored token is still attached.
pub struct InvitesApi {
    client: SessionClient,
}

impl InvitesApi {
    pub(crate) fn new(client: SessionClient) -> Self {
        Self { client }
    }

    /// Check whether an invite token is still usable.
    ///
    /// The token is sent as a single encoded path segment. Tokens that cannot
    /// form one (empty, `.` or `..`) are reported invalid without a request.
    pub async fn validate(&self, token: &str) -> Result<InviteValidation> {
        let Some(segment) = path_segment(token) else {
            tracing::debug!("Rejecting invite token that is not a path segment");
            return Ok(InviteValidation {
                valid: false,
                email: None,
            });
        };
        self.client.get(&format!("public/invite/{}", segment)).await
    }

    /// Create the invited account.
    pub async fn complete(&self, request: &CompleteInviteRequest) -> Result<User> {
        let envelope: ApiEnvelope<User> = self
            .client
            .post("public/invite/complete", request)
            .await?;
        Ok(envelope.data)
    }
}

/// Percent-encode `value` as one path segment. Dot segments are refused since
/// URL resolution collapses them even when encoded.
fn path_segment(value: &str) -> Option<String> {
    match value {
        "" | "." | ".." => None,
        _ => Some(urlencoding::encode(value).into_owned()),
    }
}
