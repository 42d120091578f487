//! Auth API: login, logout, refresh and password recovery.

use crate::client::SessionClient;
use crate::error::{Result, SessionError};
use crate::events::SessionEvent;
use crate::transport::ApiRequest;
use crate::types::{
    ApiEnvelope, CompletePasswordReset, LoginRequest, MessageResponse, RecoveryCode,
    RecoveryRequest, TokenPair,
};

const LOGOUT_PATH: &str = "auth/logout";
const RECOVERY_REQUEST_PATH: &str = "auth/recovery/request";
const RECOVERY_VALIDATE_PATH: &str = "auth/recovery/validate";
const RECOVERY_CONFIRM_PATH: &str = "auth/recovery/confirm";

/// Auth API client.
pub struct AuthApi {
    client: SessionClient,
}

impl AuthApi {
    pub(crate) fn new(client: SessionClient) -> Self {
        Self { client }
    }

    /// Sign in and store the returned token pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair> {
        let login_path = self.client.coordinator().config().login_path.clone();
        let request = ApiRequest::post(
            login_path,
            &LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            },
        )?;

        let envelope: ApiEnvelope<TokenPair> = self.client.dispatch(request).await?.into_result()?;
        let pair = envelope.data;
        if pair.token.is_empty() {
            return Err(SessionError::InvalidResponse(
                "login response did not include an access token".to_string(),
            ));
        }

        self.complete_session(&pair.token, pair.refresh_token.as_deref());
        Ok(pair)
    }

    /// Store tokens obtained outside the login call (invite or e-mail
    /// confirmation flows) and announce the new session.
    pub fn complete_session(&self, access: &str, refresh: Option<&str>) {
        self.client.store().set_tokens(access, refresh);
        let subject = self.client.state().current_subject();
        tracing::info!(subject = ?subject, "Session started");
        self.client
            .events()
            .publish(SessionEvent::LoggedIn { subject });
    }

    /// Sign out. Local tokens are cleared even if the server call fails.
    pub async fn logout(&self) -> Result<()> {
        let request = ApiRequest::post(LOGOUT_PATH, &serde_json::json!({}))?;
        match self.client.dispatch(request).await {
            Ok(response) if !response.is_success() => {
                tracing::debug!(status = response.status(), "Logout rejected by server");
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "Logout request failed"),
        }

        self.client.store().clear_all();
        self.client.events().publish(SessionEvent::LoggedOut);
        tracing::info!("Session ended");
        Ok(())
    }

    /// Force a token refresh, sharing any refresh already in flight.
    pub async fn refresh(&self) -> Result<String> {
        self.client.coordinator().refresh_now().await
    }

    /// Ask the server to send a recovery code.
    pub async fn request_recovery(&self, email: &str) -> Result<MessageResponse> {
        self.client
            .post(
                RECOVERY_REQUEST_PATH,
                &RecoveryRequest {
                    email: email.to_string(),
                },
            )
            .await
    }

    /// Check a recovery code before asking for the new password.
    pub async fn validate_recovery_code(&self, email: &str, code: &str) -> Result<MessageResponse> {
        self.client
            .post(
                RECOVERY_VALIDATE_PATH,
                &RecoveryCode {
                    email: email.to_string(),
                    code: code.to_string(),
                },
            )
            .await
    }

    /// Set a new password with a validated recovery code.
    pub async fn confirm_recovery(&self, payload: &CompletePasswordReset) -> Result<MessageResponse> {
        self.client.post(RECOVERY_CONFIRM_PATH, payload).await
    }
}
