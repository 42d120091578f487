//! Current-user profile API.

use crate::client::SessionClient;
use crate::error::Result;
use crate::types::{
    ApiEnvelope, ChangePasswordRequest, ConfirmEmailRequest, ConfirmEmailResponse,
    MessageResponse, UpdateProfileRequest, User,
};

/// Profile endpoint, relative to the API base URL.
pub const PROFILE_PATH: &str = "users/me";

/// Profile API client.
pub struct ProfileApi {
    client: SessionClient,
}

impl ProfileApi {
    pub(crate) fn new(client: SessionClient) -> Self {
        Self { client }
    }

    /// Fetch the signed-in user's profile from the server.
    pub async fn get(&self) -> Result<User> {
        let envelope: ApiEnvelope<User> = self.client.get(PROFILE_PATH).await?;
        Ok(envelope.data)
    }

    /// Update name, e-mail and phone.
    pub async fn update(&self, request: &UpdateProfileRequest) -> Result<ApiEnvelope<User>> {
        self.client.put(PROFILE_PATH, request).await
    }

    /// Confirm a pending e-mail change. A token in the response becomes the
    /// new access token.
    pub async fn confirm_email(&self, code: &str) -> Result<ConfirmEmailResponse> {
        let response: ConfirmEmailResponse = self
            .client
            .post(
                &format!("{}/confirm-email", PROFILE_PATH),
                &ConfirmEmailRequest {
                    code: code.to_string(),
                },
            )
            .await?;

        if let Some(token) = response.token.as_deref().filter(|t| !t.is_empty()) {
            self.client.auth().complete_session(token, None);
        }
        Ok(response)
    }

    pub async fn change_password(&self, request: &ChangePasswordRequest) -> Result<MessageResponse> {
        self.client
            .patch(&format!("{}/change-password", PROFILE_PATH), request)
            .await
    }
}
