//! HTTP client for the internal bot API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use crate::config::BotApiConfig;
use crate::domain::foundation::{ChannelId, DiscordUserId, GuildId, RoleId};
use crate::ports::{BotApi, BotApiError};

/// Header carrying the shared secret on every bot API call.
pub const SECRET_HEADER: &str = "x-internal-secret";

const MAX_ERROR_BODY: usize = 256;

/// Talks to the bot process that owns the Discord gateway connection.
///
/// Every request is bounded by the configured timeout and sent once; a
/// failed grant is left to the caller to log for remediation.
pub struct HttpBotApi {
    client: reqwest::Client,
    base_url: String,
    secret: SecretString,
}

impl HttpBotApi {
    pub fn new(config: &BotApiConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self::with_client(client, &config.base_url, config.secret.clone()))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, secret: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: SecretString::new(secret),
        }
    }

    fn roles_url(&self, guild_id: &GuildId, user_id: &DiscordUserId) -> String {
        format!("{}/discord/{}/users/{}/roles", self.base_url, guild_id, user_id)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(), BotApiError> {
        let response = request
            .header(SECRET_HEADER, self.secret.expose_secret())
            .send()
            .await
            .map_err(|e| BotApiError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            body.truncate(cut);
        }
        Err(BotApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl BotApi for HttpBotApi {
    async fn add_role(
        &self,
        guild_id: &GuildId,
        user_id: &DiscordUserId,
        role_id: &RoleId,
    ) -> Result<(), BotApiError> {
        let request = self
            .client
            .post(self.roles_url(guild_id, user_id))
            .json(&json!({ "roleId": role_id.as_str() }));
        self.send(request).await
    }

    async fn remove_role(
        &self,
        guild_id: &GuildId,
        user_id: &DiscordUserId,
        role_id: &RoleId,
    ) -> Result<(), BotApiError> {
        let url = format!("{}/{}", self.roles_url(guild_id, user_id), role_id);
        self.send(self.client.delete(url)).await
    }

    async fn send_message(
        &self,
        guild_id: &GuildId,
        channel_id: &ChannelId,
        content: &str,
    ) -> Result<(), BotApiError> {
        let url = format!(
            "{}/discord/{}/channels/{}/send",
            self.base_url, guild_id, channel_id
        );
        self.send(self.client.post(url).json(&json!({ "content": content })))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ids() -> (GuildId, DiscordUserId, RoleId) {
        (
            GuildId::new("111").unwrap(),
            DiscordUserId::new("222").unwrap(),
            RoleId::new("333").unwrap(),
        )
    }

    fn api(server: &MockServer) -> HttpBotApi {
        HttpBotApi::with_client(reqwest::Client::new(), &server.uri(), "bot-secret".to_string())
    }

    #[tokio::test]
    async fn add_role_sends_secret() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/discord/111/users/222/roles"))
            .and(header(SECRET_HEADER, "bot-secret"))
            .and(body_json(json!({ "roleId": "333" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let (guild, user, role) = ids();
        api(&server).add_role(&guild, &user, &role).await.unwrap();
    }

    #[tokio::test]
    async fn remove_role_reports_status_errors() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/discord/111/users/222/roles/333"))
            .respond_with(ResponseTemplate::new(404).set_body_string("member not found"))
            .mount(&server)
            .await;

        let (guild, user, role) = ids();
        let err = api(&server).remove_role(&guild, &user, &role).await.unwrap_err();
        match err {
            BotApiError::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "member not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_message_posts_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/discord/111/channels/444/send"))
            .and(body_json(json!({ "content": "hello" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        api(&server)
            .send_message(
                &GuildId::new("111").unwrap(),
                &ChannelId::new("444").unwrap(),
                "hello",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unreachable_bot_is_a_transport_error() {
        let api = HttpBotApi::with_client(
            reqwest::Client::new(),
            "http://127.0.0.1:1",
            "bot-secret".to_string(),
        );
        let (guild, user, role) = ids();
        assert!(matches!(
            api.add_role(&guild, &user, &role).await,
            Err(BotApiError::Transport(_))
        ));
    }
}
