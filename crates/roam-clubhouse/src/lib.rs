//! Clubhouse HTTP adapter.
//!
//! Implements the auth and room ports over the platform's JSON API. The client
//! holds no session state: credentials arrive with every room call.

pub mod wire;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method, RequestBuilder,
};
use serde::{de::DeserializeOwned, Serialize};

use roam_core::{
    domain::{AuthOutcome, Channel, ChannelName, Credentials, TokenPair},
    errors::Error,
    ports::{AuthClient, RoomClient},
    Result,
};

use wire::{
    Ack, AuthResponse, ChannelRequest, ChannelsResponse, PhoneAuthRequest, RefreshRequest,
    RefreshResponse,
};

#[derive(Clone, Debug)]
pub struct ClientInfo {
    pub app_version: String,
    pub app_build: String,
    pub device_id: String,
}

#[derive(Clone, Debug)]
pub struct ClubhouseClient {
    base_url: String,
    info: ClientInfo,
    http: reqwest::Client,
}

impl ClubhouseClient {
    pub fn new(base_url: impl Into<String>, info: ClientInfo, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            info,
            http,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    /// Headers every call carries, plus session headers when `creds` is given.
    pub fn headers(&self, creds: Option<&Credentials>) -> Result<HeaderMap> {
        let mut pairs = vec![
            ("CH-Languages", "en-US".to_string()),
            ("CH-Locale", "en_US".to_string()),
            ("Accept", "application/json".to_string()),
            ("CH-AppBuild", self.info.app_build.clone()),
            ("CH-AppVersion", self.info.app_version.clone()),
            (
                "User-Agent",
                format!(
                    "clubhouse/{} (iPhone; iOS 14.4; Scale/2.00)",
                    self.info.app_build
                ),
            ),
        ];

        let device_id = creds
            .and_then(|c| c.device_id.clone())
            .unwrap_or_else(|| self.info.device_id.clone());
        pairs.push(("CH-DeviceId", device_id));

        if let Some(c) = creds {
            pairs.push(("Authorization", c.authorization()));
            pairs.push(("CH-UserID", c.user_id.to_string()));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            let key = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("bad header name {name}: {e}")))?;
            let value = HeaderValue::from_str(&value).map_err(|_| {
                Error::Credentials(format!("{name} header has invalid characters"))
            })?;
            headers.insert(key, value);
        }
        Ok(headers)
    }

    fn request(
        &self,
        method: Method,
        endpoint: &str,
        creds: Option<&Credentials>,
    ) -> Result<RequestBuilder> {
        Ok(self
            .http
            .request(method, self.url(endpoint))
            .headers(self.headers(creds)?))
    }

    async fn send<T: DeserializeOwned>(&self, endpoint: &str, req: RequestBuilder) -> Result<T> {
        tracing::debug!("calling {endpoint}");
        let resp = req
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{endpoint}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: format!(
                    "{endpoint}: {}",
                    body.chars().take(200).collect::<String>()
                ),
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| Error::Transport(format!("{endpoint}: bad response body: {e}")))
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        creds: Option<&Credentials>,
        body: &B,
    ) -> Result<T> {
        let req = self.request(Method::POST, endpoint, creds)?.json(body);
        self.send(endpoint, req).await
    }

    async fn channel_call(
        &self,
        endpoint: &str,
        creds: &Credentials,
        body: ChannelRequest<'_>,
    ) -> Result<()> {
        let ack: Ack = self.post(endpoint, Some(creds), &body).await?;
        if !ack.success {
            return Err(Error::Rejected(format!(
                "{endpoint} {}: {}",
                body.channel,
                ack.error_message.unwrap_or_default()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthClient for ClubhouseClient {
    async fn start_phone_auth(&self, phone: &str) -> Result<AuthOutcome> {
        let body = PhoneAuthRequest {
            phone_number: phone,
            verification_code: None,
        };
        let resp: AuthResponse = self.post("start_phone_number_auth", None, &body).await?;
        Ok(resp.into())
    }

    async fn complete_phone_auth(&self, phone: &str, code: &str) -> Result<AuthOutcome> {
        let body = PhoneAuthRequest {
            phone_number: phone,
            verification_code: Some(code),
        };
        let resp: AuthResponse = self
            .post("complete_phone_number_auth", None, &body)
            .await?;
        Ok(resp.into())
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair> {
        let body = RefreshRequest {
            refresh: refresh_token,
        };
        let resp: RefreshResponse = self.post("refresh_token", None, &body).await?;
        Ok(resp.into())
    }
}

#[async_trait]
impl RoomClient for ClubhouseClient {
    async fn get_channels(&self, creds: &Credentials) -> Result<Vec<Channel>> {
        let req = self.request(Method::GET, "get_channels", Some(creds))?;
        let resp: ChannelsResponse = self.send("get_channels", req).await?;
        Ok(resp.channels.into_iter().map(Channel::from).collect())
    }

    async fn join_channel(&self, creds: &Credentials, channel: &ChannelName) -> Result<()> {
        self.channel_call(
            "join_channel",
            creds,
            ChannelRequest {
                channel: &channel.0,
                attribution_source: Some("feed"),
                attribution_details: Some("eyJpc19leHBsb3JlIjpmYWxzZSwicmFuayI6MX0="),
            },
        )
        .await
    }

    async fn active_ping(&self, creds: &Credentials, channel: &ChannelName) -> Result<()> {
        self.channel_call(
            "active_ping",
            creds,
            ChannelRequest {
                channel: &channel.0,
                attribution_source: None,
                attribution_details: None,
            },
        )
        .await
    }
}
