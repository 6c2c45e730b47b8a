//! JSON shapes of the platform endpoints and their mapping to domain types.

use serde::{Deserialize, Serialize};

use roam_core::domain::{AuthOutcome, Channel, ChannelName, ChannelUser, Club, TokenPair, UserId};

#[derive(Debug, Serialize)]
pub struct PhoneAuthRequest<'a> {
    pub phone_number: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ChannelRequest<'a> {
    pub channel: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution_source: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution_details: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserProfile {
    pub user_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub is_waitlisted: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub user_profile: Option<UserProfile>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl From<AuthResponse> for AuthOutcome {
    fn from(r: AuthResponse) -> Self {
        Self {
            success: r.success,
            is_waitlisted: r.is_waitlisted,
            access_token: r.access_token,
            refresh_token: r.refresh_token,
            auth_token: r.auth_token,
            user_id: r.user_profile.map(|p| UserId(p.user_id)),
            error_message: r.error_message,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    pub refresh: String,
}

impl From<RefreshResponse> for TokenPair {
    fn from(r: RefreshResponse) -> Self {
        Self {
            access: r.access,
            refresh: r.refresh,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireClub {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct WireUser {
    pub user_id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireChannel {
    pub channel_id: i64,
    pub channel: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub club: Option<WireClub>,
    #[serde(default)]
    pub num_all: u32,
    #[serde(default)]
    pub num_speakers: u32,
    #[serde(default)]
    pub users: Vec<WireUser>,
}

impl From<WireChannel> for Channel {
    fn from(c: WireChannel) -> Self {
        Self {
            channel_id: c.channel_id,
            name: ChannelName(c.channel),
            topic: c.topic,
            club: c.club.map(|club| Club { name: club.name }),
            num_all: c.num_all,
            num_speakers: c.num_speakers,
            users: c
                .users
                .into_iter()
                .map(|u| ChannelUser {
                    user_id: UserId(u.user_id),
                    name: u.name,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChannelsResponse {
    #[serde(default)]
    pub channels: Vec<WireChannel>,
}

/// Body shared by join/ping acknowledgements.
#[derive(Debug, Deserialize)]
pub struct Ack {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

fn default_true() -> bool {
    true
}
