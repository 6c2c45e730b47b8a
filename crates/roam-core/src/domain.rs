use std::fmt;

/// Platform user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Channel (room) name as used by join/ping calls.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChannelName(pub String);

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the session token is named in the credential file and sent to the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenScheme {
    /// `ACCESS_TOKEN` + `REFRESH_TOKEN`, sent as `Authorization: Bearer ...`.
    Bearer,
    /// A single long-lived `AUTH_TOKEN`, sent as `Authorization: Token ...`.
    Token,
}

impl TokenScheme {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "bearer" => Some(Self::Bearer),
            "token" => Some(Self::Token),
            _ => None,
        }
    }

    pub fn header_prefix(self) -> &'static str {
        match self {
            Self::Bearer => "Bearer",
            Self::Token => "Token",
        }
    }

    pub fn supports_refresh(self) -> bool {
        matches!(self, Self::Bearer)
    }
}

/// Immutable session credentials passed into every room call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: UserId,
    pub scheme: TokenScheme,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub device_id: Option<String>,
}

impl Credentials {
    /// Value of the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.scheme.header_prefix(), self.access_token)
    }

    /// Fill in `device_id` when the stored session has none.
    pub fn or_device_id(mut self, device_id: &str) -> Self {
        if self.device_id.is_none() {
            self.device_id = Some(device_id.to_string());
        }
        self
    }

    /// Copy of these credentials carrying a freshly minted token pair.
    pub fn with_tokens(&self, tokens: &TokenPair) -> Self {
        Self {
            access_token: tokens.access.clone(),
            refresh_token: Some(tokens.refresh.clone()),
            ..self.clone()
        }
    }
}

/// Access/refresh token pair returned by a refresh call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Result of a phone auth call (start or complete).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthOutcome {
    pub success: bool,
    pub is_waitlisted: bool,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub auth_token: Option<String>,
    pub user_id: Option<UserId>,
    pub error_message: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Club {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelUser {
    pub user_id: UserId,
    pub name: Option<String>,
}

/// A live room as listed by the platform. Fetched fresh every pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    pub channel_id: i64,
    pub name: ChannelName,
    pub topic: Option<String>,
    pub club: Option<Club>,
    pub num_all: u32,
    pub num_speakers: u32,
    pub users: Vec<ChannelUser>,
}

impl Channel {
    pub fn has_user(&self, user_id: UserId) -> bool {
        self.users.iter().any(|u| u.user_id == user_id)
    }

    /// One human-readable line: id, name, topic, club, counts.
    pub fn summary_line(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.channel_id,
            self.name,
            self.topic.as_deref().unwrap_or(""),
            self.club.as_ref().map(|c| c.name.as_str()).unwrap_or(""),
            self.num_all,
            self.num_speakers
        )
    }
}
