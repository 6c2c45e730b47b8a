use std::io::Write;

use async_trait::async_trait;

use crate::{
    domain::{AuthOutcome, Channel, ChannelName, Credentials, TokenPair},
    Result,
};

/// Phone-number authentication and token refresh.
#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn start_phone_auth(&self, phone: &str) -> Result<AuthOutcome>;

    async fn complete_phone_auth(&self, phone: &str, code: &str) -> Result<AuthOutcome>;

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair>;
}

/// Room listing and membership calls.
///
/// Credentials travel with every call; implementations keep no session state.
#[async_trait]
pub trait RoomClient: Send + Sync {
    async fn get_channels(&self, creds: &Credentials) -> Result<Vec<Channel>>;

    async fn join_channel(&self, creds: &Credentials, channel: &ChannelName) -> Result<()>;

    async fn active_ping(&self, creds: &Credentials, channel: &ChannelName) -> Result<()>;
}

/// Observer for user-facing progress output.
pub trait ProgressSink: Send + Sync {
    fn room(&self, channel: &Channel);
    fn joined(&self, channel: &ChannelName);
    fn pinged(&self, channel: &ChannelName);
    fn refreshed(&self);
}

/// Terse stdout markers: one line per room, `+` join, `.` ping, `@` refresh.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutProgress;

impl StdoutProgress {
    fn mark(marker: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(marker.as_bytes());
        let _ = out.flush();
    }
}

impl ProgressSink for StdoutProgress {
    fn room(&self, channel: &Channel) {
        println!("{}", channel.summary_line());
    }

    fn joined(&self, _channel: &ChannelName) {
        Self::mark("+");
    }

    fn pinged(&self, _channel: &ChannelName) {
        Self::mark(".");
    }

    fn refreshed(&self) {
        Self::mark("@");
    }
}
