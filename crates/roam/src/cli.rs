use std::ffi::OsString;

use clap::Parser;

use roam_core::config::DEFAULT_DELAY_SECS;

#[derive(Parser, Debug)]
#[command(
    name = "roam",
    version,
    about = "Sign in by phone, keep the session fresh and walk every public room"
)]
pub struct Cli {
    /// One of: login, auth, online, join-every-room
    #[arg(long, default_value = "")]
    pub action: String,

    /// Code received by SMS (auth action)
    #[arg(long = "verification-code", alias = "verificationCode", default_value = "")]
    pub verification_code: String,

    /// Seconds between pings; joins wait twice as long
    #[arg(long, default_value_t = DEFAULT_DELAY_SECS)]
    pub delay: u64,
}

/// Long flags that may also be spelled with a single dash (`-action=login`).
const SINGLE_DASH_LONG: &[&str] = &["action", "verificationCode", "verification-code", "delay"];

impl Cli {
    /// Parse `args`, accepting `-action`, `-verificationCode` and `-delay`
    /// alongside their `--` forms.
    pub fn from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(args.into_iter().map(|a| widen_single_dash(a.into())))
    }
}

fn widen_single_dash(arg: OsString) -> OsString {
    let Some(s) = arg.to_str() else {
        return arg;
    };
    let Some(rest) = s.strip_prefix('-') else {
        return arg;
    };
    if rest.starts_with('-') {
        return arg;
    }
    let name = rest.split_once('=').map_or(rest, |(n, _)| n);
    if SINGLE_DASH_LONG.contains(&name) {
        OsString::from(format!("-{s}"))
    } else {
        arg
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Login,
    Auth,
    Online,
    JoinEveryRoom,
}

impl Action {
    /// Unknown names are not an error: the caller treats them as a no-op.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "login" => Some(Self::Login),
            "auth" => Some(Self::Auth),
            "online" => Some(Self::Online),
            "join-every-room" => Some(Self::JoinEveryRoom),
            _ => None,
        }
    }
}
