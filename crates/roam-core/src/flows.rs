//! The four CLI actions, independent of the concrete API adapter.

use std::{sync::Arc, time::Duration};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    credentials::{
        CredentialStore, ACCESS_TOKEN, AUTH_TOKEN, DEVICE_ID, REFRESH_TOKEN, USER_ID,
    },
    domain::{Credentials, TokenScheme},
    errors::Error,
    orchestrator::RoomOrchestrator,
    pacing::PaceConfig,
    ports::{AuthClient, ProgressSink, RoomClient},
    refresher::SessionRefresher,
    Result,
};

/// Ask the platform to text a verification code to `PHONE_NUMBER`.
pub async fn login(store: &CredentialStore, auth: &dyn AuthClient) -> Result<()> {
    let phone = store.phone_number()?;
    let outcome = auth.start_phone_auth(&phone).await?;
    if !outcome.success {
        return Err(Error::Rejected(outcome.error_message.unwrap_or_else(|| {
            "phone number authentication was not started".to_string()
        })));
    }
    tracing::info!(
        "verification code sent to {}; run the auth action next",
        mask_phone(&phone)
    );
    Ok(())
}

/// Exchange the verification code for session tokens and persist them.
///
/// Nothing is written unless the platform reports success; the device id the
/// client has been sending is persisted together with the tokens.
pub async fn complete_auth(
    store: &CredentialStore,
    auth: &dyn AuthClient,
    scheme: TokenScheme,
    device_id: &str,
    code: &str,
) -> Result<Credentials> {
    let code = code.trim();
    if code.is_empty() {
        return Err(Error::Config(
            "a verification code is required for the auth action".to_string(),
        ));
    }

    let phone = store.phone_number()?;
    let outcome = auth.complete_phone_auth(&phone, code).await?;
    if !outcome.success {
        return Err(Error::Rejected(outcome.error_message.unwrap_or_else(|| {
            "verification code was not accepted".to_string()
        })));
    }
    if outcome.is_waitlisted {
        tracing::warn!("account is waitlisted; room calls may be refused");
    }

    let missing = |what: &str| Error::Rejected(format!("auth response has no {what}"));
    let user_id = outcome.user_id.ok_or_else(|| missing("user id"))?;

    let mut pairs = vec![
        (USER_ID, user_id.to_string()),
        (DEVICE_ID, device_id.to_string()),
    ];
    match scheme {
        TokenScheme::Bearer => {
            pairs.push((
                ACCESS_TOKEN,
                outcome.access_token.ok_or_else(|| missing("access token"))?,
            ));
            pairs.push((
                REFRESH_TOKEN,
                outcome.refresh_token.ok_or_else(|| missing("refresh token"))?,
            ));
        }
        TokenScheme::Token => {
            pairs.push((
                AUTH_TOKEN,
                outcome.auth_token.ok_or_else(|| missing("auth token"))?,
            ));
        }
    }

    store.update(pairs)?;
    tracing::info!("signed in as user {user_id}");
    store.credentials(scheme)
}

/// Refresh right away, then keep refreshing every `period` until cancelled.
pub async fn online(
    refresher: &SessionRefresher,
    period: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    match refresher.refresh_once(&cancel).await {
        Ok(_) => {}
        Err(Error::Cancelled) => return Ok(()),
        Err(e) => return Err(e),
    }
    refresher.run(period, cancel).await
}

/// Walk every public room forever, refreshing the session in the background
/// when the token scheme allows it.
///
/// `device_id` is used when the credential file does not carry one yet.
pub async fn join_every_room(
    cfg: &Config,
    store: &CredentialStore,
    auth: Arc<dyn AuthClient>,
    rooms: Arc<dyn RoomClient>,
    progress: Arc<dyn ProgressSink>,
    device_id: &str,
    cancel: CancellationToken,
) -> Result<()> {
    let creds = store
        .credentials(cfg.token_scheme)?
        .or_device_id(device_id);
    let pace = PaceConfig {
        join_interval: cfg.join_interval,
        ping_interval: cfg.ping_interval,
    };
    let orchestrator = RoomOrchestrator::new(rooms, progress.clone(), pace, cfg.retry);

    if !cfg.token_scheme.supports_refresh() {
        let (_tx, rx) = watch::channel(creds);
        return orchestrator.run(rx, cancel).await;
    }

    let refresher = Arc::new(SessionRefresher::new(
        auth,
        store.clone(),
        cfg.retry,
        progress,
        creds,
    )?);
    match refresher.refresh_once(&cancel).await {
        Ok(_) => {}
        Err(Error::Cancelled) => return Ok(()),
        Err(e) => return Err(e),
    }

    let rx = refresher.subscribe();
    let child = cancel.child_token();
    let mut refresh_task = refresher.spawn(cfg.refresh_interval, child.clone());

    let result = tokio::select! {
        r = orchestrator.run(rx, child.clone()) => r,
        r = &mut refresh_task => match r {
            Ok(r) => r,
            Err(e) => Err(Error::Task(format!("session refresher: {e}"))),
        },
    };

    child.cancel();
    if !refresh_task.is_finished() {
        let _ = refresh_task.await;
    }
    result
}

fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{tail}", "*".repeat(chars.len() - 4))
}
