//! Periodic session refresh.
//!
//! The refresher owns the latest `Credentials` and publishes every new token
//! set on a `watch` channel; the room loop picks it up at the start of its
//! next pass.

use std::{sync::Arc, time::Duration};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    credentials::{CredentialStore, ACCESS_TOKEN, DEVICE_ID, REFRESH_TOKEN},
    domain::Credentials,
    errors::Error,
    ports::{AuthClient, ProgressSink},
    retry::{retry, RetryPolicy},
    Result,
};

pub struct SessionRefresher {
    auth: Arc<dyn AuthClient>,
    store: CredentialStore,
    retry: RetryPolicy,
    progress: Arc<dyn ProgressSink>,
    tx: watch::Sender<Credentials>,
}

impl SessionRefresher {
    pub fn new(
        auth: Arc<dyn AuthClient>,
        store: CredentialStore,
        retry: RetryPolicy,
        progress: Arc<dyn ProgressSink>,
        initial: Credentials,
    ) -> Result<Self> {
        if !initial.scheme.supports_refresh() {
            return Err(Error::Config(
                "token refresh needs the bearer token scheme (ACCESS_TOKEN/REFRESH_TOKEN)"
                    .to_string(),
            ));
        }
        let (tx, _rx) = watch::channel(initial);
        Ok(Self {
            auth,
            store,
            retry,
            progress,
            tx,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<Credentials> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Credentials {
        self.tx.borrow().clone()
    }

    /// Exchange the current refresh token for a new pair, persist and publish it.
    ///
    /// Returns `Error::Cancelled` if `cancel` fires while the call or a retry
    /// pause is in flight; nothing is written in that case.
    pub async fn refresh_once(&self, cancel: &CancellationToken) -> Result<Credentials> {
        let current = self.current();
        let refresh_token = current
            .refresh_token
            .clone()
            .ok_or_else(|| Error::Credentials(format!("{REFRESH_TOKEN} is missing")))?;

        let tokens = retry(&self.retry, "token refresh", cancel, || {
            self.auth.refresh_token(&refresh_token)
        })
        .await?;

        let mut pairs = vec![
            (ACCESS_TOKEN, tokens.access.clone()),
            (REFRESH_TOKEN, tokens.refresh.clone()),
        ];
        if let Some(device_id) = &current.device_id {
            pairs.push((DEVICE_ID, device_id.clone()));
        }
        self.store.update(pairs)?;

        let next = current.with_tokens(&tokens);
        self.tx.send_replace(next.clone());
        self.progress.refreshed();
        tracing::debug!("session tokens refreshed");
        Ok(next)
    }

    /// Refresh every `period` until cancelled. The first refresh happens one
    /// period after start.
    pub async fn run(&self, period: Duration, cancel: CancellationToken) -> Result<()> {
        let mut tick = interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tick.tick() => match self.refresh_once(&cancel).await {
                    Ok(_) => {}
                    Err(Error::Cancelled) => return Ok(()),
                    Err(e) => return Err(e),
                },
            }
        }
    }

    pub fn spawn(
        self: Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run(period, cancel).await })
    }
}
