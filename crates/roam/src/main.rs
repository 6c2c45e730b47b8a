mod cli;

use std::{process::ExitCode, sync::Arc};

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use roam_clubhouse::{ClientInfo, ClubhouseClient};
use roam_core::{
    config::Config,
    credentials::CredentialStore,
    flows,
    ports::{ProgressSink, StdoutProgress},
    refresher::SessionRefresher,
};

use cli::{Action, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::from_args(std::env::args_os()).unwrap_or_else(|e| e.exit());
    if let Err(e) = roam_core::logging::init("roam") {
        eprintln!("{e}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Cancel on Ctrl-C. Only the long-running actions install this; the
/// one-shot ones keep the default SIGINT behaviour.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted, shutting down");
                cancel.cancel();
            }
        }
    });
    cancel
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(action) = Action::parse(&cli.action) else {
        tracing::warn!("unknown action `{}`; nothing to do", cli.action);
        return Ok(());
    };

    let cfg = Config::load()?.with_delay(cli.delay);
    let store = CredentialStore::new(&cfg.env_file);
    let device_id = store.device_id().context("reading device id")?;
    let client = Arc::new(ClubhouseClient::new(
        cfg.api_url.clone(),
        ClientInfo {
            app_version: cfg.app_version.clone(),
            app_build: cfg.app_build.clone(),
            device_id: device_id.clone(),
        },
        cfg.http_timeout,
    )?);
    let progress: Arc<dyn ProgressSink> = Arc::new(StdoutProgress);

    match action {
        Action::Login => flows::login(&store, client.as_ref())
            .await
            .context("login failed")?,
        Action::Auth => {
            flows::complete_auth(
                &store,
                client.as_ref(),
                cfg.token_scheme,
                &device_id,
                &cli.verification_code,
            )
            .await
            .context("auth failed")?;
        }
        Action::Online => {
            let creds = store
                .credentials(cfg.token_scheme)?
                .or_device_id(&device_id);
            let refresher =
                SessionRefresher::new(client.clone(), store.clone(), cfg.retry, progress, creds)?;
            flows::online(&refresher, cfg.refresh_interval, cancel_on_ctrl_c())
                .await
                .context("session refresh failed")?;
        }
        Action::JoinEveryRoom => {
            flows::join_every_room(
                &cfg,
                &store,
                client.clone(),
                client,
                progress,
                &device_id,
                cancel_on_ctrl_c(),
            )
            .await
            .context("room loop failed")?;
        }
    }

    Ok(())
}
