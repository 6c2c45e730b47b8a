//! The room loop: LIST every room, then ACT on each (join or ping).

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{Channel, Credentials},
    pacing::{PaceConfig, Pacer, RoomAction},
    ports::{ProgressSink, RoomClient},
    retry::RetryPolicy,
    Result,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    pub listed: usize,
    pub joined: usize,
    pub pinged: usize,
}

pub struct RoomOrchestrator {
    rooms: Arc<dyn RoomClient>,
    progress: Arc<dyn ProgressSink>,
    pace: PaceConfig,
    retry: RetryPolicy,
}

/// Least populated rooms first. Stable: equal counts keep listing order.
pub fn sort_by_population(channels: &mut [Channel]) {
    channels.sort_by_key(|c| c.num_all);
}

impl RoomOrchestrator {
    pub fn new(
        rooms: Arc<dyn RoomClient>,
        progress: Arc<dyn ProgressSink>,
        pace: PaceConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            rooms,
            progress,
            pace,
            retry,
        }
    }

    /// One LIST -> ACT pass. The first failing call aborts the pass.
    pub async fn run_pass(&self, creds: &Credentials, pacer: &mut Pacer) -> Result<PassReport> {
        pacer.wait().await;
        let mut channels = self.rooms.get_channels(creds).await?;
        sort_by_population(&mut channels);
        for channel in &channels {
            self.progress.room(channel);
        }

        let mut report = PassReport {
            listed: channels.len(),
            ..Default::default()
        };

        if channels.is_empty() {
            // Nothing to act on; keep the next listing from going out immediately.
            pacer.record(RoomAction::Ping);
            return Ok(report);
        }

        for channel in &channels {
            pacer.wait().await;
            if channel.has_user(creds.user_id) {
                self.rooms.active_ping(creds, &channel.name).await?;
                self.progress.pinged(&channel.name);
                pacer.record(RoomAction::Ping);
                report.pinged += 1;
            } else {
                self.rooms.join_channel(creds, &channel.name).await?;
                self.progress.joined(&channel.name);
                pacer.record(RoomAction::Join);
                report.joined += 1;
            }
        }

        Ok(report)
    }

    /// Loop passes until cancelled, using the latest published credentials
    /// for each pass.
    ///
    /// A failing pass is retried under the retry policy; the failure count
    /// resets after every successful pass.
    pub async fn run(
        &self,
        mut creds: watch::Receiver<Credentials>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut pacer = Pacer::new(self.pace);
        let mut failures = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let current = creds.borrow_and_update().clone();

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                r = self.run_pass(&current, &mut pacer) => r,
            };

            match outcome {
                Ok(report) => {
                    failures = 0;
                    tracing::debug!(
                        "pass done: {} rooms, {} joined, {} pinged",
                        report.listed,
                        report.joined,
                        report.pinged
                    );
                }
                Err(e) if e.is_retryable() && self.retry.allows(failures) => {
                    let wait = self.retry.delay_for(failures);
                    failures += 1;
                    tracing::warn!("room pass failed (retry {failures} in {wait:?}): {e}");
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = sleep(wait) => {}
                    }
                }
                Err(e) => {
                    tracing::error!("room pass failed: {e}");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChannelName, ChannelUser, TokenScheme, UserId};
    use crate::errors::Error;
    use async_trait::async_trait;
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeRooms {
        listings: Mutex<VecDeque<Result<Vec<Channel>>>>,
        calls: Mutex<Vec<String>>,
        failing_joins: HashSet<String>,
        lists: Mutex<usize>,
        cancel_on_list: Option<(usize, CancellationToken)>,
        rotate_on_first_list: Mutex<Option<(watch::Sender<Credentials>, Credentials)>>,
    }

    impl FakeRooms {
        fn with_listings(listings: Vec<Result<Vec<Channel>>>) -> Self {
            Self {
                listings: Mutex::new(listings.into()),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RoomClient for FakeRooms {
        async fn get_channels(&self, creds: &Credentials) -> Result<Vec<Channel>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("list:{}", creds.authorization()));
            let n = {
                let mut lists = self.lists.lock().unwrap();
                *lists += 1;
                *lists
            };
            if let Some((after, tok)) = &self.cancel_on_list {
                if n >= *after {
                    tok.cancel();
                }
            }
            if let Some((tx, next)) = self.rotate_on_first_list.lock().unwrap().take() {
                tx.send_replace(next);
            }
            self.listings
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn join_channel(&self, _creds: &Credentials, channel: &ChannelName) -> Result<()> {
            self.calls.lock().unwrap().push(format!("join:{channel}"));
            if self.failing_joins.contains(&channel.0) {
                return Err(Error::Api {
                    status: 500,
                    message: "boom".into(),
                });
            }
            Ok(())
        }

        async fn active_ping(&self, _creds: &Credentials, channel: &ChannelName) -> Result<()> {
            self.calls.lock().unwrap().push(format!("ping:{channel}"));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        lines: Mutex<Vec<String>>,
        marks: Mutex<String>,
    }

    impl ProgressSink for RecordingProgress {
        fn room(&self, channel: &Channel) {
            self.lines.lock().unwrap().push(channel.summary_line());
        }
        fn joined(&self, _channel: &ChannelName) {
            self.marks.lock().unwrap().push('+');
        }
        fn pinged(&self, _channel: &ChannelName) {
            self.marks.lock().unwrap().push('.');
        }
        fn refreshed(&self) {
            self.marks.lock().unwrap().push('@');
        }
    }

    fn room(id: i64, num_all: u32, users: &[i64]) -> Channel {
        Channel {
            channel_id: id,
            name: ChannelName(format!("room{id}")),
            topic: None,
            club: None,
            num_all,
            num_speakers: 0,
            users: users
                .iter()
                .map(|u| ChannelUser {
                    user_id: UserId(*u),
                    name: None,
                })
                .collect(),
        }
    }

    fn creds(token: &str) -> Credentials {
        Credentials {
            user_id: UserId(7),
            scheme: TokenScheme::Bearer,
            access_token: token.into(),
            refresh_token: Some("r".into()),
            device_id: None,
        }
    }

    fn no_pause() -> PaceConfig {
        PaceConfig {
            join_interval: Duration::ZERO,
            ping_interval: Duration::ZERO,
        }
    }

    fn orchestrator(
        rooms: Arc<FakeRooms>,
        progress: Arc<RecordingProgress>,
        retry: RetryPolicy,
    ) -> RoomOrchestrator {
        RoomOrchestrator::new(rooms, progress, no_pause(), retry)
    }

    #[test]
    fn sort_is_non_decreasing_and_stable() {
        let mut rooms = vec![room(1, 5, &[]), room(2, 1, &[]), room(3, 5, &[]), room(4, 0, &[])];
        sort_by_population(&mut rooms);
        let ids: Vec<i64> = rooms.iter().map(|c| c.channel_id).collect();
        assert_eq!(ids, vec![4, 2, 1, 3]);
        assert!(rooms.windows(2).all(|w| w[0].num_all <= w[1].num_all));
    }

    #[tokio::test]
    async fn joins_absent_rooms_and_pings_joined_ones() {
        let rooms = Arc::new(FakeRooms::with_listings(vec![Ok(vec![
            room(1, 50, &[7]),
            room(2, 10, &[]),
        ])]));
        let progress = Arc::new(RecordingProgress::default());
        let orch = orchestrator(rooms.clone(), progress.clone(), RetryPolicy::fail_fast());

        let mut pacer = Pacer::new(no_pause());
        let report = orch.run_pass(&creds("a"), &mut pacer).await.unwrap();

        assert_eq!(
            report,
            PassReport {
                listed: 2,
                joined: 1,
                pinged: 1
            }
        );
        assert_eq!(
            rooms.calls(),
            vec!["list:Bearer a", "join:room2", "ping:room1"]
        );
        assert_eq!(
            *progress.lines.lock().unwrap(),
            vec!["2 room2   10 0", "1 room1   50 0"]
        );
        assert_eq!(*progress.marks.lock().unwrap(), "+.");
    }

    #[tokio::test]
    async fn join_failure_aborts_rest_of_pass() {
        let mut fake = FakeRooms::with_listings(vec![Ok(vec![room(1, 1, &[]), room(2, 2, &[])])]);
        fake.failing_joins.insert("room1".into());
        let rooms = Arc::new(fake);
        let orch = orchestrator(
            rooms.clone(),
            Arc::new(RecordingProgress::default()),
            RetryPolicy::fail_fast(),
        );

        let mut pacer = Pacer::new(no_pause());
        let err = orch.run_pass(&creds("a"), &mut pacer).await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 500, .. }));
        assert_eq!(rooms.calls(), vec!["list:Bearer a", "join:room1"]);
    }

    #[tokio::test]
    async fn fail_fast_listing_error_ends_the_loop() {
        let rooms = Arc::new(FakeRooms::with_listings(vec![
            Err(Error::Transport("connection reset".into())),
            Ok(vec![room(1, 1, &[])]),
        ]));
        let orch = orchestrator(
            rooms.clone(),
            Arc::new(RecordingProgress::default()),
            RetryPolicy::fail_fast(),
        );
        let (_tx, rx) = watch::channel(creds("a"));

        let out = orch.run(rx, CancellationToken::new()).await;
        assert!(matches!(out, Err(Error::Transport(_))));
        assert_eq!(rooms.calls(), vec!["list:Bearer a"]);
    }

    #[tokio::test]
    async fn retrying_listing_error_relists() {
        let cancel = CancellationToken::new();
        let rooms = Arc::new(FakeRooms {
            cancel_on_list: Some((2, cancel.clone())),
            ..FakeRooms::with_listings(vec![
                Err(Error::Transport("connection reset".into())),
                Ok(vec![room(1, 1, &[])]),
            ])
        });
        let orch = orchestrator(
            rooms.clone(),
            Arc::new(RecordingProgress::default()),
            RetryPolicy::fixed(Duration::ZERO),
        );
        let (_tx, rx) = watch::channel(creds("a"));

        orch.run(rx, cancel).await.unwrap();
        assert_eq!(
            rooms.calls(),
            vec!["list:Bearer a", "list:Bearer a", "join:room1"]
        );
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let rooms = Arc::new(FakeRooms::with_listings(vec![Err(Error::Api {
            status: 401,
            message: "unauthorized".into(),
        })]));
        let orch = orchestrator(
            rooms.clone(),
            Arc::new(RecordingProgress::default()),
            RetryPolicy::fixed(Duration::ZERO),
        );
        let (_tx, rx) = watch::channel(creds("a"));

        assert!(orch.run(rx, CancellationToken::new()).await.is_err());
        assert_eq!(rooms.calls().len(), 1);
    }

    #[tokio::test]
    async fn each_pass_uses_latest_credentials() {
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(creds("old"));
        let rooms = Arc::new(FakeRooms {
            cancel_on_list: Some((2, cancel.clone())),
            rotate_on_first_list: Mutex::new(Some((tx, creds("new")))),
            ..Default::default()
        });
        let orch = orchestrator(
            rooms.clone(),
            Arc::new(RecordingProgress::default()),
            RetryPolicy::fail_fast(),
        );

        orch.run(rx, cancel).await.unwrap();
        assert_eq!(rooms.calls(), vec!["list:Bearer old", "list:Bearer new"]);
    }
}
