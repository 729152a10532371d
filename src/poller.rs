//! Thread Poller
//!
//! Owns the cursor and drives poll cycles: request posts newer than the
//! cursor, render the ones that really are newer, advance the cursor.
//!
//! Cycles are serialized. The wait before the next cycle starts only once the
//! previous cycle has completed, so there is never more than one request in
//! flight and responses cannot arrive out of order.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::watch;

use crate::client::{FetchError, MessageSource};
use crate::cursor::Cursor;
use crate::page::CommentSink;
use crate::render::Renderer;
use crate::thread::Message;

/// Configuration for poll behavior
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Wait between the end of one cycle and the start of the next (ms)
    pub interval_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self { interval_ms: 5000 }
    }
}

/// Running totals for a poller
#[derive(Debug, Clone, Default)]
pub struct PollStats {
    /// Completed cycles, successful or not
    pub cycles: u64,
    /// Posts rendered
    pub rendered: u64,
    /// Cycles that failed
    pub failures: u64,
    /// Failures since the last successful cycle
    pub consecutive_failures: u32,
    /// When the last successful cycle finished
    pub last_success: Option<DateTime<Utc>>,
}

/// Outcome of one successful cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Posts in the response
    pub received: usize,
    /// Posts rendered
    pub rendered: usize,
    /// Cursor after the cycle
    pub cursor: Cursor,
}

/// Polls a [`MessageSource`] and renders new posts into a [`CommentSink`]
pub struct Poller<S, K> {
    source: S,
    sink: K,
    renderer: Renderer,
    cursor: Cursor,
    config: PollerConfig,
    stats: PollStats,
}

impl<S: MessageSource, K: CommentSink> Poller<S, K> {
    pub fn new(source: S, sink: K, renderer: Renderer, cursor: Cursor, config: PollerConfig) -> Self {
        Self {
            source,
            sink,
            renderer,
            cursor,
            config,
            stats: PollStats::default(),
        }
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    /// Consume the poller, returning its sink
    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Render every message the cursor is behind, in the given order.
    ///
    /// Returns the number rendered. Messages at or below the cursor are skipped,
    /// so re-delivered posts never render twice.
    pub fn apply(&mut self, messages: &[Message]) -> usize {
        let mut rendered = 0;

        for msg in messages {
            if !self.cursor.is_behind(&msg.postid) {
                tracing::trace!(postid = %msg.postid, cursor = %self.cursor, "Skipping seen post");
                continue;
            }

            self.renderer.render(&mut self.sink, msg);
            self.cursor.advance(&msg.postid);
            rendered += 1;

            tracing::info!(postid = %msg.postid, poster = %msg.poster, "Rendered post");
        }

        rendered
    }

    /// Run one poll cycle
    pub async fn poll_cycle(&mut self) -> Result<CycleReport, FetchError> {
        self.stats.cycles += 1;

        let messages = match self.source.fetch_after(&self.cursor).await {
            Ok(messages) => messages,
            Err(e) => {
                self.stats.failures += 1;
                self.stats.consecutive_failures += 1;
                return Err(e);
            }
        };

        let rendered = self.apply(&messages);
        if rendered > 0 {
            if let Err(e) = self.sink.flush() {
                tracing::warn!(error = %e, "Failed to flush rendered posts");
            }
        }

        self.stats.rendered += rendered as u64;
        self.stats.consecutive_failures = 0;
        self.stats.last_success = Some(Utc::now());

        Ok(CycleReport {
            received: messages.len(),
            rendered,
            cursor: self.cursor.clone(),
        })
    }

    /// Run one cycle and log its outcome
    async fn run_cycle(&mut self) {
        match self.poll_cycle().await {
            Ok(report) if report.rendered > 0 => {
                tracing::info!(
                    received = report.received,
                    rendered = report.rendered,
                    cursor = %report.cursor,
                    "Poll cycle rendered new posts"
                );
            }
            Ok(report) => {
                tracing::debug!(received = report.received, cursor = %report.cursor, "No new posts");
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    consecutive_failures = self.stats.consecutive_failures,
                    "Poll cycle failed"
                );
            }
        }
    }

    /// Poll until `shutdown` turns true or its sender is dropped.
    ///
    /// The first cycle runs immediately.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> PollStats {
        let interval = Duration::from_millis(self.config.interval_ms);

        tracing::info!(
            interval_ms = self.config.interval_ms,
            cursor = %self.cursor,
            "Starting thread poller"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                _ = self.run_cycle() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }

            tokio::select! {
                biased;
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            cycles = self.stats.cycles,
            rendered = self.stats.rendered,
            failures = self.stats.failures,
            cursor = %self.cursor,
            "Thread poller stopped"
        );

        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::decode_messages;
    use crate::page::{Element, PageResult};
    use crate::thread::PostId;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    enum Reply {
        Posts(Vec<Message>),
        Status(u16),
        Malformed(&'static str),
    }

    #[derive(Clone, Default)]
    struct ScriptedSource {
        replies: Arc<Mutex<VecDeque<Reply>>>,
        requested: Arc<Mutex<Vec<Cursor>>>,
        delay: Option<Duration>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies.into())),
                ..Default::default()
            }
        }

        fn requested(&self) -> Vec<Cursor> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageSource for ScriptedSource {
        async fn fetch_after(&self, cursor: &Cursor) -> Result<Vec<Message>, FetchError> {
            self.requested.lock().unwrap().push(cursor.clone());

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Posts(posts)) => Ok(posts),
                Some(Reply::Status(status)) => Err(FetchError::Status {
                    url: format!("http://test/thread/1/{}", cursor),
                    status,
                }),
                Some(Reply::Malformed(body)) => decode_messages(body),
                None => Ok(Vec::new()),
            }
        }
    }

    #[derive(Default)]
    struct CountingSink {
        comments: Vec<Element>,
        flushes: usize,
    }

    impl CommentSink for CountingSink {
        fn append(&mut self, fragment: &Element) {
            self.comments.push(fragment.clone());
        }

        fn flush(&mut self) -> PageResult<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    fn post(id: i64) -> Message {
        Message::new(format!("user{}", id), id, format!("body {}", id))
    }

    fn rendered_ids(sink: &CountingSink) -> Vec<String> {
        sink.comments
            .iter()
            .map(|c| {
                c.child_elements()
                    .next()
                    .and_then(|info| info.child_elements().nth(1))
                    .map(|id| id.inner_text())
                    .unwrap_or_default()
            })
            .collect()
    }

    fn poller(source: ScriptedSource, cursor: Cursor) -> Poller<ScriptedSource, CountingSink> {
        Poller::new(
            source,
            CountingSink::default(),
            Renderer::default(),
            cursor,
            PollerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_only_newer_posts_render() {
        let source = ScriptedSource::new(vec![Reply::Posts(vec![post(3), post(6), post(7)])]);
        let mut poller = poller(source, Cursor::from_marker("5"));

        let report = poller.poll_cycle().await.unwrap();
        assert_eq!(report.received, 3);
        assert_eq!(report.rendered, 2);
        assert_eq!(report.cursor, Cursor::At(PostId::from(7)));
        assert_eq!(rendered_ids(poller.sink()), vec!["ID: 6", "ID: 7"]);
        assert_eq!(poller.sink().flushes, 1);
    }

    #[tokio::test]
    async fn test_status_error_leaves_cursor() {
        let source = ScriptedSource::new(vec![Reply::Status(404)]);
        let mut poller = poller(source, Cursor::from_marker("5"));

        let err = poller.poll_cycle().await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(poller.cursor(), &Cursor::At(PostId::from(5)));
        assert!(poller.sink().comments.is_empty());
        assert_eq!(poller.stats().failures, 1);
        assert_eq!(poller.stats().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_malformed_response_is_skipped() {
        let source = ScriptedSource::new(vec![
            Reply::Malformed("<html>500</html>"),
            Reply::Posts(vec![post(6)]),
        ]);
        let mut poller = poller(source, Cursor::from_marker("5"));

        assert!(matches!(poller.poll_cycle().await, Err(FetchError::Decode(_))));
        assert_eq!(poller.cursor(), &Cursor::At(PostId::from(5)));

        poller.poll_cycle().await.unwrap();
        assert_eq!(rendered_ids(poller.sink()), vec!["ID: 6"]);
        assert_eq!(poller.stats().consecutive_failures, 0);
        assert!(poller.stats().last_success.is_some());
    }

    #[tokio::test]
    async fn test_redelivery_is_idempotent() {
        let source = ScriptedSource::new(vec![
            Reply::Posts(vec![post(6), post(7)]),
            Reply::Posts(vec![post(6), post(7)]),
            Reply::Posts(vec![post(7), post(8)]),
        ]);
        let mut poller = poller(source.clone(), Cursor::from_marker("5"));

        for _ in 0..3 {
            poller.poll_cycle().await.unwrap();
        }

        assert_eq!(rendered_ids(poller.sink()), vec!["ID: 6", "ID: 7", "ID: 8"]);
        assert_eq!(poller.stats().rendered, 3);
        // The second cycle rendered nothing, so it did not flush.
        assert_eq!(poller.sink().flushes, 2);
        assert_eq!(
            source.requested(),
            vec![
                Cursor::At(PostId::from(5)),
                Cursor::At(PostId::from(7)),
                Cursor::At(PostId::from(7)),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_response() {
        let source = ScriptedSource::new(vec![Reply::Posts(Vec::new())]);
        let mut poller = poller(source, Cursor::from_marker("5"));

        let report = poller.poll_cycle().await.unwrap();
        assert_eq!(report.rendered, 0);
        assert_eq!(poller.cursor(), &Cursor::At(PostId::from(5)));
        assert_eq!(poller.sink().flushes, 0);
    }

    #[tokio::test]
    async fn test_unset_cursor_renders_everything() {
        let source = ScriptedSource::new(vec![Reply::Posts(vec![post(1), post(2)])]);
        let mut poller = poller(source.clone(), Cursor::Unset);

        poller.poll_cycle().await.unwrap();
        assert_eq!(source.requested(), vec![Cursor::Unset]);
        assert_eq!(rendered_ids(poller.sink()), vec!["ID: 1", "ID: 2"]);
        assert_eq!(poller.cursor(), &Cursor::At(PostId::from(2)));
    }

    #[tokio::test]
    async fn test_unsorted_response_is_not_reordered() {
        let source = ScriptedSource::new(vec![Reply::Posts(vec![post(9), post(6)])]);
        let mut poller = poller(source, Cursor::from_marker("5"));

        poller.poll_cycle().await.unwrap();
        assert_eq!(rendered_ids(poller.sink()), vec!["ID: 9"]);
        assert_eq!(poller.cursor(), &Cursor::At(PostId::from(9)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_never_overlap() {
        let mut source = ScriptedSource::new(vec![
            Reply::Posts(vec![post(6)]),
            Reply::Posts(vec![post(7)]),
        ]);
        // Each response takes longer than the poll interval.
        source.delay = Some(Duration::from_secs(12));
        let max_in_flight = Arc::clone(&source.max_in_flight);

        let mut poller = poller(source.clone(), Cursor::from_marker("5"));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let stats = poller.run(rx).await;
            (stats, poller)
        });

        tokio::time::sleep(Duration::from_secs(60)).await;
        tx.send(true).unwrap();
        let (stats, poller) = handle.await.unwrap();

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        assert!(stats.cycles >= 3);
        assert_eq!(rendered_ids(poller.sink()), vec!["ID: 6", "ID: 7"]);

        // Every request after the first was sent with the cursor the previous
        // cycle left behind.
        let requested = source.requested();
        assert_eq!(requested[0], Cursor::At(PostId::from(5)));
        assert_eq!(requested[1], Cursor::At(PostId::from(6)));
        assert_eq!(requested[2], Cursor::At(PostId::from(7)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_sender_dropped() {
        let source = ScriptedSource::new(Vec::new());
        let mut poller = poller(source, Cursor::Unset);
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let stats = poller.run(rx).await;
        assert_eq!(stats.cycles, 1);
    }
}
