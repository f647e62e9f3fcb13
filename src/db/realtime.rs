//! Realtime row-change feed.
//!
//! Backends publish ChangeEvents into a broadcast ChangeFeed; consumers call
//! `subscribe(filter, handler)` and get a Subscription that stops delivery
//! when dropped. Handlers of one subscription run one at a time: the next event
//! is not delivered until the previous handler future has resolved.

use crate::errors::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::future::Future;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// Events were dropped; the subscriber must re-read everything it shows
    Resync,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub table: String,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    #[serde(default)]
    pub record: Value,
    #[serde(default)]
    pub old_record: Value,
}

impl ChangeEvent {
    pub fn resync(table: &str) -> Self {
        Self {
            table: table.to_string(),
            kind: ChangeKind::Resync,
            record: Value::Null,
            old_record: Value::Null,
        }
    }
}

/// Which changes a subscriber wants: a table plus an optional `column = value`
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeFilter {
    pub table: String,
    pub column_eq: Option<(String, Value)>,
}

impl ChangeFilter {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            column_eq: None,
        }
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.column_eq = Some((column.to_string(), value.into()));
        self
    }

    /// Deletes only carry the old row, so both images are checked
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table {
            return false;
        }
        match &self.column_eq {
            None => true,
            Some((column, value)) => {
                event.record.get(column) == Some(value)
                    || event.old_record.get(column) == Some(value)
            }
        }
    }
}

/// Fan-out point for row-change notifications
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Deliver an event to current subscribers. Returns how many received it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[cfg(test)]
    pub fn raw_receiver(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Run `handler` for every event matching `filter` until the returned
    /// subscription is dropped or unsubscribed. A subscriber that falls
    /// behind gets one `Resync` event in place of the events it missed.
    pub fn subscribe<F, Fut>(&self, filter: ChangeFilter, handler: F) -> Subscription
    where
        F: Fn(ChangeEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut receiver = self.sender.subscribe();
        let description = format!("{}{}", filter.table, describe_column(&filter));

        tracing::debug!("Subscribed to changes on {}", description);

        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if filter.matches(&event) {
                            handler(event).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "Change subscription on {} lagged, {} events skipped",
                            filter.table,
                            skipped
                        );
                        handler(ChangeEvent::resync(&filter.table)).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Subscription {
            description,
            task: Some(task),
        }
    }
}

fn describe_column(filter: &ChangeFilter) -> String {
    match &filter.column_eq {
        Some((column, value)) => format!(" ({}={})", column, value),
        None => String::new(),
    }
}

/// Handle to a live change subscription; dropping it unsubscribes
#[derive(Debug)]
pub struct Subscription {
    description: String,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Unsubscribed from changes on {}", self.description);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

/// NOTIFY channel the migration's trigger publishes on
pub const CHANGE_CHANNEL: &str = "hub_changes";

/// Forwards Postgres NOTIFY payloads from `CHANGE_CHANNEL` into a ChangeFeed.
///
/// The migration installs a trigger that emits one JSON payload per row
/// change: `{"table", "type", "record", "old_record"}`.
pub struct PgRealtime {
    task: JoinHandle<()>,
}

impl PgRealtime {
    pub async fn start(pool: &PgPool, feed: ChangeFeed) -> Result<Self> {
        let mut listener = PgListener::connect_with(pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;
        tracing::info!("Listening for row changes on channel {}", CHANGE_CHANNEL);

        let task = tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        match serde_json::from_str::<ChangeEvent>(notification.payload()) {
                            Ok(event) => {
                                feed.publish(event);
                            }
                            Err(e) => {
                                tracing::warn!("Ignoring malformed change payload: {}", e);
                            }
                        }
                    }
                    Err(e) => {
                        // PgListener reconnects on the next recv
                        tracing::error!("Realtime listener error: {}", e);
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Ok(Self { task })
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(self) {
        self.task.abort();
        tracing::info!("Realtime listener stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn profile_change(id: &str, kind: ChangeKind) -> ChangeEvent {
        ChangeEvent {
            table: "profiles".to_string(),
            kind,
            record: json!({ "id": id }),
            old_record: Value::Null,
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_payload_format() {
        let payload = r#"{"table":"profiles","type":"DELETE","record":null,"old_record":{"id":"u1"}}"#;
        let event: ChangeEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);

        let filter = ChangeFilter::table("profiles").eq("id", "u1");
        assert!(filter.matches(&event));
        assert!(!ChangeFilter::table("profiles").eq("id", "u2").matches(&event));
        assert!(!ChangeFilter::table("reservas").matches(&event));
    }

    #[tokio::test]
    async fn test_subscription_receives_matching_events_only() {
        let feed = ChangeFeed::new(16);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let subscription = feed.subscribe(ChangeFilter::table("profiles").eq("id", "u1"), move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        feed.publish(profile_change("u1", ChangeKind::Update));
        feed.publish(profile_change("u2", ChangeKind::Update));
        feed.publish(profile_change("u1", ChangeKind::Insert));
        settle().await;

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(subscription.is_active());
    }

    #[tokio::test]
    async fn test_dropping_subscription_stops_delivery() {
        let feed = ChangeFeed::new(16);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let subscription = feed.subscribe(ChangeFilter::table("profiles"), move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        subscription.unsubscribe();
        settle().await;

        feed.publish(profile_change("u1", ChangeKind::Update));
        settle().await;

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handlers_run_sequentially() {
        let feed = ChangeFeed::new(16);
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let (r, m) = (running.clone(), max_seen.clone());

        let _subscription = feed.subscribe(ChangeFilter::table("profiles"), move |_| {
            let (r, m) = (r.clone(), m.clone());
            async move {
                let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                r.fetch_sub(1, Ordering::SeqCst);
            }
        });

        for _ in 0..3 {
            feed.publish(profile_change("u1", ChangeKind::Update));
        }
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lagged_subscriber_gets_resync() {
        let feed = ChangeFeed::new(1);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let log = seen.clone();

        let _subscription = feed.subscribe(ChangeFilter::table("profiles").eq("id", "u1"), move |event| {
            let log = log.clone();
            async move {
                log.lock().push(event.kind);
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        });

        feed.publish(profile_change("u1", ChangeKind::Update));
        settle().await;
        // Handler is busy; these overflow the single slot
        feed.publish(ChangeEvent {
            table: "reservas".to_string(),
            kind: ChangeKind::Insert,
            record: json!({}),
            old_record: Value::Null,
        });
        feed.publish(profile_change("u1", ChangeKind::Update));
        feed.publish(profile_change("u2", ChangeKind::Update));
        tokio::time::sleep(Duration::from_millis(500)).await;

        let kinds = seen.lock().clone();
        assert_eq!(kinds[0], ChangeKind::Update);
        assert!(kinds.contains(&ChangeKind::Resync));
    }

    #[test]
    fn test_migration_trigger_uses_listener_channel() {
        let migration = include_str!("migrations/20240501000000_hub_schema.sql");
        assert!(migration.contains(&format!("'{}'", CHANGE_CHANNEL)));
    }
}
