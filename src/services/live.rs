use crate::db::{ChangeFeed, ChangeFilter, Subscription};
use crate::session::Session;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Keeps one subscription on `table` filtered by `column = <user id>`.
///
/// When the session user changes the old subscription is dropped, a new one
/// is opened for the new user and `on_change` runs once. Dropping the binding
/// drops both the subscription and the session watcher.
pub struct UserBinding {
    subscription: Arc<Mutex<Option<Subscription>>>,
    watcher: Option<JoinHandle<()>>,
}

impl UserBinding {
    pub fn bind<F, Fut>(
        session: &Session,
        feed: &ChangeFeed,
        table: &'static str,
        column: &'static str,
        on_change: F,
    ) -> Self
    where
        F: Fn() -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let subscribe = {
            let feed = feed.clone();
            let on_change = on_change.clone();
            move |user: Option<Uuid>| -> Option<Subscription> {
                let user = user?;
                let on_change = on_change.clone();
                Some(feed.subscribe(
                    ChangeFilter::table(table).eq(column, user.to_string()),
                    move |_event| on_change(),
                ))
            }
        };

        let subscription = Arc::new(Mutex::new(subscribe(session.user_id())));

        let mut users = session.watch();
        let current = subscription.clone();
        let watcher = tokio::spawn(async move {
            while users.changed().await.is_ok() {
                let user = users.borrow_and_update().as_ref().map(|u| u.id);
                tracing::debug!("Rebinding {} subscription to user {:?}", table, user);
                let replaced = std::mem::replace(&mut *current.lock(), subscribe(user));
                drop(replaced);
                on_change().await;
            }
        });

        Self {
            subscription,
            watcher: Some(watcher),
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .lock()
            .as_ref()
            .map(Subscription::is_active)
            .unwrap_or(false)
    }
}

impl Drop for UserBinding {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        self.subscription.lock().take();
    }
}
