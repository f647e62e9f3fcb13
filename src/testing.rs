use crate::context::HubContext;
use crate::db::memory::MemoryRemoteStore;
use crate::db::ChangeFeed;
use crate::errors::{AppError, Result};
use crate::local::{KeyValueStore, MemoryStore};
use crate::notifications::{
    NotificationPermission, Notifier, OsNotification, Toast, ToastKind, Toaster,
};
use crate::palette::{LinkOpener, Navigator};
use crate::session::Session;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Signed-out context over an in-memory remote store whose writes publish
/// to the context's change feed
pub fn test_context(
    local: Option<Arc<dyn KeyValueStore>>,
) -> (HubContext, MemoryRemoteStore, Arc<RecordingToaster>) {
    let feed = ChangeFeed::new(64);
    let remote = MemoryRemoteStore::new().with_feed(feed.clone());
    let local = local.unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>);
    let toaster = Arc::new(RecordingToaster::new());

    let ctx = HubContext::new(Arc::new(remote.clone()), feed, local, Session::signed_out())
        .with_toaster(toaster.clone())
        .with_notifier(Arc::new(RecordingNotifier::granted()));
    (ctx, remote, toaster)
}

#[derive(Default)]
pub struct RecordingToaster {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingToaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().clone()
    }

    pub fn count(&self, kind: ToastKind) -> usize {
        self.toasts.lock().iter().filter(|t| t.kind == kind).count()
    }

    pub fn clear(&self) {
        self.toasts.lock().clear();
    }
}

impl Toaster for RecordingToaster {
    fn show(&self, toast: Toast) {
        self.toasts.lock().push(toast);
    }
}

pub struct RecordingNotifier {
    permission: Mutex<NotificationPermission>,
    answer: NotificationPermission,
    requests: AtomicUsize,
    shown: Mutex<Vec<OsNotification>>,
}

impl RecordingNotifier {
    /// Starts in `initial`; a permission request moves it to `answer`
    pub fn new(initial: NotificationPermission, answer: NotificationPermission) -> Self {
        Self {
            permission: Mutex::new(initial),
            answer,
            requests: AtomicUsize::new(0),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn granted() -> Self {
        Self::new(NotificationPermission::Granted, NotificationPermission::Granted)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn shown(&self) -> Vec<OsNotification> {
        self.shown.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn permission(&self) -> NotificationPermission {
        *self.permission.lock()
    }

    async fn request_permission(&self) -> NotificationPermission {
        self.requests.fetch_add(1, Ordering::SeqCst);
        *self.permission.lock() = self.answer;
        self.answer
    }

    fn show(&self, notification: &OsNotification) -> Result<()> {
        self.shown.lock().push(notification.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    paths: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        self.paths.lock().push(path.to_string());
    }
}

#[derive(Default)]
pub struct RecordingLinkOpener {
    urls: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingLinkOpener {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl LinkOpener for RecordingLinkOpener {
    fn open(&self, url: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Internal(format!("cannot open {}", url)));
        }
        self.urls.lock().push(url.to_string());
        Ok(())
    }
}

/// Let spawned tasks run until they block
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
