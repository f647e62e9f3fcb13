use crate::errors::{AppError, Result};
use crate::services::ToolsService;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Minimum Jaro-Winkler similarity for a fuzzy word match
pub const FUZZY_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub label: &'static str,
    pub path: &'static str,
}

pub static ROUTES: Lazy<Vec<Route>> = Lazy::new(|| {
    vec![
        Route { label: "Início", path: "/" },
        Route { label: "Ferramentas", path: "/ferramentas" },
        Route { label: "Comunicados", path: "/comunicados" },
        Route { label: "Calendário", path: "/calendario" },
        Route { label: "Reserva de salas", path: "/reservas" },
        Route { label: "Aniversariantes", path: "/aniversariantes" },
        Route { label: "Meu perfil", path: "/perfil" },
        Route { label: "Auditoria", path: "/admin/auditoria" },
    ]
});

// ============================================================================
// Seams
// ============================================================================

/// In-app navigation
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Opens external links
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
}

/// Opens links in the desktop's default browser
#[derive(Debug, Default, Clone)]
pub struct SystemLinkOpener;

impl LinkOpener for SystemLinkOpener {
    fn open(&self, url: &str) -> Result<()> {
        open::that(url)
            .map_err(|e| AppError::Internal(format!("Failed to open {}: {}", url, e)))
    }
}

/// Navigator for hosts without a router; logs the target
#[derive(Debug, Default, Clone)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, path: &str) {
        tracing::info!("Navigate to {}", path);
    }
}

// ============================================================================
// Keyboard
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: false,
            meta: false,
            shift: false,
        }
    }

    pub fn ctrl(key: impl Into<String>) -> Self {
        Self {
            ctrl: true,
            ..Self::new(key)
        }
    }

    pub fn meta(key: impl Into<String>) -> Self {
        Self {
            meta: true,
            ..Self::new(key)
        }
    }

    fn is_palette_shortcut(&self) -> bool {
        (self.ctrl || self.meta) && self.key.eq_ignore_ascii_case("k")
    }
}

/// Global key-event bus
#[derive(Debug, Clone)]
pub struct KeyBus {
    sender: broadcast::Sender<KeyEvent>,
}

impl KeyBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn emit(&self, event: KeyEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn subscribe(&self) -> broadcast::Receiver<KeyEvent> {
        self.sender.subscribe()
    }
}

impl Default for KeyBus {
    fn default() -> Self {
        Self::new(32)
    }
}

/// Detaches the palette from the key bus when dropped
#[derive(Debug)]
pub struct KeyListener {
    task: Option<JoinHandle<()>>,
}

impl Drop for KeyListener {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ============================================================================
// Palette
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteState {
    Closed,
    Open,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaletteItem {
    Route(Route),
    Tool {
        id: String,
        name: String,
        area: String,
        url: String,
    },
}

impl PaletteItem {
    pub fn label(&self) -> &str {
        match self {
            PaletteItem::Route(route) => route.label,
            PaletteItem::Tool { name, .. } => name,
        }
    }
}

/// Filtered palette contents, one list per group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaletteGroups {
    pub routes: Vec<PaletteItem>,
    pub tools: Vec<PaletteItem>,
}

impl PaletteGroups {
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty() && self.tools.is_empty()
    }
}

struct PaletteInner {
    state: Mutex<(PaletteState, String)>,
    tools: ToolsService,
    navigator: Arc<dyn Navigator>,
    opener: Arc<dyn LinkOpener>,
}

#[derive(Clone)]
pub struct CommandPalette {
    inner: Arc<PaletteInner>,
}

impl CommandPalette {
    pub fn new(
        tools: ToolsService,
        navigator: Arc<dyn Navigator>,
        opener: Arc<dyn LinkOpener>,
    ) -> Self {
        Self {
            inner: Arc::new(PaletteInner {
                state: Mutex::new((PaletteState::Closed, String::new())),
                tools,
                navigator,
                opener,
            }),
        }
    }

    pub fn state(&self) -> PaletteState {
        self.inner.state.lock().0
    }

    pub fn is_open(&self) -> bool {
        self.state() == PaletteState::Open
    }

    pub fn open(&self) {
        self.inner.state.lock().0 = PaletteState::Open;
    }

    /// Close and clear the query
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        state.0 = PaletteState::Closed;
        state.1.clear();
    }

    pub fn toggle(&self) {
        if self.is_open() {
            self.close();
        } else {
            self.open();
        }
    }

    /// Handle a key press; returns true when the event was consumed
    pub fn handle_key(&self, event: &KeyEvent) -> bool {
        if event.is_palette_shortcut() {
            self.toggle();
            return true;
        }
        if self.is_open() && event.key == "Escape" {
            self.close();
            return true;
        }
        false
    }

    /// React to key events from `bus` until the returned listener is dropped
    pub fn listen(&self, bus: &KeyBus) -> KeyListener {
        let mut events = bus.subscribe();
        let palette = self.clone();
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        palette.handle_key(&event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Palette missed {} key events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        KeyListener { task: Some(task) }
    }

    pub fn query(&self) -> String {
        self.inner.state.lock().1.clone()
    }

    pub fn set_query(&self, query: impl Into<String>) {
        self.inner.state.lock().1 = query.into();
    }

    /// Routes and active tools matching the current query
    pub fn items(&self) -> PaletteGroups {
        let query = self.query();

        let routes = ROUTES
            .iter()
            .filter(|route| matches_query(&query, route.label))
            .map(|route| PaletteItem::Route(*route))
            .collect();

        let tools = self
            .inner
            .tools
            .active_tools()
            .into_iter()
            .filter(|tool| {
                matches_query(&query, &tool.name) || matches_query(&query, &tool.area)
            })
            .map(|tool| PaletteItem::Tool {
                id: tool.id,
                name: tool.name,
                area: tool.area,
                url: tool.url,
            })
            .collect();

        PaletteGroups { routes, tools }
    }

    /// Close the palette, then navigate or open the tool
    pub fn select(&self, item: &PaletteItem) -> Result<()> {
        self.close();
        match item {
            PaletteItem::Route(route) => {
                self.inner.navigator.navigate(route.path);
                Ok(())
            }
            PaletteItem::Tool { id, url, .. } => {
                self.inner.tools.record_access(id);
                self.inner.opener.open(url).map_err(|e| {
                    tracing::error!("Failed to open tool {}: {}", id, e);
                    e
                })
            }
        }
    }
}

/// Case-insensitive substring match, or a fuzzy match of the query against
/// any word of `text`
pub fn matches_query(query: &str, text: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    let text = text.to_lowercase();
    if text.contains(&query) {
        return true;
    }
    text.split_whitespace()
        .any(|word| strsim::jaro_winkler(word, &query) >= FUZZY_THRESHOLD)
}
