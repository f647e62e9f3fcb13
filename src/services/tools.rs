use crate::context::HubContext;
use crate::domain::{Favorite, RecentAccess, Tool, ToolDraft, ToolStatus, ToolUpdate};
use crate::errors::{AppError, Result};
use crate::local::Persisted;
use crate::notifications::{Toast, Toaster};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const DEFAULT_RECENT_LIMIT: usize = 5;

#[derive(Clone)]
pub struct ToolsService {
    tools: Persisted<Vec<Tool>>,
    favorites: Persisted<Vec<Favorite>>,
    recent: Persisted<Vec<RecentAccess>>,
    toaster: Arc<dyn Toaster>,
}

impl ToolsService {
    pub fn new(ctx: &HubContext) -> Self {
        Self {
            tools: Persisted::new(ctx.local.clone(), ctx.local_key("tools"), Vec::new()),
            favorites: Persisted::new(ctx.local.clone(), ctx.local_key("favorites"), Vec::new()),
            recent: Persisted::new(ctx.local.clone(), ctx.local_key("recent_access"), Vec::new()),
            toaster: ctx.toaster.clone(),
        }
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    pub fn tools(&self) -> Vec<Tool> {
        self.tools.get()
    }

    pub fn active_tools(&self) -> Vec<Tool> {
        self.tools
            .with(|tools| tools.iter().filter(|t| t.active).cloned().collect())
    }

    pub fn find(&self, id: &str) -> Option<Tool> {
        self.tools
            .with(|tools| tools.iter().find(|t| t.id == id).cloned())
    }

    pub fn add_tool(&self, draft: ToolDraft) -> Result<Tool> {
        if draft.name.trim().is_empty() || draft.url.trim().is_empty() {
            let err = AppError::ValidationError("Nome e URL são obrigatórios.".to_string());
            self.toaster
                .show(Toast::error("Erro ao adicionar ferramenta").with_description(err.user_message()));
            return Err(err);
        }

        let tool = draft.into_tool(Utc::now());
        self.tools.update(|tools| tools.push(tool.clone()));
        tracing::info!("Tool added: {} ({})", tool.name, tool.id);
        self.toaster.show(Toast::success("Ferramenta adicionada"));
        Ok(tool)
    }

    pub fn update_tool(&self, id: &str, changes: ToolUpdate) -> Result<Tool> {
        let updated = self.tools.update(|tools| {
            tools.iter_mut().find(|t| t.id == id).map(|tool| {
                changes.apply(tool, Utc::now());
                tool.clone()
            })
        });

        match updated {
            Some(tool) => {
                tracing::info!("Tool updated: {}", tool.id);
                self.toaster.show(Toast::success("Ferramenta atualizada"));
                Ok(tool)
            }
            None => self.not_found(id, "Erro ao atualizar ferramenta"),
        }
    }

    /// Remove a tool along with its favorite and recent-access entries
    pub fn delete_tool(&self, id: &str) -> Result<()> {
        let removed = self.tools.update(|tools| {
            let before = tools.len();
            tools.retain(|t| t.id != id);
            tools.len() != before
        });
        if !removed {
            return self.not_found(id, "Erro ao remover ferramenta");
        }

        self.favorites.update(|favorites| favorites.retain(|f| f.tool_id != id));
        self.recent.update(|recent| recent.retain(|r| r.tool_id != id));

        tracing::info!("Tool deleted: {}", id);
        self.toaster.show(Toast::success("Ferramenta removida"));
        Ok(())
    }

    pub fn set_active(&self, id: &str, active: bool) -> Result<Tool> {
        self.update_tool(
            id,
            ToolUpdate {
                active: Some(active),
                ..Default::default()
            },
        )
    }

    /// Active tools matching every given criterion. The text query matches
    /// name, description and tags, case-insensitively.
    pub fn search(&self, query: &str, area: Option<&str>, status: Option<ToolStatus>) -> Vec<Tool> {
        let needle = query.trim().to_lowercase();
        self.tools.with(|tools| {
            tools
                .iter()
                .filter(|t| t.active)
                .filter(|t| area.map(|a| t.area.eq_ignore_ascii_case(a)).unwrap_or(true))
                .filter(|t| status.map(|s| t.status == s).unwrap_or(true))
                .filter(|t| {
                    needle.is_empty()
                        || t.name.to_lowercase().contains(&needle)
                        || t.description.to_lowercase().contains(&needle)
                        || t.tags.iter().any(|tag| tag.to_lowercase().contains(&needle))
                })
                .cloned()
                .collect()
        })
    }

    /// Distinct areas of the active tools, sorted
    pub fn areas(&self) -> Vec<String> {
        self.tools.with(|tools| {
            tools
                .iter()
                .filter(|t| t.active)
                .map(|t| t.area.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        })
    }

    fn not_found<T>(&self, id: &str, failure: &str) -> Result<T> {
        tracing::warn!("Tool {} not found", id);
        let err = AppError::NotFound("Ferramenta".to_string());
        self.toaster
            .show(Toast::error(failure).with_description(err.user_message()));
        Err(err)
    }

    // ========================================================================
    // Favorites
    // ========================================================================

    pub fn favorites(&self) -> Vec<Favorite> {
        self.favorites.get()
    }

    pub fn is_favorite(&self, tool_id: &str) -> bool {
        self.favorites
            .with(|favorites| favorites.iter().any(|f| f.tool_id == tool_id))
    }

    /// Add or remove the favorite; returns whether the tool is now a favorite
    pub fn toggle_favorite(&self, tool_id: &str) -> bool {
        self.favorites.update(|favorites| {
            if let Some(pos) = favorites.iter().position(|f| f.tool_id == tool_id) {
                favorites.remove(pos);
                false
            } else {
                favorites.push(Favorite {
                    tool_id: tool_id.to_string(),
                    favorited_at: Utc::now(),
                });
                true
            }
        })
    }

    /// Active favorite tools, most recently favorited first
    pub fn favorite_tools(&self) -> Vec<Tool> {
        let mut favorites = self.favorites.get();
        favorites.sort_by(|a, b| b.favorited_at.cmp(&a.favorited_at));
        self.join_active(favorites.iter().map(|f| f.tool_id.as_str()))
    }

    // ========================================================================
    // Recent accesses
    // ========================================================================

    pub fn record_access(&self, tool_id: &str) {
        self.record_access_at(tool_id, Utc::now());
    }

    pub fn record_access_at(&self, tool_id: &str, at: DateTime<Utc>) {
        self.recent.update(|recent| {
            match recent.iter_mut().find(|r| r.tool_id == tool_id) {
                Some(entry) => {
                    entry.count = entry.count.saturating_add(1);
                    entry.last_access = at;
                }
                None => recent.push(RecentAccess {
                    tool_id: tool_id.to_string(),
                    last_access: at,
                    count: 1,
                }),
            }
        });
        tracing::debug!("Recorded access to tool {}", tool_id);
    }

    pub fn recent_access(&self) -> Vec<RecentAccess> {
        self.recent.get()
    }

    /// Active recently opened tools, newest first, at most `limit`
    pub fn recent_tools(&self, limit: usize) -> Vec<Tool> {
        let mut recent = self.recent.get();
        recent.sort_by(|a, b| b.last_access.cmp(&a.last_access));
        let mut tools = self.join_active(recent.iter().map(|r| r.tool_id.as_str()));
        tools.truncate(limit);
        tools
    }

    fn join_active<'a>(&self, ids: impl Iterator<Item = &'a str>) -> Vec<Tool> {
        self.tools.with(|tools| {
            ids.filter_map(|id| tools.iter().find(|t| t.id == id && t.active).cloned())
                .collect()
        })
    }
}
