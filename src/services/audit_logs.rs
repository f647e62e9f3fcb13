use super::{keys, Resource};
use crate::context::HubContext;
use crate::db::schema::{AuditLogRow, ProfileRow, AUDIT_LOGS, PROFILES};
use crate::db::{decode_rows, encode_row, Direction, Query};
use crate::domain::{AuditEntry, AuditLog, AuditLogFilters};
use crate::errors::{AppError, Result};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

struct Inner {
    ctx: HubContext,
    logs: Resource<Vec<AuditLog>>,
    filters: RwLock<AuditLogFilters>,
}

#[derive(Clone)]
pub struct AuditLogsService {
    inner: Arc<Inner>,
}

impl AuditLogsService {
    pub fn new(ctx: &HubContext) -> Self {
        Self {
            inner: Arc::new(Inner {
                ctx: ctx.clone(),
                logs: Resource::default(),
                filters: RwLock::new(AuditLogFilters::default()),
            }),
        }
    }

    pub fn logs(&self) -> Vec<AuditLog> {
        self.inner.logs.get()
    }

    pub fn filters(&self) -> AuditLogFilters {
        self.inner.filters.read().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.ctx.loading.is_loading_key(keys::AUDIT_LOGS)
    }

    pub async fn mount(&self) {
        self.refresh().await;
    }

    pub fn unmount(&self) {
        self.inner.logs.close();
    }

    /// Replace the filters and re-fetch
    pub async fn set_filters(&self, filters: AuditLogFilters) {
        *self.inner.filters.write() = filters;
        self.refresh().await;
    }

    pub async fn refresh(&self) {
        let filters = self.filters();
        let fetched = self
            .inner
            .ctx
            .loading
            .with_loading(keys::AUDIT_LOGS, || self.fetch(&filters))
            .await;

        match fetched {
            Ok(logs) => {
                tracing::debug!("Loaded {} audit log entries", logs.len());
                self.inner.logs.replace(logs);
            }
            Err(e) => {
                tracing::error!("Failed to load audit logs: {}", e);
                self.inner.logs.replace(Vec::new());
            }
        }
    }

    async fn fetch(&self, filters: &AuditLogFilters) -> Result<Vec<AuditLog>> {
        let mut query = Query::from(AUDIT_LOGS)
            .order("created_at", Direction::Desc)
            .limit(filters.limit);
        if let Some(entity_type) = &filters.entity_type {
            query = query.eq("entity_type", entity_type.as_str());
        }
        if let Some(action) = &filters.action {
            query = query.eq("action", action.as_str());
        }
        if let Some(user) = filters.user_id {
            query = query.any_eq(&["user_id", "target_user_id"], user.to_string());
        }

        let remote = &self.inner.ctx.remote;
        let rows: Vec<AuditLogRow> = decode_rows(AUDIT_LOGS, remote.select(&query).await?);
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let people: BTreeSet<String> = rows
            .iter()
            .flat_map(|r| std::iter::once(r.user_id).chain(r.target_user_id))
            .map(|id| id.to_string())
            .collect();
        let profiles: HashMap<_, _> = decode_rows::<ProfileRow>(
            PROFILES,
            remote
                .select(&Query::from(PROFILES).is_in("id", people))
                .await?,
        )
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

        Ok(rows
            .into_iter()
            .map(|row| AuditLog::from_row(row, &profiles))
            .collect())
    }

    /// Insert an entry authored by the signed-in user, then re-fetch
    pub async fn record(&self, entry: AuditEntry) -> Result<()> {
        let outcome: Result<()> = async {
            let actor = self
                .inner
                .ctx
                .session
                .user_id()
                .ok_or(AppError::Unauthorized)?;
            let row = entry.into_row(actor);
            tracing::info!(
                "Recording audit entry {} on {}",
                row.action,
                row.entity_type
            );
            self.inner
                .ctx
                .remote
                .insert(AUDIT_LOGS, encode_row(&row)?)
                .await?;
            Ok(())
        }
        .await;

        self.refresh().await;
        if let Err(e) = &outcome {
            tracing::error!("Failed to record audit entry: {}", e);
        }
        outcome
    }
}
