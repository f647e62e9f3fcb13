use super::{keys, report, Resource};
use crate::context::HubContext;
use crate::db::schema::{EventRow, EVENTS};
use crate::db::{decode_rows, encode_row, Direction, Filter, Query};
use crate::domain::{CalendarEvent, EventDraft, EventUpdate};
use crate::errors::{AppError, Result};
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

struct Inner {
    ctx: HubContext,
    events: Resource<Vec<CalendarEvent>>,
}

#[derive(Clone)]
pub struct CalendarEventsService {
    inner: Arc<Inner>,
}

impl CalendarEventsService {
    pub fn new(ctx: &HubContext) -> Self {
        Self {
            inner: Arc::new(Inner {
                ctx: ctx.clone(),
                events: Resource::default(),
            }),
        }
    }

    pub fn events(&self) -> Vec<CalendarEvent> {
        self.inner.events.get()
    }

    pub fn events_on(&self, date: NaiveDate) -> Vec<CalendarEvent> {
        self.inner
            .events
            .with(|events| events.iter().filter(|e| e.date == date).cloned().collect())
    }

    pub fn is_loading(&self) -> bool {
        self.inner.ctx.loading.is_loading_key(keys::CALENDAR_EVENTS)
    }

    pub async fn mount(&self) {
        self.refresh().await;
    }

    pub fn unmount(&self) {
        self.inner.events.close();
    }

    /// Re-read all events by date. The list is cleared on failure.
    pub async fn refresh(&self) {
        let fetched = self
            .inner
            .ctx
            .loading
            .with_loading(keys::CALENDAR_EVENTS, || async {
                let rows = self
                    .inner
                    .ctx
                    .remote
                    .select(&Query::from(EVENTS).order("data", Direction::Asc))
                    .await?;
                Ok::<_, AppError>(
                    decode_rows::<EventRow>(EVENTS, rows)
                        .into_iter()
                        .map(CalendarEvent::from)
                        .collect::<Vec<_>>(),
                )
            })
            .await;

        match fetched {
            Ok(events) => {
                tracing::debug!("Loaded {} calendar events", events.len());
                self.inner.events.replace(events);
            }
            Err(e) => {
                tracing::error!("Failed to load calendar events: {}", e);
                self.inner.events.replace(Vec::new());
            }
        }
    }

    pub async fn add(&self, draft: EventDraft) -> Result<()> {
        let outcome: Result<()> = async {
            if draft.title.trim().is_empty() {
                return Err(AppError::ValidationError("Informe um título.".to_string()));
            }
            let author = self.inner.ctx.session.user_id();
            self.inner
                .ctx
                .remote
                .insert(EVENTS, encode_row(&draft.to_changes(author))?)
                .await?;
            tracing::info!("Calendar event added on {}", draft.date);
            Ok(())
        }
        .await;

        self.refresh().await;
        report(
            &*self.inner.ctx.toaster,
            outcome,
            "Evento criado",
            "Erro ao criar evento",
        )
    }

    pub async fn update(&self, id: Uuid, changes: EventUpdate) -> Result<()> {
        let outcome: Result<()> = async {
            let updated = self
                .inner
                .ctx
                .remote
                .update(EVENTS, encode_row(&changes.to_changes())?, &[by_id(id)])
                .await?;
            if updated == 0 {
                return Err(AppError::NotFound("Evento".to_string()));
            }
            Ok(())
        }
        .await;

        self.refresh().await;
        report(
            &*self.inner.ctx.toaster,
            outcome,
            "Evento atualizado",
            "Erro ao atualizar evento",
        )
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let outcome = self
            .inner
            .ctx
            .remote
            .delete(EVENTS, &[by_id(id)])
            .await
            .map(|_| ());

        self.refresh().await;
        report(
            &*self.inner.ctx.toaster,
            outcome,
            "Evento removido",
            "Erro ao remover evento",
        )
    }
}

fn by_id(id: Uuid) -> Filter {
    Filter::Eq("id".to_string(), json!(id.to_string()))
}
