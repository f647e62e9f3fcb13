use super::{keys, report, Resource};
use crate::context::HubContext;
use crate::db::schema::{NamedRow, ReservationRow, MEETING_TYPES, RESERVATIONS, ROOMS};
use crate::db::{decode_rows, Direction, Filter, Query};
use crate::domain::reservation::name_index;
use crate::domain::{CalendarEntry, UserReservation};
use crate::errors::{AppError, Result};
use crate::notifications::Meeting;
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use uuid::Uuid;

/// How far ahead a reservation counts as an upcoming meeting
pub const UPCOMING_WINDOW_HOURS: i64 = 24;

struct Inner {
    ctx: HubContext,
    reservations: Resource<Vec<UserReservation>>,
}

#[derive(Clone)]
pub struct ReservationsService {
    inner: Arc<Inner>,
}

impl ReservationsService {
    pub fn new(ctx: &HubContext) -> Self {
        Self {
            inner: Arc::new(Inner {
                ctx: ctx.clone(),
                reservations: Resource::default(),
            }),
        }
    }

    pub fn reservations(&self) -> Vec<UserReservation> {
        self.inner.reservations.get()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.ctx.loading.is_loading_key(keys::RESERVATIONS)
    }

    pub async fn mount(&self) {
        self.refresh().await;
    }

    pub fn unmount(&self) {
        self.inner.reservations.close();
    }

    pub async fn refresh(&self) {
        self.refresh_from(Local::now().date_naive()).await;
    }

    /// Re-read reservations dated `today` or later. No user, no query.
    pub async fn refresh_from(&self, today: NaiveDate) {
        let Some(user) = self.inner.ctx.session.user_id() else {
            self.inner.reservations.replace(Vec::new());
            return;
        };

        let fetched = self
            .inner
            .ctx
            .loading
            .with_loading(keys::RESERVATIONS, || self.fetch(user, today))
            .await;

        match fetched {
            Ok(list) => {
                tracing::debug!("Loaded {} reservations for {}", list.len(), user);
                self.inner.reservations.replace(list);
            }
            Err(e) => {
                tracing::error!("Failed to load reservations: {}", e);
                self.inner.reservations.replace(Vec::new());
            }
        }
    }

    async fn fetch(&self, user: Uuid, today: NaiveDate) -> Result<Vec<UserReservation>> {
        let remote = &self.inner.ctx.remote;
        let rows = remote
            .select(
                &Query::from(RESERVATIONS)
                    .eq("user_id", user.to_string())
                    .gte("data", today.format("%Y-%m-%d").to_string())
                    .order("data", Direction::Asc)
                    .order("hora_inicio", Direction::Asc),
            )
            .await?;
        let rows: Vec<ReservationRow> = decode_rows(RESERVATIONS, rows);
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let room_ids: BTreeSet<String> = rows.iter().map(|r| r.sala_id.to_string()).collect();
        let type_ids: BTreeSet<String> = rows
            .iter()
            .filter_map(|r| r.tipo_reuniao_id.map(|id| id.to_string()))
            .collect();

        let rooms = name_index(decode_rows::<NamedRow>(
            ROOMS,
            remote
                .select(&Query::from(ROOMS).is_in("id", room_ids))
                .await?,
        ));
        let meeting_types = if type_ids.is_empty() {
            HashMap::new()
        } else {
            name_index(decode_rows::<NamedRow>(
                MEETING_TYPES,
                remote
                    .select(&Query::from(MEETING_TYPES).is_in("id", type_ids))
                    .await?,
            ))
        };

        Ok(rows
            .into_iter()
            .map(|row| UserReservation::from_row(row, &rooms, &meeting_types))
            .collect())
    }

    /// Cancel one of the user's reservations
    pub async fn cancel(&self, id: Uuid) -> Result<()> {
        let outcome: Result<()> = async {
            let user = self
                .inner
                .ctx
                .session
                .user_id()
                .ok_or(AppError::Unauthorized)?;
            let removed = self
                .inner
                .ctx
                .remote
                .delete(
                    RESERVATIONS,
                    &[
                        Filter::Eq("id".to_string(), json!(id.to_string())),
                        Filter::Eq("user_id".to_string(), json!(user.to_string())),
                    ],
                )
                .await?;
            if removed == 0 {
                return Err(AppError::NotFound("Reserva".to_string()));
            }
            tracing::info!("Reservation {} cancelled", id);
            Ok(())
        }
        .await;

        self.refresh().await;
        report(
            &*self.inner.ctx.toaster,
            outcome,
            "Reserva cancelada",
            "Erro ao cancelar reserva",
        )
    }

    // ========================================================================
    // Derived views
    // ========================================================================

    pub fn calendar_events(&self) -> Vec<CalendarEntry> {
        self.inner.reservations.with(|list| {
            list.iter()
                .filter_map(UserReservation::to_calendar_entry)
                .collect()
        })
    }

    /// Reservations starting within `[now, now + 24h]`
    pub fn upcoming_meetings_at(&self, now: NaiveDateTime) -> Vec<UserReservation> {
        let until = now + Duration::hours(UPCOMING_WINDOW_HOURS);
        self.inner.reservations.with(|list| {
            list.iter()
                .filter(|r| {
                    r.starts_at()
                        .map(|start| start >= now && start <= until)
                        .unwrap_or(false)
                })
                .cloned()
                .collect()
        })
    }

    pub fn upcoming_meetings(&self) -> Vec<UserReservation> {
        self.upcoming_meetings_at(Local::now().naive_local())
    }

    /// Every loaded reservation as a notifier input
    pub fn meetings(&self) -> Vec<Meeting> {
        self.inner
            .reservations
            .with(|list| list.iter().map(UserReservation::to_meeting).collect())
    }
}
