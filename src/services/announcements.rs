use super::{keys, report, Resource};
use crate::context::HubContext;
use crate::db::schema::{
    AnnouncementRow, PollOptionRow, PollVoteRow, ANNOUNCEMENTS, POLL_OPTIONS, POLL_VOTES,
};
use crate::db::{decode_rows, encode_row, Direction, Filter, Query};
use crate::domain::announcement::tally_poll;
use crate::domain::{Announcement, AnnouncementDraft, AnnouncementUpdate, PollKind, PopupMode};
use crate::errors::{AppError, Result};
use crate::local::Persisted;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

struct Inner {
    ctx: HubContext,
    announcements: Resource<Vec<Announcement>>,
    dismissed: Persisted<Vec<Uuid>>,
    last_login: Persisted<Option<DateTime<Utc>>>,
}

#[derive(Clone)]
pub struct AnnouncementsService {
    inner: Arc<Inner>,
}

impl AnnouncementsService {
    pub fn new(ctx: &HubContext) -> Self {
        Self {
            inner: Arc::new(Inner {
                ctx: ctx.clone(),
                announcements: Resource::default(),
                dismissed: Persisted::new(
                    ctx.local.clone(),
                    ctx.local_key("dismissed_popups"),
                    Vec::new(),
                ),
                last_login: Persisted::new(ctx.local.clone(), ctx.local_key("last_login"), None),
            }),
        }
    }

    pub fn announcements(&self) -> Vec<Announcement> {
        self.inner.announcements.get()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.ctx.loading.is_loading_key(keys::ANNOUNCEMENTS)
    }

    pub async fn mount(&self) {
        self.refresh().await;
    }

    pub fn unmount(&self) {
        self.inner.announcements.close();
    }

    /// Re-read active announcements. On failure the previous list is kept.
    pub async fn refresh(&self) {
        let ctx = &self.inner.ctx;
        let fetched = ctx
            .loading
            .with_loading(keys::ANNOUNCEMENTS, || self.fetch())
            .await;

        match fetched {
            Ok(list) => {
                tracing::debug!("Loaded {} announcements", list.len());
                self.inner.announcements.replace(list);
            }
            Err(e) => tracing::error!("Failed to load announcements: {}", e),
        }
    }

    async fn fetch(&self) -> Result<Vec<Announcement>> {
        let remote = &self.inner.ctx.remote;
        let rows = remote
            .select(
                &Query::from(ANNOUNCEMENTS)
                    .eq("ativo", true)
                    .order("fixado", Direction::Desc)
                    .order("publicado_em", Direction::Desc),
            )
            .await?;

        let mut announcements: Vec<Announcement> = decode_rows::<AnnouncementRow>(ANNOUNCEMENTS, rows)
            .into_iter()
            .map(Announcement::from_row)
            .collect();
        announcements.sort_by(|a, b| {
            b.pinned
                .cmp(&a.pinned)
                .then_with(|| b.published_at.cmp(&a.published_at))
        });

        let poll_ids: Vec<String> = announcements
            .iter()
            .filter(|a| a.is_poll())
            .map(|a| a.id.to_string())
            .collect();
        if poll_ids.is_empty() {
            return Ok(announcements);
        }

        let options_query = Query::from(POLL_OPTIONS)
            .is_in("comunicado_id", poll_ids.clone())
            .order("ordem", Direction::Asc);
        let votes_query = Query::from(POLL_VOTES).is_in("comunicado_id", poll_ids);
        let (options, votes) =
            futures::try_join!(remote.select(&options_query), remote.select(&votes_query))?;
        let options: Vec<PollOptionRow> = decode_rows(POLL_OPTIONS, options);
        let votes: Vec<PollVoteRow> = decode_rows(POLL_VOTES, votes);

        let me = self.inner.ctx.session.user_id();
        for announcement in announcements.iter_mut().filter(|a| a.is_poll()) {
            announcement.poll_options = tally_poll(announcement.id, &options, &votes, me);
        }
        Ok(announcements)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub async fn add(&self, draft: AnnouncementDraft) -> Result<Uuid> {
        let outcome = self.insert(draft).await;
        self.refresh().await;
        report(
            &*self.inner.ctx.toaster,
            outcome,
            "Comunicado publicado",
            "Erro ao publicar comunicado",
        )
    }

    async fn insert(&self, draft: AnnouncementDraft) -> Result<Uuid> {
        if draft.title.trim().is_empty() {
            return Err(AppError::ValidationError("Informe um título.".to_string()));
        }
        if draft.poll_kind.is_some() && draft.options.len() < 2 {
            return Err(AppError::ValidationError(
                "A enquete precisa de ao menos duas opções.".to_string(),
            ));
        }

        let remote = &self.inner.ctx.remote;
        let author = self.inner.ctx.session.user_id();
        let stored = remote
            .insert(ANNOUNCEMENTS, encode_row(&draft.to_changes(author, Utc::now()))?)
            .await?;
        let id = stored_id(&stored)?;

        for (position, text) in draft.options.iter().enumerate() {
            let option = json!({
                "comunicado_id": id.to_string(),
                "texto": text,
                "ordem": position as i32 + 1,
            });
            if let Value::Object(row) = option {
                remote.insert(POLL_OPTIONS, row).await?;
            }
        }

        tracing::info!("Announcement {} published", id);
        Ok(id)
    }

    pub async fn update(&self, id: Uuid, changes: AnnouncementUpdate) -> Result<()> {
        let outcome = self.write_update(id, &changes).await;
        self.refresh().await;
        report(
            &*self.inner.ctx.toaster,
            outcome,
            "Comunicado atualizado",
            "Erro ao atualizar comunicado",
        )
    }

    async fn write_update(&self, id: Uuid, changes: &AnnouncementUpdate) -> Result<()> {
        let row = encode_row(&changes.to_changes())?;
        if row.is_empty() {
            return Ok(());
        }
        let updated = self
            .inner
            .ctx
            .remote
            .update(ANNOUNCEMENTS, row, &[by_id(id)])
            .await?;
        if updated == 0 {
            return Err(AppError::NotFound("Comunicado".to_string()));
        }
        Ok(())
    }

    /// Delete an announcement with its poll options and votes
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let outcome = self.remove(id).await;
        self.refresh().await;
        report(
            &*self.inner.ctx.toaster,
            outcome,
            "Comunicado removido",
            "Erro ao remover comunicado",
        )
    }

    async fn remove(&self, id: Uuid) -> Result<()> {
        let remote = &self.inner.ctx.remote;
        let of_poll = [Filter::Eq("comunicado_id".to_string(), json!(id.to_string()))];
        remote.delete(POLL_VOTES, &of_poll).await?;
        remote.delete(POLL_OPTIONS, &of_poll).await?;
        remote.delete(ANNOUNCEMENTS, &[by_id(id)]).await?;
        tracing::info!("Announcement {} deleted", id);
        Ok(())
    }

    /// Replace the current user's votes on a poll
    pub async fn vote(&self, announcement_id: Uuid, option_ids: &[Uuid]) -> Result<()> {
        let outcome = self.write_votes(announcement_id, option_ids).await;
        self.refresh().await;
        report(
            &*self.inner.ctx.toaster,
            outcome,
            "Voto registrado",
            "Erro ao registrar voto",
        )
    }

    async fn write_votes(&self, announcement_id: Uuid, option_ids: &[Uuid]) -> Result<()> {
        let user = self
            .inner
            .ctx
            .session
            .user_id()
            .ok_or(AppError::Unauthorized)?;

        let remote = &self.inner.ctx.remote;
        let kind = self.poll_kind(announcement_id).await?;

        let mut chosen: Vec<Uuid> = Vec::with_capacity(option_ids.len());
        for id in option_ids {
            if !chosen.contains(id) {
                chosen.push(*id);
            }
        }
        if chosen.is_empty() || (kind == PollKind::Single && chosen.len() > 1) {
            return Err(AppError::ValidationError(
                "Seleção de opções inválida.".to_string(),
            ));
        }

        let options: Vec<PollOptionRow> = decode_rows(
            POLL_OPTIONS,
            remote
                .select(&Query::from(POLL_OPTIONS).eq("comunicado_id", announcement_id.to_string()))
                .await?,
        );
        if chosen
            .iter()
            .any(|id| !options.iter().any(|option| option.id == *id))
        {
            return Err(AppError::ValidationError(
                "Opção não pertence a esta enquete.".to_string(),
            ));
        }

        remote
            .delete(
                POLL_VOTES,
                &[
                    Filter::Eq("comunicado_id".to_string(), json!(announcement_id.to_string())),
                    Filter::Eq("user_id".to_string(), json!(user.to_string())),
                ],
            )
            .await?;

        for option_id in &chosen {
            let vote = PollVoteRow {
                id: None,
                comunicado_id: announcement_id,
                opcao_id: *option_id,
                user_id: user,
            };
            remote.insert(POLL_VOTES, encode_row(&vote)?).await?;
        }

        tracing::info!(
            "User {} voted on poll {} ({} options)",
            user,
            announcement_id,
            chosen.len()
        );
        Ok(())
    }

    /// Poll kind read from the stored row, so votes work without a mounted list
    async fn poll_kind(&self, announcement_id: Uuid) -> Result<PollKind> {
        let rows = self
            .inner
            .ctx
            .remote
            .select(
                &Query::from(ANNOUNCEMENTS)
                    .eq("id", announcement_id.to_string())
                    .limit(1),
            )
            .await?;
        let announcement = decode_rows::<AnnouncementRow>(ANNOUNCEMENTS, rows)
            .into_iter()
            .next()
            .map(Announcement::from_row)
            .ok_or_else(|| AppError::NotFound("Comunicado".to_string()))?;

        announcement
            .poll_kind
            .ok_or_else(|| AppError::ValidationError("Comunicado não é uma enquete.".to_string()))
    }

    /// Increment the view counter. Silent: failures are logged and returned.
    pub async fn record_view(&self, id: Uuid) -> Result<()> {
        let outcome = self.increment_views(id).await;
        self.refresh().await;
        if let Err(e) = &outcome {
            tracing::error!("Failed to record view of announcement {}: {}", id, e);
        }
        outcome
    }

    async fn increment_views(&self, id: Uuid) -> Result<()> {
        let remote = &self.inner.ctx.remote;
        let rows = remote
            .select(&Query::from(ANNOUNCEMENTS).eq("id", id.to_string()).limit(1))
            .await?;
        let current = decode_rows::<AnnouncementRow>(ANNOUNCEMENTS, rows)
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("Comunicado".to_string()))?;

        let mut changes = Map::new();
        changes.insert(
            "visualizacoes".to_string(),
            json!(current.visualizacoes.unwrap_or(0) + 1),
        );
        remote.update(ANNOUNCEMENTS, changes, &[by_id(id)]).await?;
        Ok(())
    }

    // ========================================================================
    // Popups
    // ========================================================================

    /// Active popup announcements not yet dismissed on this machine.
    ///
    /// `imediato` popups show right away; `proximo_login` ones only once a
    /// login newer than their publication has been recorded.
    pub fn pending_popups(&self) -> Vec<Announcement> {
        let dismissed = self.inner.dismissed.get();
        let last_login = self.inner.last_login.get();

        self.inner.announcements.with(|list| {
            list.iter()
                .filter(|a| a.active && !dismissed.contains(&a.id))
                .filter(|a| match a.popup_mode {
                    Some(PopupMode::Immediate) => true,
                    Some(PopupMode::NextLogin) => match (last_login, a.published_at) {
                        (Some(login), Some(published)) => login > published,
                        (Some(_), None) => true,
                        (None, _) => false,
                    },
                    None => false,
                })
                .cloned()
                .collect()
        })
    }

    pub fn dismiss_popup(&self, id: Uuid) {
        self.inner.dismissed.update(|dismissed| {
            if !dismissed.contains(&id) {
                dismissed.push(id);
            }
        });
    }

    pub fn mark_login(&self) {
        self.mark_login_at(Utc::now());
    }

    pub fn mark_login_at(&self, at: DateTime<Utc>) {
        self.inner.last_login.set(Some(at));
    }
}

fn by_id(id: Uuid) -> Filter {
    Filter::Eq("id".to_string(), json!(id.to_string()))
}

fn stored_id(row: &Map<String, Value>) -> Result<Uuid> {
    row.get("id")
        .and_then(Value::as_str)
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(|| AppError::Internal("Inserted row has no id".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryRemoteStore;
    use crate::notifications::ToastKind;
    use crate::session::AuthUser;
    use crate::testing::{test_context, RecordingToaster};
    use chrono::Duration;

    fn seed_announcement(remote: &MemoryRemoteStore, title: &str, extra: Value) -> Uuid {
        let id = Uuid::new_v4();
        let mut row = json!({
            "id": id.to_string(),
            "titulo": title,
            "resumo": null,
            "conteudo": "Texto",
            "fixado": false,
            "publicado_em": "2024-05-01T09:00:00Z",
            "ativo": true,
            "tipo_template": "simple",
            "imagem_url": null,
            "tipo_enquete": null,
            "modo_popup": null,
            "visualizacoes": 0,
            "comentarios": 0,
            "autor_id": null
        });
        if let (Value::Object(row), Value::Object(extra)) = (&mut row, extra) {
            row.extend(extra);
        }
        remote.seed(ANNOUNCEMENTS, row);
        id
    }

    fn setup() -> (AnnouncementsService, MemoryRemoteStore, Arc<RecordingToaster>, Uuid) {
        let (ctx, remote, toaster) = test_context(None);
        let user = Uuid::new_v4();
        ctx.session.sign_in(AuthUser::new(user));
        (ctx.announcements(), remote, toaster, user)
    }

    #[tokio::test]
    async fn test_fetch_orders_pinned_then_recent() {
        let (service, remote, _, _) = setup();
        seed_announcement(&remote, "Antigo", json!({"publicado_em": "2024-01-01T00:00:00Z"}));
        seed_announcement(&remote, "Recente", json!({"publicado_em": "2024-06-01T00:00:00Z"}));
        seed_announcement(
            &remote,
            "Fixado",
            json!({"fixado": true, "publicado_em": "2023-01-01T00:00:00Z"}),
        );
        seed_announcement(&remote, "Inativo", json!({"ativo": false}));

        service.mount().await;
        let titles: Vec<String> = service.announcements().into_iter().map(|a| a.title).collect();
        assert_eq!(titles, vec!["Fixado", "Recente", "Antigo"]);
        assert!(!service.is_loading());
    }

    #[tokio::test]
    async fn test_vote_replaces_previous_vote() {
        let (service, remote, toaster, user) = setup();
        let poll = seed_announcement(
            &remote,
            "Happy hour",
            json!({"tipo_template": "poll", "tipo_enquete": "single"}),
        );
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        for (id, text, ordem) in [(a, "Quinta", 1), (b, "Sexta", 2)] {
            remote.seed(
                POLL_OPTIONS,
                json!({"id": id.to_string(), "comunicado_id": poll.to_string(), "texto": text, "ordem": ordem}),
            );
        }
        remote.seed(
            POLL_VOTES,
            json!({"id": Uuid::new_v4().to_string(), "comunicado_id": poll.to_string(), "opcao_id": b.to_string(), "user_id": Uuid::new_v4().to_string()}),
        );
        service.mount().await;

        service.vote(poll, &[a]).await.unwrap();
        service.vote(poll, &[b]).await.unwrap();

        let announcement = service.announcements().into_iter().next().unwrap();
        assert_eq!(announcement.total_votes(), 2);
        assert_eq!(announcement.poll_options[0].votes, 0);
        assert_eq!(announcement.poll_options[1].votes, 2);
        assert!(announcement.poll_options[1].voted_by_me);

        let mine: Vec<_> = remote
            .rows(POLL_VOTES)
            .into_iter()
            .filter(|v| v["user_id"] == json!(user.to_string()))
            .collect();
        assert_eq!(mine.len(), 1);
        assert_eq!(toaster.count(ToastKind::Success), 2);
    }

    #[tokio::test]
    async fn test_single_choice_poll_rejects_multiple_options() {
        let (service, remote, toaster, _) = setup();
        let poll = seed_announcement(
            &remote,
            "Enquete",
            json!({"tipo_template": "poll", "tipo_enquete": "single"}),
        );
        service.mount().await;

        let result = service.vote(poll, &[Uuid::new_v4(), Uuid::new_v4()]).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert_eq!(toaster.count(ToastKind::Error), 1);
        assert!(remote.rows(POLL_VOTES).is_empty());
    }

    fn seed_poll(remote: &MemoryRemoteStore, kind: &str) -> (Uuid, Uuid, Uuid) {
        let poll = seed_announcement(
            remote,
            "Enquete",
            json!({"tipo_template": "poll", "tipo_enquete": kind}),
        );
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        for (id, ordem) in [(a, 1), (b, 2)] {
            remote.seed(
                POLL_OPTIONS,
                json!({"id": id.to_string(), "comunicado_id": poll.to_string(), "texto": "Opção", "ordem": ordem}),
            );
        }
        (poll, a, b)
    }

    #[tokio::test]
    async fn test_vote_rejects_foreign_option_and_counts_duplicates_once() {
        let (service, remote, _, user) = setup();
        let (poll, a, _) = seed_poll(&remote, "multiple");
        let (_, elsewhere, _) = seed_poll(&remote, "multiple");
        service.mount().await;

        service.vote(poll, &[a]).await.unwrap();
        let result = service.vote(poll, &[elsewhere]).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));

        // Previous vote untouched by the rejected one
        let mine: Vec<_> = remote
            .rows(POLL_VOTES)
            .into_iter()
            .filter(|v| v["user_id"] == json!(user.to_string()))
            .collect();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0]["opcao_id"], json!(a.to_string()));

        service.vote(poll, &[a, a]).await.unwrap();
        assert_eq!(remote.rows(POLL_VOTES).len(), 1);
        let announcement = service
            .announcements()
            .into_iter()
            .find(|x| x.id == poll)
            .unwrap();
        assert_eq!(announcement.poll_options[0].votes, 1);
        assert_eq!(announcement.poll_options[1].votes, 0);
    }

    #[tokio::test]
    async fn test_vote_reads_poll_kind_without_mount() {
        let (service, remote, _, _) = setup();
        let (poll, a, b) = seed_poll(&remote, "multiple");

        service.vote(poll, &[a, b]).await.unwrap();
        assert_eq!(remote.rows(POLL_VOTES).len(), 2);

        let plain = seed_announcement(&remote, "Aviso", json!({}));
        let result = service.vote(plain, &[a]).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert_eq!(remote.rows(POLL_VOTES).len(), 2);

        let missing = service.vote(Uuid::new_v4(), &[a]).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_add_poll_creates_options_and_refetches() {
        let (service, remote, _, user) = setup();
        let id = service
            .add(AnnouncementDraft::poll(
                "Local da confraternização",
                PollKind::Multiple,
                ["Restaurante", "Escritório"],
            ))
            .await
            .unwrap();

        assert_eq!(remote.rows(POLL_OPTIONS).len(), 2);
        let announcement = service.announcements().into_iter().find(|a| a.id == id).unwrap();
        assert_eq!(announcement.author_id, Some(user));
        assert_eq!(announcement.poll_options[0].text, "Restaurante");
        assert_eq!(announcement.poll_kind, Some(PollKind::Multiple));
    }

    #[tokio::test]
    async fn test_delete_removes_poll_rows() {
        let (service, remote, _, _) = setup();
        let id = service
            .add(AnnouncementDraft::poll("Enquete", PollKind::Single, ["A", "B"]))
            .await
            .unwrap();
        service.delete(id).await.unwrap();

        assert!(service.announcements().is_empty());
        assert!(remote.rows(POLL_OPTIONS).is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_list() {
        let (service, remote, _, _) = setup();
        seed_announcement(&remote, "Bem-vindo", json!({}));
        service.mount().await;

        remote.fail_table(ANNOUNCEMENTS, true);
        service.refresh().await;
        assert_eq!(service.announcements().len(), 1);
        assert!(!service.is_loading());
    }

    #[tokio::test]
    async fn test_failed_update_toasts_and_returns_error() {
        let (service, remote, toaster, _) = setup();
        let id = seed_announcement(&remote, "Original", json!({}));
        service.mount().await;

        remote.fail_table(ANNOUNCEMENTS, true);
        let result = service
            .update(
                id,
                AnnouncementUpdate {
                    title: Some("Novo".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(result.is_err());
        assert_eq!(toaster.count(ToastKind::Error), 1);
        assert_eq!(service.announcements()[0].title, "Original");
    }

    #[tokio::test]
    async fn test_record_view_increments_counter() {
        let (service, remote, toaster, _) = setup();
        let id = seed_announcement(&remote, "Aviso", json!({"visualizacoes": 4}));
        service.mount().await;

        service.record_view(id).await.unwrap();
        assert_eq!(service.announcements()[0].view_count, 5);
        assert!(toaster.toasts().is_empty());
    }

    #[tokio::test]
    async fn test_popups_respect_mode_and_dismissal() {
        let (service, remote, _, _) = setup();
        let now = Utc::now();
        let immediate = seed_announcement(&remote, "Agora", json!({"modo_popup": "imediato"}));
        let next_login = seed_announcement(
            &remote,
            "Próximo login",
            json!({"modo_popup": "proximo_login", "publicado_em": (now - Duration::hours(1)).to_rfc3339()}),
        );
        seed_announcement(&remote, "Sem popup", json!({}));
        service.mount().await;

        let ids = |list: Vec<Announcement>| list.into_iter().map(|a| a.id).collect::<Vec<_>>();
        assert_eq!(ids(service.pending_popups()), vec![immediate]);

        service.mark_login_at(now);
        let pending = ids(service.pending_popups());
        assert!(pending.contains(&next_login));

        service.dismiss_popup(immediate);
        service.dismiss_popup(next_login);
        assert!(service.pending_popups().is_empty());
    }

    #[tokio::test]
    async fn test_unmounted_service_ignores_refresh() {
        let (service, remote, _, _) = setup();
        service.unmount();
        seed_announcement(&remote, "Tarde demais", json!({}));
        service.refresh().await;
        assert!(service.announcements().is_empty());
    }
}
