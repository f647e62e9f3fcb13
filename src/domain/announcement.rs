use crate::db::schema::{AnnouncementChanges, AnnouncementRow, PollOptionRow, PollVoteRow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ============================================================================
// Storage tags
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    #[default]
    Simple,
    Banner,
    Poll,
}

impl TemplateKind {
    pub fn as_str(&self) -> &str {
        match self {
            TemplateKind::Simple => "simple",
            TemplateKind::Banner => "banner",
            TemplateKind::Poll => "poll",
        }
    }

    /// Unknown or missing tags render as a simple announcement
    pub fn from_storage(tag: Option<&str>) -> Self {
        match tag {
            Some("banner") => TemplateKind::Banner,
            Some("poll") => TemplateKind::Poll,
            _ => TemplateKind::Simple,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PollKind {
    #[default]
    Single,
    Multiple,
}

impl PollKind {
    pub fn as_str(&self) -> &str {
        match self {
            PollKind::Single => "single",
            PollKind::Multiple => "multiple",
        }
    }

    pub fn from_storage(tag: Option<&str>) -> Self {
        match tag {
            Some("multiple") => PollKind::Multiple,
            _ => PollKind::Single,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PopupMode {
    #[serde(rename = "imediato")]
    Immediate,
    #[serde(rename = "proximo_login")]
    NextLogin,
}

impl PopupMode {
    pub fn as_str(&self) -> &str {
        match self {
            PopupMode::Immediate => "imediato",
            PopupMode::NextLogin => "proximo_login",
        }
    }

    pub fn from_storage(tag: Option<&str>) -> Option<Self> {
        match tag {
            Some("imediato") => Some(PopupMode::Immediate),
            Some("proximo_login") => Some(PopupMode::NextLogin),
            _ => None,
        }
    }
}

// ============================================================================
// View models
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub id: Uuid,
    pub text: String,
    pub votes: u32,
    pub voted_by_me: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub pinned: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub template: TemplateKind,
    pub image_url: Option<String>,
    pub poll_kind: Option<PollKind>,
    pub popup_mode: Option<PopupMode>,
    pub view_count: i64,
    pub comment_count: i64,
    pub author_id: Option<Uuid>,
    pub poll_options: Vec<PollOption>,
}

impl Announcement {
    pub fn from_row(row: AnnouncementRow) -> Self {
        let template = TemplateKind::from_storage(row.tipo_template.as_deref());
        let poll_kind = (template == TemplateKind::Poll)
            .then(|| PollKind::from_storage(row.tipo_enquete.as_deref()));

        Self {
            id: row.id,
            title: row.titulo,
            summary: row.resumo,
            content: row.conteudo,
            pinned: row.fixado.unwrap_or(false),
            published_at: row.publicado_em,
            active: row.ativo.unwrap_or(true),
            template,
            image_url: row.imagem_url,
            poll_kind,
            popup_mode: PopupMode::from_storage(row.modo_popup.as_deref()),
            view_count: row.visualizacoes.unwrap_or(0),
            comment_count: row.comentarios.unwrap_or(0),
            author_id: row.autor_id,
            poll_options: Vec::new(),
        }
    }

    pub fn is_poll(&self) -> bool {
        self.template == TemplateKind::Poll
    }

    /// Sum of the option counts
    pub fn total_votes(&self) -> u32 {
        self.poll_options.iter().map(|o| o.votes).sum()
    }

    pub fn has_voted(&self) -> bool {
        self.poll_options.iter().any(|o| o.voted_by_me)
    }
}

/// Build the options of one poll from its option and vote rows.
///
/// Options come back sorted by `ordem`; votes pointing to unknown options are
/// ignored so the counts always add up to the poll total.
pub fn tally_poll(
    announcement_id: Uuid,
    options: &[PollOptionRow],
    votes: &[PollVoteRow],
    current_user: Option<Uuid>,
) -> Vec<PollOption> {
    let mut rows: Vec<&PollOptionRow> = options
        .iter()
        .filter(|o| o.comunicado_id == announcement_id)
        .collect();
    rows.sort_by_key(|o| o.ordem.unwrap_or(i32::MAX));

    let mut counts: HashMap<Uuid, (u32, bool)> = HashMap::new();
    for vote in votes.iter().filter(|v| v.comunicado_id == announcement_id) {
        let entry = counts.entry(vote.opcao_id).or_default();
        entry.0 += 1;
        if Some(vote.user_id) == current_user {
            entry.1 = true;
        }
    }

    rows.into_iter()
        .map(|option| {
            let (votes, voted_by_me) = counts.get(&option.id).copied().unwrap_or_default();
            PollOption {
                id: option.id,
                text: option.texto.clone(),
                votes,
                voted_by_me,
            }
        })
        .collect()
}

/// Announcement to publish
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementDraft {
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub pinned: bool,
    pub template: TemplateKind,
    pub image_url: Option<String>,
    pub poll_kind: Option<PollKind>,
    pub popup_mode: Option<PopupMode>,
    /// Option texts, in display order; only used by polls
    pub options: Vec<String>,
}

impl AnnouncementDraft {
    pub fn simple(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: None,
            content: Some(content.into()),
            pinned: false,
            template: TemplateKind::Simple,
            image_url: None,
            poll_kind: None,
            popup_mode: None,
            options: Vec::new(),
        }
    }

    pub fn poll<I, S>(title: impl Into<String>, kind: PollKind, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: title.into(),
            summary: None,
            content: None,
            pinned: false,
            template: TemplateKind::Poll,
            image_url: None,
            poll_kind: Some(kind),
            popup_mode: None,
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    pub fn popup(mut self, mode: PopupMode) -> Self {
        self.popup_mode = Some(mode);
        self
    }

    pub fn to_changes(&self, author: Option<Uuid>, now: DateTime<Utc>) -> AnnouncementChanges {
        AnnouncementChanges {
            titulo: Some(self.title.clone()),
            resumo: self.summary.clone(),
            conteudo: self.content.clone(),
            fixado: Some(self.pinned),
            publicado_em: Some(now),
            ativo: Some(true),
            tipo_template: Some(self.template.as_str().to_string()),
            imagem_url: self.image_url.clone(),
            tipo_enquete: self.poll_kind.map(|k| k.as_str().to_string()),
            modo_popup: self.popup_mode.map(|m| m.as_str().to_string()),
            visualizacoes: Some(0),
            autor_id: author,
        }
    }
}

/// Partial announcement update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementUpdate {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub pinned: Option<bool>,
    pub active: Option<bool>,
    pub image_url: Option<String>,
    pub popup_mode: Option<PopupMode>,
}

impl AnnouncementUpdate {
    pub fn to_changes(&self) -> AnnouncementChanges {
        AnnouncementChanges {
            titulo: self.title.clone(),
            resumo: self.summary.clone(),
            conteudo: self.content.clone(),
            fixado: self.pinned,
            ativo: self.active,
            imagem_url: self.image_url.clone(),
            modo_popup: self.popup_mode.map(|m| m.as_str().to_string()),
            ..Default::default()
        }
    }
}
