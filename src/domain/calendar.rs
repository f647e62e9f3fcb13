use crate::db::schema::{EventChanges, EventRow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub event_type: Option<String>,
    pub created_by: Option<Uuid>,
}

impl From<EventRow> for CalendarEvent {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            title: row.titulo,
            description: row.descricao,
            date: row.data,
            event_type: row.tipo,
            created_by: row.criado_por,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub event_type: Option<String>,
}

impl EventDraft {
    pub fn new(title: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            description: None,
            date,
            event_type: None,
        }
    }

    pub fn to_changes(&self, created_by: Option<Uuid>) -> EventChanges {
        EventChanges {
            titulo: Some(self.title.clone()),
            descricao: self.description.clone(),
            data: Some(self.date),
            tipo: self.event_type.clone(),
            criado_por: created_by,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub event_type: Option<String>,
}

impl EventUpdate {
    pub fn to_changes(&self) -> EventChanges {
        EventChanges {
            titulo: self.title.clone(),
            descricao: self.description.clone(),
            data: self.date,
            tipo: self.event_type.clone(),
            criado_por: None,
        }
    }
}
