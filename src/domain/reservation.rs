use crate::db::schema::{NamedRow, ReservationRow};
use crate::notifications::scheduler::parse_time_of_day;
use crate::notifications::Meeting;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserReservation {
    pub id: Uuid,
    pub room_id: Uuid,
    pub room_name: Option<String>,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub meeting_type: Option<String>,
    pub notes: Option<String>,
    pub participants: Option<i32>,
}

impl UserReservation {
    /// Map a row, resolving room and meeting-type names from batch lookups
    pub fn from_row(
        row: ReservationRow,
        rooms: &HashMap<Uuid, String>,
        meeting_types: &HashMap<Uuid, String>,
    ) -> Self {
        Self {
            id: row.id,
            room_id: row.sala_id,
            room_name: rooms.get(&row.sala_id).cloned(),
            date: row.data,
            start_time: row.hora_inicio,
            end_time: row.hora_fim,
            meeting_type: row
                .tipo_reuniao_id
                .and_then(|id| meeting_types.get(&id).cloned()),
            notes: row.observacoes,
            participants: row.participantes,
        }
    }

    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        parse_time_of_day(&self.start_time).map(|t| self.date.and_time(t))
    }

    pub fn ends_at(&self) -> Option<NaiveDateTime> {
        parse_time_of_day(&self.end_time).map(|t| self.date.and_time(t))
    }

    pub fn room_label(&self) -> String {
        self.room_name
            .clone()
            .unwrap_or_else(|| "Sala não identificada".to_string())
    }

    pub fn to_meeting(&self) -> Meeting {
        Meeting {
            id: self.id.to_string(),
            room: self.room_label(),
            date: self.date,
            start_time: self.start_time.clone(),
        }
    }

    /// Display entry, or None when the stored times are unparsable
    pub fn to_calendar_entry(&self) -> Option<CalendarEntry> {
        let start = self.starts_at()?;
        let end = self.ends_at()?;
        let title = match &self.meeting_type {
            Some(kind) => format!("{} - {}", kind, self.room_label()),
            None => self.room_label(),
        };

        Some(CalendarEntry {
            id: self.id,
            title,
            start,
            end,
            room_name: self.room_label(),
            notes: self.notes.clone(),
        })
    }
}

/// Display-ready calendar entry for a reservation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEntry {
    pub id: Uuid,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub room_name: String,
    pub notes: Option<String>,
}

/// id -> nome map of `salas` or `tipos_reuniao` rows
pub fn name_index(rows: Vec<NamedRow>) -> HashMap<Uuid, String> {
    rows.into_iter().map(|row| (row.id, row.nome)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_resolves_names() {
        let room = Uuid::new_v4();
        let kind = Uuid::new_v4();
        let row = ReservationRow {
            id: Uuid::new_v4(),
            sala_id: room,
            user_id: Uuid::new_v4(),
            data: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            hora_inicio: "09:00:00".to_string(),
            hora_fim: "10:30".to_string(),
            tipo_reuniao_id: Some(kind),
            observacoes: None,
            participantes: Some(3),
        };

        let rooms = HashMap::from([(room, "Sala Azul".to_string())]);
        let kinds = HashMap::from([(kind, "Reunião de equipe".to_string())]);
        let reservation = UserReservation::from_row(row, &rooms, &kinds);

        assert_eq!(reservation.room_name.as_deref(), Some("Sala Azul"));
        assert_eq!(reservation.meeting_type.as_deref(), Some("Reunião de equipe"));

        let entry = reservation.to_calendar_entry().unwrap();
        assert_eq!(entry.title, "Reunião de equipe - Sala Azul");
        assert_eq!(entry.end.time().format("%H:%M").to_string(), "10:30");
    }

    #[test]
    fn test_unknown_room_gets_placeholder_label() {
        let row = ReservationRow {
            id: Uuid::new_v4(),
            sala_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            data: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            hora_inicio: "14:00".to_string(),
            hora_fim: "15:00".to_string(),
            tipo_reuniao_id: None,
            observacoes: None,
            participantes: None,
        };
        let reservation = UserReservation::from_row(row, &HashMap::new(), &HashMap::new());
        assert_eq!(reservation.room_name, None);
        assert_eq!(reservation.to_meeting().room, "Sala não identificada");
    }
}
