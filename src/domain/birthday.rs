use crate::db::schema::ProfileRow;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Birthday {
    pub user_id: Uuid,
    pub name: String,
    pub avatar_url: Option<String>,
    pub department: Option<String>,
    pub birthday: NaiveDate,
}

impl Birthday {
    /// Profiles without a birth date have no birthday entry
    pub fn from_profile(row: ProfileRow) -> Option<Self> {
        let birthday = row.data_nascimento?;
        Some(Self {
            user_id: row.id,
            name: row
                .nome_completo
                .filter(|n| !n.trim().is_empty())
                .or(row.email)
                .unwrap_or_default(),
            avatar_url: row.avatar_url,
            department: row.setor,
            birthday,
        })
    }

    /// The anniversary in `year`; Feb 29 falls on Feb 28 in common years
    pub fn in_year(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.birthday.month(), self.birthday.day())
            .or_else(|| NaiveDate::from_ymd_opt(year, 2, 28))
    }

    pub fn falls_on(&self, date: NaiveDate) -> bool {
        self.in_year(date.year()) == Some(date)
    }

    /// First anniversary on or after `from`
    pub fn next_occurrence(&self, from: NaiveDate) -> Option<NaiveDate> {
        match self.in_year(from.year()) {
            Some(date) if date >= from => Some(date),
            _ => self.in_year(from.year() + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn birthday(date: &str) -> Birthday {
        Birthday {
            user_id: Uuid::new_v4(),
            name: "Ana".to_string(),
            avatar_url: None,
            department: None,
            birthday: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        }
    }

    #[test]
    fn test_leap_day_in_common_year() {
        let b = birthday("1992-02-29");
        assert!(b.falls_on(NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()));
        assert!(b.falls_on(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
    }

    #[test]
    fn test_next_occurrence_wraps_year() {
        let b = birthday("1990-01-05");
        let from = NaiveDate::from_ymd_opt(2024, 12, 20).unwrap();
        assert_eq!(
            b.next_occurrence(from),
            NaiveDate::from_ymd_opt(2025, 1, 5)
        );
    }

    #[test]
    fn test_profile_without_name_uses_email() {
        let row = ProfileRow {
            id: Uuid::new_v4(),
            nome_completo: Some("  ".to_string()),
            avatar_url: None,
            email: Some("bruno@empresa.com.br".to_string()),
            setor: None,
            cargo: None,
            telefone: None,
            unidade: None,
            data_nascimento: NaiveDate::from_ymd_opt(1988, 3, 1),
        };
        assert_eq!(Birthday::from_profile(row).unwrap().name, "bruno@empresa.com.br");
    }
}
