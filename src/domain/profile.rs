use crate::db::schema::{ProfileChanges, ProfileRow};
use crate::session::AuthUser;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub phone: Option<String>,
    pub unit: Option<String>,
    pub birthday: Option<NaiveDate>,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            full_name: row.nome_completo,
            avatar_url: row.avatar_url,
            email: row.email,
            department: row.setor,
            position: row.cargo,
            phone: row.telefone,
            unit: row.unidade,
            birthday: row.data_nascimento,
        }
    }
}

impl UserProfile {
    /// Profile built from authentication metadata when no row exists
    pub fn from_auth(user: &AuthUser) -> Self {
        Self {
            id: user.id,
            full_name: user.metadata.full_name.clone(),
            avatar_url: user.metadata.avatar_url.clone(),
            email: user.email.clone(),
            department: None,
            position: None,
            phone: None,
            unit: None,
            birthday: None,
        }
    }

    /// Name to greet the user with
    pub fn display_name(&self) -> String {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.email.as_deref())
            .unwrap_or("Usuário")
            .to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub phone: Option<String>,
    pub unit: Option<String>,
    pub birthday: Option<NaiveDate>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.avatar_url.is_none()
            && self.department.is_none()
            && self.position.is_none()
            && self.phone.is_none()
            && self.unit.is_none()
            && self.birthday.is_none()
    }

    pub fn to_changes(&self) -> ProfileChanges {
        ProfileChanges {
            nome_completo: self.full_name.clone(),
            avatar_url: self.avatar_url.clone(),
            setor: self.department.clone(),
            cargo: self.position.clone(),
            telefone: self.phone.clone(),
            unidade: self.unit.clone(),
            data_nascimento: self.birthday,
        }
    }
}

// ============================================================================
// Completion
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    FullName,
    Phone,
}

impl RequiredField {
    pub const ALL: [RequiredField; 2] = [RequiredField::FullName, RequiredField::Phone];

    pub fn label(&self) -> &str {
        match self {
            RequiredField::FullName => "Nome completo",
            RequiredField::Phone => "Telefone",
        }
    }

    fn value<'a>(&self, row: &'a ProfileRow) -> Option<&'a str> {
        match self {
            RequiredField::FullName => row.nome_completo.as_deref(),
            RequiredField::Phone => row.telefone.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileCompletion {
    pub is_complete: bool,
    pub missing_fields: Vec<RequiredField>,
}

impl ProfileCompletion {
    pub fn complete() -> Self {
        Self {
            is_complete: true,
            missing_fields: Vec::new(),
        }
    }

    /// Blank or whitespace-only values count as missing; no row means
    /// every required field is missing.
    pub fn evaluate(row: Option<&ProfileRow>) -> Self {
        let missing_fields: Vec<RequiredField> = RequiredField::ALL
            .into_iter()
            .filter(|field| {
                row.and_then(|r| field.value(r))
                    .map(|v| v.trim().is_empty())
                    .unwrap_or(true)
            })
            .collect();

        Self {
            is_complete: missing_fields.is_empty(),
            missing_fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: Option<&str>, phone: Option<&str>) -> ProfileRow {
        ProfileRow {
            id: Uuid::new_v4(),
            nome_completo: name.map(String::from),
            avatar_url: None,
            email: None,
            setor: None,
            cargo: None,
            telefone: phone.map(String::from),
            unidade: None,
            data_nascimento: None,
        }
    }

    #[test]
    fn test_blank_phone_is_missing() {
        let completion = ProfileCompletion::evaluate(Some(&row(Some("Ana Souza"), Some("   "))));
        assert!(!completion.is_complete);
        assert_eq!(completion.missing_fields, vec![RequiredField::Phone]);
    }

    #[test]
    fn test_filled_profile_is_complete() {
        let completion =
            ProfileCompletion::evaluate(Some(&row(Some("Ana Souza"), Some("11 99999-0000"))));
        assert_eq!(completion, ProfileCompletion::complete());
    }

    #[test]
    fn test_missing_row_misses_everything() {
        let completion = ProfileCompletion::evaluate(None);
        assert_eq!(completion.missing_fields, RequiredField::ALL.to_vec());
    }

    #[test]
    fn test_auth_fallback() {
        let user = AuthUser::new(Uuid::new_v4())
            .with_email("ana@empresa.com.br")
            .with_full_name("Ana Souza");
        let profile = UserProfile::from_auth(&user);
        assert_eq!(profile.display_name(), "Ana Souza");
        assert_eq!(profile.phone, None);
    }
}
