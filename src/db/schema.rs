use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PROFILES: &str = "profiles";
pub const ANNOUNCEMENTS: &str = "comunicados";
pub const POLL_OPTIONS: &str = "enquete_opcoes";
pub const POLL_VOTES: &str = "enquete_votos";
pub const EVENTS: &str = "eventos";
pub const RESERVATIONS: &str = "reservas";
pub const ROOMS: &str = "salas";
pub const MEETING_TYPES: &str = "tipos_reuniao";
pub const AUDIT_LOGS: &str = "audit_logs";

// ============================================================================
// Profile
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: Uuid,
    pub nome_completo: Option<String>,
    pub avatar_url: Option<String>,
    pub email: Option<String>,
    pub setor: Option<String>,
    pub cargo: Option<String>,
    pub telefone: Option<String>,
    pub unidade: Option<String>,
    pub data_nascimento: Option<NaiveDate>,
}

/// Partial profile update; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome_completo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cargo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unidade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_nascimento: Option<NaiveDate>,
}

// ============================================================================
// Announcements & polls
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncementRow {
    pub id: Uuid,
    pub titulo: String,
    pub resumo: Option<String>,
    pub conteudo: Option<String>,
    pub fixado: Option<bool>,
    pub publicado_em: Option<DateTime<Utc>>,
    pub ativo: Option<bool>,
    pub tipo_template: Option<String>,
    pub imagem_url: Option<String>,
    pub tipo_enquete: Option<String>,
    pub modo_popup: Option<String>,
    pub visualizacoes: Option<i64>,
    pub comentarios: Option<i64>,
    pub autor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnnouncementChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub titulo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conteudo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixado: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publicado_em: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ativo: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imagem_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo_enquete: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modo_popup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualizacoes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollOptionRow {
    pub id: Uuid,
    pub comunicado_id: Uuid,
    pub texto: String,
    pub ordem: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollVoteRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub comunicado_id: Uuid,
    pub opcao_id: Uuid,
    pub user_id: Uuid,
}

// ============================================================================
// Calendar events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRow {
    pub id: Uuid,
    pub titulo: String,
    pub descricao: Option<String>,
    pub data: NaiveDate,
    pub tipo: Option<String>,
    pub criado_por: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EventChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub titulo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descricao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criado_por: Option<Uuid>,
}

// ============================================================================
// Room reservations
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRow {
    pub id: Uuid,
    pub sala_id: Uuid,
    pub user_id: Uuid,
    pub data: NaiveDate,
    pub hora_inicio: String,
    pub hora_fim: String,
    pub tipo_reuniao_id: Option<Uuid>,
    pub observacoes: Option<String>,
    pub participantes: Option<i32>,
}

/// Shared shape of `salas` and `tipos_reuniao`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedRow {
    pub id: Uuid,
    pub nome: String,
}

// ============================================================================
// Audit logs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target_user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAuditLogRow {
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}
