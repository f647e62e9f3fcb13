use crate::db::schema::{AuditLogRow, NewAuditLogRow, ProfileRow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Action recorded in an audit log entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Login,
    Logout,
    RoleChange,
    PermissionChange,
    Export,
    /// Tag not known to this client; kept verbatim
    Unknown(String),
}

impl AuditAction {
    pub fn as_str(&self) -> &str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Login => "login",
            AuditAction::Logout => "logout",
            AuditAction::RoleChange => "role_change",
            AuditAction::PermissionChange => "permission_change",
            AuditAction::Export => "export",
            AuditAction::Unknown(tag) => tag,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            AuditAction::Create => "Criação",
            AuditAction::Update => "Alteração",
            AuditAction::Delete => "Exclusão",
            AuditAction::Login => "Login",
            AuditAction::Logout => "Logout",
            AuditAction::RoleChange => "Alteração de papel",
            AuditAction::PermissionChange => "Alteração de permissão",
            AuditAction::Export => "Exportação",
            AuditAction::Unknown(_) => "Outra ação",
        }
    }
}

impl From<&str> for AuditAction {
    fn from(tag: &str) -> Self {
        match tag {
            "create" => AuditAction::Create,
            "update" => AuditAction::Update,
            "delete" => AuditAction::Delete,
            "login" => AuditAction::Login,
            "logout" => AuditAction::Logout,
            "role_change" => AuditAction::RoleChange,
            "permission_change" => AuditAction::PermissionChange,
            "export" => AuditAction::Export,
            other => AuditAction::Unknown(other.to_string()),
        }
    }
}

/// Kind of entity an audit entry refers to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityType {
    User,
    Profile,
    Role,
    Tool,
    Announcement,
    Event,
    Reservation,
    Settings,
    Unknown(String),
}

impl EntityType {
    pub fn as_str(&self) -> &str {
        match self {
            EntityType::User => "user",
            EntityType::Profile => "profile",
            EntityType::Role => "role",
            EntityType::Tool => "tool",
            EntityType::Announcement => "announcement",
            EntityType::Event => "event",
            EntityType::Reservation => "reservation",
            EntityType::Settings => "settings",
            EntityType::Unknown(tag) => tag,
        }
    }
}

impl From<&str> for EntityType {
    fn from(tag: &str) -> Self {
        match tag {
            "user" => EntityType::User,
            "profile" => EntityType::Profile,
            "role" => EntityType::Role,
            "tool" => EntityType::Tool,
            "announcement" => EntityType::Announcement,
            "event" => EntityType::Event,
            "reservation" => EntityType::Reservation,
            "settings" => EntityType::Settings,
            other => EntityType::Unknown(other.to_string()),
        }
    }
}

macro_rules! tag_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let tag = String::deserialize(deserializer)?;
                Ok(<$ty>::from(tag.as_str()))
            }
        }
    };
}

tag_serde!(AuditAction);
tag_serde!(EntityType);

/// Audit log entry enriched with actor and target names
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub target_user_id: Option<Uuid>,
    pub target_user_name: Option<String>,
    pub target_user_email: Option<String>,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: Option<String>,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    /// Map a row; ids absent from `profiles` leave the name/email fields empty
    pub fn from_row(row: AuditLogRow, profiles: &HashMap<Uuid, ProfileRow>) -> Self {
        let actor = profiles.get(&row.user_id);
        let target = row.target_user_id.and_then(|id| profiles.get(&id));

        Self {
            id: row.id,
            user_id: row.user_id,
            user_name: actor.and_then(|p| p.nome_completo.clone()),
            user_email: actor.and_then(|p| p.email.clone()),
            target_user_id: row.target_user_id,
            target_user_name: target.and_then(|p| p.nome_completo.clone()),
            target_user_email: target.and_then(|p| p.email.clone()),
            action: AuditAction::from(row.action.as_str()),
            entity_type: EntityType::from(row.entity_type.as_str()),
            entity_id: row.entity_id,
            old_value: row.old_value,
            new_value: row.new_value,
            user_agent: row.user_agent,
            created_at: row.created_at,
        }
    }
}

/// Filters of the audit log listing
#[derive(Debug, Clone, PartialEq)]
pub struct AuditLogFilters {
    pub entity_type: Option<EntityType>,
    pub action: Option<AuditAction>,
    /// Matches entries where the user is the actor or the target
    pub user_id: Option<Uuid>,
    pub limit: usize,
}

impl Default for AuditLogFilters {
    fn default() -> Self {
        Self {
            entity_type: None,
            action: None,
            user_id: None,
            limit: 100,
        }
    }
}

/// Entry to record; the actor is the signed-in user
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: Option<String>,
    pub target_user_id: Option<Uuid>,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub user_agent: Option<String>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, entity_type: EntityType) -> Self {
        Self {
            action,
            entity_type,
            entity_id: None,
            target_user_id: None,
            old_value: None,
            new_value: None,
            user_agent: None,
        }
    }

    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_target(mut self, target_user_id: Uuid) -> Self {
        self.target_user_id = Some(target_user_id);
        self
    }

    pub fn with_values(
        mut self,
        old_value: Option<serde_json::Value>,
        new_value: Option<serde_json::Value>,
    ) -> Self {
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }

    pub fn into_row(self, actor: Uuid) -> NewAuditLogRow {
        NewAuditLogRow {
            user_id: actor,
            target_user_id: self.target_user_id,
            action: self.action.as_str().to_string(),
            entity_type: self.entity_type.as_str().to_string(),
            entity_id: self.entity_id,
            old_value: self.old_value,
            new_value: self.new_value,
            user_agent: self.user_agent,
            created_at: Utc::now(),
        }
    }
}
