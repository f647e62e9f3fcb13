use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ToolStatus {
    #[serde(rename = "PRODUCAO")]
    Production,
    #[serde(rename = "PILOTO")]
    Pilot,
    #[serde(rename = "CONSTRUCAO")]
    UnderConstruction,
}

impl ToolStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ToolStatus::Production => "PRODUCAO",
            ToolStatus::Pilot => "PILOTO",
            ToolStatus::UnderConstruction => "CONSTRUCAO",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    pub icon: Option<String>,
    pub area: String,
    pub status: ToolStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    pub owner: Option<String>,
    #[serde(default)]
    pub embeddable: bool,
    #[serde(default = "default_active")]
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

/// Fields supplied when registering a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDraft {
    pub name: String,
    pub description: String,
    pub url: String,
    pub icon: Option<String>,
    pub area: String,
    pub status: ToolStatus,
    pub tags: Vec<String>,
    pub owner: Option<String>,
    pub embeddable: bool,
}

impl ToolDraft {
    pub fn new(name: impl Into<String>, url: impl Into<String>, area: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            url: url.into(),
            icon: None,
            area: area.into(),
            status: ToolStatus::Production,
            tags: Vec::new(),
            owner: None,
            embeddable: false,
        }
    }

    pub fn status(mut self, status: ToolStatus) -> Self {
        self.status = status;
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn into_tool(self, now: DateTime<Utc>) -> Tool {
        Tool {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            description: self.description,
            url: self.url,
            icon: self.icon,
            area: self.area,
            status: self.status,
            tags: self.tags,
            owner: self.owner,
            embeddable: self.embeddable,
            active: true,
            updated_at: now,
        }
    }
}

/// Partial tool update; `None` leaves a field as is
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub icon: Option<String>,
    pub area: Option<String>,
    pub status: Option<ToolStatus>,
    pub tags: Option<Vec<String>>,
    pub owner: Option<String>,
    pub embeddable: Option<bool>,
    pub active: Option<bool>,
}

impl ToolUpdate {
    pub fn apply(self, tool: &mut Tool, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            tool.name = name;
        }
        if let Some(description) = self.description {
            tool.description = description;
        }
        if let Some(url) = self.url {
            tool.url = url;
        }
        if self.icon.is_some() {
            tool.icon = self.icon;
        }
        if let Some(area) = self.area {
            tool.area = area;
        }
        if let Some(status) = self.status {
            tool.status = status;
        }
        if let Some(tags) = self.tags {
            tool.tags = tags;
        }
        if self.owner.is_some() {
            tool.owner = self.owner;
        }
        if let Some(embeddable) = self.embeddable {
            tool.embeddable = embeddable;
        }
        if let Some(active) = self.active {
            tool.active = active;
        }
        tool.updated_at = now;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub tool_id: String,
    pub favorited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecentAccess {
    pub tool_id: String,
    pub last_access: DateTime<Utc>,
    pub count: u32,
}
