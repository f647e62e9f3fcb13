use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Metadata the authentication provider keeps alongside the account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
    #[serde(default)]
    pub metadata: UserMetadata,
}

impl AuthUser {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            email: None,
            metadata: UserMetadata::default(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_full_name(mut self, name: impl Into<String>) -> Self {
        self.metadata.full_name = Some(name.into());
        self
    }
}

/// Shared handle to the signed-in user. Clones observe the same session.
#[derive(Clone)]
pub struct Session {
    sender: Arc<watch::Sender<Option<AuthUser>>>,
}

impl Session {
    pub fn new(user: Option<AuthUser>) -> Self {
        let (sender, _) = watch::channel(user);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn signed_out() -> Self {
        Self::new(None)
    }

    pub fn current(&self) -> Option<AuthUser> {
        self.sender.borrow().clone()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.sender.borrow().as_ref().map(|u| u.id)
    }

    pub fn sign_in(&self, user: AuthUser) {
        tracing::info!("Session signed in as {}", user.id);
        self.sender.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        tracing::info!("Session signed out");
        self.sender.send_replace(None);
    }

    /// Receiver notified on every sign-in or sign-out
    pub fn watch(&self) -> watch::Receiver<Option<AuthUser>> {
        self.sender.subscribe()
    }
}
