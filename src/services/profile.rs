use super::live::UserBinding;
use super::{keys, report, Resource};
use crate::context::HubContext;
use crate::db::schema::{ProfileRow, PROFILES};
use crate::db::{decode_rows, encode_row, Filter, Query};
use crate::domain::{ProfileCompletion, ProfileUpdate, UserProfile};
use crate::errors::{AppError, Result};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Read the `profiles` row of `user`, if any
async fn fetch_row(ctx: &HubContext, user: Uuid) -> Result<Option<ProfileRow>> {
    let rows = ctx
        .remote
        .select(&Query::from(PROFILES).eq("id", user.to_string()).limit(1))
        .await?;
    Ok(decode_rows::<ProfileRow>(PROFILES, rows).into_iter().next())
}

// ============================================================================
// Profile
// ============================================================================

struct ProfileInner {
    ctx: HubContext,
    profile: Resource<Option<UserProfile>>,
    binding: Mutex<Option<UserBinding>>,
}

#[derive(Clone)]
pub struct ProfileService {
    inner: Arc<ProfileInner>,
}

impl ProfileService {
    pub fn new(ctx: &HubContext) -> Self {
        Self {
            inner: Arc::new(ProfileInner {
                ctx: ctx.clone(),
                profile: Resource::default(),
                binding: Mutex::new(None),
            }),
        }
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.inner.profile.get()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.ctx.loading.is_loading_key(keys::PROFILE)
    }

    pub fn is_live(&self) -> bool {
        self.inner
            .binding
            .lock()
            .as_ref()
            .map(UserBinding::is_subscribed)
            .unwrap_or(false)
    }

    /// Fetch the profile and follow changes to the user's row
    pub async fn mount(&self) {
        self.refresh().await;

        let weak: Weak<ProfileInner> = Arc::downgrade(&self.inner);
        let binding = UserBinding::bind(
            &self.inner.ctx.session,
            &self.inner.ctx.feed,
            PROFILES,
            "id",
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade() {
                        ProfileService { inner }.refresh().await;
                    }
                }
            },
        );
        *self.inner.binding.lock() = Some(binding);
    }

    pub fn unmount(&self) {
        self.inner.profile.close();
        self.inner.binding.lock().take();
    }

    pub async fn refresh(&self) {
        let ctx = &self.inner.ctx;
        let Some(user) = ctx.session.current() else {
            self.inner.profile.replace(None);
            return;
        };

        let fetched = ctx
            .loading
            .with_loading(keys::PROFILE, || fetch_row(ctx, user.id))
            .await;

        let profile = match fetched {
            Ok(Some(row)) => UserProfile::from(row),
            Ok(None) => UserProfile::from_auth(&user),
            Err(e) => {
                tracing::error!("Failed to load profile of {}: {}", user.id, e);
                UserProfile::from_auth(&user)
            }
        };
        self.inner.profile.replace(Some(profile));
    }

    /// Write the given fields to the user's row, creating it when missing
    pub async fn update_profile(&self, changes: ProfileUpdate) -> Result<()> {
        let outcome = self.write(&changes).await;
        self.refresh().await;
        report(
            &*self.inner.ctx.toaster,
            outcome,
            "Perfil atualizado",
            "Erro ao atualizar perfil",
        )
    }

    async fn write(&self, changes: &ProfileUpdate) -> Result<()> {
        let ctx = &self.inner.ctx;
        let user = ctx.session.current().ok_or(AppError::Unauthorized)?;
        if changes.is_empty() {
            return Ok(());
        }

        let row = encode_row(&changes.to_changes())?;
        let updated = ctx
            .remote
            .update(
                PROFILES,
                row.clone(),
                &[Filter::Eq("id".to_string(), json!(user.id.to_string()))],
            )
            .await?;

        if updated == 0 {
            let mut row = row;
            row.insert("id".to_string(), Value::String(user.id.to_string()));
            if let Some(email) = &user.email {
                row.entry("email").or_insert_with(|| json!(email));
            }
            ctx.remote.insert(PROFILES, row).await?;
            tracing::info!("Profile row created for {}", user.id);
        } else {
            tracing::info!("Profile of {} updated", user.id);
        }
        Ok(())
    }
}

// ============================================================================
// Profile completion
// ============================================================================

struct CompletionInner {
    ctx: HubContext,
    completion: Resource<Option<ProfileCompletion>>,
    binding: Mutex<Option<UserBinding>>,
}

#[derive(Clone)]
pub struct ProfileCompletionService {
    inner: Arc<CompletionInner>,
}

impl ProfileCompletionService {
    pub fn new(ctx: &HubContext) -> Self {
        Self {
            inner: Arc::new(CompletionInner {
                ctx: ctx.clone(),
                completion: Resource::default(),
                binding: Mutex::new(None),
            }),
        }
    }

    /// None until the first successful check
    pub fn completion(&self) -> Option<ProfileCompletion> {
        self.inner.completion.get()
    }

    pub fn is_complete(&self) -> bool {
        self.completion().map(|c| c.is_complete).unwrap_or(false)
    }

    pub fn is_loading(&self) -> bool {
        self.inner.ctx.loading.is_loading_key(keys::PROFILE_COMPLETION)
    }

    pub async fn mount(&self) {
        self.refresh().await;

        let weak: Weak<CompletionInner> = Arc::downgrade(&self.inner);
        let binding = UserBinding::bind(
            &self.inner.ctx.session,
            &self.inner.ctx.feed,
            PROFILES,
            "id",
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade() {
                        ProfileCompletionService { inner }.refresh().await;
                    }
                }
            },
        );
        *self.inner.binding.lock() = Some(binding);
    }

    pub fn unmount(&self) {
        self.inner.completion.close();
        self.inner.binding.lock().take();
    }

    /// No user counts as complete; a missing row misses every field
    pub async fn refresh(&self) {
        let ctx = &self.inner.ctx;
        let Some(user) = ctx.session.user_id() else {
            self.inner.completion.replace(Some(ProfileCompletion::complete()));
            return;
        };

        let fetched = ctx
            .loading
            .with_loading(keys::PROFILE_COMPLETION, || fetch_row(ctx, user))
            .await;

        match fetched {
            Ok(row) => {
                let completion = ProfileCompletion::evaluate(row.as_ref());
                if !completion.is_complete {
                    tracing::debug!(
                        "Profile of {} misses {:?}",
                        user,
                        completion.missing_fields
                    );
                }
                self.inner.completion.replace(Some(completion));
            }
            Err(e) => tracing::error!("Failed to check profile completion of {}: {}", user, e),
        }
    }
}
