use super::{keys, Resource};
use crate::context::HubContext;
use crate::db::schema::{ProfileRow, PROFILES};
use crate::db::{decode_rows, Query};
use crate::domain::Birthday;
use crate::errors::Result;
use chrono::{Datelike, Duration, NaiveDate};
use std::sync::Arc;

struct Inner {
    ctx: HubContext,
    birthdays: Resource<Vec<Birthday>>,
}

#[derive(Clone)]
pub struct BirthdaysService {
    inner: Arc<Inner>,
}

impl BirthdaysService {
    pub fn new(ctx: &HubContext) -> Self {
        Self {
            inner: Arc::new(Inner {
                ctx: ctx.clone(),
                birthdays: Resource::default(),
            }),
        }
    }

    pub fn birthdays(&self) -> Vec<Birthday> {
        self.inner.birthdays.get()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.ctx.loading.is_loading_key(keys::BIRTHDAYS)
    }

    pub async fn mount(&self) {
        self.refresh().await;
    }

    pub fn unmount(&self) {
        self.inner.birthdays.close();
    }

    pub async fn refresh(&self) {
        let fetched = self
            .inner
            .ctx
            .loading
            .with_loading(keys::BIRTHDAYS, || self.fetch())
            .await;

        match fetched {
            Ok(list) => {
                tracing::debug!("Loaded {} birthdays", list.len());
                self.inner.birthdays.replace(list);
            }
            Err(e) => {
                tracing::error!("Failed to load birthdays: {}", e);
                self.inner.birthdays.replace(Vec::new());
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<Birthday>> {
        let rows = self
            .inner
            .ctx
            .remote
            .select(&Query::from(PROFILES).not_null("data_nascimento"))
            .await?;

        Ok(decode_rows::<ProfileRow>(PROFILES, rows)
            .into_iter()
            .filter_map(Birthday::from_profile)
            .collect())
    }

    /// People celebrating on `date`, by name
    pub fn today(&self, date: NaiveDate) -> Vec<Birthday> {
        let mut list: Vec<Birthday> = self
            .inner
            .birthdays
            .with(|all| all.iter().filter(|b| b.falls_on(date)).cloned().collect());
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Birthdays in `month` (1-12), ordered by day then name
    pub fn in_month(&self, month: u32) -> Vec<Birthday> {
        let mut list: Vec<Birthday> = self.inner.birthdays.with(|all| {
            all.iter()
                .filter(|b| b.birthday.month() == month)
                .cloned()
                .collect()
        });
        list.sort_by(|a, b| {
            a.birthday
                .day()
                .cmp(&b.birthday.day())
                .then_with(|| a.name.cmp(&b.name))
        });
        list
    }

    /// Birthdays within `days` days from `from` (inclusive), soonest first
    pub fn upcoming(&self, from: NaiveDate, days: i64) -> Vec<Birthday> {
        let until = from + Duration::days(days);
        let mut list: Vec<(NaiveDate, Birthday)> = self.inner.birthdays.with(|all| {
            all.iter()
                .filter_map(|b| {
                    b.next_occurrence(from)
                        .filter(|next| *next <= until)
                        .map(|next| (next, b.clone()))
                })
                .collect()
        });
        list.sort_by(|(a, x), (b, y)| a.cmp(b).then_with(|| x.name.cmp(&y.name)));
        list.into_iter().map(|(_, b)| b).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_context;
    use serde_json::json;
    use uuid::Uuid;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn mounted(people: &[(&str, Option<&str>)]) -> BirthdaysService {
        let (ctx, remote, _) = test_context(None);
        for (name, birth) in people {
            remote.seed(
                PROFILES,
                json!({"id": Uuid::new_v4().to_string(), "nome_completo": name, "setor": "RH", "data_nascimento": birth}),
            );
        }
        let service = ctx.birthdays();
        service.mount().await;
        service
    }

    #[tokio::test]
    async fn test_profiles_without_birth_date_are_skipped() {
        let service = mounted(&[("Ana", Some("1990-05-10")), ("Bruno", None)]).await;
        assert_eq!(service.birthdays().len(), 1);
        assert_eq!(service.today(date("2024-05-10"))[0].name, "Ana");
        assert!(service.today(date("2024-05-11")).is_empty());
    }

    #[tokio::test]
    async fn test_month_and_upcoming() {
        let service = mounted(&[
            ("Carla", Some("1985-12-30")),
            ("Davi", Some("1992-12-02")),
            ("Eva", Some("1999-01-03")),
        ])
        .await;

        let december: Vec<String> = service.in_month(12).into_iter().map(|b| b.name).collect();
        assert_eq!(december, vec!["Davi", "Carla"]);

        let soon: Vec<String> = service
            .upcoming(date("2024-12-28"), 7)
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(soon, vec!["Carla", "Eva"]);
    }
}
