use crate::db::query::{validate_filters, validate_identifier, Direction, Filter, Query, Row};
use crate::db::realtime::{ChangeEvent, ChangeFeed, ChangeKind};
use crate::db::store::RemoteStore;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct MemoryRemoteStore {
    tables: Arc<Mutex<HashMap<String, Vec<Row>>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    selects: Arc<AtomicUsize>,
    feed: Option<ChangeFeed>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish every write to `feed`, like the database trigger does
    pub fn with_feed(mut self, feed: ChangeFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Seed a row without publishing a change
    pub fn seed(&self, table: &str, row: Value) {
        if let Value::Object(row) = row {
            self.tables
                .lock()
                .entry(table.to_string())
                .or_default()
                .push(row);
        }
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.lock().get(table).cloned().unwrap_or_default()
    }

    /// Make every operation on `table` fail until cleared
    pub fn fail_table(&self, table: &str, failing: bool) {
        let mut tables = self.failing.lock();
        if failing {
            tables.insert(table.to_string());
        } else {
            tables.remove(table);
        }
    }

    pub fn select_count(&self) -> usize {
        self.selects.load(AtomicOrdering::SeqCst)
    }

    fn check(&self, table: &str) -> Result<()> {
        validate_identifier(table)?;
        if self.failing.lock().contains(table) {
            return Err(AppError::Internal(format!("{} is unavailable", table)));
        }
        Ok(())
    }

    fn publish(&self, table: &str, kind: ChangeKind, record: Value, old_record: Value) {
        if let Some(feed) = &self.feed {
            feed.publish(ChangeEvent {
                table: table.to_string(),
                kind,
                record,
                old_record,
            });
        }
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn is_null(row: &Row, column: &str) -> bool {
    matches!(row.get(column), None | Some(Value::Null))
}

fn matches(row: &Row, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(column, Value::Null) => is_null(row, column),
        Filter::Neq(column, Value::Null) => !is_null(row, column),
        Filter::Eq(column, value) => row.get(column) == Some(value),
        Filter::Neq(column, value) => row.get(column) != Some(value),
        Filter::Gte(column, value) => {
            !is_null(row, column) && compare(row.get(column), Some(value)) != Ordering::Less
        }
        Filter::Lte(column, value) => {
            !is_null(row, column) && compare(row.get(column), Some(value)) != Ordering::Greater
        }
        Filter::In(column, values) => row.get(column).map(|v| values.contains(v)).unwrap_or(false),
        Filter::IsNull(column) => is_null(row, column),
        Filter::NotNull(column) => !is_null(row, column),
        Filter::AnyEq(pairs) => pairs.iter().any(|(column, value)| row.get(column) == Some(value)),
    }
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|f| matches(row, f))
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn select(&self, query: &Query) -> Result<Vec<Row>> {
        query.validate()?;
        self.check(&query.table)?;
        self.selects.fetch_add(1, AtomicOrdering::SeqCst);

        let mut rows: Vec<Row> = self
            .rows(&query.table)
            .into_iter()
            .filter(|row| matches_all(row, &query.filters))
            .collect();

        rows.sort_by(|a, b| {
            for order in &query.order {
                let ordering = compare(a.get(&order.column), b.get(&order.column));
                let ordering = match order.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row> {
        self.check(table)?;
        row.entry("id")
            .or_insert_with(|| json!(Uuid::new_v4().to_string()));

        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .push(row.clone());

        self.publish(table, ChangeKind::Insert, Value::Object(row.clone()), Value::Null);
        Ok(row)
    }

    async fn update(&self, table: &str, changes: Row, filters: &[Filter]) -> Result<u64> {
        self.check(table)?;
        validate_filters(filters)?;

        let mut changed = Vec::new();
        {
            let mut tables = self.tables.lock();
            if let Some(rows) = tables.get_mut(table) {
                for row in rows.iter_mut().filter(|row| matches_all(row, filters)) {
                    let old = row.clone();
                    for (column, value) in &changes {
                        row.insert(column.clone(), value.clone());
                    }
                    changed.push((Value::Object(row.clone()), Value::Object(old)));
                }
            }
        }

        let count = changed.len() as u64;
        for (record, old) in changed {
            self.publish(table, ChangeKind::Update, record, old);
        }
        Ok(count)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        self.check(table)?;
        validate_filters(filters)?;

        let removed: Vec<Row> = {
            let mut tables = self.tables.lock();
            match tables.get_mut(table) {
                Some(rows) => {
                    let (gone, kept): (Vec<Row>, Vec<Row>) = rows
                        .drain(..)
                        .partition(|row| matches_all(row, filters));
                    *rows = kept;
                    gone
                }
                None => Vec::new(),
            }
        };

        let count = removed.len() as u64;
        for old in removed {
            self.publish(table, ChangeKind::Delete, Value::Null, Value::Object(old));
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_select_filters_orders_and_limits() {
        let store = MemoryRemoteStore::new();
        store.seed("reservas", json!({"id": "a", "user_id": "u1", "data": "2024-05-02", "hora_inicio": "09:00"}));
        store.seed("reservas", json!({"id": "b", "user_id": "u1", "data": "2024-05-01", "hora_inicio": "14:00"}));
        store.seed("reservas", json!({"id": "c", "user_id": "u1", "data": "2024-05-01", "hora_inicio": "08:00"}));
        store.seed("reservas", json!({"id": "d", "user_id": "u2", "data": "2024-05-03", "hora_inicio": "08:00"}));

        let rows = store
            .select(
                &Query::from("reservas")
                    .eq("user_id", "u1")
                    .gte("data", "2024-05-01")
                    .order("data", Direction::Asc)
                    .order("hora_inicio", Direction::Asc)
                    .limit(2),
            )
            .await
            .unwrap();

        let ids: Vec<_> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_writes_publish_changes() {
        let feed = ChangeFeed::new(8);
        let mut receiver = feed.raw_receiver();
        let store = MemoryRemoteStore::new().with_feed(feed);

        let row = store.insert("eventos", json!({"titulo": "x"}).as_object().cloned().unwrap()).await.unwrap();
        let id = row["id"].clone();
        store
            .delete("eventos", &[Filter::Eq("id".into(), id)])
            .await
            .unwrap();

        assert_eq!(receiver.recv().await.unwrap().kind, ChangeKind::Insert);
        assert_eq!(receiver.recv().await.unwrap().kind, ChangeKind::Delete);
        assert!(store.rows("eventos").is_empty());
    }

    #[tokio::test]
    async fn test_failing_table() {
        let store = MemoryRemoteStore::new();
        store.fail_table("eventos", true);
        assert!(store.select(&Query::from("eventos")).await.is_err());
        store.fail_table("eventos", false);
        assert!(store.select(&Query::from("eventos")).await.is_ok());
    }
}
