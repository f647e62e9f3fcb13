use crate::db::query::{Filter, Query, Row};
use crate::errors::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Query surface of the hosted tables
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read rows matching `query`
    async fn select(&self, query: &Query) -> Result<Vec<Row>>;

    /// Insert one row and return it as stored (defaults filled in)
    async fn insert(&self, table: &str, row: Row) -> Result<Row>;

    /// Update the given columns on every row matching `filters`
    async fn update(&self, table: &str, changes: Row, filters: &[Filter]) -> Result<u64>;

    /// Delete every row matching `filters`
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64>;
}

/// Decode storage rows, skipping (and logging) rows that do not fit `T`
pub fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<Row>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<T>(Value::Object(row)) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!("Skipping malformed {} row: {}", table, e);
                None
            }
        })
        .collect()
}

/// Serialize a write payload into a storage row
pub fn encode_row<T: Serialize>(payload: &T) -> Result<Row> {
    match serde_json::to_value(payload)? {
        Value::Object(row) => Ok(row),
        other => Err(crate::errors::AppError::Internal(format!(
            "Expected an object payload, got {}",
            other
        ))),
    }
}
