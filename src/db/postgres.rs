//! RemoteStore backed by a Postgres pool.
//!
//! Rows travel as JSON: reads project `to_jsonb(r)`, writes go through
//! `jsonb_populate_record` so Postgres casts every column to its declared type.
//! Filters compare `to_jsonb(r) -> column` with a bound jsonb value, which keeps
//! column names out of the SQL text entirely.

use crate::db::query::{validate_filters, validate_identifier, Filter, Query, Row};
use crate::db::store::RemoteStore;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder, Row as _};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn push_json_path(builder: &mut QueryBuilder<'_, Postgres>, column: &str) {
    builder.push("(to_jsonb(r) -> ");
    builder.push_bind(column.to_string());
    builder.push(")");
}

fn push_is_null(builder: &mut QueryBuilder<'_, Postgres>, column: &str, negate: bool) {
    builder.push("COALESCE(to_jsonb(r) -> ");
    builder.push_bind(column.to_string());
    builder.push(if negate {
        ", 'null'::jsonb) <> 'null'::jsonb"
    } else {
        ", 'null'::jsonb) = 'null'::jsonb"
    });
}

fn push_comparison(
    builder: &mut QueryBuilder<'_, Postgres>,
    column: &str,
    operator: &str,
    value: &Value,
) {
    push_json_path(builder, column);
    builder.push(operator);
    builder.push_bind(value.clone());
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    match filter {
        Filter::Eq(column, Value::Null) => push_is_null(builder, column, false),
        Filter::Neq(column, Value::Null) => push_is_null(builder, column, true),
        Filter::Eq(column, value) => push_comparison(builder, column, " = ", value),
        Filter::Neq(column, value) => push_comparison(builder, column, " <> ", value),
        Filter::Gte(column, value) => push_comparison(builder, column, " >= ", value),
        Filter::Lte(column, value) => push_comparison(builder, column, " <= ", value),
        Filter::In(_, values) if values.is_empty() => {
            builder.push("FALSE");
        }
        Filter::In(column, values) => {
            push_json_path(builder, column);
            builder.push(" IN (SELECT jsonb_array_elements(");
            builder.push_bind(Value::Array(values.clone()));
            builder.push("))");
        }
        Filter::IsNull(column) => push_is_null(builder, column, false),
        Filter::NotNull(column) => push_is_null(builder, column, true),
        Filter::AnyEq(pairs) if pairs.is_empty() => {
            builder.push("FALSE");
        }
        Filter::AnyEq(pairs) => {
            builder.push("(");
            for (i, (column, value)) in pairs.iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                push_comparison(builder, column, " = ", value);
            }
            builder.push(")");
        }
    }
}

fn push_where(builder: &mut QueryBuilder<'_, Postgres>, filters: &[Filter]) {
    for (i, filter) in filters.iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        push_filter(builder, filter);
    }
}

fn validated_columns(row: &Row) -> Result<String> {
    for column in row.keys() {
        validate_identifier(column)?;
    }
    Ok(row.keys().cloned().collect::<Vec<_>>().join(", "))
}

fn row_from_json(value: Value) -> Result<Row> {
    match value {
        Value::Object(row) => Ok(row),
        other => Err(AppError::Internal(format!(
            "Expected a JSON object row, got {}",
            other
        ))),
    }
}

#[async_trait]
impl RemoteStore for PgStore {
    async fn select(&self, query: &Query) -> Result<Vec<Row>> {
        query.validate()?;

        let mut builder = QueryBuilder::<Postgres>::new("SELECT to_jsonb(r) AS row FROM ");
        builder.push(&query.table);
        builder.push(" AS r");
        push_where(&mut builder, &query.filters);

        for (i, order) in query.order.iter().enumerate() {
            builder.push(if i == 0 { " ORDER BY " } else { ", " });
            push_json_path(&mut builder, &order.column);
            builder.push(" ");
            builder.push(order.direction.as_sql());
        }

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit as i64);
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        tracing::debug!("Selected {} rows from {}", rows.len(), query.table);

        rows.into_iter()
            .map(|row| row_from_json(row.try_get::<Value, _>("row")?))
            .collect()
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row> {
        validate_identifier(table)?;

        let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO ");
        builder.push(table);

        if row.is_empty() {
            builder.push(" DEFAULT VALUES");
        } else {
            let columns = validated_columns(&row)?;
            builder.push(format!(" ({columns}) SELECT {columns} FROM jsonb_populate_record(NULL::{table}, "));
            builder.push_bind(Value::Object(row));
            builder.push(")");
        }
        builder.push(format!(" RETURNING to_jsonb({table}.*) AS row"));

        let inserted = builder.build().fetch_one(&self.pool).await?;
        tracing::debug!("Inserted row into {}", table);

        row_from_json(inserted.try_get::<Value, _>("row")?)
    }

    async fn update(&self, table: &str, changes: Row, filters: &[Filter]) -> Result<u64> {
        validate_identifier(table)?;
        validate_filters(filters)?;

        if filters.is_empty() {
            return Err(AppError::ValidationError(format!(
                "Refusing to update every row of {}",
                table
            )));
        }
        if changes.is_empty() {
            return Ok(0);
        }

        let columns = validated_columns(&changes)?;
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE ");
        builder.push(format!(
            "{table} AS r SET ({columns}) = (SELECT {columns} FROM jsonb_populate_record(NULL::{table}, "
        ));
        builder.push_bind(Value::Object(changes));
        builder.push("))");
        push_where(&mut builder, filters);

        let result = builder.build().execute(&self.pool).await?;
        tracing::debug!("Updated {} rows in {}", result.rows_affected(), table);

        Ok(result.rows_affected())
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        validate_identifier(table)?;
        validate_filters(filters)?;

        if filters.is_empty() {
            return Err(AppError::ValidationError(format!(
                "Refusing to delete every row of {}",
                table
            )));
        }

        let mut builder = QueryBuilder::<Postgres>::new("DELETE FROM ");
        builder.push(table);
        builder.push(" AS r");
        push_where(&mut builder, filters);

        let result = builder.build().execute(&self.pool).await?;
        tracing::debug!("Deleted {} rows from {}", result.rows_affected(), table);

        Ok(result.rows_affected())
    }
}
