//! Executes planned [`ScopedQuery`] values against Postgres

use super::gateway::{Predicate, ScopedQuery, SqlValue};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

/// Runs reads and writes that the gateway has already scoped.
///
/// Implementations must apply [`ScopedQuery::filters`] to every read and update
/// and must pass payloads through `prepare_insert` / `prepare_update`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScopedExecutor: Send + Sync {
    async fn fetch_all(&self, query: &ScopedQuery, predicates: &[Predicate]) -> Result<Vec<Value>>;

    async fn insert(&self, query: &ScopedQuery, payload: Map<String, Value>) -> Result<Value>;

    /// Returns the updated rows; an empty result means nothing in scope matched.
    async fn update(
        &self,
        query: &ScopedQuery,
        predicates: &[Predicate],
        payload: Map<String, Value>,
    ) -> Result<Vec<Value>>;
}

pub struct PgScopedExecutor {
    pool: PgPool,
}

impl PgScopedExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScopedExecutor for PgScopedExecutor {
    async fn fetch_all(&self, query: &ScopedQuery, predicates: &[Predicate]) -> Result<Vec<Value>> {
        let mut builder = select_sql(query, predicates);
        let rows: Vec<(Json<Value>,)> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(Json(row),)| row).collect())
    }

    async fn insert(&self, query: &ScopedQuery, payload: Map<String, Value>) -> Result<Value> {
        let row = query.prepare_insert(payload)?;
        let mut builder = insert_sql(query, row);
        let (Json(inserted),): (Json<Value>,) =
            builder.build_query_as().fetch_one(&self.pool).await?;
        Ok(inserted)
    }

    async fn update(
        &self,
        query: &ScopedQuery,
        predicates: &[Predicate],
        payload: Map<String, Value>,
    ) -> Result<Vec<Value>> {
        let row = query.prepare_update(payload)?;
        let mut builder = update_sql(query, predicates, row);
        let rows: Vec<(Json<Value>,)> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(Json(row),)| row).collect())
    }
}

fn quoted(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

fn push_value(builder: &mut QueryBuilder<'static, Postgres>, value: &SqlValue) {
    match value {
        SqlValue::Uuid(v) => builder.push_bind(*v),
        SqlValue::Text(v) => builder.push_bind(v.clone()),
        SqlValue::Bool(v) => builder.push_bind(*v),
        SqlValue::Int(v) => builder.push_bind(*v),
    };
}

/// `AND t.col = $n` for every scope filter, then every predicate
fn push_conditions(
    builder: &mut QueryBuilder<'static, Postgres>,
    query: &ScopedQuery,
    predicates: &[Predicate],
) {
    builder.push(" WHERE TRUE");
    for filter in query.filters() {
        builder
            .push(" AND t.")
            .push(quoted(filter.column.as_str()))
            .push(" = ")
            .push_bind(filter.value);
    }
    for predicate in predicates {
        builder
            .push(" AND t.")
            .push(quoted(predicate.column()))
            .push(" = ");
        push_value(builder, predicate.value());
    }
}

fn select_sql(query: &ScopedQuery, predicates: &[Predicate]) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT row_to_json(t.*) FROM ");
    builder.push(quoted(query.table())).push(" AS t");
    push_conditions(&mut builder, query, predicates);
    builder
}

fn insert_sql(query: &ScopedQuery, row: Map<String, Value>) -> QueryBuilder<'static, Postgres> {
    let table = quoted(query.table());
    let columns = row.keys().map(|c| quoted(c)).collect::<Vec<_>>().join(", ");

    let mut builder = QueryBuilder::new("INSERT INTO ");
    builder
        .push(&table)
        .push(" AS t (")
        .push(&columns)
        .push(") SELECT ")
        .push(&columns)
        .push(" FROM jsonb_populate_record(NULL::")
        .push(&table)
        .push(", ")
        .push_bind(Json(Value::Object(row)))
        .push(") RETURNING row_to_json(t.*)");
    builder
}

fn update_sql(
    query: &ScopedQuery,
    predicates: &[Predicate],
    row: Map<String, Value>,
) -> QueryBuilder<'static, Postgres> {
    let table = quoted(query.table());
    let assignments = row
        .keys()
        .map(|c| format!("{col} = r.{col}", col = quoted(c)))
        .collect::<Vec<_>>()
        .join(", ");

    let mut builder = QueryBuilder::new("UPDATE ");
    builder
        .push(&table)
        .push(" AS t SET ")
        .push(&assignments)
        .push(" FROM jsonb_populate_record(NULL::")
        .push(&table)
        .push(", ")
        .push_bind(Json(Value::Object(row)))
        .push(") AS r");
    push_conditions(&mut builder, query, predicates);
    builder.push(" RETURNING row_to_json(t.*)");
    builder
}
