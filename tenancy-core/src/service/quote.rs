//! Quote version lifecycle

use crate::domain::{AccessContext, EffectiveScope, QuoteStatus, QuoteVersion};
use crate::error::{AppError, Result};
use crate::repository::{Predicate, QueryOptions, ScopeColumn, ScopedExecutor, ScopedGateway};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const QUOTE_VERSIONS: &str = "quote_versions";
pub const QUOTES: &str = "quotes";
/// Column of `quotes` owned by [`QuoteLifecycleService::set_current_version`]
pub const CURRENT_VERSION_COLUMN: &str = "current_version_id";

/// Status changes and current-version selection, all through the scoped gateway
pub struct QuoteLifecycleService<E: ScopedExecutor> {
    gateway: ScopedGateway,
    executor: Arc<E>,
}

impl<E: ScopedExecutor> QuoteLifecycleService<E> {
    pub fn new(gateway: ScopedGateway, executor: Arc<E>) -> Self {
        Self { gateway, executor }
    }

    /// Load a quote version visible in the caller's scope
    pub async fn get_version(&self, ctx: &AccessContext, version_id: Uuid) -> Result<QuoteVersion> {
        let query = self
            .gateway
            .scoped_query(ctx, QUOTE_VERSIONS, QueryOptions::default())?;
        let rows = self
            .executor
            .fetch_all(&query, &[Predicate::eq("id", version_id)?])
            .await?;
        rows.into_iter()
            .next()
            .map(parse_version)
            .transpose()?
            .ok_or_else(|| AppError::NotFound(format!("Quote version {} not found", version_id)))
    }

    /// Start a new draft version of a quote visible in the caller's scope.
    ///
    /// Versions always begin as `draft`; every later status goes through
    /// [`Self::transition`].
    pub async fn create_version(&self, ctx: &AccessContext, quote_id: Uuid) -> Result<QuoteVersion> {
        let quotes = self.gateway.scoped_query(ctx, QUOTES, QueryOptions::default())?;
        let quote = self
            .executor
            .fetch_all(&quotes, &[Predicate::eq("id", quote_id)?])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Quote {} not found", quote_id)))?;

        let versions = self
            .gateway
            .scoped_query(ctx, QUOTE_VERSIONS, QueryOptions::default())?;
        let latest = self
            .executor
            .fetch_all(&versions, &[Predicate::eq("quote_id", quote_id)?])
            .await?
            .iter()
            .filter_map(|row| row.get("version_number").and_then(Value::as_i64))
            .max()
            .unwrap_or(0);

        let mut row = payload(json!({
            "quote_id": quote_id.to_string(),
            "version_number": latest + 1,
            "status": QuoteStatus::Draft.as_str(),
        }));
        if versions.scope() == Some(EffectiveScope::Global) {
            // Unscoped inserts name their tenant explicitly; take it from the quote
            for column in ScopeColumn::ALL {
                if let Some(value) = quote.get(column.as_str()) {
                    row.insert(column.as_str().to_string(), value.clone());
                }
            }
        }

        let version = parse_version(self.executor.insert(&versions, row).await?)?;
        info!(
            user_id = %ctx.user_id(),
            quote_id = %quote_id,
            quote_version_id = %version.id,
            version_number = version.version_number,
            "Quote version created"
        );
        Ok(version)
    }

    /// Move a quote version to `target`.
    ///
    /// The update is conditioned on the status that was checked, so a
    /// concurrent transition surfaces as `Conflict` instead of being overwritten.
    pub async fn transition(
        &self,
        ctx: &AccessContext,
        version_id: Uuid,
        target: QuoteStatus,
    ) -> Result<QuoteVersion> {
        let current = self.get_version(ctx, version_id).await?;

        if !current.status.can_transition_to(target) {
            metrics::counter!("tenancy_lifecycle_transitions_total", "outcome" => "rejected")
                .increment(1);
            return Err(AppError::InvalidTransition {
                from: current.status,
                to: target,
            });
        }

        let query = self
            .gateway
            .scoped_query(ctx, QUOTE_VERSIONS, QueryOptions::default())?;
        let predicates = [
            Predicate::eq("id", version_id)?,
            Predicate::eq("status", current.status.as_str())?,
        ];
        let rows = self
            .executor
            .update(&query, &predicates, payload(json!({ "status": target.as_str() })))
            .await?;

        let updated = match rows.into_iter().next() {
            Some(row) => parse_version(row)?,
            None => {
                metrics::counter!("tenancy_lifecycle_transitions_total", "outcome" => "conflict")
                    .increment(1);
                return Err(AppError::Conflict(format!(
                    "Quote version {} changed while transitioning",
                    version_id
                )));
            }
        };

        metrics::counter!("tenancy_lifecycle_transitions_total", "outcome" => "applied")
            .increment(1);
        info!(
            user_id = %ctx.user_id(),
            quote_version_id = %version_id,
            from = %current.status,
            to = %target,
            "Quote version transitioned"
        );
        Ok(updated)
    }

    /// Point the parent quote at `version_id`. Not a status transition.
    pub async fn set_current_version(&self, ctx: &AccessContext, version_id: Uuid) -> Result<Value> {
        let version = self.get_version(ctx, version_id).await?;

        let query = self.gateway.scoped_query(ctx, QUOTES, QueryOptions::default())?;
        let rows = self
            .executor
            .update(
                &query,
                &[Predicate::eq("id", version.quote_id)?],
                {
                    let mut row = Map::new();
                    row.insert(
                        CURRENT_VERSION_COLUMN.to_string(),
                        Value::String(version_id.to_string()),
                    );
                    row
                },
            )
            .await?;

        let quote = rows
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Quote {} not found", version.quote_id)))?;

        info!(
            user_id = %ctx.user_id(),
            quote_id = %version.quote_id,
            quote_version_id = %version_id,
            "Quote current version updated"
        );
        Ok(quote)
    }
}

fn parse_version(row: Value) -> Result<QuoteVersion> {
    serde_json::from_value(row)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Malformed quote version row: {}", e)))
}

fn payload(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
