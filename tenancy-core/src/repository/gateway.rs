//! Scoped query gateway
//!
//! Every read and write of a tenant-owned table is planned here. The plan
//! carries the scope filters derived from the [`AccessContext`] and is the only
//! thing executors accept, so no data path can skip tenancy filtering.

use crate::config::AccessConfig;
use crate::domain::{AccessContext, EffectiveScope};
use crate::error::{AppError, Result};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// What a table holds, as far as tenancy is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Reference data with neither scope column; reachable only through bypass
    GlobalReference,
    /// Carries `tenant_id`
    TenantOwned,
    /// Carries `tenant_id` and `franchise_id`
    FranchiseOwned,
}

/// Deploy-time map of table name to [`TableKind`]
#[derive(Debug, Clone)]
pub struct TableRegistry {
    global_reference: HashSet<String>,
    tenant_owned: HashSet<String>,
    franchise_owned: HashSet<String>,
}

impl TableRegistry {
    pub fn new<G, T, F>(global_reference: G, tenant_owned: T, franchise_owned: F) -> Result<Self>
    where
        G: IntoIterator,
        G::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        let global_reference = collect_tables(global_reference)?;
        let tenant_owned = collect_tables(tenant_owned)?;
        let franchise_owned = collect_tables(franchise_owned)?;

        let overlap = global_reference
            .intersection(&tenant_owned)
            .chain(global_reference.intersection(&franchise_owned))
            .chain(tenant_owned.intersection(&franchise_owned))
            .next();
        if let Some(table) = overlap {
            return Err(AppError::Configuration(format!(
                "table '{}' is registered with more than one scope kind",
                table
            )));
        }

        Ok(Self {
            global_reference,
            tenant_owned,
            franchise_owned,
        })
    }

    pub fn from_config(config: &AccessConfig) -> Result<Self> {
        Self::new(
            config.global_reference_tables.iter().cloned(),
            config.tenant_scoped_tables.iter().cloned(),
            config.franchise_scoped_tables.iter().cloned(),
        )
    }

    pub fn kind_of(&self, table: &str) -> Option<TableKind> {
        if self.global_reference.contains(table) {
            Some(TableKind::GlobalReference)
        } else if self.franchise_owned.contains(table) {
            Some(TableKind::FranchiseOwned)
        } else if self.tenant_owned.contains(table) {
            Some(TableKind::TenantOwned)
        } else {
            None
        }
    }

    pub fn is_global_reference(&self, table: &str) -> bool {
        self.global_reference.contains(table)
    }
}

fn collect_tables<I>(tables: I) -> Result<HashSet<String>>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    tables
        .into_iter()
        .map(|t| {
            let t = t.into();
            if IDENTIFIER_REGEX.is_match(&t) {
                Ok(t)
            } else {
                Err(AppError::Configuration(format!(
                    "invalid table name '{}' in access configuration",
                    t
                )))
            }
        })
        .collect()
}

/// Options for [`ScopedGateway::scoped_query`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Skip tenancy filtering. Only valid on global reference tables.
    pub bypass_scope: bool,
}

impl QueryOptions {
    pub fn bypass() -> Self {
        Self { bypass_scope: true }
    }
}

/// A scope column managed exclusively by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeColumn {
    TenantId,
    FranchiseId,
}

impl ScopeColumn {
    pub const ALL: [ScopeColumn; 2] = [ScopeColumn::TenantId, ScopeColumn::FranchiseId];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeColumn::TenantId => "tenant_id",
            ScopeColumn::FranchiseId => "franchise_id",
        }
    }
}

impl fmt::Display for ScopeColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `column = value` applied to every read and injected into every write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeFilter {
    pub column: ScopeColumn,
    pub value: Uuid,
}

/// How a planned query relates to tenancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeMode {
    /// Explicit, allow-listed bypass for global reference data
    Bypass,
    Scoped(EffectiveScope),
}

/// A typed scalar for caller-supplied predicates
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Uuid(Uuid),
    Text(String),
    Bool(bool),
    Int(i64),
}

impl SqlValue {
    /// Loose equality against a JSON row value
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (SqlValue::Uuid(expected), Value::String(s)) => {
                Uuid::parse_str(s).map(|u| u == *expected).unwrap_or(false)
            }
            (SqlValue::Text(expected), Value::String(s)) => expected == s,
            (SqlValue::Bool(expected), Value::Bool(b)) => expected == b,
            (SqlValue::Int(expected), Value::Number(n)) => n.as_i64() == Some(*expected),
            _ => false,
        }
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        SqlValue::Uuid(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

/// Caller-supplied equality predicate, ANDed with the scope filters
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    column: String,
    value: SqlValue,
}

impl Predicate {
    /// Predicates may not target scope columns; tenancy comes from the gateway only.
    pub fn eq(column: &str, value: impl Into<SqlValue>) -> Result<Self> {
        validate_identifier(column)?;
        if ScopeColumn::ALL.iter().any(|c| c.as_str() == column) {
            return Err(AppError::ScopeViolation(format!(
                "predicate on gateway-managed column '{}'",
                column
            )));
        }
        Ok(Self {
            column: column.to_string(),
            value: value.into(),
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn value(&self) -> &SqlValue {
        &self.value
    }

    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        row.get(&self.column)
            .map(|v| self.value.matches(v))
            .unwrap_or(false)
    }
}

/// Builds [`ScopedQuery`] plans from an access context
#[derive(Debug, Clone)]
pub struct ScopedGateway {
    registry: Arc<TableRegistry>,
}

impl ScopedGateway {
    pub fn new(registry: TableRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    /// Plan an operation on `table` for `ctx`.
    ///
    /// The effective scope is recomputed on every call.
    pub fn scoped_query(
        &self,
        ctx: &AccessContext,
        table: &str,
        options: QueryOptions,
    ) -> Result<ScopedQuery> {
        let kind = self.registry.kind_of(table).ok_or_else(|| {
            AppError::ScopeViolation(format!("table '{}' is not registered for scoped access", table))
        })?;

        if options.bypass_scope {
            if kind != TableKind::GlobalReference {
                tracing::error!(
                    user_id = %ctx.user_id(),
                    table,
                    "bypass_scope requested on a table outside the global reference allow-list"
                );
                return Err(AppError::ScopeViolation(format!(
                    "bypass_scope is not allowed on table '{}'",
                    table
                )));
            }
            return Ok(ScopedQuery {
                table: table.to_string(),
                kind,
                mode: ScopeMode::Bypass,
                filters: vec![],
                may_write_reference: ctx.is_platform_admin() && !ctx.admin_override_enabled(),
            });
        }

        if kind == TableKind::GlobalReference {
            return Err(AppError::ScopeViolation(format!(
                "table '{}' holds global reference data and requires bypass_scope",
                table
            )));
        }

        let scope = EffectiveScope::for_context(ctx)?;
        let mut filters = Vec::with_capacity(2);
        if let Some(tenant_id) = scope.tenant_id() {
            filters.push(ScopeFilter {
                column: ScopeColumn::TenantId,
                value: tenant_id,
            });
        }
        if let (Some(franchise_id), TableKind::FranchiseOwned) = (scope.franchise_id(), kind) {
            filters.push(ScopeFilter {
                column: ScopeColumn::FranchiseId,
                value: franchise_id,
            });
        }

        tracing::debug!(user_id = %ctx.user_id(), table, ?scope, "Planned scoped query");

        Ok(ScopedQuery {
            table: table.to_string(),
            kind,
            mode: ScopeMode::Scoped(scope),
            filters,
            may_write_reference: false,
        })
    }
}

/// A planned, scope-filtered operation on one table
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedQuery {
    table: String,
    kind: TableKind,
    mode: ScopeMode,
    filters: Vec<ScopeFilter>,
    may_write_reference: bool,
}

impl ScopedQuery {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn mode(&self) -> ScopeMode {
        self.mode
    }

    pub fn is_bypass(&self) -> bool {
        self.mode == ScopeMode::Bypass
    }

    /// The effective scope, or `None` for a bypass query
    pub fn scope(&self) -> Option<EffectiveScope> {
        match self.mode {
            ScopeMode::Bypass => None,
            ScopeMode::Scoped(scope) => Some(scope),
        }
    }

    /// Filters every read and every update must carry
    pub fn filters(&self) -> &[ScopeFilter] {
        &self.filters
    }

    /// True if `row` is visible under this query's scope
    pub fn admits(&self, row: &Map<String, Value>) -> bool {
        self.filters.iter().all(|filter| {
            row.get(filter.column.as_str())
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())
                .map(|v| v == filter.value)
                .unwrap_or(false)
        })
    }

    /// Turn a caller payload into the row to insert.
    ///
    /// Caller-supplied scope columns are discarded and replaced by the scope's
    /// values. An unscoped platform admin must name the target tenant explicitly.
    pub fn prepare_insert(&self, payload: Map<String, Value>) -> Result<Map<String, Value>> {
        validate_payload_columns(&payload)?;

        let scope = match self.mode {
            ScopeMode::Bypass => {
                self.require_reference_write()?;
                return Ok(self.strip_scope_columns(payload));
            }
            ScopeMode::Scoped(scope) => scope,
        };

        if scope == EffectiveScope::Global {
            return self.prepare_global_insert(payload);
        }

        let mut row = self.strip_scope_columns(payload);
        for filter in &self.filters {
            row.insert(
                filter.column.as_str().to_string(),
                Value::String(filter.value.to_string()),
            );
        }
        Ok(row)
    }

    /// Turn a caller payload into the column assignments of an update.
    ///
    /// Scope columns are always dropped: an update never moves a row across
    /// tenants or franchises.
    pub fn prepare_update(&self, payload: Map<String, Value>) -> Result<Map<String, Value>> {
        validate_payload_columns(&payload)?;
        if self.is_bypass() {
            self.require_reference_write()?;
        }
        let row = self.strip_scope_columns(payload);
        if row.is_empty() {
            return Err(AppError::BadRequest("No updatable fields supplied".to_string()));
        }
        Ok(row)
    }

    fn prepare_global_insert(&self, mut payload: Map<String, Value>) -> Result<Map<String, Value>> {
        let target_tenant = payload
            .get(ScopeColumn::TenantId.as_str())
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Inserting into '{}' without tenant scope requires an explicit tenant_id",
                    self.table
                ))
            })?;
        payload.insert(
            ScopeColumn::TenantId.as_str().to_string(),
            Value::String(target_tenant.to_string()),
        );

        let franchise_key = ScopeColumn::FranchiseId.as_str();
        match (self.kind, payload.get(franchise_key)) {
            (_, None) | (_, Some(Value::Null)) => {}
            (TableKind::FranchiseOwned, Some(Value::String(s))) if Uuid::parse_str(s).is_ok() => {}
            (TableKind::FranchiseOwned, Some(_)) => {
                return Err(AppError::BadRequest("franchise_id must be a UUID".to_string()));
            }
            _ => {
                payload.remove(franchise_key);
            }
        }
        Ok(payload)
    }

    fn require_reference_write(&self) -> Result<()> {
        if self.may_write_reference {
            tracing::info!(target: "audit", table = %self.table, "Write to global reference table");
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Only platform administrators may modify reference data".to_string(),
            ))
        }
    }

    fn strip_scope_columns(&self, mut payload: Map<String, Value>) -> Map<String, Value> {
        for column in ScopeColumn::ALL {
            if payload.remove(column.as_str()).is_some() {
                metrics::counter!(
                    "tenancy_scope_columns_stripped_total",
                    "table" => self.table.clone()
                )
                .increment(1);
                tracing::debug!(table = %self.table, column = %column, "Discarded caller-supplied scope column");
            }
        }
        payload
    }
}

fn validate_payload_columns(payload: &Map<String, Value>) -> Result<()> {
    payload.keys().try_for_each(|key| validate_identifier(key))
}

pub(crate) fn validate_identifier(name: &str) -> Result<()> {
    if IDENTIFIER_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Invalid column name '{}'", name)))
    }
}

lazy_static::lazy_static! {
    static ref IDENTIFIER_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").unwrap();
}
