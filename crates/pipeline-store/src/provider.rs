//! SQLite Data Provider
//!
//! Implements the board's `DataProvider` port over the local database.
//! Filters support column equality and the `column@is` null operator.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use pipeline_core::provider::{
    CreateParams, DataProvider, ListParams, ListResult, ProviderError, SortOrder, UpdateParams, OPPORTUNITIES,
};

use crate::error::{StoreError, StoreResult};
use crate::table::{quote, spec_for, TableSpec};

/// SQLite implementation of the data provider
#[derive(Clone)]
pub struct SqliteProvider {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProvider {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }
}

fn find_row(conn: &Connection, spec: &TableSpec, id: u32) -> StoreResult<Option<Value>> {
    let sql = format!("SELECT {} FROM {} WHERE id = ?1", spec.select_list(), spec.resource);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row([id], |row| Ok(spec.row_to_json(row)))
        .optional()?;
    row.transpose()
}

fn data_object(data: &Value) -> StoreResult<&Map<String, Value>> {
    data.as_object()
        .ok_or_else(|| StoreError::Invalid("data must be an object".to_string()))
}

pub(crate) fn update_row(conn: &Connection, spec: &TableSpec, id: u32, data: &Value) -> StoreResult<Value> {
    let current = find_row(conn, spec, id)?.ok_or_else(|| StoreError::NotFound {
        resource: spec.resource.to_string(),
        id,
    })?;

    let mut assignments = Vec::new();
    let mut values = Vec::new();
    for (column, value) in data_object(data)? {
        if column == "id" {
            continue;
        }
        spec.check_column(column)?;
        assignments.push(format!("{} = ?", quote(column)));
        values.push(spec.to_sql(column, value)?);
    }

    // A stage change restarts the in-stage clock
    if spec.resource == OPPORTUNITIES {
        if let Some(stage) = data.get("stage") {
            if current.get("stage") != Some(stage) && data.get("days_in_stage").is_none() {
                assignments.push(format!("{} = ?", quote("days_in_stage")));
                values.push(SqlValue::Integer(0));
            }
        }
    }
    if spec.has_updated_at && data.get("updated_at").is_none() {
        assignments.push(format!("{} = ?", quote("updated_at")));
        values.push(SqlValue::Text(Utc::now().to_rfc3339()));
    }

    if !assignments.is_empty() {
        values.push(SqlValue::Integer(i64::from(id)));
        let sql = format!("UPDATE {} SET {} WHERE id = ?", spec.resource, assignments.join(", "));
        conn.execute(&sql, params_from_iter(values))?;
    }

    find_row(conn, spec, id)?.ok_or_else(|| StoreError::NotFound {
        resource: spec.resource.to_string(),
        id,
    })
}

pub(crate) fn insert_row(conn: &Connection, spec: &TableSpec, data: &Value) -> StoreResult<Value> {
    let mut columns = Vec::new();
    let mut values = Vec::new();
    for (column, value) in data_object(data)? {
        spec.check_column(column)?;
        columns.push(quote(column));
        values.push(spec.to_sql(column, value)?);
    }
    if spec.has_created_at && data.get("created_at").is_none() {
        columns.push(quote("created_at"));
        values.push(SqlValue::Text(Utc::now().to_rfc3339()));
    }

    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        spec.resource,
        columns.join(", "),
        placeholders
    );
    conn.execute(&sql, params_from_iter(values))?;

    let rowid = conn.last_insert_rowid();
    let id = u32::try_from(rowid).map_err(|_| StoreError::Invalid(format!("row id {} out of range", rowid)))?;
    find_row(conn, spec, id)?.ok_or_else(|| StoreError::NotFound {
        resource: spec.resource.to_string(),
        id,
    })
}

pub(crate) fn list_rows(conn: &Connection, spec: &TableSpec, params: &ListParams) -> StoreResult<ListResult> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    for (key, value) in &params.filter {
        match key.strip_suffix("@is") {
            Some(column) => {
                spec.check_column(column)?;
                if value.is_null() {
                    clauses.push(format!("{} IS NULL", quote(column)));
                } else {
                    clauses.push(format!("{} IS ?", quote(column)));
                    values.push(spec.to_sql(column, value)?);
                }
            }
            None => {
                spec.check_column(key)?;
                clauses.push(format!("{} = ?", quote(key)));
                values.push(spec.to_sql(key, value)?);
            }
        }
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    let total: u64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}{}", spec.resource, where_sql),
        params_from_iter(values.iter()),
        |row| row.get::<_, i64>(0),
    )? as u64;

    let order_sql = match &params.sort {
        Some(sort) => {
            spec.check_column(&sort.field)?;
            let dir = match sort.order {
                SortOrder::Asc => "ASC",
                SortOrder::Desc => "DESC",
            };
            format!(" ORDER BY {} {}, id {}", quote(&sort.field), dir, dir)
        }
        None => " ORDER BY id ASC".to_string(),
    };
    let per_page = params.pagination.per_page.max(1);
    // SQLite takes a signed 64-bit offset
    let offset = (u64::from(params.pagination.page.saturating_sub(1)) * u64::from(per_page)).min(i64::MAX as u64);

    let sql = format!(
        "SELECT {} FROM {}{}{} LIMIT {} OFFSET {}",
        spec.select_list(),
        spec.resource,
        where_sql,
        order_sql,
        per_page,
        offset
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(values.iter()))?;
    let mut data = Vec::new();
    while let Some(row) = rows.next()? {
        data.push(spec.row_to_json(row)?);
    }
    Ok(ListResult { data, total })
}

#[async_trait(?Send)]
impl DataProvider for SqliteProvider {
    async fn update(&self, resource: &str, params: UpdateParams) -> Result<Value, ProviderError> {
        let spec = spec_for(resource)?;
        let conn = self.conn.lock().await;
        let row = update_row(&conn, spec, params.id, &params.data)?;
        info!("Updated {}#{}", resource, params.id);
        Ok(row)
    }

    async fn create(&self, resource: &str, params: CreateParams) -> Result<Value, ProviderError> {
        let spec = spec_for(resource)?;
        let conn = self.conn.lock().await;
        let row = insert_row(&conn, spec, &params.data)?;
        debug!("Created {} row {}", resource, row["id"]);
        Ok(row)
    }

    async fn get_list(&self, resource: &str, params: ListParams) -> Result<ListResult, ProviderError> {
        let spec = spec_for(resource)?;
        let conn = self.conn.lock().await;
        Ok(list_rows(&conn, spec, &params)?)
    }
}
