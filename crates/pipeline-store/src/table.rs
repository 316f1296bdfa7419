//! Table specs and row conversion
//!
//! Each provider resource maps to one table. Column names coming from the
//! wire are checked against the spec before they reach SQL.

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Row;
use serde_json::{Map, Number, Value};

use pipeline_core::provider::{ACTIVITIES, OPPORTUNITIES, OPPORTUNITY_PRODUCTS};

use crate::error::{StoreError, StoreResult};

pub struct TableSpec {
    pub resource: &'static str,
    pub columns: &'static [&'static str],
    /// Columns stored as JSON text
    pub json_columns: &'static [&'static str],
    pub has_created_at: bool,
    pub has_updated_at: bool,
}

pub const OPPORTUNITIES_TABLE: TableSpec = TableSpec {
    resource: OPPORTUNITIES,
    columns: &[
        "id",
        "name",
        "stage",
        "status",
        "priority",
        "customer_organization_id",
        "principal_organization_id",
        "distributor_organization_id",
        "contact_ids",
        "estimated_close_date",
        "days_in_stage",
        "days_since_last_activity",
        "win_reason",
        "loss_reason",
        "close_reason_notes",
        "created_at",
        "updated_at",
        "deleted_at",
    ],
    json_columns: &["contact_ids"],
    has_created_at: true,
    has_updated_at: true,
};

pub const OPPORTUNITY_PRODUCTS_TABLE: TableSpec = TableSpec {
    resource: OPPORTUNITY_PRODUCTS,
    columns: &["id", "opportunity_id", "product_id", "notes", "created_at", "deleted_at"],
    json_columns: &[],
    has_created_at: true,
    has_updated_at: false,
};

pub const ACTIVITIES_TABLE: TableSpec = TableSpec {
    resource: ACTIVITIES,
    columns: &[
        "id",
        "activity_type",
        "type",
        "subject",
        "activity_date",
        "opportunity_id",
        "organization_id",
        "created_at",
    ],
    json_columns: &[],
    has_created_at: true,
    has_updated_at: false,
};

static TABLES: [&TableSpec; 3] = [&OPPORTUNITIES_TABLE, &OPPORTUNITY_PRODUCTS_TABLE, &ACTIVITIES_TABLE];

pub fn spec_for(resource: &str) -> StoreResult<&'static TableSpec> {
    TABLES
        .iter()
        .copied()
        .find(|t| t.resource == resource)
        .ok_or_else(|| StoreError::UnknownResource(resource.to_string()))
}

impl TableSpec {
    pub fn check_column(&self, column: &str) -> StoreResult<()> {
        if self.columns.contains(&column) {
            Ok(())
        } else {
            Err(StoreError::UnknownColumn {
                resource: self.resource.to_string(),
                column: column.to_string(),
            })
        }
    }

    pub fn select_list(&self) -> String {
        self.columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ")
    }

    /// JSON value to a bindable SQL value for `column`
    pub fn to_sql(&self, column: &str, value: &Value) -> StoreResult<SqlValue> {
        if self.json_columns.contains(&column) {
            return Ok(SqlValue::Text(serde_json::to_string(value)?));
        }
        Ok(match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Real(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(serde_json::to_string(other)?),
        })
    }

    /// Read a full row selected with [`TableSpec::select_list`]
    pub fn row_to_json(&self, row: &Row) -> StoreResult<Value> {
        let mut obj = Map::new();
        for (i, column) in self.columns.iter().enumerate() {
            let value = match row.get_ref(i)? {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(n) => Value::Number(n.into()),
                ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
                ValueRef::Text(bytes) => {
                    let text = String::from_utf8_lossy(bytes).into_owned();
                    if self.json_columns.contains(column) {
                        serde_json::from_str(&text)?
                    } else {
                        Value::String(text)
                    }
                }
                ValueRef::Blob(_) => Value::Null,
            };
            obj.insert((*column).to_string(), value);
        }
        Ok(Value::Object(obj))
    }
}

pub fn quote(column: &str) -> String {
    format!("\"{}\"", column)
}
