//! Data Provider Port
//!
//! The board talks to persistence through this trait only. The desktop
//! store implements it over SQLite, the web frontend over the host bridge,
//! and tests over scripted fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const OPPORTUNITIES: &str = "opportunities";
pub const OPPORTUNITY_PRODUCTS: &str = "opportunity_products";
pub const ACTIVITIES: &str = "activities";

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ProviderError {
    #[error("Unknown resource: {0}")]
    UnknownResource(String),
    #[error("Record not found: {resource}#{id}")]
    NotFound { resource: String, id: u32 },
    #[error("Rejected by server: {0}")]
    Rejected(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParams {
    pub id: u32,
    pub data: Value,
    pub previous_data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateParams {
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Filter keys are column names, optionally suffixed with an operator
/// (`deleted_at@is` with a null value matches rows where the column is null).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListParams {
    pub filter: Map<String, Value>,
    pub pagination: Pagination,
    pub sort: Option<Sort>,
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }

    /// Restrict to rows that have not been soft-deleted
    pub fn not_deleted(self) -> Self {
        self.filter("deleted_at@is", Value::Null)
    }

    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.pagination = Pagination { page, per_page };
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResult {
    pub data: Vec<Value>,
    pub total: u64,
}

#[async_trait(?Send)]
pub trait DataProvider {
    async fn update(&self, resource: &str, params: UpdateParams) -> Result<Value, ProviderError>;

    async fn create(&self, resource: &str, params: CreateParams) -> Result<Value, ProviderError>;

    async fn get_list(&self, resource: &str, params: ListParams) -> Result<ListResult, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_params_wire_shape() {
        let params = ListParams::new()
            .filter("principal_organization_id", 3)
            .not_deleted()
            .page(1, 100)
            .sort(Sort::desc("created_at"));
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["filter"]["principal_organization_id"], 3);
        assert_eq!(json["filter"]["deleted_at@is"], Value::Null);
        assert_eq!(json["pagination"], json!({"page": 1, "perPage": 100}));
        assert_eq!(json["sort"], json!({"field": "created_at", "order": "DESC"}));
    }

    #[test]
    fn test_update_params_wire_shape() {
        let params = UpdateParams {
            id: 4,
            data: json!({"stage": "closed_won"}),
            previous_data: json!({"stage": "demo_scheduled"}),
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["previousData"]["stage"], "demo_scheduled");
    }
}
