//! Scripted data provider for unit tests.
//!
//! Holds resources as JSON rows, records every call, and can be told to
//! fail the next update or create.

use std::cell::RefCell;
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::provider::{CreateParams, DataProvider, ListParams, ListResult, ProviderError, SortOrder, UpdateParams};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Update(String, UpdateParams),
    Create(String, CreateParams),
    GetList(String, ListParams),
}

#[derive(Default)]
pub struct ScriptedProvider {
    pub rows: RefCell<HashMap<String, Vec<Value>>>,
    pub calls: RefCell<Vec<Call>>,
    pub fail_update: RefCell<Option<ProviderError>>,
    pub fail_create: RefCell<Option<ProviderError>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, resource: &str, row: Value) {
        self.rows
            .borrow_mut()
            .entry(resource.to_string())
            .or_default()
            .push(row);
    }

    pub fn updates(&self) -> Vec<UpdateParams> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Update(_, p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn creates(&self, resource: &str) -> Vec<Value> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Create(r, p) if r == resource => Some(p.data.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn list_calls(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, Call::GetList(..)))
            .count()
    }
}

fn matches_filter(row: &Value, filter: &serde_json::Map<String, Value>) -> bool {
    filter.iter().all(|(key, expected)| match key.strip_suffix("@is") {
        Some(column) => row.get(column).cloned().unwrap_or(Value::Null) == *expected,
        None => row.get(key.as_str()) == Some(expected),
    })
}

#[async_trait(?Send)]
impl DataProvider for ScriptedProvider {
    async fn update(&self, resource: &str, params: UpdateParams) -> Result<Value, ProviderError> {
        self.calls
            .borrow_mut()
            .push(Call::Update(resource.to_string(), params.clone()));
        if let Some(err) = self.fail_update.borrow_mut().take() {
            return Err(err);
        }

        let mut rows = self.rows.borrow_mut();
        let table = rows.entry(resource.to_string()).or_default();
        let row = table
            .iter_mut()
            .find(|r| r["id"] == json!(params.id))
            .ok_or_else(|| ProviderError::NotFound {
                resource: resource.to_string(),
                id: params.id,
            })?;
        if let (Some(target), Some(patch)) = (row.as_object_mut(), params.data.as_object()) {
            for (k, v) in patch {
                target.insert(k.clone(), v.clone());
            }
        }
        Ok(row.clone())
    }

    async fn create(&self, resource: &str, params: CreateParams) -> Result<Value, ProviderError> {
        self.calls
            .borrow_mut()
            .push(Call::Create(resource.to_string(), params.clone()));
        if let Some(err) = self.fail_create.borrow_mut().take() {
            return Err(err);
        }

        let mut rows = self.rows.borrow_mut();
        let table = rows.entry(resource.to_string()).or_default();
        let mut row = params.data;
        if let Some(obj) = row.as_object_mut() {
            obj.entry("id").or_insert(json!(table.len() as u32 + 1));
        }
        table.push(row.clone());
        Ok(row)
    }

    async fn get_list(&self, resource: &str, params: ListParams) -> Result<ListResult, ProviderError> {
        self.calls
            .borrow_mut()
            .push(Call::GetList(resource.to_string(), params.clone()));

        let rows = self.rows.borrow();
        let mut data: Vec<Value> = rows
            .get(resource)
            .map(|t| t.iter().filter(|r| matches_filter(r, &params.filter)).cloned().collect())
            .unwrap_or_default();

        if let Some(sort) = &params.sort {
            data.sort_by(|a, b| {
                let ord = a[&sort.field].to_string().cmp(&b[&sort.field].to_string());
                match sort.order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });
        }

        let total = data.len() as u64;
        let per_page = params.pagination.per_page.max(1) as usize;
        let skip = params.pagination.page.saturating_sub(1) as usize * per_page;
        let data = data.into_iter().skip(skip).take(per_page).collect();
        Ok(ListResult { data, total })
    }
}
