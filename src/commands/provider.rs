//! Data provider over the host bridge

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use pipeline_core::provider::{CreateParams, DataProvider, ListParams, ListResult, ProviderError, UpdateParams};

use super::call;

const CMD_UPDATE: &str = "provider_update";
const CMD_CREATE: &str = "provider_create";
const CMD_GET_LIST: &str = "provider_get_list";

#[derive(Serialize)]
struct ResourceArgs<'a, T> {
    resource: &'a str,
    params: T,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HostDataProvider;

#[async_trait(?Send)]
impl DataProvider for HostDataProvider {
    async fn update(&self, resource: &str, params: UpdateParams) -> Result<Value, ProviderError> {
        call(CMD_UPDATE, &ResourceArgs { resource, params }).await
    }

    async fn create(&self, resource: &str, params: CreateParams) -> Result<Value, ProviderError> {
        call(CMD_CREATE, &ResourceArgs { resource, params }).await
    }

    async fn get_list(&self, resource: &str, params: ListParams) -> Result<ListResult, ProviderError> {
        call(CMD_GET_LIST, &ResourceArgs { resource, params }).await
    }
}
