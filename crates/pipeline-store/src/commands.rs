//! Host Commands
//!
//! Named commands the frontend invokes over the host bridge. Arguments and
//! results are JSON; errors come back as a serialized `ProviderError`.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use pipeline_core::provider::{CreateParams, DataProvider, ListParams, ProviderError, UpdateParams};

use crate::bootstrap::Backend;

pub const CMD_UPDATE: &str = "provider_update";
pub const CMD_CREATE: &str = "provider_create";
pub const CMD_GET_LIST: &str = "provider_get_list";
pub const CMD_BOARD_CONFIG: &str = "board_config";
pub const CMD_RECENT_LOGS: &str = "recent_logs";

#[derive(Deserialize)]
struct ResourceArgs<T> {
    resource: String,
    params: T,
}

fn parse_args<T: for<'de> Deserialize<'de>>(cmd: &str, args: Value) -> Result<T, ProviderError> {
    serde_json::from_value(args).map_err(|e| ProviderError::Rejected(format!("bad arguments for {}: {}", cmd, e)))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, ProviderError> {
    serde_json::to_value(value).map_err(|e| ProviderError::Storage(e.to_string()))
}

/// Run one host command against the backend
pub async fn handle_command(backend: &Backend, cmd: &str, args: Value) -> Result<Value, ProviderError> {
    let result = match cmd {
        CMD_UPDATE => {
            let args: ResourceArgs<UpdateParams> = parse_args(cmd, args)?;
            backend.provider.update(&args.resource, args.params).await
        }
        CMD_CREATE => {
            let args: ResourceArgs<CreateParams> = parse_args(cmd, args)?;
            backend.provider.create(&args.resource, args.params).await
        }
        CMD_GET_LIST => {
            let args: ResourceArgs<ListParams> = parse_args(cmd, args)?;
            let list = backend.provider.get_list(&args.resource, args.params).await?;
            to_json(&list)
        }
        CMD_BOARD_CONFIG => to_json(&backend.config),
        CMD_RECENT_LOGS => to_json(&rolling_logger::recent_lines()),
        other => Err(ProviderError::Rejected(format!("unknown command: {}", other))),
    };
    if let Err(e) = &result {
        warn!("Command {} failed: {}", cmd, e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::init_backend;
    use pipeline_core::provider::OPPORTUNITIES;
    use serde_json::json;

    #[tokio::test]
    async fn test_commands_round_the_provider() {
        let dir = tempfile::tempdir().unwrap();
        let backend = init_backend(dir.path()).await.unwrap();

        let created = handle_command(
            &backend,
            CMD_CREATE,
            json!({"resource": OPPORTUNITIES, "params": {"data": {
                "name": "Sysco", "stage": "new_lead",
                "customer_organization_id": 1, "principal_organization_id": 2}}}),
        )
        .await
        .unwrap();
        let id = created["id"].as_u64().unwrap();

        let updated = handle_command(
            &backend,
            CMD_UPDATE,
            json!({"resource": OPPORTUNITIES, "params": {
                "id": id, "data": {"stage": "initial_outreach"}, "previousData": created}}),
        )
        .await
        .unwrap();
        assert_eq!(updated["stage"], "initial_outreach");

        let list = handle_command(
            &backend,
            CMD_GET_LIST,
            json!({"resource": OPPORTUNITIES, "params": {
                "filter": {"deleted_at@is": null},
                "pagination": {"page": 1, "perPage": 10},
                "sort": {"field": "created_at", "order": "DESC"}}}),
        )
        .await
        .unwrap();
        assert_eq!(list["total"], 1);

        let config = handle_command(&backend, CMD_BOARD_CONFIG, Value::Null).await.unwrap();
        assert_eq!(config["drag_activation_distance"], 8);
    }

    #[tokio::test]
    async fn test_bad_arguments_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = init_backend(dir.path()).await.unwrap();

        let err = handle_command(&backend, CMD_UPDATE, json!({"resource": OPPORTUNITIES}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));

        let err = handle_command(&backend, "drop_tables", Value::Null).await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));
    }
}
