//! Host Command Wrappers
//!
//! Frontend bindings to the host bridge. The board reaches persistence only
//! through [`HostDataProvider`].

mod provider;

use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use pipeline_core::provider::ProviderError;
use pipeline_core::BoardConfig;

pub use provider::HostDataProvider;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["window", "__TAURI__", "core"], catch)]
    async fn invoke(cmd: &str, args: JsValue) -> Result<JsValue, JsValue>;
}

/// Host errors arrive as a serialized `ProviderError` or a bare string
fn host_error(err: JsValue) -> ProviderError {
    if let Ok(e) = serde_wasm_bindgen::from_value::<ProviderError>(err.clone()) {
        return e;
    }
    ProviderError::Transport(err.as_string().unwrap_or_else(|| format!("{:?}", err)))
}

/// Invoke `cmd` with JSON-compatible arguments and decode the reply
pub(crate) async fn call<A: Serialize, R: DeserializeOwned>(cmd: &str, args: &A) -> Result<R, ProviderError> {
    let js_args = args
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| ProviderError::Transport(e.to_string()))?;
    let result = invoke(cmd, js_args).await.map_err(host_error)?;
    serde_wasm_bindgen::from_value(result).map_err(|e| ProviderError::Transport(e.to_string()))
}

pub async fn load_board_config() -> Result<BoardConfig, ProviderError> {
    call("board_config", &()).await
}
