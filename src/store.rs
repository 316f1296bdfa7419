//! UI State Store
//!
//! Uses Leptos reactive_stores for fine-grained reactivity. Board state
//! itself lives in the machine; this holds what only the view cares about.

use leptos::prelude::*;
use reactive_stores::Store;

use pipeline_core::board::Notification;
use pipeline_core::domain::Stage;
use pipeline_core::gate::GateForm;
use pipeline_core::BoardConfig;

/// How the open close modal was reached
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GateMode {
    /// A drop into a closed column; confirm resumes the board's pending move
    #[default]
    Drop,
    /// A card's "mark won/lost" action
    Direct,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Toast {
    pub id: u32,
    pub notification: Notification,
}

#[derive(Clone, Debug, Default, Store)]
pub struct UiState {
    pub toasts: Vec<Toast>,
    pub next_toast_id: u32,
    /// Close modal form, present while the modal is open
    pub gate: Option<GateForm>,
    pub gate_mode: GateMode,
    /// Live-region text for screen readers
    pub announcement: String,
    pub config: BoardConfig,
    pub load_error: Option<String>,
    pub menu_open: bool,
    /// Active stage filter; `None` shows every visible column
    pub stage_filter: Option<Vec<Stage>>,
}

pub type UiStore = Store<UiState>;

pub fn use_ui_store() -> UiStore {
    expect_context::<UiStore>()
}

// ========================
// Store Helper Functions
// ========================

/// Push a toast and return its id
pub fn store_push_toast(store: &UiStore, notification: Notification) -> u32 {
    let id = store.next_toast_id().get_untracked();
    store.next_toast_id().set(id + 1);
    store.toasts().write().push(Toast { id, notification });
    id
}

pub fn store_dismiss_toast(store: &UiStore, id: u32) {
    store.toasts().write().retain(|t| t.id != id);
}

pub fn store_open_gate(store: &UiStore, form: GateForm, mode: GateMode) {
    store.gate_mode().set(mode);
    store.gate().set(Some(form));
}

pub fn store_close_gate(store: &UiStore) {
    store.gate().set(None);
}

/// Edit the open form in place; no-op when the modal is closed
pub fn store_update_gate(store: &UiStore, f: impl FnOnce(&mut GateForm)) {
    if let Some(form) = &mut *store.gate().write() {
        f(form);
    }
}
