//! Board Context
//!
//! Shared board handle provided via the Leptos Context API. All board
//! events go through [`BoardContext::dispatch`], which runs the machine and
//! then carries out the effects it asks for.

use chrono::{Local, Utc};
use leptos::prelude::*;
use leptos::task::spawn_local;

use pipeline_core::board::{BoardEffect, BoardEvent, BoardMachine, Notification, NotifyDuration, NotifyLevel};
use pipeline_core::coordinator::{execute_effect, BOARD_PAGE_SIZE};
use pipeline_core::domain::Stage;
use pipeline_core::gate::{GateForm, GatePrompt};
use pipeline_core::preferences::ColumnPreferences;
use pipeline_core::provider::{DataProvider, ListParams, Sort, OPPORTUNITIES};
use pipeline_core::BoardState;

use crate::commands::HostDataProvider;
use crate::storage::LocalStoragePreferences;
use crate::store::{
    store_close_gate, store_dismiss_toast, store_open_gate, store_push_toast, GateMode, UiStateStoreFields,
    UiStore,
};

#[derive(Clone, Copy)]
pub struct BoardContext {
    pub machine: RwSignal<BoardMachine>,
    pub preferences: RwSignal<ColumnPreferences<LocalStoragePreferences>>,
    /// Bumped to refetch the board
    pub reload_trigger: ReadSignal<u32>,
    set_reload_trigger: WriteSignal<u32>,
    pub store: UiStore,
}

impl BoardContext {
    pub fn new(store: UiStore) -> Self {
        let config = store.config().get_untracked();
        let (reload_trigger, set_reload_trigger) = signal(0u32);
        Self {
            machine: RwSignal::new(BoardMachine::default()),
            preferences: RwSignal::new(ColumnPreferences::load_with_keys(
                LocalStoragePreferences,
                &config.collapsed_stages_key,
                &config.visible_stages_key,
            )),
            reload_trigger,
            set_reload_trigger,
            store,
        }
    }

    /// Trigger a refetch of the board
    pub fn reload(&self) {
        self.set_reload_trigger.update(|v| *v += 1);
    }

    /// Feed one event to the machine and apply what it emits
    pub fn dispatch(&self, event: BoardEvent) {
        let effects = self.machine.try_update(|m| m.handle(event)).unwrap_or_default();
        for effect in effects {
            self.apply(effect);
        }
    }

    fn apply(&self, effect: BoardEffect) {
        match effect {
            BoardEffect::Persist(_) | BoardEffect::CreateAuditLog(_) => {
                let ctx = *self;
                spawn_local(async move {
                    if let Some(outcome) = execute_effect(&HostDataProvider, &effect, Utc::now()).await {
                        ctx.dispatch(outcome);
                    }
                });
            }
            BoardEffect::InvalidateCaches => self.reload(),
            BoardEffect::OpenGate(prompt) => {
                store_open_gate(&self.store, GateForm::new(prompt), GateMode::Drop);
            }
            BoardEffect::CloseGate => store_close_gate(&self.store),
            BoardEffect::Notify(notification) => self.notify(notification),
            BoardEffect::ValidationFailed(errors) => {
                web_sys::console::warn_1(&format!("[BOARD] {}", errors).into());
                if let Some(first) = errors.errors().first() {
                    self.notify(Notification {
                        level: NotifyLevel::Error,
                        message: first.message.clone(),
                        duration: NotifyDuration::Normal,
                    });
                }
            }
            BoardEffect::Announce(text) => self.store.announcement().set(text),
        }
    }

    /// Show a toast and schedule its dismissal
    pub fn notify(&self, notification: Notification) {
        let config = self.store.config().get_untracked();
        let ms = match notification.duration {
            NotifyDuration::Normal => config.notification_duration_ms,
            NotifyDuration::Long => config.audit_warning_duration_ms,
        };
        let id = store_push_toast(&self.store, notification);
        let store = self.store;
        gloo_timers::callback::Timeout::new(ms, move || store_dismiss_toast(&store, id)).forget();
    }

    /// Fetch open opportunities and hand them to the machine
    pub fn load(&self) {
        let ctx = *self;
        spawn_local(async move {
            let params = ListParams::new()
                .not_deleted()
                .page(1, BOARD_PAGE_SIZE)
                .sort(Sort::desc("created_at"));
            let result = HostDataProvider.get_list(OPPORTUNITIES, params).await;
            let today = Local::now().date_naive();
            match result {
                Ok(list) => match BoardState::from_records(&list.data, today) {
                    Ok(board) => {
                        web_sys::console::log_1(&format!("[BOARD] Loaded {} opportunities", board.len()).into());
                        ctx.store.load_error().set(None);
                        ctx.dispatch(BoardEvent::Loaded(board));
                    }
                    Err(e) => ctx.store.load_error().set(Some(e.to_string())),
                },
                Err(e) => ctx.store.load_error().set(Some(e.to_string())),
            }
        });
    }

    /// Open the close modal for a card action instead of a drop
    pub fn begin_direct_close(&self, id: u32, target: Stage) {
        let name = self
            .machine
            .with_untracked(|m| m.board().get(id).map(|o| o.name.clone()));
        let Some(opportunity_name) = name else {
            return;
        };
        let prompt = GatePrompt {
            opportunity_id: id,
            opportunity_name,
            target,
        };
        store_open_gate(&self.store, GateForm::new(prompt), GateMode::Direct);
    }
}

pub fn use_board() -> BoardContext {
    expect_context::<BoardContext>()
}
