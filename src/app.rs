//! Pipeline Board App
//!
//! Loads configuration, provides the board context and lays out the board
//! with its modal, toasts and live region.

use leptos::prelude::*;
use leptos::task::spawn_local;
use reactive_stores::Store;

use crate::commands;
use crate::components::{CloseReasonModal, ColumnMenu, PipelineBoard, ToastList};
use crate::context::BoardContext;
use crate::store::{UiState, UiStateStoreFields};

#[component]
pub fn App() -> impl IntoView {
    let store = Store::new(UiState::default());
    provide_context(store);

    let (config_ready, set_config_ready) = signal(false);

    // Config first: it carries the preference keys and drag distance
    spawn_local(async move {
        match commands::load_board_config().await {
            Ok(config) => store.config().set(config),
            Err(e) => web_sys::console::warn_1(&format!("[APP] Using default config: {}", e).into()),
        }
        set_config_ready.set(true);
    });

    view! {
        <Show
            when=move || config_ready.get()
            fallback=|| view! { <p class="board-loading">"Loading..."</p> }
        >
            <BoardShell store=store />
        </Show>
    }
}

#[component]
fn BoardShell(store: Store<UiState>) -> impl IntoView {
    let ctx = BoardContext::new(store);
    provide_context(ctx);

    // Refetch whenever the trigger moves
    Effect::new(move |_| {
        let trigger = ctx.reload_trigger.get();
        web_sys::console::log_1(&format!("[APP] Loading board, trigger={}", trigger).into());
        ctx.load();
    });

    let total = move || ctx.machine.with(|m| m.board().len());

    view! {
        <div class="app-layout">
            <header class="board-header">
                <h1>"Opportunities"</h1>
                <span class="board-count">{move || format!("{} opportunities", total())}</span>
                <ColumnMenu />
            </header>

            {move || store.load_error().get().map(|e| view! {
                <div class="board-error" role="alert">
                    <span>{format!("Failed to load opportunities: {}", e)}</span>
                    <button on:click=move |_| ctx.reload()>"Retry"</button>
                </div>
            })}

            <PipelineBoard />
            <CloseReasonModal />
            <ToastList />

            <div class="sr-only" aria-live="polite" aria-atomic="true">
                {move || store.announcement().get()}
            </div>
        </div>
    }
}
