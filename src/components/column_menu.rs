//! Column Menu Component
//!
//! Show/hide individual stage columns, collapse or expand all, or reset.

use leptos::prelude::*;

use pipeline_core::domain::{Stage, StageRegistry};

use crate::context::use_board;
use crate::store::UiStateStoreFields;

#[component]
pub fn ColumnMenu() -> impl IntoView {
    let ctx = use_board();
    let store = ctx.store;
    let open = move || store.menu_open().get();
    let degraded = move || ctx.preferences.with(|p| p.is_degraded());
    let open_only = move || store.stage_filter().with(|f| f.is_some());
    let toggle_open_only = move |_| {
        store.stage_filter().update(|f| {
            *f = if f.is_some() {
                None
            } else {
                Some(StageRegistry::default_filter_stages())
            };
        })
    };

    view! {
        <div class="column-menu">
            <button
                class="column-menu-btn"
                aria-expanded=move || open().to_string()
                on:click=move |_| store.menu_open().update(|v| *v = !*v)
            >
                "Columns"
            </button>
            <Show when=open>
                <div class="column-menu-panel" role="menu">
                    {Stage::ALL
                        .into_iter()
                        .map(|stage| {
                            let visible = move || ctx.preferences.with(|p| p.is_visible(stage));
                            let count = move || ctx.machine.with(|m| m.board().column(stage).len());
                            view! {
                                <label class="column-menu-item">
                                    <input
                                        type="checkbox"
                                        prop:checked=visible
                                        on:change=move |_| ctx.preferences.update(|p| p.toggle_visibility(stage))
                                    />
                                    {move || format!("{} ({})", stage.label(), count())}
                                </label>
                            }
                        })
                        .collect_view()}
                    <label class="column-menu-item filter">
                        <input type="checkbox" prop:checked=open_only on:change=toggle_open_only />
                        "Open stages only"
                    </label>
                    <div class="column-menu-actions">
                        <button on:click=move |_| ctx.preferences.update(|p| p.collapse_all())>"Collapse all"</button>
                        <button on:click=move |_| ctx.preferences.update(|p| p.expand_all())>"Expand all"</button>
                        <button on:click=move |_| ctx.preferences.update(|p| p.reset())>"Reset"</button>
                    </div>
                    <Show when=degraded>
                        <p class="column-menu-note">"Column settings will not be saved on this device."</p>
                    </Show>
                </div>
            </Show>
        </div>
    }
}
