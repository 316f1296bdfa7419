//! Pipeline Board Component
//!
//! Wires the drag-and-drop layer to the board machine and renders the
//! visible columns in stage order.

use leptos::prelude::*;

use pipeline_core::board::BoardEvent;
use pipeline_core::domain::Stage;
use pipeline_dragdrop::{bind_global_handlers, create_dnd_signals, DndCallbacks};

use crate::components::BoardColumn;
use crate::context::use_board;
use crate::store::UiStateStoreFields;

#[component]
pub fn PipelineBoard() -> impl IntoView {
    let ctx = use_board();
    let dnd = create_dnd_signals();
    provide_context(dnd);

    let column_ids: Vec<String> = Stage::ALL.iter().map(|s| s.as_str().to_string()).collect();
    let distance = ctx.store.config().get_untracked().drag_activation_distance as i32;

    bind_global_handlers(
        dnd,
        distance,
        column_ids,
        DndCallbacks {
            on_start: Callback::new(move |id: u32| ctx.dispatch(BoardEvent::DragStart(id))),
            on_over: Callback::new(move |over: Option<String>| ctx.dispatch(BoardEvent::DragOver(over))),
            on_drop: Callback::new(move |(active, over): (u32, Option<String>)| {
                ctx.dispatch(BoardEvent::Drop { active, over })
            }),
            on_cancel: Callback::new(move |_| ctx.dispatch(BoardEvent::DragCancel)),
        },
    );

    let columns = move || {
        let filter = ctx.store.stage_filter().get();
        ctx.preferences.with(|p| p.visible_columns(filter.as_deref()))
    };

    view! {
        <div class="pipeline-board" role="list">
            <For
                each=columns
                key=|stage| *stage
                children=move |stage| view! { <BoardColumn stage=stage /> }
            />
            <Show when=move || columns().is_empty()>
                <p class="board-empty">"All columns are hidden. Use the column menu to show them."</p>
            </Show>
        </div>
    }
}
