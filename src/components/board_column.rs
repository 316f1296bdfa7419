//! Board Column Component
//!
//! One stage column: header with count and collapse toggle, then its cards.
//! The column body is a droppable keyed by the stage id.

use leptos::prelude::*;

use pipeline_core::domain::{Opportunity, Stage};
use pipeline_dragdrop::DndSignals;

use crate::components::OpportunityCard;
use crate::context::use_board;

#[component]
pub fn BoardColumn(stage: Stage) -> impl IntoView {
    let ctx = use_board();
    let dnd = expect_context::<DndSignals>();

    let cards = move || ctx.machine.with(|m| m.board().column(stage).to_vec());
    let count = move || ctx.machine.with(|m| m.board().column(stage).len());
    let collapsed = move || ctx.preferences.with(|p| p.is_collapsed(stage));

    // Highlight when the pointer is over the column or one of its cards
    let is_over = move || {
        dnd.over_id_read.get().is_some_and(|over| {
            Stage::parse(&over) == Some(stage)
                || over
                    .parse::<u32>()
                    .ok()
                    .and_then(|id| ctx.machine.with_untracked(|m| m.board().locate(id)))
                    .is_some_and(|slot| slot.stage == stage)
        })
    };

    let column_class = move || {
        let mut c = format!("board-column stage-{}", stage.as_str());
        if collapsed() { c.push_str(" collapsed"); }
        if stage.is_terminal() { c.push_str(" terminal"); }
        if is_over() { c.push_str(" drop-target"); }
        c
    };

    let toggle = move |_| ctx.preferences.update(|p| p.toggle_collapse(stage));

    view! {
        <section class=column_class role="listitem" aria-label=stage.label()>
            <header class="column-header" title=stage.info().description>
                <button
                    class="column-collapse-btn"
                    aria-expanded=move || (!collapsed()).to_string()
                    on:click=toggle
                >
                    {move || if collapsed() { "▶" } else { "▼" }}
                </button>
                <h2 class="column-title">{stage.label()}</h2>
                <span class="column-count">{count}</span>
            </header>

            <div class="column-body" data-droppable-id=stage.as_str()>
                <Show when=move || !collapsed()>
                    <For
                        each=cards
                        key=|opp: &Opportunity| {
                            (
                                opp.id,
                                opp.stage,
                                opp.days_in_stage,
                                opp.estimated_close_date,
                                opp.win_reason,
                                opp.loss_reason,
                                opp.close_reason_notes.clone(),
                                opp.name.clone(),
                            )
                        }
                        children=move |opp| view! { <OpportunityCard opportunity=opp /> }
                    />
                </Show>
            </div>
        </section>
    }
}
