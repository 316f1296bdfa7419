//! Opportunity Card Component
//!
//! A draggable card. The body is picked from a renderer registry so closed,
//! urgent and ordinary cards each get their own treatment.

use chrono::Local;
use leptos::prelude::*;

use pipeline_core::domain::{classify_opportunity, Opportunity, Stage};
use pipeline_core::render::{has_close_reason, is_urgent, is_warning, CardContext, RendererRegistry};
use pipeline_dragdrop::{make_on_mousedown, DndSignals};

use crate::context::use_board;

type CardRenderer = fn(&CardContext) -> AnyView;

fn card_renderers() -> RendererRegistry<CardContext, CardRenderer> {
    RendererRegistry::new()
        .register("close_reason", has_close_reason, render_close_reason as CardRenderer)
        .register("urgent", is_urgent, render_attention as CardRenderer)
        .register("warning", is_warning, render_attention as CardRenderer)
        .fallback(render_plain as CardRenderer)
}

fn render_close_reason(ctx: &CardContext) -> AnyView {
    let reason = ctx.opportunity.close_reason().map(|r| r.label()).unwrap_or_default();
    let notes = ctx.opportunity.close_reason_notes.clone();
    view! {
        <div class="card-body card-closed">
            <span class="reason-badge">{reason}</span>
            {notes.map(|n| view! { <p class="reason-notes">{n}</p> })}
        </div>
    }
    .into_any()
}

fn render_attention(ctx: &CardContext) -> AnyView {
    let health = ctx.health.as_str();
    let detail = match ctx.opportunity.estimated_close_date {
        Some(date) => format!("{} days in stage · close {}", ctx.opportunity.days_in_stage, date),
        None => format!("{} days in stage", ctx.opportunity.days_in_stage),
    };
    view! {
        <div class=format!("card-body card-{}", health)>
            <span class=format!("health-badge health-{}", health)>{health}</span>
            <span class="card-detail">{detail}</span>
        </div>
    }
    .into_any()
}

fn render_plain(ctx: &CardContext) -> AnyView {
    let days = ctx.opportunity.days_in_stage;
    view! {
        <div class="card-body">
            <span class="card-detail">{format!("{} days in stage", days)}</span>
        </div>
    }
    .into_any()
}

#[component]
pub fn OpportunityCard(opportunity: Opportunity) -> impl IntoView {
    let ctx = use_board();
    let dnd = expect_context::<DndSignals>();
    let id = opportunity.id;
    let stage = opportunity.stage;

    let health = classify_opportunity(&opportunity, Local::now().date_naive());
    let card_ctx = CardContext {
        opportunity: opportunity.clone(),
        health,
    };
    let body = card_renderers().resolve(&card_ctx).map(|render| render(&card_ctx));

    let on_mousedown = make_on_mousedown(dnd, id);
    let is_dragging = move || dnd.dragging_id_read.get() == Some(id);
    let (expanded, set_expanded) = signal(false);

    let card_class = move || {
        let mut c = format!("opportunity-card health-{}", health.as_str());
        if is_dragging() { c.push_str(" dragging"); }
        c
    };
    let card_style = move || {
        if is_dragging() {
            let (dx, dy) = dnd.offset_read.get();
            format!("transform: translate({}px, {}px);", dx, dy)
        } else {
            String::new()
        }
    };

    let on_click = move |_| {
        // Swallow the click that ends a drag
        if dnd.drag_just_ended_read.get_untracked() {
            return;
        }
        set_expanded.update(|v| *v = !*v);
    };

    let contact_count = opportunity.contact_ids.len();
    let priority = format!("{:?}", opportunity.priority).to_lowercase();

    view! {
        <article
            class=card_class
            style=card_style
            tabindex="0"
            aria-roledescription="draggable opportunity"
            data-draggable-id=id.to_string()
            data-droppable-id=id.to_string()
            on:mousedown=on_mousedown
            on:click=on_click
        >
            <h3 class="card-title">{opportunity.name.clone()}</h3>
            {body}

            <Show when=move || expanded.get()>
                <dl class="card-meta">
                    <dt>"Priority"</dt>
                    <dd>{priority.clone()}</dd>
                    <dt>"Contacts"</dt>
                    <dd>{contact_count}</dd>
                </dl>
            </Show>

            <Show when=move || !stage.is_terminal()>
                <div class="card-actions">
                    <button
                        class="card-action won"
                        title="Mark as won"
                        on:click=move |ev| {
                            ev.stop_propagation();
                            ctx.begin_direct_close(id, Stage::ClosedWon);
                        }
                    >
                        "Won"
                    </button>
                    <button
                        class="card-action lost"
                        title="Mark as lost"
                        on:click=move |ev| {
                            ev.stop_propagation();
                            ctx.begin_direct_close(id, Stage::ClosedLost);
                        }
                    >
                        "Lost"
                    </button>
                </div>
            </Show>
        </article>
    }
}
