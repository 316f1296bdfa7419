//! Close Reason Modal
//!
//! Collects a win or loss reason (and notes for "other") before an
//! opportunity may enter a closed stage. Confirm stays disabled until the
//! form validates.

use leptos::prelude::*;

use pipeline_core::board::BoardEvent;
use pipeline_core::domain::{LossReason, Stage, WinReason};
use pipeline_core::gate::{CLOSE_NOTES_MAX_LEN, FIELD_CLOSE_REASON_NOTES, FIELD_LOSS_REASON, FIELD_WIN_REASON};

use crate::context::use_board;
use crate::store::{store_close_gate, store_update_gate, GateMode, UiStateStoreFields};

/// `(value, label)` pairs for the reason select
fn reason_options(target: Stage) -> Vec<(&'static str, &'static str)> {
    match target {
        Stage::ClosedWon => WinReason::ALL.iter().map(|r| (r.as_str(), r.label())).collect(),
        Stage::ClosedLost => LossReason::ALL.iter().map(|r| (r.as_str(), r.label())).collect(),
        _ => Vec::new(),
    }
}

#[component]
pub fn CloseReasonModal() -> impl IntoView {
    let ctx = use_board();
    let store = ctx.store;
    let max_len = CLOSE_NOTES_MAX_LEN;

    // Errors show once the user has touched the form
    let (touched, set_touched) = signal(false);

    let is_open = move || store.gate().with(|g| g.is_some());
    let target = move || store.gate().with(|g| g.as_ref().map(|f| f.target()));
    let title = move || {
        store.gate().with(|g| {
            g.as_ref()
                .map(|f| format!("{}: {}", f.target().label(), f.prompt.opportunity_name))
                .unwrap_or_default()
        })
    };
    let selected = move || {
        store.gate().with(|g| {
            g.as_ref()
                .and_then(|f| match f.target() {
                    Stage::ClosedWon => f.input().win_reason.map(|r| r.as_str()),
                    Stage::ClosedLost => f.input().loss_reason.map(|r| r.as_str()),
                    _ => None,
                })
                .unwrap_or("")
                .to_string()
        })
    };
    let notes = move || {
        store.gate().with(|g| {
            g.as_ref()
                .and_then(|f| f.input().close_reason_notes.clone())
                .unwrap_or_default()
        })
    };
    let notes_required = move || store.gate().with(|g| g.as_ref().is_some_and(|f| f.notes_required()));
    let can_confirm = move || store.gate().with(|g| g.as_ref().is_some_and(|f| f.can_confirm()));
    let error_for = move |field: &'static str| {
        move || {
            if !touched.get() {
                return None;
            }
            store.gate().with(|g| {
                g.as_ref()
                    .and_then(|f| f.errors())
                    .and_then(|e| e.message_for(field).map(str::to_string))
            })
        }
    };

    let on_reason = move |ev: web_sys::Event| {
        let value = event_target_value(&ev);
        set_touched.set(true);
        store_update_gate(&store, |f| match f.target() {
            Stage::ClosedWon => f.select_win_reason(WinReason::parse(&value)),
            Stage::ClosedLost => f.select_loss_reason(LossReason::parse(&value)),
            _ => {}
        });
    };
    let on_notes = move |ev: web_sys::Event| {
        let value = event_target_value(&ev);
        set_touched.set(true);
        store_update_gate(&store, |f| f.set_notes(value));
    };

    let confirm = move || {
        let Some(form) = store.gate().get_untracked() else {
            return;
        };
        match form.submit() {
            Ok(input) => {
                set_touched.set(false);
                match store.gate_mode().get_untracked() {
                    GateMode::Drop => ctx.dispatch(BoardEvent::GateConfirm(input)),
                    GateMode::Direct => {
                        store_close_gate(&store);
                        ctx.dispatch(BoardEvent::DirectClose {
                            id: form.prompt.opportunity_id,
                            target: form.target(),
                            input,
                        });
                    }
                }
            }
            Err(_) => set_touched.set(true),
        }
    };
    let cancel = move || {
        set_touched.set(false);
        match store.gate_mode().get_untracked() {
            GateMode::Drop => ctx.dispatch(BoardEvent::GateCancel),
            GateMode::Direct => store_close_gate(&store),
        }
    };

    let reason_field = move || match target() {
        Some(Stage::ClosedLost) => FIELD_LOSS_REASON,
        _ => FIELD_WIN_REASON,
    };

    view! {
        <Show when=is_open>
            <div class="modal-backdrop">
                <div
                    class="modal close-reason-modal"
                    role="dialog"
                    aria-modal="true"
                    aria-labelledby="close-reason-title"
                    on:keydown=move |ev: web_sys::KeyboardEvent| {
                        if ev.key() == "Escape" {
                            cancel();
                        }
                    }
                >
                    <h2 id="close-reason-title">{title}</h2>

                    <label class="field">
                        <span>{move || if target() == Some(Stage::ClosedLost) { "Loss reason" } else { "Win reason" }}</span>
                        <select prop:value=selected on:change=on_reason>
                            <option value="">"Select a reason"</option>
                            {move || {
                                target()
                                    .map(reason_options)
                                    .unwrap_or_default()
                                    .into_iter()
                                    .map(|(value, label)| view! { <option value=value>{label}</option> })
                                    .collect_view()
                            }}
                        </select>
                        {move || error_for(reason_field())().map(|e| view! { <p class="field-error">{e}</p> })}
                    </label>

                    <label class="field">
                        <span>{move || if notes_required() { "Notes (required)" } else { "Notes" }}</span>
                        <textarea
                            maxlength=max_len.to_string()
                            prop:value=notes
                            on:input=on_notes
                        />
                        <span class="char-count">{move || format!("{}/{}", notes().chars().count(), max_len)}</span>
                        {move || error_for(FIELD_CLOSE_REASON_NOTES)().map(|e| view! { <p class="field-error">{e}</p> })}
                    </label>

                    <div class="modal-actions">
                        <button class="cancel-btn" on:click=move |_| cancel()>"Cancel"</button>
                        <button
                            class="confirm-btn"
                            disabled=move || !can_confirm()
                            on:click=move |_| confirm()
                        >
                            "Confirm"
                        </button>
                    </div>
                </div>
            </div>
        </Show>
    }
}
