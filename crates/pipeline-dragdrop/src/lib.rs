//! Pipeline DragDrop
//!
//! Mouse-driven drag-and-drop for the pipeline board.
//! A press becomes a drag only after the pointer travels past an activation
//! distance, so plain clicks still open cards. While dragging, droppables
//! marked with `data-droppable-id` are measured and run through
//! [`collision::resolve_collision`]. Escape cancels.

pub mod collision;

use leptos::prelude::*;
use wasm_bindgen::JsCast;

pub use collision::{resolve_collision, CollisionInput, Droppable, Point, Rect};

/// Attribute carrying a droppable id (column stage id or card id)
pub const DROPPABLE_ATTR: &str = "data-droppable-id";
/// Attribute carrying the id of a draggable card
pub const DRAGGABLE_ATTR: &str = "data-draggable-id";

pub const DEFAULT_ACTIVATION_DISTANCE_PX: i32 = 8;

/// DnD state signals
#[derive(Clone, Copy)]
pub struct DndSignals {
    pub dragging_id_read: ReadSignal<Option<u32>>,
    pub dragging_id_write: WriteSignal<Option<u32>>,
    /// Droppable currently under the drag, as resolved by collision detection
    pub over_id_read: ReadSignal<Option<String>>,
    pub over_id_write: WriteSignal<Option<String>>,
    pub drag_just_ended_read: ReadSignal<bool>,
    pub drag_just_ended_write: WriteSignal<bool>,
    /// Pending card id (mousedown but not yet dragging)
    pub pending_id_read: ReadSignal<Option<u32>>,
    pub pending_id_write: WriteSignal<Option<u32>>,
    pub start_x_read: ReadSignal<i32>,
    pub start_x_write: WriteSignal<i32>,
    pub start_y_read: ReadSignal<i32>,
    pub start_y_write: WriteSignal<i32>,
    /// Pointer offset from the press position while dragging
    pub offset_read: ReadSignal<(i32, i32)>,
    pub offset_write: WriteSignal<(i32, i32)>,
}

pub fn create_dnd_signals() -> DndSignals {
    let (dragging_id_read, dragging_id_write) = signal(None::<u32>);
    let (over_id_read, over_id_write) = signal(None::<String>);
    let (drag_just_ended_read, drag_just_ended_write) = signal(false);
    let (pending_id_read, pending_id_write) = signal(None::<u32>);
    let (start_x_read, start_x_write) = signal(0i32);
    let (start_y_read, start_y_write) = signal(0i32);
    let (offset_read, offset_write) = signal((0i32, 0i32));
    DndSignals {
        dragging_id_read,
        dragging_id_write,
        over_id_read,
        over_id_write,
        drag_just_ended_read,
        drag_just_ended_write,
        pending_id_read,
        pending_id_write,
        start_x_read,
        start_x_write,
        start_y_read,
        start_y_write,
        offset_read,
        offset_write,
    }
}

/// Board callbacks fired by the global handlers
#[derive(Clone)]
pub struct DndCallbacks {
    pub on_start: Callback<u32>,
    pub on_over: Callback<Option<String>>,
    pub on_drop: Callback<(u32, Option<String>)>,
    pub on_cancel: Callback<()>,
}

/// Reset drag state. `drag_just_ended` stays true briefly so the click
/// that follows a mouseup does not open the card.
pub fn end_drag(dnd: &DndSignals) {
    dnd.dragging_id_write.set(None);
    dnd.over_id_write.set(None);
    dnd.pending_id_write.set(None);
    dnd.offset_write.set((0, 0));
    dnd.drag_just_ended_write.set(true);

    if let Some(win) = web_sys::window() {
        let clear = dnd.drag_just_ended_write;
        let cb = wasm_bindgen::closure::Closure::<dyn FnMut()>::new(move || {
            clear.set(false);
        });
        let _ = win.set_timeout_with_callback_and_timeout_and_arguments_0(cb.as_ref().unchecked_ref(), 100);
        cb.forget();
    }
}

/// Mousedown handler for cards: records a pending drag and its start position
pub fn make_on_mousedown(dnd: DndSignals, card_id: u32) -> impl Fn(web_sys::MouseEvent) + Copy + 'static {
    move |ev: web_sys::MouseEvent| {
        if ev.button() != 0 {
            return;
        }
        if let Some(target) = ev.target() {
            if target.dyn_ref::<web_sys::HtmlButtonElement>().is_some()
                || target.dyn_ref::<web_sys::HtmlSelectElement>().is_some()
            {
                return;
            }
        }
        dnd.pending_id_write.set(Some(card_id));
        dnd.start_x_write.set(ev.client_x());
        dnd.start_y_write.set(ev.client_y());
    }
}

fn rect_of(el: &web_sys::Element) -> Rect {
    let r = el.get_bounding_client_rect();
    Rect::new(r.left(), r.top(), r.width(), r.height())
}

/// Measure every element carrying [`DROPPABLE_ATTR`]
pub fn measure_droppables(doc: &web_sys::Document) -> Vec<Droppable> {
    let mut out = Vec::new();
    let Ok(nodes) = doc.query_selector_all(&format!("[{}]", DROPPABLE_ATTR)) else {
        return out;
    };
    for i in 0..nodes.length() {
        let Some(el) = nodes.item(i).and_then(|n| n.dyn_into::<web_sys::Element>().ok()) else {
            continue;
        };
        if let Some(id) = el.get_attribute(DROPPABLE_ATTR) {
            out.push(Droppable::new(id, rect_of(&el)));
        }
    }
    out
}

/// Current rectangle of the dragged card, shifted by the pointer offset
fn active_rect(doc: &web_sys::Document, card_id: u32, dx: f64, dy: f64) -> Rect {
    doc.query_selector(&format!("[{}=\"{}\"]", DRAGGABLE_ATTR, card_id))
        .ok()
        .flatten()
        .map(|el| rect_of(&el).translated(dx, dy))
        .unwrap_or_default()
}

/// Resolve the droppable under the pointer for a card being dragged
pub fn detect_over(doc: &web_sys::Document, card_id: u32, pointer: Point, offset: (i32, i32), column_ids: &[String]) -> Option<String> {
    let droppables: Vec<Droppable> = measure_droppables(doc)
        .into_iter()
        .filter(|d| d.id != card_id.to_string())
        .collect();
    let input = CollisionInput {
        pointer: Some(pointer),
        active: active_rect(doc, card_id, offset.0 as f64, offset.1 as f64),
        droppables: &droppables,
    };
    resolve_collision(&input, column_ids)
}

/// Bind document-level mousemove, mouseup and Escape handlers.
///
/// `column_ids` lists the droppable ids that are columns.
pub fn bind_global_handlers(dnd: DndSignals, activation_distance: i32, column_ids: Vec<String>, callbacks: DndCallbacks) {
    use wasm_bindgen::closure::Closure;

    let Some(doc) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };

    let move_doc = doc.clone();
    let move_callbacks = callbacks.clone();
    let on_mousemove = Closure::<dyn FnMut(web_sys::MouseEvent)>::new(move |ev: web_sys::MouseEvent| {
        let Some(pending) = dnd.pending_id_read.get_untracked() else {
            return;
        };
        let dx = ev.client_x() - dnd.start_x_read.get_untracked();
        let dy = ev.client_y() - dnd.start_y_read.get_untracked();

        if dnd.dragging_id_read.get_untracked().is_none() {
            if dx.abs() <= activation_distance && dy.abs() <= activation_distance {
                return;
            }
            dnd.dragging_id_write.set(Some(pending));
            move_callbacks.on_start.run(pending);
        }

        dnd.offset_write.set((dx, dy));
        let pointer = Point::new(ev.client_x() as f64, ev.client_y() as f64);
        let over = detect_over(&move_doc, pending, pointer, (dx, dy), &column_ids);
        if over != dnd.over_id_read.get_untracked() {
            dnd.over_id_write.set(over.clone());
            move_callbacks.on_over.run(over);
        }
    });

    let up_callbacks = callbacks.clone();
    let on_mouseup = Closure::<dyn FnMut(web_sys::MouseEvent)>::new(move |_ev: web_sys::MouseEvent| {
        let dragging = dnd.dragging_id_read.get_untracked();
        let over = dnd.over_id_read.get_untracked();
        end_drag(&dnd);
        if let Some(id) = dragging {
            up_callbacks.on_drop.run((id, over));
        }
    });

    let on_keydown = Closure::<dyn FnMut(web_sys::KeyboardEvent)>::new(move |ev: web_sys::KeyboardEvent| {
        if ev.key() == "Escape" && dnd.dragging_id_read.get_untracked().is_some() {
            end_drag(&dnd);
            callbacks.on_cancel.run(());
        }
    });

    let _ = doc.add_event_listener_with_callback("mousemove", on_mousemove.as_ref().unchecked_ref());
    let _ = doc.add_event_listener_with_callback("mouseup", on_mouseup.as_ref().unchecked_ref());
    let _ = doc.add_event_listener_with_callback("keydown", on_keydown.as_ref().unchecked_ref());
    on_mousemove.forget();
    on_mouseup.forget();
    on_keydown.forget();
}
