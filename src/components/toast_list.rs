//! Toast List Component

use leptos::prelude::*;

use pipeline_core::board::NotifyLevel;

use crate::store::{store_dismiss_toast, use_ui_store, Toast, UiStateStoreFields};

fn level_class(level: NotifyLevel) -> &'static str {
    match level {
        NotifyLevel::Info => "toast info",
        NotifyLevel::Success => "toast success",
        NotifyLevel::Warning => "toast warning",
        NotifyLevel::Error => "toast error",
    }
}

#[component]
pub fn ToastList() -> impl IntoView {
    let store = use_ui_store();

    view! {
        <div class="toast-list" role="status" aria-live="polite">
            <For
                each=move || store.toasts().get()
                key=|toast: &Toast| toast.id
                children=move |toast| {
                    let id = toast.id;
                    view! {
                        <div class=level_class(toast.notification.level)>
                            <span>{toast.notification.message}</span>
                            <button
                                class="toast-close"
                                aria-label="Dismiss"
                                on:click=move |_| store_dismiss_toast(&store, id)
                            >
                                "×"
                            </button>
                        </div>
                    }
                }
            />
        </div>
    }
}
