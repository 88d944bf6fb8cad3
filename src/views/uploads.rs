use crate::services::backend::MediaBackend;
use crate::services::media_list::MediaListStore;
use std::fmt::Write;

pub fn render_uploads<B: MediaBackend>(store: &MediaListStore<B>) -> String {
    if store.is_loading() {
        return "Loading...\n".to_string();
    }
    if store.is_empty() {
        return "No uploads found.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<26} {:<30} {:<6} {:<8} {:<10}",
        "ID", "TITLE", "TYPE", "VISIBLE", "STATE"
    );
    let _ = writeln!(out, "{}", "-".repeat(84));
    for item in store.items() {
        let state = store.item_state(&item.id);
        let status = match (state.is_editing(), state.is_updating()) {
            (true, true) => "editing, updating",
            (true, false) => "editing",
            (false, true) => "updating",
            (false, false) => "",
        };
        let _ = writeln!(
            out,
            "{:<26} {:<30} {:<6} {:<8} {:<10}",
            item.id,
            item.display_title(),
            item.media_type,
            if item.is_private { "private" } else { "public" },
            status
        );
    }
    out
}
