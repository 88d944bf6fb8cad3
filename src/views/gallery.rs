use super::format_date;
use crate::services::grouping::Grouping;
use std::fmt::Write;

/// One section per group. `resolve_url` turns stored urls into links.
pub fn render_gallery(groups: &Grouping<'_>, resolve_url: impl Fn(&str) -> String) -> String {
    let mut out = String::new();
    for group in groups {
        let _ = writeln!(out, "== {} ({}) ==", group.label, group.items.len());
        for item in group.items {
            let title = match item.display_title() {
                "" => "(untitled)",
                title => title,
            };
            let _ = writeln!(
                out,
                "  {:<30} {:<6} {:<13} {:>5} downloads  {}",
                title,
                item.media_type,
                format_date(item.created_at),
                item.download_count,
                resolve_url(&item.url)
            );
        }
        out.push('\n');
    }
    if out.is_empty() {
        out.push_str("No media found.\n");
    }
    out
}
