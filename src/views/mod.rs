//! Plain-text renderings of the gallery, uploads and profile screens.

mod gallery;
mod profile;
mod uploads;

pub use gallery::render_gallery;
pub use profile::render_profile;
pub use uploads::render_uploads;

use chrono::{DateTime, Utc};

pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(date) => date.format("%b %d, %Y").to_string(),
        None => "Unknown date".to_string(),
    }
}
