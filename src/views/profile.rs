use super::format_date;
use crate::models::ProfileSummary;
use std::fmt::Write;

pub fn render_profile(profile: &ProfileSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Name:     {}",
        profile.display_name.as_deref().unwrap_or("N/A")
    );
    let _ = writeln!(out, "Email:    {}", profile.email);
    if let Some(ref photo) = profile.photo_url {
        let _ = writeln!(out, "Photo:    {}", photo);
    }
    let _ = writeln!(out, "Joined:   {}", format_date(profile.joined));
    let uploads = match profile.upload_count {
        Some(count) => count.to_string(),
        None => "unavailable".to_string(),
    };
    let _ = writeln!(out, "Uploads:  {}", uploads);
    out
}
