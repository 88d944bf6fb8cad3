use super::context::Context;
use super::ProfileCommand;
use crate::models::SelectedFile;
use crate::services::media_list::MediaListStore;
use crate::services::profile::{ProfilePanel, StoragePhotoStore};
use crate::views;
use anyhow::{Context as _, Result};

pub async fn run(ctx: &Context, command: ProfileCommand) -> Result<()> {
    let auth = ctx.auth().await?;
    let user = auth.require_user().context("Not signed in. Run `snapshare login` first.")?;
    let backend = ctx.backend(Some(&user))?;
    let panel = ProfilePanel::new(&auth, MediaListStore::from_config(&backend, &ctx.config));

    match command {
        ProfileCommand::Show => {
            let profile = panel.load().await?;
            print!("{}", views::render_profile(&profile));
        }
        ProfileCommand::Rename { name } => {
            let user = panel
                .rename(&name)
                .await
                .map_err(|e| anyhow::anyhow!(e.notification("Failed to update name")))?;
            println!(
                "Display name is now {}",
                user.display_name.as_deref().unwrap_or("N/A")
            );
        }
        ProfileCommand::Photo { path } => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .with_context(|| format!("{} has no file name", path.display()))?;
            if !path.is_file() {
                anyhow::bail!("{} is not a file", path.display());
            }
            let store = StoragePhotoStore::new(
                &ctx.config.storage.endpoint,
                &ctx.config.storage.bucket,
                &user,
                ctx.config.backend.request_timeout(),
            )
            .context("Photo storage is not configured (set storage.bucket)")?;
            let user = panel
                .replace_photo(SelectedFile::from_disk(name, path), &store)
                .await
                .map_err(|e| anyhow::anyhow!(e.notification("Failed to update photo")))?;
            println!(
                "Photo updated: {}",
                user.photo_url.as_deref().unwrap_or("N/A")
            );
        }
    }
    Ok(())
}
