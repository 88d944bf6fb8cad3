use super::context::Context;
use crate::models::{MediaId, MediaScope};
use crate::services::backend::MediaBackend;
use crate::services::download::DirectorySaveTarget;
use crate::services::grouping::{group_by, GroupField};
use crate::services::media_list::MediaListStore;
use crate::views;
use anyhow::Result;
use std::path::PathBuf;

fn scope_of(mine: bool) -> MediaScope {
    if mine {
        MediaScope::Mine
    } else {
        MediaScope::Public
    }
}

pub async fn run(ctx: &Context, group: &str, mine: bool) -> Result<()> {
    let field: GroupField = group
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid group '{}', expected category or folder", group))?;

    let user = if mine {
        Some(ctx.require_user().await?)
    } else {
        ctx.saved_user().await?
    };
    let store = MediaListStore::from_config(ctx.backend(user.as_ref())?, &ctx.config);
    store
        .refresh(scope_of(mine))
        .await
        .map_err(|e| anyhow::anyhow!(e.notification("Failed to load media")))?;

    let items = store.items();
    let backend = store.backend();
    print!(
        "{}",
        views::render_gallery(&group_by(&items, field), |url| backend.asset_url(url))
    );
    Ok(())
}

pub async fn download(ctx: &Context, id: &str, dir: Option<PathBuf>, mine: bool) -> Result<()> {
    let user = if mine {
        Some(ctx.require_user().await?)
    } else {
        ctx.saved_user().await?
    };
    let store = MediaListStore::from_config(ctx.backend(user.as_ref())?, &ctx.config);
    store
        .refresh(scope_of(mine))
        .await
        .map_err(|e| anyhow::anyhow!(e.notification("Failed to load media")))?;

    let target = DirectorySaveTarget::new(dir.unwrap_or_else(|| ctx.config.download_dir()));
    let path = store
        .record_download(&MediaId::from(id), &target)
        .await
        .map_err(|e| anyhow::anyhow!(e.notification("Failed to download media")))?;

    if let Some(item) = store.get(&MediaId::from(id)) {
        println!(
            "Saved {} ({} downloads)",
            path.display(),
            item.download_count
        );
    }
    Ok(())
}
