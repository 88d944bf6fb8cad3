use super::context::Context;
use crate::models::{DraftField, DraftKind};
use crate::services::selection::{DirectorySelection, PathSelection};
use crate::services::upload::UploadComposer;
use anyhow::Result;
use std::path::PathBuf;

pub async fn run(
    ctx: &Context,
    paths: Vec<PathBuf>,
    kind: &str,
    title: String,
    category: String,
    private: bool,
) -> Result<()> {
    let kind: DraftKind = kind
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid kind '{}', expected image, video or folder", kind))?;
    let user = ctx.require_user().await?;
    let backend = ctx.backend(Some(&user))?;

    let mut composer = UploadComposer::from_config(&ctx.config);
    composer.set_field(DraftField::Kind(kind));
    composer.set_field(DraftField::Title(title));
    composer.set_field(DraftField::Category(category));
    composer.set_field(DraftField::Private(private));

    match kind {
        DraftKind::Folder => {
            let [root] = paths.as_slice() else {
                anyhow::bail!("A folder upload takes exactly one directory");
            };
            composer.select_from(&DirectorySelection::new(root.clone()))?;
        }
        DraftKind::Image | DraftKind::Video => {
            composer.select_from(&PathSelection::new(paths))?;
        }
    }

    let count = composer.draft().files.len();
    let receipt = composer
        .submit(&backend)
        .await
        .map_err(|e| anyhow::anyhow!(e.notification("Upload failed")))?;

    println!("Uploaded {} file(s)", count);
    for item in receipt.items {
        println!("  {}  {}", item.id, item.display_title());
    }
    Ok(())
}
