use super::context::Context;
use super::UploadsCommand;
use crate::models::{MediaId, MediaPatch, MediaScope, MediaType};
use crate::services::media_list::MediaListStore;
use crate::views;
use anyhow::Result;
use std::io::Write;

/// Asks on the terminal; anything but `y`/`yes` declines.
pub struct PromptConfirm;

impl crate::services::media_list::Confirm for PromptConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{} [y/N] ", prompt);
        if std::io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

pub async fn run(ctx: &Context, command: UploadsCommand) -> Result<()> {
    let user = ctx.require_user().await?;
    let store = MediaListStore::from_config(ctx.backend(Some(&user))?, &ctx.config);
    store
        .refresh(MediaScope::Mine)
        .await
        .map_err(|e| anyhow::anyhow!(e.notification("Failed to load your uploads")))?;

    match command {
        UploadsCommand::List => {
            print!("{}", views::render_uploads(&store));
        }
        UploadsCommand::Edit {
            id,
            title,
            media_type,
        } => {
            let media_type = match media_type {
                Some(t) => Some(
                    t.parse::<MediaType>()
                        .map_err(|_| anyhow::anyhow!("Invalid type '{}', expected image or video", t))?,
                ),
                None => None,
            };
            let patch = MediaPatch {
                title,
                media_type,
                is_private: None,
            };
            if patch.is_empty() {
                anyhow::bail!("Nothing to change (pass --title and/or --type)");
            }
            store
                .update(&MediaId::from(id.as_str()), patch)
                .await
                .map_err(|e| anyhow::anyhow!(e.notification("Failed to update media")))?;
            println!("Updated {}", id);
        }
        UploadsCommand::Privacy {
            id,
            private,
            public,
        } => {
            let id = MediaId::from(id.as_str());
            let result = if private || public {
                store.set_privacy(&id, private).await.map(|()| private)
            } else {
                store.toggle_privacy(&id).await
            };
            let now_private =
                result.map_err(|e| anyhow::anyhow!(e.notification("Failed to update privacy")))?;
            println!(
                "{} is now {}",
                id,
                if now_private { "private" } else { "public" }
            );
        }
        UploadsCommand::Delete { id, yes } => {
            let id = MediaId::from(id.as_str());
            let result = if yes {
                store.remove(&id, &|_: &str| true).await
            } else {
                store.remove(&id, &PromptConfirm).await
            };
            let deleted =
                result.map_err(|e| anyhow::anyhow!(e.notification("Failed to delete media")))?;
            if deleted {
                println!("Deleted {}", id);
            } else {
                println!("Kept {}", id);
            }
        }
    }
    Ok(())
}
