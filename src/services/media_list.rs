//! Client-side cache of one media list and its per-item UI state.
//!
//! The server stays authoritative: the cached list is replaced wholesale on
//! refresh and patched by id only after a mutation is acknowledged. The store
//! is meant for a single task; operations take `&self` so that several of
//! them can be in flight at once, kept apart by per-id updating markers.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{MediaId, MediaItem, MediaPatch, MediaScope};
use crate::services::backend::{with_deadline, MediaBackend};
use crate::services::download::{download_filename, SaveTarget};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditMode {
    #[default]
    Viewing,
    Editing(MediaPatch),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activity {
    #[default]
    Idle,
    Updating,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemState {
    pub mode: EditMode,
    pub activity: Activity,
}

impl ItemState {
    pub fn is_editing(&self) -> bool {
        matches!(self.mode, EditMode::Editing(_))
    }

    pub fn is_updating(&self) -> bool {
        self.activity == Activity::Updating
    }

    pub fn staged(&self) -> Option<&MediaPatch> {
        match self.mode {
            EditMode::Editing(ref patch) => Some(patch),
            EditMode::Viewing => None,
        }
    }

    fn is_resting(&self) -> bool {
        *self == Self::default()
    }
}

/// Asks the user before a destructive call.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Default)]
struct StoreState {
    items: Vec<MediaItem>,
    states: HashMap<MediaId, ItemState>,
    loading: bool,
    scope: MediaScope,
}

impl StoreState {
    fn settle(&mut self, id: &MediaId) {
        if self.states.get(id).is_some_and(ItemState::is_resting) {
            self.states.remove(id);
        }
    }
}

/// Releases the updating marker of one id, however the call ends.
struct UpdatingMarker<'a> {
    state: &'a RefCell<StoreState>,
    id: MediaId,
}

impl Drop for UpdatingMarker<'_> {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        if let Some(item_state) = state.states.get_mut(&self.id) {
            item_state.activity = Activity::Idle;
        }
        state.settle(&self.id);
    }
}

struct LoadingMarker<'a>(&'a RefCell<StoreState>);

impl Drop for LoadingMarker<'_> {
    fn drop(&mut self) {
        self.0.borrow_mut().loading = false;
    }
}

pub struct MediaListStore<B> {
    backend: B,
    state: RefCell<StoreState>,
    timeout: Duration,
}

impl<B: MediaBackend> MediaListStore<B> {
    pub fn new(backend: B, timeout: Duration) -> Self {
        Self {
            backend,
            state: RefCell::new(StoreState::default()),
            timeout,
        }
    }

    pub fn from_config(backend: B, config: &Config) -> Self {
        Self::new(backend, config.backend.request_timeout())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn items(&self) -> Vec<MediaItem> {
        self.state.borrow().items.clone()
    }

    pub fn get(&self, id: &MediaId) -> Option<MediaItem> {
        self.state
            .borrow()
            .items
            .iter()
            .find(|item| &item.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().items.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Scope of the last successful refresh.
    pub fn scope(&self) -> MediaScope {
        self.state.borrow().scope
    }

    pub fn item_state(&self, id: &MediaId) -> ItemState {
        self.state
            .borrow()
            .states
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Replaces the cached list with the server's. On failure the previous
    /// list is kept.
    pub async fn refresh(&self, scope: MediaScope) -> Result<()> {
        let _loading = self.begin_loading();
        let fresh = with_deadline(self.timeout, self.backend.list_media(scope)).await?;

        let mut state = self.state.borrow_mut();
        let seen_counts: HashMap<MediaId, u64> = state
            .items
            .iter()
            .map(|item| (item.id.clone(), item.download_count))
            .collect();

        let mut ids = HashSet::with_capacity(fresh.len());
        let mut items = Vec::with_capacity(fresh.len());
        for mut item in fresh {
            if !ids.insert(item.id.clone()) {
                tracing::warn!("Duplicate media id {} in {} list, keeping the first", item.id, scope);
                continue;
            }
            if let Some(&seen) = seen_counts.get(&item.id) {
                item.download_count = item.download_count.max(seen);
            }
            items.push(item);
        }

        state.states.retain(|id, _| ids.contains(id));
        state.items = items;
        state.scope = scope;
        tracing::debug!("Refreshed {} list: {} item(s)", scope, state.items.len());
        Ok(())
    }

    /// Returns `Ok(false)` when the user declines; nothing is sent then.
    pub async fn remove(&self, id: &MediaId, confirm: &impl Confirm) -> Result<bool> {
        let item = self.get(id).ok_or_else(|| Error::NotFound(id.clone()))?;
        let _marker = self.begin_update(id)?;

        let prompt = format!("Delete \"{}\"?", item.title.as_deref().unwrap_or(id.as_str()));
        if !confirm.confirm(&prompt) {
            tracing::debug!("Delete of {} declined", id);
            return Ok(false);
        }

        if let Err(e) = with_deadline(self.timeout, self.backend.delete_media(id)).await {
            tracing::warn!("Delete of {} failed: {}", id, e);
            return Err(e);
        }

        let mut state = self.state.borrow_mut();
        state.items.retain(|item| &item.id != id);
        state.states.remove(id);
        tracing::info!("Deleted media {}", id);
        Ok(true)
    }

    pub async fn set_privacy(&self, id: &MediaId, is_private: bool) -> Result<()> {
        self.ensure_known(id)?;
        let _marker = self.begin_update(id)?;

        let patch = MediaPatch::privacy(is_private);
        if let Err(e) = with_deadline(self.timeout, self.backend.update_media(id, &patch)).await {
            tracing::warn!("Privacy update of {} failed: {}", id, e);
            return Err(e);
        }

        self.patch_item(id, &patch);
        tracing::info!(
            "Media {} is now {}",
            id,
            if is_private { "private" } else { "public" }
        );
        Ok(())
    }

    /// Flips the cached privacy flag through [`Self::set_privacy`].
    pub async fn toggle_privacy(&self, id: &MediaId) -> Result<bool> {
        let current = self
            .get(id)
            .map(|item| item.is_private)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        self.set_privacy(id, !current).await?;
        Ok(!current)
    }

    /// Stages title/type changes for `id` and enters editing. No network call.
    pub fn edit(&self, id: &MediaId, patch: MediaPatch) -> Result<()> {
        self.ensure_known(id)?;
        let patch = MediaPatch {
            is_private: None,
            ..patch
        };

        let mut state = self.state.borrow_mut();
        let item_state = state.states.entry(id.clone()).or_default();
        if let EditMode::Editing(ref mut staged) = item_state.mode {
            staged.merge(patch);
        } else {
            item_state.mode = EditMode::Editing(patch);
        }
        Ok(())
    }

    /// Enters editing with the item's current title and type staged.
    pub fn begin_edit(&self, id: &MediaId) -> Result<()> {
        let item = self.get(id).ok_or_else(|| Error::NotFound(id.clone()))?;
        let patch = MediaPatch {
            title: Some(item.title.unwrap_or_default()),
            media_type: Some(item.media_type),
            is_private: None,
        };

        let mut state = self.state.borrow_mut();
        state.states.entry(id.clone()).or_default().mode = EditMode::Editing(patch);
        Ok(())
    }

    /// Drops the staged patch. Returns whether `id` was being edited.
    pub fn cancel_edit(&self, id: &MediaId) -> bool {
        let mut state = self.state.borrow_mut();
        let was_editing = match state.states.get_mut(id) {
            Some(item_state) if item_state.is_editing() => {
                item_state.mode = EditMode::Viewing;
                true
            }
            _ => false,
        };
        state.settle(id);
        was_editing
    }

    /// Sends the staged patch. On failure editing continues with the patch
    /// intact.
    pub async fn save_edit(&self, id: &MediaId) -> Result<()> {
        self.ensure_known(id)?;
        let patch = self
            .item_state(id)
            .staged()
            .cloned()
            .ok_or_else(|| Error::invalid(format!("media {} is not being edited", id)))?;

        if patch.is_empty() {
            self.cancel_edit(id);
            return Ok(());
        }

        let _marker = self.begin_update(id)?;
        if let Err(e) = with_deadline(self.timeout, self.backend.update_media(id, &patch)).await {
            tracing::warn!("Edit of {} failed: {}", id, e);
            return Err(e);
        }

        self.patch_item(id, &patch);
        if let Some(item_state) = self.state.borrow_mut().states.get_mut(id) {
            item_state.mode = EditMode::Viewing;
        }
        tracing::info!("Saved edit of media {}", id);
        Ok(())
    }

    /// Stage and save in one step.
    pub async fn update(&self, id: &MediaId, patch: MediaPatch) -> Result<()> {
        self.edit(id, patch)?;
        self.save_edit(id).await
    }

    /// Tells the backend about the download, refreshes so the count is the
    /// server's, then fetches the bytes and hands them to `target`.
    pub async fn record_download(&self, id: &MediaId, target: &impl SaveTarget) -> Result<PathBuf> {
        let item = self.get(id).ok_or_else(|| Error::NotFound(id.clone()))?;

        with_deadline(self.timeout, self.backend.notify_download(id)).await?;

        if let Err(e) = self.refresh(self.scope()).await {
            tracing::warn!("Refresh after download of {} failed: {}", id, e);
        }

        let bytes = with_deadline(self.timeout, self.backend.fetch_file(&item.url)).await?;
        target.save(&download_filename(&item), &bytes)
    }

    fn ensure_known(&self, id: &MediaId) -> Result<()> {
        let known = self.state.borrow().items.iter().any(|item| &item.id == id);
        if known {
            Ok(())
        } else {
            Err(Error::NotFound(id.clone()))
        }
    }

    fn begin_update(&self, id: &MediaId) -> Result<UpdatingMarker<'_>> {
        let mut state = self.state.borrow_mut();
        let item_state = state.states.entry(id.clone()).or_default();
        if item_state.is_updating() {
            return Err(Error::Busy(id.clone()));
        }
        item_state.activity = Activity::Updating;
        Ok(UpdatingMarker {
            state: &self.state,
            id: id.clone(),
        })
    }

    fn begin_loading(&self) -> LoadingMarker<'_> {
        self.state.borrow_mut().loading = true;
        LoadingMarker(&self.state)
    }

    fn patch_item(&self, id: &MediaId, patch: &MediaPatch) {
        let mut state = self.state.borrow_mut();
        if let Some(item) = state.items.iter_mut().find(|item| &item.id == id) {
            item.apply(patch);
        }
    }
}
