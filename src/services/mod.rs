pub mod backend;
pub mod download;
pub mod grouping;
pub mod identity;
pub mod media_list;
pub mod profile;
pub mod selection;
pub mod upload;

pub use backend::{HttpBackend, MediaBackend, UploadReceipt};
pub use download::{DirectorySaveTarget, SaveTarget};
pub use grouping::{group_by, GroupField, Grouping, MediaGroup};
pub use identity::{AuthService, IdentityProvider, IdentityToolkitProvider, SessionStore};
pub use media_list::{Confirm, ItemState, MediaListStore};
pub use profile::{PhotoStore, ProfilePanel, StoragePhotoStore};
pub use selection::{DirectorySelection, FileSelectionProvider, PathSelection};
pub use upload::UploadComposer;
