#[cfg(test)]
mod tests {

    mod support {
        use crate::error::{Error, Result};
        use crate::models::{
            CurrentUser, FederatedCredential, MediaId, MediaItem, MediaPatch, MediaScope,
            MediaType, ProfileUpdate, SelectedFile,
        };
        use crate::services::backend::{MediaBackend, UploadReceipt};
        use crate::services::identity::IdentityProvider;
        use crate::services::profile::PhotoStore;
        use crate::services::upload::UploadRequest;
        use chrono::{TimeZone, Utc};
        use std::cell::RefCell;
        use std::collections::HashSet;
        use std::time::Duration;

        pub fn item(id: &str, title: &str, category: Option<&str>, folder: Option<&str>) -> MediaItem {
            MediaItem {
                id: MediaId::from(id),
                title: Some(title.to_string()),
                media_type: MediaType::Image,
                url: format!("/uploads/{}.jpg", id),
                category: category.map(str::to_string),
                folder: folder.map(str::to_string),
                is_private: false,
                download_count: 0,
                created_at: None,
            }
        }

        #[derive(Default)]
        pub struct FakeBackend {
            pub items: RefCell<Vec<MediaItem>>,
            pub calls: RefCell<Vec<String>>,
            pub created: RefCell<Vec<UploadRequest>>,
            pub patches: RefCell<Vec<(MediaId, MediaPatch)>>,
            failing: RefCell<HashSet<&'static str>>,
            delay: Option<Duration>,
        }

        impl FakeBackend {
            pub fn with_items(items: Vec<MediaItem>) -> Self {
                Self {
                    items: RefCell::new(items),
                    ..Default::default()
                }
            }

            pub fn with_delay(mut self, delay: Duration) -> Self {
                self.delay = Some(delay);
                self
            }

            pub fn fail(&self, op: &'static str) {
                self.failing.borrow_mut().insert(op);
            }

            pub fn heal(&self, op: &'static str) {
                self.failing.borrow_mut().remove(op);
            }

            pub fn calls_to(&self, op: &str) -> usize {
                self.calls.borrow().iter().filter(|c| *c == op).count()
            }

            async fn enter(&self, op: &'static str) -> Result<()> {
                self.calls.borrow_mut().push(op.to_string());
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                if self.failing.borrow().contains(op) {
                    return Err(Error::Server {
                        status: 500,
                        message: Some(format!("{} failed", op)),
                    });
                }
                Ok(())
            }
        }

        impl MediaBackend for FakeBackend {
            async fn list_media(&self, scope: MediaScope) -> Result<Vec<MediaItem>> {
                self.enter("list").await?;
                let items = self.items.borrow();
                Ok(match scope {
                    MediaScope::Public => items.iter().filter(|i| !i.is_private).cloned().collect(),
                    MediaScope::Mine => items.clone(),
                })
            }

            async fn create_media(&self, request: UploadRequest) -> Result<UploadReceipt> {
                self.enter("create").await?;
                let n = self.created.borrow().len() + 1;
                let created = MediaItem {
                    id: MediaId::new(format!("new-{}", n)),
                    title: request.field("title").map(str::to_string),
                    media_type: request
                        .field("type")
                        .and_then(|t| t.parse().ok())
                        .unwrap_or(MediaType::Image),
                    url: format!("/uploads/{}", request.files[0].name),
                    category: request.field("category").map(str::to_string),
                    folder: request.field("folder").map(str::to_string),
                    is_private: request.field("isPrivate") == Some("true"),
                    download_count: 0,
                    created_at: None,
                };
                self.items.borrow_mut().push(created.clone());
                self.created.borrow_mut().push(request);
                Ok(UploadReceipt {
                    items: vec![created],
                })
            }

            async fn update_media(&self, id: &MediaId, patch: &MediaPatch) -> Result<()> {
                self.enter("update").await?;
                self.patches.borrow_mut().push((id.clone(), patch.clone()));
                if let Some(item) = self.items.borrow_mut().iter_mut().find(|i| &i.id == id) {
                    item.apply(patch);
                }
                Ok(())
            }

            async fn delete_media(&self, id: &MediaId) -> Result<()> {
                self.enter("delete").await?;
                self.items.borrow_mut().retain(|i| &i.id != id);
                Ok(())
            }

            async fn notify_download(&self, id: &MediaId) -> Result<()> {
                self.enter("notify").await?;
                if let Some(item) = self.items.borrow_mut().iter_mut().find(|i| &i.id == id) {
                    item.download_count += 1;
                }
                Ok(())
            }

            async fn fetch_file(&self, url: &str) -> Result<Vec<u8>> {
                self.enter("fetch").await?;
                Ok(format!("bytes of {}", url).into_bytes())
            }

            fn asset_url(&self, url: &str) -> String {
                format!("http://fake{}", url)
            }
        }

        pub fn user() -> CurrentUser {
            CurrentUser {
                uid: "u1".to_string(),
                email: "ada@example.com".to_string(),
                display_name: Some("Ada".to_string()),
                photo_url: None,
                created_at: None,
                id_token: "token".to_string(),
                refresh_token: "refresh".to_string(),
                expires_at: Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).single(),
            }
        }

        #[derive(Default)]
        pub struct FakeIdentity {
            pub updates: RefCell<Vec<ProfileUpdate>>,
            pub fail_updates: bool,
            pub refreshes: RefCell<usize>,
            pub fail_refresh: bool,
        }

        /// Photo bucket kept in memory.
        #[derive(Default)]
        pub struct MemoryPhotoStore {
            pub stored: RefCell<Vec<String>>,
            pub failing: bool,
        }

        impl PhotoStore for MemoryPhotoStore {
            async fn store_photo(&self, file: SelectedFile) -> Result<String> {
                if self.failing {
                    return Err(Error::Network("bucket unreachable".to_string()));
                }
                self.stored.borrow_mut().push(file.name.clone());
                Ok(format!("http://photos/{}", file.name))
            }
        }

        impl IdentityProvider for FakeIdentity {
            async fn create_account(&self, email: &str, _password: &str) -> Result<CurrentUser> {
                Ok(CurrentUser {
                    email: email.to_string(),
                    display_name: None,
                    ..user()
                })
            }

            async fn sign_in(&self, email: &str, password: &str) -> Result<CurrentUser> {
                if password != "secret" {
                    return Err(Error::Identity("INVALID_PASSWORD".to_string()));
                }
                Ok(CurrentUser {
                    email: email.to_string(),
                    ..user()
                })
            }

            async fn sign_in_with_provider(&self, _credential: &FederatedCredential) -> Result<CurrentUser> {
                Ok(user())
            }

            async fn sign_out(&self, _user: &CurrentUser) -> Result<()> {
                Ok(())
            }

            async fn update_profile(&self, user: &CurrentUser, update: &ProfileUpdate) -> Result<CurrentUser> {
                self.updates.borrow_mut().push(update.clone());
                if self.fail_updates {
                    return Err(Error::Identity("TOKEN_EXPIRED".to_string()));
                }
                let mut updated = user.clone();
                if let Some(ref name) = update.display_name {
                    updated.display_name = Some(name.clone());
                }
                if let Some(ref url) = update.photo_url {
                    updated.photo_url = Some(url.clone());
                }
                Ok(updated)
            }

            async fn lookup(&self, user: &CurrentUser) -> Result<CurrentUser> {
                Ok(CurrentUser {
                    created_at: crate::services::identity::parse_millis("1700000000000"),
                    ..user.clone()
                })
            }

            async fn refresh(&self, user: &CurrentUser) -> Result<CurrentUser> {
                *self.refreshes.borrow_mut() += 1;
                if self.fail_refresh {
                    return Err(Error::Identity("TOKEN_EXPIRED".to_string()));
                }
                Ok(CurrentUser {
                    id_token: "fresh-token".to_string(),
                    expires_at: Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).single(),
                    ..user.clone()
                })
            }
        }
    }

    mod grouping_tests {
        use super::support::item;
        use crate::services::grouping::{group_by, GroupField};

        #[test]
        fn test_groups_partition_list_in_order() {
            let items = vec![
                item("1", "a", Some("Travel"), None),
                item("2", "b", None, None),
                item("3", "c", Some("Travel"), None),
                item("4", "d", Some("   "), None),
                item("5", "e", Some("Food"), None),
            ];

            let groups: Vec<_> = group_by(&items, GroupField::Category).into_iter().collect();
            let labels: Vec<&str> = groups.iter().map(|g| g.label).collect();
            assert_eq!(labels, vec!["Travel", "Uncategorized", "Food"]);

            let travel: Vec<&str> = groups[0].items.iter().map(|i| i.id.as_str()).collect();
            assert_eq!(travel, vec!["1", "3"]);
            let uncategorized: Vec<&str> = groups[1].items.iter().map(|i| i.id.as_str()).collect();
            assert_eq!(uncategorized, vec!["2", "4"]);

            let total: usize = groups.iter().map(|g| g.items.len()).sum();
            assert_eq!(total, items.len());
        }

        #[test]
        fn test_folder_fallback_label() {
            let items = vec![
                item("1", "a", None, Some("trip")),
                item("2", "b", None, None),
            ];
            let labels: Vec<&str> = group_by(&items, GroupField::Folder)
                .iter()
                .map(|g| g.label)
                .collect();
            assert_eq!(labels, vec!["trip", "Others"]);
        }

        #[test]
        fn test_grouping_is_restartable() {
            let items = vec![item("1", "a", Some("x"), None), item("2", "b", Some("y"), None)];
            let grouping = group_by(&items, GroupField::Category);
            let first: Vec<_> = grouping.iter().collect();
            let second: Vec<_> = grouping.iter().collect();
            assert_eq!(first, second);
        }

        #[test]
        fn test_empty_list_has_no_groups() {
            assert_eq!(group_by(&[], GroupField::Category).iter().count(), 0);
        }

        #[test]
        fn test_group_field_parse() {
            assert_eq!("Folder".parse::<GroupField>(), Ok(GroupField::Folder));
            assert!("tags".parse::<GroupField>().is_err());
        }
    }

    mod media_model_tests {
        use crate::models::{MediaId, MediaItem, MediaType};

        #[test]
        fn test_numeric_ids_decode_as_text() {
            let items: Vec<MediaItem> = serde_json::from_str(
                r#"[
                    {"_id": 17, "type": "image", "url": "/u/17.jpg"},
                    {"id": 18, "type": "video", "url": "/u/18.mp4"},
                    {"_id": "64f0a1", "type": "image", "url": "/u/a.jpg"}
                ]"#,
            )
            .unwrap();
            assert_eq!(items[0].id, MediaId::from("17"));
            assert_eq!(items[1].id, MediaId::from("18"));
            assert_eq!(items[1].media_type, MediaType::Video);
            assert_eq!(items[2].id, MediaId::from("64f0a1"));
        }

        #[test]
        fn test_null_counters_read_as_defaults() {
            let item: MediaItem = serde_json::from_str(
                r#"{"_id": "1", "type": "image", "url": "/u/1.jpg",
                    "downloadCount": null, "isPrivate": null}"#,
            )
            .unwrap();
            assert_eq!(item.download_count, 0);
            assert!(!item.is_private);

            let item: MediaItem = serde_json::from_str(
                r#"{"_id": "2", "type": "image", "url": "/u/2.jpg",
                    "downloadCount": 4, "isPrivate": true}"#,
            )
            .unwrap();
            assert_eq!(item.download_count, 4);
            assert!(item.is_private);
        }
    }

    mod draft_tests {
        use crate::error::Error;
        use crate::models::{DraftField, DraftKind, SelectedFile};
        use crate::services::upload::{UploadComposer, UploadEndpoint, UploadRequest};
        use std::time::Duration;

        fn composer() -> UploadComposer {
            UploadComposer::new(false, Duration::from_secs(5))
        }

        #[test]
        fn test_kind_change_clears_files() {
            let mut c = composer();
            c.select_files(vec![SelectedFile::from_bytes("cat.jpg", vec![1])])
                .unwrap();
            c.set_field(DraftField::Kind(DraftKind::Image));
            assert_eq!(c.draft().files.len(), 1);

            c.set_field(DraftField::Kind(DraftKind::Video));
            assert!(c.draft().files.is_empty());
        }

        #[test]
        fn test_single_kind_rejects_many_files() {
            let mut c = composer();
            let result = c.select_files(vec![
                SelectedFile::from_bytes("a.jpg", vec![1]),
                SelectedFile::from_bytes("b.jpg", vec![2]),
            ]);
            assert!(matches!(result, Err(Error::Invalid(_))));
            assert!(c.draft().files.is_empty());
        }

        #[test]
        fn test_folder_selection_keeps_order_and_folder() {
            let mut c = composer();
            c.set_field(DraftField::Kind(DraftKind::Folder));
            c.select_files(vec![
                SelectedFile::from_bytes("a/b.jpg", vec![1]),
                SelectedFile::from_bytes("a/c.jpg", vec![2]),
            ])
            .unwrap();

            let draft = c.draft();
            assert_eq!(draft.folder_name(), Some("a"));
            let names: Vec<&str> = draft.files.iter().map(|f| f.name.as_str()).collect();
            assert_eq!(names, vec!["b.jpg", "c.jpg"]);
        }

        #[test]
        fn test_folder_selection_rejects_mixed_roots() {
            let mut c = composer();
            c.set_field(DraftField::Kind(DraftKind::Folder));
            c.select_files(vec![SelectedFile::from_bytes("a/b.jpg", vec![1])])
                .unwrap();

            let result = c.select_files(vec![
                SelectedFile::from_bytes("a/b.jpg", vec![1]),
                SelectedFile::from_bytes("z/c.jpg", vec![2]),
            ]);
            assert!(result.is_err());
            assert_eq!(c.draft().files.len(), 1);
        }

        #[test]
        fn test_folder_selection_rejects_loose_files() {
            let mut c = composer();
            c.set_field(DraftField::Kind(DraftKind::Folder));
            assert!(c
                .select_files(vec![SelectedFile::from_bytes("b.jpg", vec![1])])
                .is_err());
        }

        #[tokio::test]
        async fn test_single_request_fields() {
            let mut c = composer();
            c.set_field(DraftField::Title("  Sunset ".to_string()));
            c.set_field(DraftField::Private(true));
            c.select_files(vec![SelectedFile::from_bytes("sunset.jpg", vec![7, 7])])
                .unwrap();

            let request = UploadRequest::from_draft(c.draft()).await.unwrap();
            assert_eq!(request.endpoint, UploadEndpoint::Single);
            assert_eq!(request.field("title"), Some("Sunset"));
            assert_eq!(request.field("type"), Some("image"));
            assert_eq!(request.field("isPrivate"), Some("true"));
            assert_eq!(request.field("category"), None);
            assert_eq!(request.files[0].mime, "image/jpeg");
            assert_eq!(request.files[0].bytes, vec![7, 7]);
        }

        #[tokio::test]
        async fn test_folder_request_fields() {
            let mut c = composer();
            c.set_field(DraftField::Kind(DraftKind::Folder));
            c.set_field(DraftField::Category("Trips".to_string()));
            c.select_files(vec![
                SelectedFile::from_bytes("a/b.jpg", vec![1]),
                SelectedFile::from_bytes("a/c.jpg", vec![2]),
            ])
            .unwrap();

            let request = UploadRequest::from_draft(c.draft()).await.unwrap();
            assert_eq!(request.endpoint, UploadEndpoint::Multi);
            assert_eq!(request.field("folder"), Some("a"));
            assert_eq!(request.field("category"), Some("Trips"));
            assert_eq!(request.field("type"), Some("image"));
            assert_eq!(request.field("relativePaths"), Some(r#"["a/b.jpg","a/c.jpg"]"#));
            assert_eq!(request.files.len(), 2);
        }

        #[tokio::test]
        async fn test_all_video_folder_is_video() {
            let mut c = composer();
            c.set_field(DraftField::Kind(DraftKind::Folder));
            c.select_files(vec![
                SelectedFile::from_bytes("clips/one.mp4", vec![1]),
                SelectedFile::from_bytes("clips/two.mp4", vec![2]),
            ])
            .unwrap();

            let request = UploadRequest::from_draft(c.draft()).await.unwrap();
            assert_eq!(request.field("type"), Some("video"));
        }
    }

    mod upload_tests {
        use super::support::FakeBackend;
        use crate::error::Error;
        use crate::models::{DraftField, SelectedFile};
        use crate::services::upload::UploadComposer;
        use std::time::Duration;

        #[tokio::test]
        async fn test_submit_without_files_never_calls_backend() {
            let backend = FakeBackend::default();
            let mut c = UploadComposer::new(false, Duration::from_secs(5));
            c.set_field(DraftField::Title("nothing".to_string()));

            let result = c.submit(&backend).await;
            assert!(matches!(result, Err(Error::NoFileSelected)));
            assert!(backend.calls.borrow().is_empty());
            assert_eq!(c.draft().title, "nothing");
        }

        #[tokio::test]
        async fn test_required_category_is_checked_locally() {
            let backend = FakeBackend::default();
            let mut c = UploadComposer::new(true, Duration::from_secs(5));
            c.select_files(vec![SelectedFile::from_bytes("a.jpg", vec![1])])
                .unwrap();

            let err = c.submit(&backend).await.unwrap_err();
            assert!(matches!(err, Error::MissingField("category")));
            assert!(err.is_validation());
            assert!(backend.calls.borrow().is_empty());
        }

        #[tokio::test]
        async fn test_successful_submit_resets_draft() {
            let backend = FakeBackend::default();
            let mut c = UploadComposer::new(false, Duration::from_secs(5));
            c.set_field(DraftField::Title("Cat".to_string()));
            c.select_files(vec![SelectedFile::from_bytes("cat.jpg", vec![1])])
                .unwrap();

            let receipt = c.submit(&backend).await.unwrap();
            assert_eq!(receipt.items.len(), 1);
            assert_eq!(receipt.items[0].title.as_deref(), Some("Cat"));
            assert!(c.draft().is_empty());
            assert_eq!(backend.calls_to("create"), 1);
        }

        #[tokio::test]
        async fn test_failed_submit_keeps_draft() {
            let backend = FakeBackend::default();
            backend.fail("create");
            let mut c = UploadComposer::new(false, Duration::from_secs(5));
            c.set_field(DraftField::Title("Cat".to_string()));
            c.select_files(vec![SelectedFile::from_bytes("cat.jpg", vec![1])])
                .unwrap();

            let err = c.submit(&backend).await.unwrap_err();
            assert_eq!(err.notification("Upload failed"), "create failed");
            assert_eq!(c.draft().title, "Cat");
            assert_eq!(c.draft().files.len(), 1);
        }
    }

    mod store_tests {
        use super::support::{item, FakeBackend};
        use crate::error::Error;
        use crate::models::{MediaId, MediaPatch, MediaScope, MediaType};
        use crate::services::download::DirectorySaveTarget;
        use crate::services::media_list::MediaListStore;
        use std::time::Duration;

        fn backend() -> FakeBackend {
            FakeBackend::with_items(vec![
                item("1", "Beach", Some("Travel"), None),
                item("2", "Lunch", Some("Food"), None),
                item("3", "Hike", None, None),
            ])
        }

        fn timeout() -> Duration {
            Duration::from_secs(5)
        }

        #[tokio::test]
        async fn test_refresh_loads_scope() {
            let backend = backend();
            backend.items.borrow_mut()[2].is_private = true;
            let store = MediaListStore::new(&backend, timeout());

            store.refresh(MediaScope::Public).await.unwrap();
            assert_eq!(store.len(), 2);

            store.refresh(MediaScope::Mine).await.unwrap();
            assert_eq!(store.len(), 3);
            assert_eq!(store.scope(), MediaScope::Mine);
            assert!(!store.is_loading());
        }

        #[tokio::test]
        async fn test_failed_refresh_keeps_list() {
            let backend = backend();
            let store = MediaListStore::new(&backend, timeout());
            store.refresh(MediaScope::Mine).await.unwrap();

            backend.fail("list");
            assert!(store.refresh(MediaScope::Mine).await.is_err());
            assert_eq!(store.len(), 3);
            assert!(!store.is_loading());
        }

        #[tokio::test]
        async fn test_privacy_only_touches_its_item() {
            let backend = backend();
            let store = MediaListStore::new(&backend, timeout());
            store.refresh(MediaScope::Mine).await.unwrap();
            let before = store.items();

            store.set_privacy(&MediaId::from("2"), true).await.unwrap();

            let after = store.items();
            assert!(after[1].is_private);
            assert_eq!(after[0], before[0]);
            assert_eq!(after[2], before[2]);
            assert_eq!(
                backend.patches.borrow()[0],
                (MediaId::from("2"), MediaPatch::privacy(true))
            );
            assert!(!store.item_state(&MediaId::from("2")).is_updating());
        }

        #[tokio::test]
        async fn test_toggle_privacy_round_trip() {
            let backend = backend();
            let store = MediaListStore::new(&backend, timeout());
            store.refresh(MediaScope::Mine).await.unwrap();
            let id = MediaId::from("1");

            assert!(store.toggle_privacy(&id).await.unwrap());
            assert!(store.get(&id).unwrap().is_private);
            assert!(!store.toggle_privacy(&id).await.unwrap());
            assert!(!store.get(&id).unwrap().is_private);
        }

        #[tokio::test]
        async fn test_failed_privacy_update_changes_nothing() {
            let backend = backend();
            let store = MediaListStore::new(&backend, timeout());
            store.refresh(MediaScope::Mine).await.unwrap();
            backend.fail("update");

            let err = store.set_privacy(&MediaId::from("1"), true).await.unwrap_err();
            assert_eq!(err.notification("Failed to update privacy"), "update failed");
            assert!(!store.get(&MediaId::from("1")).unwrap().is_private);
            assert!(!store.item_state(&MediaId::from("1")).is_updating());
        }

        #[tokio::test]
        async fn test_remove_success_and_failure() {
            let backend = backend();
            let store = MediaListStore::new(&backend, timeout());
            store.refresh(MediaScope::Mine).await.unwrap();

            assert!(store.remove(&MediaId::from("1"), &|_: &str| true).await.unwrap());
            assert_eq!(store.len(), 2);
            assert!(store.get(&MediaId::from("1")).is_none());

            backend.fail("delete");
            assert!(store.remove(&MediaId::from("2"), &|_: &str| true).await.is_err());
            assert_eq!(store.len(), 2);
        }

        #[tokio::test]
        async fn test_declined_remove_sends_nothing() {
            let backend = backend();
            let store = MediaListStore::new(&backend, timeout());
            store.refresh(MediaScope::Mine).await.unwrap();

            let removed = store
                .remove(&MediaId::from("1"), &|prompt: &str| {
                    assert!(prompt.contains("Beach"));
                    false
                })
                .await
                .unwrap();
            assert!(!removed);
            assert_eq!(backend.calls_to("delete"), 0);
            assert_eq!(store.len(), 3);
        }

        #[tokio::test]
        async fn test_remove_unknown_id() {
            let backend = backend();
            let store = MediaListStore::new(&backend, timeout());
            store.refresh(MediaScope::Mine).await.unwrap();
            let result = store.remove(&MediaId::from("nope"), &|_: &str| true).await;
            assert!(matches!(result, Err(Error::NotFound(_))));
        }

        #[tokio::test]
        async fn test_edit_then_cancel() {
            let backend = backend();
            let store = MediaListStore::new(&backend, timeout());
            store.refresh(MediaScope::Mine).await.unwrap();
            let id = MediaId::from("1");

            store.begin_edit(&id).unwrap();
            store.edit(&id, MediaPatch::title("Shore")).unwrap();
            assert_eq!(
                store.item_state(&id).staged().and_then(|p| p.title.as_deref()),
                Some("Shore")
            );

            assert!(store.cancel_edit(&id));
            assert!(!store.item_state(&id).is_editing());
            assert_eq!(store.get(&id).unwrap().title.as_deref(), Some("Beach"));
            assert_eq!(backend.calls_to("update"), 0);
        }

        #[tokio::test]
        async fn test_save_edit_applies_patch() {
            let backend = backend();
            let store = MediaListStore::new(&backend, timeout());
            store.refresh(MediaScope::Mine).await.unwrap();
            let id = MediaId::from("3");

            store
                .update(&id, MediaPatch {
                    title: Some("Summit".to_string()),
                    media_type: Some(MediaType::Video),
                    is_private: Some(true),
                })
                .await
                .unwrap();

            let updated = store.get(&id).unwrap();
            assert_eq!(updated.title.as_deref(), Some("Summit"));
            assert_eq!(updated.media_type, MediaType::Video);
            // privacy goes through set_privacy only
            assert!(!updated.is_private);
            assert!(!store.item_state(&id).is_editing());
        }

        #[tokio::test]
        async fn test_failed_save_stays_editing() {
            let backend = backend();
            let store = MediaListStore::new(&backend, timeout());
            store.refresh(MediaScope::Mine).await.unwrap();
            let id = MediaId::from("1");
            backend.fail("update");

            store.edit(&id, MediaPatch::title("Shore")).unwrap();
            assert!(store.save_edit(&id).await.is_err());

            let state = store.item_state(&id);
            assert!(state.is_editing());
            assert!(!state.is_updating());
            assert_eq!(state.staged(), Some(&MediaPatch::title("Shore")));
            assert_eq!(store.get(&id).unwrap().title.as_deref(), Some("Beach"));

            backend.heal("update");
            store.save_edit(&id).await.unwrap();
            assert_eq!(store.get(&id).unwrap().title.as_deref(), Some("Shore"));
        }

        #[tokio::test]
        async fn test_second_mutation_on_same_id_is_busy() {
            let backend = backend().with_delay(Duration::from_millis(30));
            let store = MediaListStore::new(&backend, timeout());
            store.refresh(MediaScope::Mine).await.unwrap();
            let id = MediaId::from("1");
            let other = MediaId::from("2");

            let (first, second, third) = tokio::join!(
                store.set_privacy(&id, true),
                store.set_privacy(&id, false),
                store.set_privacy(&other, true),
            );
            assert!(first.is_ok());
            assert!(matches!(second, Err(Error::Busy(_))));
            assert!(third.is_ok());
            assert!(store.get(&id).unwrap().is_private);
            assert!(store.get(&other).unwrap().is_private);
            assert!(!store.item_state(&id).is_updating());
        }

        #[tokio::test]
        async fn test_slow_backend_times_out() {
            let backend = backend();
            let store = MediaListStore::new(&backend, timeout());
            store.refresh(MediaScope::Mine).await.unwrap();

            let slow = FakeBackend::with_items(backend.items.borrow().clone())
                .with_delay(Duration::from_millis(200));
            let store = MediaListStore::new(&slow, Duration::from_millis(20));
            let result = store.refresh(MediaScope::Mine).await;
            assert!(matches!(result, Err(Error::Timeout(_))));
            assert!(!store.is_loading());
        }

        #[tokio::test]
        async fn test_download_saves_title_named_file() {
            let backend = backend();
            let store = MediaListStore::new(&backend, timeout());
            store.refresh(MediaScope::Public).await.unwrap();
            let dir = tempfile::tempdir().unwrap();
            let target = DirectorySaveTarget::new(dir.path());

            let path = store
                .record_download(&MediaId::from("1"), &target)
                .await
                .unwrap();

            assert_eq!(path, dir.path().join("Beach.jpg"));
            assert_eq!(
                std::fs::read(&path).unwrap(),
                b"bytes of /uploads/1.jpg".to_vec()
            );
            assert_eq!(store.get(&MediaId::from("1")).unwrap().download_count, 1);
            assert_eq!(
                backend.calls.borrow().as_slice(),
                ["list", "notify", "list", "fetch"]
            );
        }

        #[tokio::test]
        async fn test_download_survives_failed_refresh() {
            let backend = backend();
            let store = MediaListStore::new(&backend, timeout());
            store.refresh(MediaScope::Public).await.unwrap();
            backend.fail("list");
            let dir = tempfile::tempdir().unwrap();

            let path = store
                .record_download(&MediaId::from("2"), &DirectorySaveTarget::new(dir.path()))
                .await
                .unwrap();
            assert!(path.ends_with("Lunch.jpg"));
        }

        #[tokio::test]
        async fn test_download_counts_never_go_backwards() {
            let backend = backend();
            backend.items.borrow_mut()[0].download_count = 5;
            let store = MediaListStore::new(&backend, timeout());
            store.refresh(MediaScope::Mine).await.unwrap();

            backend.items.borrow_mut()[0].download_count = 3;
            store.refresh(MediaScope::Mine).await.unwrap();
            assert_eq!(store.get(&MediaId::from("1")).unwrap().download_count, 5);
        }

        #[tokio::test]
        async fn test_refresh_drops_duplicate_ids() {
            let backend = backend();
            backend.items.borrow_mut().push(item("1", "Copy", None, None));
            let store = MediaListStore::new(&backend, timeout());
            store.refresh(MediaScope::Mine).await.unwrap();

            assert_eq!(store.len(), 3);
            assert_eq!(store.get(&MediaId::from("1")).unwrap().title.as_deref(), Some("Beach"));
        }
    }

    mod profile_tests {
        use super::support::{item, user, FakeBackend, FakeIdentity, MemoryPhotoStore};
        use crate::error::Error;
        use crate::models::SelectedFile;
        use crate::services::identity::{AuthService, SessionStore};
        use crate::services::media_list::MediaListStore;
        use crate::services::profile::{ProfilePanel, StoragePhotoStore};
        use std::time::Duration;

        fn signed_in(identity: FakeIdentity) -> AuthService<FakeIdentity> {
            let auth = AuthService::new(identity, SessionStore::new());
            auth.session().publish(user());
            auth
        }

        #[tokio::test]
        async fn test_load_requires_user() {
            let auth = AuthService::new(FakeIdentity::default(), SessionStore::new());
            let backend = FakeBackend::default();
            let panel = ProfilePanel::new(&auth, MediaListStore::new(&backend, Duration::from_secs(5)));
            assert!(matches!(panel.load().await, Err(Error::NotSignedIn)));
        }

        #[tokio::test]
        async fn test_load_counts_uploads() {
            let auth = signed_in(FakeIdentity::default());
            let backend = FakeBackend::with_items(vec![
                item("1", "a", None, None),
                item("2", "b", None, None),
            ]);
            let panel = ProfilePanel::new(&auth, MediaListStore::new(&backend, Duration::from_secs(5)));

            let profile = panel.load().await.unwrap();
            assert_eq!(profile.email, "ada@example.com");
            assert_eq!(profile.display_name.as_deref(), Some("Ada"));
            assert_eq!(profile.upload_count, Some(2));
        }

        #[tokio::test]
        async fn test_load_survives_count_failure() {
            let auth = signed_in(FakeIdentity::default());
            let backend = FakeBackend::default();
            backend.fail("list");
            let panel = ProfilePanel::new(&auth, MediaListStore::new(&backend, Duration::from_secs(5)));

            let profile = panel.load().await.unwrap();
            assert_eq!(profile.upload_count, None);
        }

        #[tokio::test]
        async fn test_rename_rejects_empty_name() {
            let auth = signed_in(FakeIdentity::default());
            let backend = FakeBackend::default();
            let panel = ProfilePanel::new(&auth, MediaListStore::new(&backend, Duration::from_secs(5)));

            let err = panel.rename("   ").await.unwrap_err();
            assert_eq!(err.to_string(), "Name cannot be empty");
            assert!(auth.provider().updates.borrow().is_empty());
        }

        #[tokio::test]
        async fn test_rename_publishes_user() {
            let auth = signed_in(FakeIdentity::default());
            let mut subscription = auth.session().subscribe();
            let backend = FakeBackend::default();
            let panel = ProfilePanel::new(&auth, MediaListStore::new(&backend, Duration::from_secs(5)));

            panel.rename("  Grace ").await.unwrap();

            let seen = subscription.changed().await.flatten().unwrap();
            assert_eq!(seen.display_name.as_deref(), Some("Grace"));
            assert_eq!(auth.current().unwrap().display_name.as_deref(), Some("Grace"));
        }

        #[tokio::test]
        async fn test_failed_rename_keeps_user() {
            let auth = signed_in(FakeIdentity {
                fail_updates: true,
                ..Default::default()
            });
            let backend = FakeBackend::default();
            let panel = ProfilePanel::new(&auth, MediaListStore::new(&backend, Duration::from_secs(5)));

            let err = panel.rename("Grace").await.unwrap_err();
            assert_eq!(err.notification("Failed to update name"), "TOKEN_EXPIRED");
            assert_eq!(auth.current().unwrap().display_name.as_deref(), Some("Ada"));
        }

        #[tokio::test]
        async fn test_photo_change_leaves_upload_count() {
            let auth = signed_in(FakeIdentity::default());
            let backend = FakeBackend::with_items(vec![item("1", "a", None, None)]);
            let panel = ProfilePanel::new(&auth, MediaListStore::new(&backend, Duration::from_secs(5)));
            let store = MemoryPhotoStore::default();

            assert_eq!(panel.load().await.unwrap().upload_count, Some(1));
            let user = panel
                .replace_photo(SelectedFile::from_bytes("me.png", vec![1, 2]), &store)
                .await
                .unwrap();

            assert_eq!(user.photo_url.as_deref(), Some("http://photos/me.png"));
            assert_eq!(*store.stored.borrow(), vec!["me.png".to_string()]);
            assert_eq!(backend.calls_to("create"), 0);
            assert_eq!(panel.load().await.unwrap().upload_count, Some(1));
            assert_eq!(
                auth.current().unwrap().photo_url.as_deref(),
                Some("http://photos/me.png")
            );
        }

        #[tokio::test]
        async fn test_failed_photo_upload_keeps_profile() {
            let auth = signed_in(FakeIdentity::default());
            let backend = FakeBackend::default();
            let panel = ProfilePanel::new(&auth, MediaListStore::new(&backend, Duration::from_secs(5)));
            let store = MemoryPhotoStore {
                failing: true,
                ..Default::default()
            };

            let err = panel
                .replace_photo(SelectedFile::from_bytes("me.png", vec![1]), &store)
                .await
                .unwrap_err();
            assert_eq!(err.notification("Failed to update photo"), "Failed to update photo");
            assert!(auth.provider().updates.borrow().is_empty());
            assert_eq!(auth.current().unwrap().photo_url, None);
        }

        #[test]
        fn test_storage_store_needs_bucket() {
            let err = StoragePhotoStore::new(
                "https://storage.example.com",
                "",
                &user(),
                Duration::from_secs(5),
            )
            .unwrap_err();
            assert!(matches!(err, Error::MissingField("storage.bucket")));
        }

        #[tokio::test]
        async fn test_storage_store_rejects_non_images() {
            use crate::services::profile::PhotoStore;

            let store = StoragePhotoStore::new(
                "http://127.0.0.1:9",
                "bucket",
                &user(),
                Duration::from_secs(5),
            )
            .unwrap();
            let err = store
                .store_photo(SelectedFile::from_bytes("notes.txt", b"hi".to_vec()))
                .await
                .unwrap_err();
            assert!(err.is_validation());
        }
    }

    mod session_tests {
        use super::support::{user, FakeIdentity};
        use crate::error::Error;
        use crate::services::identity::{AuthService, SessionStore};

        #[tokio::test]
        async fn test_subscribe_and_unsubscribe() {
            let session = SessionStore::new();
            let mut subscription = session.subscribe();
            assert_eq!(session.subscriber_count(), 1);
            assert_eq!(subscription.current(), None);

            session.publish(user());
            assert_eq!(subscription.changed().await, Some(Some(user())));

            session.clear();
            assert_eq!(subscription.changed().await, Some(None));

            subscription.unsubscribe();
            assert_eq!(session.subscriber_count(), 0);
        }

        #[tokio::test]
        async fn test_sign_in_fills_join_date() {
            let auth = AuthService::new(FakeIdentity::default(), SessionStore::new());
            let signed = auth.sign_in("ada@example.com", "secret").await.unwrap();
            assert!(signed.created_at.is_some());
            assert_eq!(auth.current(), Some(signed));
        }

        #[tokio::test]
        async fn test_bad_password_keeps_session_empty() {
            let auth = AuthService::new(FakeIdentity::default(), SessionStore::new());
            let err = auth.sign_in("ada@example.com", "nope").await.unwrap_err();
            assert!(matches!(err, Error::Identity(ref m) if m == "INVALID_PASSWORD"));
            assert_eq!(auth.current(), None);
        }

        #[tokio::test]
        async fn test_session_persists_between_services() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("session.json");

            let auth = AuthService::new(FakeIdentity::default(), SessionStore::new())
                .persist_to(path.clone());
            auth.sign_in("ada@example.com", "secret").await.unwrap();
            assert!(path.exists());

            let restored = AuthService::new(FakeIdentity::default(), SessionStore::new())
                .persist_to(path.clone());
            let user = restored.restore().await.unwrap().unwrap();
            assert_eq!(user.email, "ada@example.com");
            assert_eq!(restored.current(), Some(user));

            restored.sign_out().await.unwrap();
            assert!(!path.exists());
            assert_eq!(restored.current(), None);
        }

        fn write_session(path: &std::path::Path, user: &crate::models::CurrentUser) {
            std::fs::write(path, serde_json::to_string(user).unwrap()).unwrap();
        }

        #[tokio::test]
        async fn test_restore_refreshes_stale_token() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("session.json");
            let stale = crate::models::CurrentUser {
                expires_at: Some(chrono::Utc::now() - chrono::Duration::minutes(5)),
                ..user()
            };
            write_session(&path, &stale);

            let auth = AuthService::new(FakeIdentity::default(), SessionStore::new())
                .persist_to(path.clone());
            let restored = auth.restore().await.unwrap().unwrap();

            assert_eq!(*auth.provider().refreshes.borrow(), 1);
            assert_eq!(restored.id_token, "fresh-token");
            assert_eq!(auth.current().unwrap().id_token, "fresh-token");
            let saved = crate::services::identity::load_session(&path).unwrap().unwrap();
            assert_eq!(saved.id_token, "fresh-token");
            assert!(!saved.token_is_stale(chrono::Utc::now()));
        }

        #[tokio::test]
        async fn test_restore_keeps_fresh_token() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("session.json");
            write_session(&path, &user());

            let auth = AuthService::new(FakeIdentity::default(), SessionStore::new())
                .persist_to(path);
            let restored = auth.restore().await.unwrap().unwrap();

            assert_eq!(*auth.provider().refreshes.borrow(), 0);
            assert_eq!(restored.id_token, "token");
        }

        #[tokio::test]
        async fn test_failed_refresh_publishes_saved_user() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("session.json");
            let stale = crate::models::CurrentUser {
                expires_at: None,
                ..user()
            };
            write_session(&path, &stale);

            let auth = AuthService::new(
                FakeIdentity {
                    fail_refresh: true,
                    ..Default::default()
                },
                SessionStore::new(),
            )
            .persist_to(path);
            let restored = auth.restore().await.unwrap().unwrap();

            assert_eq!(*auth.provider().refreshes.borrow(), 1);
            assert_eq!(restored, stale);
            assert_eq!(auth.current(), Some(stale));
        }
    }

    mod error_tests {
        use crate::error::Error;
        use std::time::Duration;

        #[test]
        fn test_notification_prefers_server_message() {
            let err = Error::Server {
                status: 400,
                message: Some("Title too long".to_string()),
            };
            assert_eq!(err.notification("Failed"), "Title too long");
        }

        #[test]
        fn test_notification_falls_back_to_generic() {
            let err = Error::Server {
                status: 500,
                message: None,
            };
            assert_eq!(err.notification("Failed to delete media"), "Failed to delete media");
            assert_eq!(
                Error::Timeout(Duration::from_secs(3)).notification("Failed"),
                "Failed"
            );
            assert_eq!(Error::NoFileSelected.notification("Failed"), "No file selected");
        }

        #[test]
        fn test_server_message_extraction() {
            use crate::services::backend::server_message;
            assert_eq!(server_message(r#"{"message":"nope"}"#), Some("nope".to_string()));
            assert_eq!(server_message(r#"{"error":"bad"}"#), Some("bad".to_string()));
            assert_eq!(server_message("Not allowed"), Some("Not allowed".to_string()));
            assert_eq!(server_message("<html></html>"), None);
            assert_eq!(server_message(""), None);
        }
    }

    mod view_tests {
        use super::support::item;
        use crate::models::ProfileSummary;
        use crate::services::grouping::{group_by, GroupField};
        use crate::views::{format_date, render_gallery, render_profile};
        use chrono::{TimeZone, Utc};

        #[test]
        fn test_format_date() {
            assert_eq!(format_date(None), "Unknown date");
            let date = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
            assert_eq!(format_date(Some(date)), "Mar 05, 2024");
        }

        #[test]
        fn test_gallery_sections() {
            let items = vec![item("1", "Beach", Some("Travel"), None), item("2", "Soup", None, None)];
            let text = render_gallery(&group_by(&items, GroupField::Category), |u| {
                format!("http://host{}", u)
            });
            assert!(text.contains("== Travel (1) =="));
            assert!(text.contains("== Uncategorized (1) =="));
            assert!(text.contains("http://host/uploads/1.jpg"));
            assert!(text.contains("Unknown date"));
        }

        #[test]
        fn test_profile_without_name() {
            let text = render_profile(&ProfileSummary {
                display_name: None,
                email: "ada@example.com".to_string(),
                photo_url: None,
                joined: None,
                upload_count: None,
            });
            assert!(text.contains("Name:     N/A"));
            assert!(text.contains("Uploads:  unavailable"));
        }
    }

    mod uploads_view_tests {
        use super::support::{item, FakeBackend};
        use crate::models::{MediaId, MediaPatch, MediaScope};
        use crate::services::media_list::MediaListStore;
        use crate::views::render_uploads;
        use std::time::Duration;

        #[tokio::test]
        async fn test_empty_and_editing_rows() {
            let backend = FakeBackend::default();
            let store = MediaListStore::new(&backend, Duration::from_secs(5));
            store.refresh(MediaScope::Mine).await.unwrap();
            assert_eq!(render_uploads(&store), "No uploads found.\n");

            backend.items.borrow_mut().push(item("9", "Cat", None, None));
            store.refresh(MediaScope::Mine).await.unwrap();
            store.edit(&MediaId::from("9"), MediaPatch::title("Dog")).unwrap();

            let text = render_uploads(&store);
            assert!(text.contains("Cat"));
            assert!(text.contains("public"));
            assert!(text.contains("editing"));
        }
    }

    mod config_tests {
        use crate::Config;
        use std::path::Path;

        #[test]
        fn test_config_load_missing_file_uses_defaults() {
            let config = Config::load(Path::new("/nonexistent/snapshare.toml")).unwrap();
            assert_eq!(config.backend.base_url, "http://localhost:3000");
            assert_eq!(config.backend.request_timeout_secs, 30);
            assert!(!config.upload.require_category);
            assert!(config.identity.persist_session);
        }

        #[test]
        fn test_config_load_valid_toml() {
            let dir = tempfile::tempdir().unwrap();
            let config_path = dir.path().join("snapshare.toml");
            std::fs::write(
                &config_path,
                r#"
[backend]
base_url = "https://media.example.com"
request_timeout_secs = 10

[upload]
require_category = true

[downloads]
dir = "saved"
"#,
            )
            .unwrap();

            let config = Config::load(&config_path).unwrap();
            assert_eq!(config.backend.base_url, "https://media.example.com");
            assert_eq!(config.backend.request_timeout().as_secs(), 10);
            assert!(config.upload.require_category);
            assert_eq!(config.download_dir(), Path::new("saved"));
            assert_eq!(config.identity.endpoint, "https://identitytoolkit.googleapis.com");
            assert_eq!(config.identity.token_endpoint, "https://securetoken.googleapis.com");
            assert_eq!(config.storage.endpoint, "https://firebasestorage.googleapis.com");
            assert_eq!(config.storage.bucket, "");
        }

        #[test]
        fn test_config_storage_section() {
            let config: Config = toml::from_str(
                r#"
[storage]
endpoint = "http://localhost:9199"
bucket = "snapshare.appspot.com"
"#,
            )
            .unwrap();
            assert_eq!(config.storage.endpoint, "http://localhost:9199");
            assert_eq!(config.storage.bucket, "snapshare.appspot.com");
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_config_rejects_zero_timeout() {
            let mut config = Config::default();
            config.backend.request_timeout_secs = 0;
            assert!(config.validate().is_err());
        }

        #[test]
        fn test_config_rejects_bad_url() {
            let mut config = Config::default();
            config.backend.base_url = "not a url".to_string();
            assert!(config.validate().is_err());
        }
    }
}
