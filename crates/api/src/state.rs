use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use site_admin_core::archive::{ConfirmationToken, SiteArchiver};
use site_admin_core::events::bus::EventBus;
use site_admin_core::media::ImageLibrary;
use site_admin_core::store::{BlobStore, PartitionStore};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::config::AppConfig;

/// Shared application state, passed to all handlers via Axum's `State` extractor.
/// Wrapped in `Arc` so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    config: AppConfig,
    partitions: Arc<dyn PartitionStore>,
    archiver: SiteArchiver,
    images: ImageLibrary,
    event_bus: EventBus,
    /// Restore confirmations issued but not yet used.
    confirmations: Mutex<HashMap<Uuid, ConfirmationToken>>,
    /// One lock per edited row; read-modify-write edits hold it until saved.
    edit_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        partitions: Arc<dyn PartitionStore>,
        blobs: Arc<dyn BlobStore>,
        event_bus: EventBus,
    ) -> Self {
        let archiver =
            SiteArchiver::new(partitions.clone(), blobs.clone(), config.store.archive_settings())
                .with_events(event_bus.clone());
        let images = ImageLibrary::new(blobs, config.store.image_settings());
        Self {
            inner: Arc::new(InnerState {
                config,
                partitions,
                archiver,
                images,
                event_bus,
                confirmations: Mutex::new(HashMap::new()),
                edit_locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn partitions(&self) -> &dyn PartitionStore {
        self.inner.partitions.as_ref()
    }

    pub fn archiver(&self) -> &SiteArchiver {
        &self.inner.archiver
    }

    pub fn images(&self) -> &ImageLibrary {
        &self.inner.images
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    /// Wait for exclusive access to the row named by `key`. Concurrent edits
    /// of the same row run one after another; other rows are unaffected.
    pub async fn edit_lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .inner
            .edit_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Hold a confirmation until the operator proceeds. Expired ones are dropped.
    pub fn hold_confirmation(&self, token: ConfirmationToken) -> Uuid {
        let id = token.id();
        let mut pending = self
            .inner
            .confirmations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pending.retain(|_, held| !self.is_expired(held));
        pending.insert(id, token);
        id
    }

    /// Take a live confirmation out of the pending set.
    pub fn take_confirmation(&self, id: Uuid) -> Option<ConfirmationToken> {
        let token = self
            .inner
            .confirmations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)?;
        (!self.is_expired(&token)).then_some(token)
    }

    fn is_expired(&self, token: &ConfirmationToken) -> bool {
        chrono::Duration::from_std(self.inner.config.confirmation_ttl)
            .ok()
            .and_then(|ttl| token.issued_at().checked_add_signed(ttl))
            .is_some_and(|deadline| deadline < Utc::now())
    }
}
