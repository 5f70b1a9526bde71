//! Service layer for studyhall-core.
//!
//! Provides typed, high-level APIs for review chains, the trusted-reviewer
//! registry, the moderation flag ledger, and the content and user collaborators
//! they depend on. Every public operation returns [`CoreResult`]; storage details
//! stay behind the [`Store`].
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use studyhall_core::config::Config;
//! use studyhall_core::core::CoreContext;
//! use studyhall_core::model::ReviewTarget;
//!
//! let root = Path::new("/campus");
//! let ctx = CoreContext::new(root, &Config::load(root).unwrap());
//! let services = ctx.services().unwrap();
//! let latest = services
//!     .reviews()
//!     .latest_for("alex", ReviewTarget::answer(2002))
//!     .unwrap();
//! ```

pub mod answers;
pub mod directory;
pub mod doctor;
pub mod errors;
pub mod flags;
pub mod inbox;
pub mod messages;
pub mod questions;
pub mod reviews;
pub mod trust;

pub use errors::{CoreError, CoreResult, ErrorKind};

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::store::Store;

/// Context for studyhall-core services.
///
/// Holds what is needed to locate and open the database. Create one per
/// session.
#[derive(Debug, Clone)]
pub struct CoreContext {
    db_path: PathBuf,
    busy_timeout: Duration,
}

impl CoreContext {
    /// Create a context for the data directory under `root`.
    #[must_use]
    pub fn new(root: &Path, config: &Config) -> Self {
        Self {
            db_path: config.db_path(root),
            busy_timeout: config.busy_timeout(),
        }
    }

    /// Create a context for an explicit database file.
    #[must_use]
    pub fn with_db_path(db_path: &Path, busy_timeout: Duration) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
            busy_timeout,
        }
    }

    /// Path to the database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Whether the database file exists.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.db_path.exists()
    }

    /// Create the database and schema if needed.
    ///
    /// Returns `false` if the database already existed.
    pub fn initialize(&self) -> CoreResult<bool> {
        let existed = self.is_initialized();
        let store = Store::open(&self.db_path, self.busy_timeout).map_err(CoreError::storage)?;
        store.init_schema().map_err(CoreError::storage)?;
        if !existed {
            tracing::info!(path = %self.db_path.display(), "initialized database");
        }
        Ok(!existed)
    }

    /// Open the database and return the service facade.
    ///
    /// Fails with [`CoreError::NotInitialized`] if the database does not exist.
    pub fn services(&self) -> CoreResult<Services> {
        if !self.is_initialized() {
            return Err(CoreError::NotInitialized {
                path: self.db_path.display().to_string(),
            });
        }
        let store = Store::open(&self.db_path, self.busy_timeout).map_err(CoreError::storage)?;
        Services::new(store)
    }
}

/// Facade providing all studyhall service APIs.
///
/// Owns the session's store and hands out borrowing service objects.
pub struct Services {
    store: Store,
}

impl Services {
    /// Wrap a store, making sure its schema exists.
    pub fn new(store: Store) -> CoreResult<Self> {
        store.init_schema().map_err(CoreError::storage)?;
        Ok(Self { store })
    }

    /// Services over a fresh in-memory database.
    pub fn in_memory() -> CoreResult<Self> {
        Self::new(Store::open_in_memory().map_err(CoreError::storage)?)
    }

    /// Access review version-chain operations.
    #[must_use]
    pub const fn reviews(&self) -> reviews::ReviewService<'_> {
        reviews::ReviewService::new(&self.store)
    }

    /// Access the trusted-reviewer registry.
    #[must_use]
    pub const fn trust(&self) -> trust::TrustService<'_> {
        trust::TrustService::new(&self.store)
    }

    /// Access the moderation flag ledger.
    #[must_use]
    pub const fn flags(&self) -> flags::FlagService<'_> {
        flags::FlagService::new(&self.store)
    }

    /// Access user and role operations.
    #[must_use]
    pub const fn users(&self) -> directory::DirectoryService<'_> {
        directory::DirectoryService::new(&self.store)
    }

    #[must_use]
    pub const fn questions(&self) -> questions::QuestionService<'_> {
        questions::QuestionService::new(&self.store)
    }

    #[must_use]
    pub const fn answers(&self) -> answers::AnswerService<'_> {
        answers::AnswerService::new(&self.store)
    }

    #[must_use]
    pub const fn messages(&self) -> messages::MessageService<'_> {
        messages::MessageService::new(&self.store)
    }

    /// Access notification aggregates.
    #[must_use]
    pub const fn inbox(&self) -> inbox::InboxService<'_> {
        inbox::InboxService::new(&self.store)
    }

    /// Access integrity checks.
    #[must_use]
    pub const fn doctor(&self) -> doctor::DoctorService<'_> {
        doctor::DoctorService::new(&self.store)
    }

    /// Get a reference to the underlying store.
    ///
    /// Useful for advanced queries not covered by the service layer.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }
}

/// Reject blank text fields.
pub(crate) fn require_text(field: &'static str, value: &str) -> CoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}
