use std::sync::Arc;

use bridge_core::model::{ActivityId, CourseOutline, EnrolleeId};
use bridge_core::origin::OriginPolicy;
use storage::repository::Storage;

use crate::Clock;
use crate::bridge::{BridgeController, BridgeSession};
use crate::error::{BridgeError, BridgeServicesError, ProgressServiceError};
use crate::grade_sink::GradeSink;
use crate::progress_service::ProgressService;

/// Assembles the progress service and the bridge controller over one storage
/// backend.
#[derive(Clone)]
pub struct BridgeServices {
    storage: Storage,
    progress: Arc<ProgressService>,
    controller: Arc<BridgeController>,
}

impl BridgeServices {
    #[must_use]
    pub fn new(
        storage: Storage,
        clock: Clock,
        policy: OriginPolicy,
        sink: Arc<dyn GradeSink>,
    ) -> Self {
        let progress = Arc::new(ProgressService::new(clock, &storage, sink));
        let controller = Arc::new(BridgeController::new(policy));
        Self {
            storage,
            progress,
            controller,
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `BridgeServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        policy: OriginPolicy,
        sink: Arc<dyn GradeSink>,
    ) -> Result<Self, BridgeServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(storage, clock, policy, sink))
    }

    #[must_use]
    pub fn in_memory(clock: Clock, policy: OriginPolicy, sink: Arc<dyn GradeSink>) -> Self {
        Self::new(Storage::in_memory(), clock, policy, sink)
    }

    /// Store course outlines in the catalog, replacing earlier versions.
    ///
    /// # Errors
    ///
    /// Returns `BridgeServicesError` if an outline cannot be stored.
    pub async fn install_courses(
        &self,
        outlines: &[CourseOutline],
    ) -> Result<(), BridgeServicesError> {
        for outline in outlines {
            self.storage.catalog.upsert_course(outline).await?;
        }
        Ok(())
    }

    /// Mount a bridge for `enrollee` working on `activity`.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::UnknownActivity` if the activity is not catalogued.
    pub async fn open_session(
        &self,
        enrollee: EnrolleeId,
        activity: ActivityId,
    ) -> Result<BridgeSession, BridgeError> {
        let activity = match self.progress.activity(activity).await {
            Ok(activity) => activity,
            Err(ProgressServiceError::Storage(err)) => return Err(BridgeError::Storage(err)),
            Err(_) => return Err(BridgeError::UnknownActivity(activity)),
        };
        Ok(BridgeSession::new(
            enrollee,
            activity,
            Arc::clone(&self.controller),
            Arc::clone(&self.progress),
        ))
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn controller(&self) -> Arc<BridgeController> {
        Arc::clone(&self.controller)
    }
}
