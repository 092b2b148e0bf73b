use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bridge_core::model::{
    Activity, ActivityId, ActivityProgress, CourseId, CourseOutline, EnrolleeId, StateBlob,
};
use bridge_core::normalizer::CanonicalResult;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// State Store Adapter: the only writer of the opaque state blob.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Last saved blob for the pair, if any. Never mutates.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn load_state(
        &self,
        enrollee: EnrolleeId,
        activity: ActivityId,
    ) -> Result<Option<StateBlob>, StorageError>;

    /// Replace the stored blob wholesale, creating the progress row lazily.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the blob cannot be stored.
    async fn save_state(
        &self,
        enrollee: EnrolleeId,
        activity: ActivityId,
        state: &StateBlob,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

/// Owner of the score, completion, success and progress fields.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fold `result` into the stored row with the monotonic-max policy and
    /// return the row as committed.
    ///
    /// Implementations must serialize concurrent merges for the same pair so
    /// no max is lost.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the merge cannot be committed.
    async fn merge_result(
        &self,
        enrollee: EnrolleeId,
        activity: ActivityId,
        result: &CanonicalResult,
        at: DateTime<Utc>,
    ) -> Result<ActivityProgress, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_progress(
        &self,
        enrollee: EnrolleeId,
        activity: ActivityId,
    ) -> Result<Option<ActivityProgress>, StorageError>;

    /// Every row the enrollee has for activities currently in `course`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list_progress(
        &self,
        enrollee: EnrolleeId,
        course: CourseId,
    ) -> Result<Vec<ActivityProgress>, StorageError>;
}

/// Read access to the course structure plus seeding.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Insert or replace a course outline. Activities and modules that are no
    /// longer listed are removed from the catalog; progress rows are kept.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the outline cannot be stored.
    async fn upsert_course(&self, outline: &CourseOutline) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_course(&self, id: CourseId) -> Result<Option<CourseOutline>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_activity(&self, id: ActivityId) -> Result<Option<Activity>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// One mutex guards all progress rows, which gives the single-writer
/// discipline merges need.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    courses: Arc<Mutex<HashMap<CourseId, CourseOutline>>>,
    progress: Arc<Mutex<HashMap<(EnrolleeId, ActivityId), ActivityProgress>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl StateStore for InMemoryRepository {
    async fn load_state(
        &self,
        enrollee: EnrolleeId,
        activity: ActivityId,
    ) -> Result<Option<StateBlob>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard
            .get(&(enrollee, activity))
            .and_then(|row| row.state().cloned()))
    }

    async fn save_state(
        &self,
        enrollee: EnrolleeId,
        activity: ActivityId,
        state: &StateBlob,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        guard
            .entry((enrollee, activity))
            .or_insert_with(|| ActivityProgress::new(enrollee, activity))
            .store_state(state.clone(), at);
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn merge_result(
        &self,
        enrollee: EnrolleeId,
        activity: ActivityId,
        result: &CanonicalResult,
        at: DateTime<Utc>,
    ) -> Result<ActivityProgress, StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        let row = guard
            .entry((enrollee, activity))
            .or_insert_with(|| ActivityProgress::new(enrollee, activity));
        row.merge(result, at);
        Ok(row.clone())
    }

    async fn get_progress(
        &self,
        enrollee: EnrolleeId,
        activity: ActivityId,
    ) -> Result<Option<ActivityProgress>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard.get(&(enrollee, activity)).cloned())
    }

    async fn list_progress(
        &self,
        enrollee: EnrolleeId,
        course: CourseId,
    ) -> Result<Vec<ActivityProgress>, StorageError> {
        let activity_ids: Vec<ActivityId> = {
            let courses = self.courses.lock().map_err(poisoned)?;
            match courses.get(&course) {
                Some(outline) => outline.activities().map(Activity::id).collect(),
                None => return Ok(Vec::new()),
            }
        };

        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(activity_ids
            .into_iter()
            .filter_map(|id| guard.get(&(enrollee, id)).cloned())
            .collect())
    }
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn upsert_course(&self, outline: &CourseOutline) -> Result<(), StorageError> {
        let mut guard = self.courses.lock().map_err(poisoned)?;
        guard.insert(outline.id(), outline.clone());
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<CourseOutline>, StorageError> {
        let guard = self.courses.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn get_activity(&self, id: ActivityId) -> Result<Option<Activity>, StorageError> {
        let guard = self.courses.lock().map_err(poisoned)?;
        Ok(guard
            .values()
            .find_map(|outline| outline.find_activity(id))
            .cloned())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub states: Arc<dyn StateStore>,
    pub progress: Arc<dyn ProgressRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let states: Arc<dyn StateStore> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let catalog: Arc<dyn CatalogRepository> = Arc::new(repo);
        Self {
            states,
            progress,
            catalog,
        }
    }
}
