//! Storage trait definitions

use crate::models::{CourseCode, CourseEvaluation, CourseMetadata, InstanceKey, SemesterFeatures};
use anyhow::Result;

/// Trait for catalog storage operations
///
/// Records are addressed by course code (metadata) and instance key
/// (evaluations). Upserts preserve the stored `created_at`; there is no
/// deletion path outside of [`CatalogStore::clear`].
pub trait CatalogStore: Send + Sync {
    /// Get scrape metadata for a course
    fn get_course(&self, code: &CourseCode) -> Result<Option<CourseMetadata>>;

    /// Insert or update scrape metadata
    fn upsert_course(&self, meta: CourseMetadata) -> Result<()>;

    /// Check if metadata exists for a course
    fn has_course(&self, code: &CourseCode) -> Result<bool>;

    /// List all course metadata, ordered by course code
    fn list_courses(&self) -> Result<Vec<CourseMetadata>>;

    /// Count stored courses
    fn count_courses(&self) -> Result<usize>;

    /// Get the evaluation for a course instance
    fn get_evaluation(&self, key: &InstanceKey) -> Result<Option<CourseEvaluation>>;

    /// Insert or update an evaluation
    fn upsert_evaluation(&self, evaluation: CourseEvaluation) -> Result<()>;

    /// Check if an evaluation exists for a course instance
    fn has_evaluation(&self, key: &InstanceKey) -> Result<bool>;

    /// List evaluations for a course, ordered by instance key
    fn list_evaluations_for_course(&self, code: &CourseCode) -> Result<Vec<CourseEvaluation>>;

    /// Insert or replace per-semester features, keyed by course and period.
    /// Every referenced course must already exist.
    fn upsert_features(&self, features: &[SemesterFeatures]) -> Result<()>;

    /// Features of one course, chronological
    fn list_features_for_course(&self, code: &CourseCode) -> Result<Vec<SemesterFeatures>>;

    /// Every stored feature row, ordered by course code then period
    fn list_features(&self) -> Result<Vec<SemesterFeatures>>;

    /// Clear all data (for testing)
    fn clear(&self) -> Result<()>;
}
