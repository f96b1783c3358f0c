//! In-memory storage implementation
//!
//! Used for tests and dry runs where nothing should touch disk.

use anyhow::{Result, bail};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use super::CatalogStore;
use crate::models::{
    CourseCode, CourseEvaluation, CourseMetadata, InstanceKey, Period, SemesterFeatures,
};

/// In-memory implementation of CatalogStore
///
/// BTreeMaps keep listing order identical to the SQLite store, which sorts
/// by the key text.
pub struct InMemoryCatalogStore {
    courses: RwLock<BTreeMap<String, CourseMetadata>>,
    evaluations: RwLock<BTreeMap<String, CourseEvaluation>>,
    /// Keyed by (course code, period) so iteration is chronological per course
    features: RwLock<BTreeMap<(String, Period), SemesterFeatures>>,
}

impl InMemoryCatalogStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            courses: RwLock::new(BTreeMap::new()),
            evaluations: RwLock::new(BTreeMap::new()),
            features: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStore for InMemoryCatalogStore {
    fn get_course(&self, code: &CourseCode) -> Result<Option<CourseMetadata>> {
        let courses = self.courses.read().unwrap_or_else(PoisonError::into_inner);
        Ok(courses.get(code.as_str()).cloned())
    }

    fn upsert_course(&self, mut meta: CourseMetadata) -> Result<()> {
        let mut courses = self.courses.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = courses.get(meta.course_code.as_str()) {
            meta.created_at = existing.created_at;
        }
        meta.updated_at = meta.updated_at.max(meta.created_at);

        courses.insert(meta.course_code.as_str().to_string(), meta);
        Ok(())
    }

    fn has_course(&self, code: &CourseCode) -> Result<bool> {
        let courses = self.courses.read().unwrap_or_else(PoisonError::into_inner);
        Ok(courses.contains_key(code.as_str()))
    }

    fn list_courses(&self) -> Result<Vec<CourseMetadata>> {
        let courses = self.courses.read().unwrap_or_else(PoisonError::into_inner);
        Ok(courses.values().cloned().collect())
    }

    fn count_courses(&self) -> Result<usize> {
        let courses = self.courses.read().unwrap_or_else(PoisonError::into_inner);
        Ok(courses.len())
    }

    fn get_evaluation(&self, key: &InstanceKey) -> Result<Option<CourseEvaluation>> {
        let evaluations = self.evaluations.read().unwrap_or_else(PoisonError::into_inner);
        Ok(evaluations.get(&key.to_string()).cloned())
    }

    fn upsert_evaluation(&self, mut evaluation: CourseEvaluation) -> Result<()> {
        if !self.has_course(&evaluation.course_code)? {
            bail!(
                "Cannot store evaluation {}: unknown course {}",
                evaluation.instance_key,
                evaluation.course_code
            );
        }

        let mut evaluations = self.evaluations.write().unwrap_or_else(PoisonError::into_inner);
        let key = evaluation.instance_key.to_string();

        if let Some(existing) = evaluations.get(&key) {
            evaluation.created_at = existing.created_at;
        }
        evaluation.updated_at = evaluation.updated_at.max(evaluation.created_at);

        evaluations.insert(key, evaluation);
        Ok(())
    }

    fn has_evaluation(&self, key: &InstanceKey) -> Result<bool> {
        let evaluations = self.evaluations.read().unwrap_or_else(PoisonError::into_inner);
        Ok(evaluations.contains_key(&key.to_string()))
    }

    fn list_evaluations_for_course(&self, code: &CourseCode) -> Result<Vec<CourseEvaluation>> {
        let evaluations = self.evaluations.read().unwrap_or_else(PoisonError::into_inner);
        Ok(evaluations
            .values()
            .filter(|e| &e.course_code == code)
            .cloned()
            .collect())
    }

    fn upsert_features(&self, features: &[SemesterFeatures]) -> Result<()> {
        for f in features {
            if !self.has_course(&f.course_code)? {
                bail!(
                    "Cannot store features for {}: unknown course {}",
                    f.period,
                    f.course_code
                );
            }
        }

        let mut stored = self.features.write().unwrap_or_else(PoisonError::into_inner);
        for f in features {
            stored.insert((f.course_code.as_str().to_string(), f.period), f.clone());
        }
        Ok(())
    }

    fn list_features_for_course(&self, code: &CourseCode) -> Result<Vec<SemesterFeatures>> {
        let features = self.features.read().unwrap_or_else(PoisonError::into_inner);
        Ok(features
            .values()
            .filter(|f| &f.course_code == code)
            .cloned()
            .collect())
    }

    fn list_features(&self) -> Result<Vec<SemesterFeatures>> {
        let features = self.features.read().unwrap_or_else(PoisonError::into_inner);
        Ok(features.values().cloned().collect())
    }

    fn clear(&self) -> Result<()> {
        self.features
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.evaluations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.courses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EvaluationData;

    fn code(s: &str) -> CourseCode {
        CourseCode::new(s).unwrap()
    }

    #[test]
    fn test_course_upsert_and_get() {
        let store = InMemoryCatalogStore::new();

        let meta = CourseMetadata::new(code("AS.171.101"));
        store.upsert_course(meta.clone()).unwrap();

        assert_eq!(store.get_course(&code("AS.171.101")).unwrap(), Some(meta));
        assert!(store.get_course(&code("AS.171.102")).unwrap().is_none());
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = InMemoryCatalogStore::new();

        let meta = CourseMetadata::new(code("AS.171.101"));
        store.upsert_course(meta.clone()).unwrap();
        store.upsert_course(meta).unwrap();

        assert_eq!(store.count_courses().unwrap(), 1);
    }

    #[test]
    fn test_upsert_preserves_created_at() {
        let store = InMemoryCatalogStore::new();

        let original = CourseMetadata::new(code("AS.171.101"));
        store.upsert_course(original.clone()).unwrap();

        let mut later = CourseMetadata::new(code("AS.171.101"));
        later.created_at = original.created_at + chrono::Duration::hours(1);
        later.updated_at = later.created_at;
        store.upsert_course(later).unwrap();

        let stored = store.get_course(&code("AS.171.101")).unwrap().unwrap();
        assert_eq!(stored.created_at, original.created_at);
        assert!(stored.updated_at >= stored.created_at);
    }

    #[test]
    fn test_evaluations_filtered_by_course() {
        let store = InMemoryCatalogStore::new();
        store.upsert_course(CourseMetadata::new(code("AS.171.101"))).unwrap();
        store.upsert_course(CourseMetadata::new(code("AS.110.202"))).unwrap();

        for key in ["AS.171.101.02.FA24", "AS.171.101.01.FA24", "AS.110.202.01.FA24"] {
            let key: InstanceKey = key.parse().unwrap();
            store
                .upsert_evaluation(CourseEvaluation::new(key, EvaluationData::default()))
                .unwrap();
        }

        let keys: Vec<String> = store
            .list_evaluations_for_course(&code("AS.171.101"))
            .unwrap()
            .iter()
            .map(|e| e.instance_key.to_string())
            .collect();
        assert_eq!(keys, vec!["AS.171.101.01.FA24", "AS.171.101.02.FA24"]);
    }

    #[test]
    fn test_features_listed_by_course_then_period() {
        let store = InMemoryCatalogStore::new();
        store.upsert_course(CourseMetadata::new(code("EN.601.226"))).unwrap();
        store.upsert_course(CourseMetadata::new(code("AS.171.101"))).unwrap();

        let rows: Vec<SemesterFeatures> = [
            ("EN.601.226", "SP24"),
            ("AS.171.101", "FA24"),
            ("AS.171.101", "IN24"),
        ]
        .iter()
        .map(|(c, p)| SemesterFeatures::new(code(c), p.parse().unwrap()))
        .collect();
        store.upsert_features(&rows).unwrap();

        let listed: Vec<String> = store
            .list_features()
            .unwrap()
            .iter()
            .map(|f| format!("{} {}", f.course_code, f.period))
            .collect();
        assert_eq!(listed, vec!["AS.171.101 IN24", "AS.171.101 FA24", "EN.601.226 SP24"]);
        assert_eq!(store.list_features_for_course(&code("EN.601.226")).unwrap().len(), 1);
    }

    #[test]
    fn test_features_require_course() {
        let store = InMemoryCatalogStore::new();
        let rows = [SemesterFeatures::new(code("AS.171.101"), "FA24".parse().unwrap())];
        assert!(store.upsert_features(&rows).is_err());
        assert!(store.list_features().unwrap().is_empty());
    }

    #[test]
    fn test_evaluation_requires_course() {
        let store = InMemoryCatalogStore::new();
        let key: InstanceKey = "AS.171.101.01.FA24".parse().unwrap();
        assert!(
            store
                .upsert_evaluation(CourseEvaluation::new(key, EvaluationData::default()))
                .is_err()
        );
    }
}
