//! Course evaluation records, one per course instance (course + section + term)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::{CourseCode, Period};

/// Error returned for strings that are not `CODE.SECTION.SEMESTER` keys
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid instance key: {0:?}")]
pub struct InstanceKeyError(pub String);

/// Identifies one offering of a course, e.g. `AS.171.101.01.FA24`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceKey {
    course_code: CourseCode,
    section: String,
    period: Period,
}

impl InstanceKey {
    pub fn new(course_code: CourseCode, section: impl Into<String>, period: Period) -> Self {
        Self {
            course_code,
            section: section.into(),
            period,
        }
    }

    pub fn course_code(&self) -> &CourseCode {
        &self.course_code
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn period(&self) -> Period {
        self.period
    }
}

impl FromStr for InstanceKey {
    type Err = InstanceKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || InstanceKeyError(s.to_string());

        let mut parts = s.trim().rsplitn(3, '.');
        let (Some(period), Some(section), Some(code)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(err());
        };

        if section.is_empty() || !section.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(err());
        }
        let period = Period::from_code(period).map_err(|_| err())?;
        let course_code = CourseCode::new(code).map_err(|_| err())?;

        Ok(Self::new(course_code, section, period))
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.course_code, self.section, self.period)
    }
}

impl Serialize for InstanceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InstanceKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Five-point rating scale used by most evaluation questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rating {
    Poor,
    Weak,
    Satisfactory,
    Good,
    Excellent,
    NotApplicable,
}

/// Workload relative to comparable courses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Workload {
    MuchLighter,
    SomewhatLighter,
    Typical,
    SomewhatHeavier,
    MuchHeavier,
}

/// How often students received useful feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Feedback {
    Never,
    Rarely,
    Sometimes,
    Often,
    Always,
}

/// Response counts per category
pub type Frequency<C> = BTreeMap<C, u32>;

/// Evaluation payload for one course instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationData {
    pub course_name: String,
    pub instructor_name: String,
    pub ta_names: Vec<String>,
    pub ta_frequency: Frequency<Rating>,
    pub feedback_frequency: Frequency<Feedback>,
    pub workload_frequency: Frequency<Workload>,
    pub overall_quality_frequency: Frequency<Rating>,
    pub intellectual_challenge_frequency: Frequency<Rating>,
    pub instructor_effectiveness_frequency: Frequency<Rating>,
}

impl EvaluationData {
    /// Total number of overall-quality responses
    pub fn respondents(&self) -> u32 {
        self.overall_quality_frequency.values().sum()
    }
}

/// A stored evaluation for one course instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseEvaluation {
    pub instance_key: InstanceKey,
    pub course_code: CourseCode,
    pub data: EvaluationData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CourseEvaluation {
    /// Create a new evaluation; the course code is taken from the key
    pub fn new(instance_key: InstanceKey, data: EvaluationData) -> Self {
        let now = Utc::now();
        Self {
            course_code: instance_key.course_code().clone(),
            instance_key,
            data,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the payload with a freshly scraped one
    pub fn replace_data(&mut self, data: EvaluationData) {
        self.data = data;
        self.updated_at = Utc::now().max(self.created_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_instance_key() {
        let key: InstanceKey = "AS.171.101.01.FA24".parse().unwrap();
        assert_eq!(key.course_code().as_str(), "AS.171.101");
        assert_eq!(key.section(), "01");
        assert_eq!(key.period().code(), "FA24");
        assert_eq!(key.to_string(), "AS.171.101.01.FA24");
    }

    #[test]
    fn test_parse_instance_key_rejects_malformed() {
        assert!("AS.171.101.FA24".parse::<InstanceKey>().is_err());
        assert!("AS.171.101..FA24".parse::<InstanceKey>().is_err());
        assert!("AS.171.101.01.Fall".parse::<InstanceKey>().is_err());
        assert!("".parse::<InstanceKey>().is_err());
    }

    #[test]
    fn test_evaluation_takes_course_from_key() {
        let key: InstanceKey = "EN.601.226.02.SP25".parse().unwrap();
        let eval = CourseEvaluation::new(key, EvaluationData::default());
        assert_eq!(eval.course_code.as_str(), "EN.601.226");
        assert_eq!(eval.created_at, eval.updated_at);
    }

    #[test]
    fn test_data_serialization_uses_category_names() {
        let mut data = EvaluationData {
            course_name: "Data Structures".to_string(),
            instructor_name: "Jane Doe".to_string(),
            ta_names: vec!["Alex Kim".to_string()],
            ..Default::default()
        };
        data.overall_quality_frequency.insert(Rating::Excellent, 12);
        data.overall_quality_frequency.insert(Rating::Good, 5);
        data.workload_frequency.insert(Workload::Typical, 9);

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["overall_quality_frequency"]["Excellent"], 12);
        assert_eq!(json["workload_frequency"]["Typical"], 9);
        assert_eq!(data.respondents(), 17);

        let back: EvaluationData = serde_json::from_value(json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_replace_data_bumps_updated_at() {
        let key: InstanceKey = "AS.171.101.01.FA24".parse().unwrap();
        let mut eval = CourseEvaluation::new(key, EvaluationData::default());
        let created = eval.created_at;

        eval.replace_data(EvaluationData {
            course_name: "Physics I".to_string(),
            ..Default::default()
        });

        assert_eq!(eval.created_at, created);
        assert!(eval.updated_at >= eval.created_at);
        assert_eq!(eval.data.course_name, "Physics I");
    }
}
