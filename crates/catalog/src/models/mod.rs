//! Domain models for catalog entities

mod course;
mod details;
mod evaluation;
mod period;

pub use course::{CourseCode, CourseCodeError, CourseMetadata};
pub use details::{SemesterFeatures, TermDetails};
pub use evaluation::{
    CourseEvaluation, EvaluationData, Feedback, Frequency, InstanceKey, InstanceKeyError, Rating,
    Workload,
};
pub use period::{Period, PeriodParseError, Season, terms_through};
