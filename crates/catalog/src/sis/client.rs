//! SIS API HTTP client
//!
//! Provides methods for querying the classes and codes endpoints.
//! Uses synchronous HTTP (ureq) with a single pooled agent, and paces
//! requests through a [`Throttle`].

use std::time::Duration;

use serde::de::DeserializeOwned;
use ureq::Agent;
use url::Url;

use super::api::{CodeEntry, Section};
use super::normalize::{parse_codes, parse_sections};
use super::{CatalogSource, Throttle};
use crate::models::{CourseCode, Period};

/// Largest response body accepted (whole-school term listings are big)
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Errors from a single SIS API call
///
/// A "no records found" response is not an error; it parses to an empty list.
#[derive(Debug, thiserror::Error)]
pub enum SisError {
    #[error("SIS request failed: {0}")]
    Transport(#[source] ureq::Error),
    #[error("SIS returned HTTP {0}")]
    Status(u16),
    #[error("SIS returned malformed JSON: {0}")]
    MalformedJson(#[source] serde_json::Error),
    #[error("Invalid SIS URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Term component of a classes path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermSelector {
    /// The API's `current` alias
    Current,
    Period(Period),
}

impl TermSelector {
    fn segment(&self) -> String {
        match self {
            TermSelector::Current => "current".to_string(),
            TermSelector::Period(p) => p.api_term(),
        }
    }
}

impl From<Period> for TermSelector {
    fn from(period: Period) -> Self {
        TermSelector::Period(period)
    }
}

/// Addressable classes endpoints
#[derive(Debug, Clone)]
pub enum ClassQuery<'a> {
    /// `/classes/{school}/{term}`
    School { school: &'a str, term: TermSelector },
    /// `/classes/{school}/{department}/{term}`
    Department {
        school: &'a str,
        department: &'a str,
        term: TermSelector,
    },
    /// `/classes/{course}[{section}][/{term}]`
    Course {
        course: &'a CourseCode,
        section: Option<&'a str>,
        term: Option<TermSelector>,
    },
    /// `/classes?{params}`
    Search(&'a [(&'a str, &'a str)]),
}

impl ClassQuery<'_> {
    /// Path segments below `classes`, unencoded
    fn segments(&self) -> Vec<String> {
        match self {
            ClassQuery::School { school, term } => vec![school.to_string(), term.segment()],
            ClassQuery::Department {
                school,
                department,
                term,
            } => vec![school.to_string(), department.to_string(), term.segment()],
            ClassQuery::Course {
                course,
                section,
                term,
            } => {
                let mut segments = vec![format!("{}{}", course.compact(), section.unwrap_or(""))];
                if let Some(term) = term {
                    segments.push(term.segment());
                }
                segments
            }
            ClassQuery::Search(_) => Vec::new(),
        }
    }

    fn params(&self) -> &[(&str, &str)] {
        match self {
            ClassQuery::Search(params) => params,
            _ => &[],
        }
    }
}

/// SIS API client
///
/// Holds the API key explicitly; it is appended to every request as the
/// `key` query parameter.
pub struct SisClient {
    agent: Agent,
    base_url: Url,
    api_key: String,
    throttle: Throttle,
}

impl SisClient {
    /// Default SIS API base URL
    pub const DEFAULT_BASE_URL: &'static str = "https://sis.jhu.edu/api";

    /// Create a new SIS client
    ///
    /// # Arguments
    /// * `base_url` - API root, e.g. [`Self::DEFAULT_BASE_URL`]
    /// * `api_key` - Static API token
    /// * `request_interval` - Minimum gap between requests
    /// * `timeout` - Per-request timeout
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        request_interval: Duration,
        timeout: Duration,
    ) -> Result<Self, SisError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))?;
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();

        Ok(Self {
            agent: Agent::new_with_config(config),
            base_url,
            api_key: api_key.into(),
            throttle: Throttle::new(request_interval),
        })
    }

    /// Build the URL for a path below the API root, without the key
    fn endpoint_url(&self, segments: &[String], params: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        let encoded: Vec<String> = segments
            .iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        let path = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            encoded.join("/")
        );
        url.set_path(&path);

        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        url
    }

    /// URL for a classes query, without the key
    pub fn classes_url(&self, query: &ClassQuery<'_>) -> Url {
        let mut segments = vec!["classes".to_string()];
        segments.extend(query.segments());
        self.endpoint_url(&segments, query.params())
    }

    /// GET a URL and return the raw body
    fn get_body(&self, url: &Url) -> Result<String, SisError> {
        self.throttle.wait();
        log::debug!("[SIS] GET {}", url.path());

        let response = self
            .agent
            .get(url.as_str())
            .query("key", &self.api_key)
            .call();

        match response {
            Ok(mut resp) => resp
                .body_mut()
                .with_config()
                .limit(MAX_BODY_BYTES)
                .read_to_string()
                .map_err(SisError::Transport),
            Err(ureq::Error::StatusCode(code)) => Err(SisError::Status(code)),
            Err(e) => Err(SisError::Transport(e)),
        }
    }

    /// Run a classes query
    pub fn classes(&self, query: &ClassQuery<'_>) -> Result<Vec<Section>, SisError> {
        let body = self.get_body(&self.classes_url(query))?;
        parse_sections(&body)
    }

    /// Advanced search with arbitrary query parameters (e.g. `School`, `Term`)
    pub fn search(&self, params: &[(&str, &str)]) -> Result<Vec<Section>, SisError> {
        self.classes(&ClassQuery::Search(params))
    }

    /// Sections currently offered by a school, via the `current` alias
    pub fn current_sections(&self, school: &str) -> Result<Vec<Section>, SisError> {
        self.classes(&ClassQuery::School {
            school,
            term: TermSelector::Current,
        })
    }

    fn codes<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Vec<T>, SisError> {
        let mut path = vec!["codes".to_string()];
        path.extend(segments.iter().map(|s| s.to_string()));
        let body = self.get_body(&self.endpoint_url(&path, &[]))?;
        parse_codes(&body)
    }

    /// Names of all schools
    pub fn schools(&self) -> Result<Vec<String>, SisError> {
        Ok(labels(self.codes(&["schools"])?))
    }

    /// Names of all terms known to the API
    pub fn terms(&self) -> Result<Vec<String>, SisError> {
        Ok(labels(self.codes(&["terms"])?))
    }

    /// Department names for a school
    pub fn departments(&self, school: &str) -> Result<Vec<String>, SisError> {
        Ok(labels(self.codes(&["departments", school])?))
    }
}

fn labels(entries: Vec<CodeEntry>) -> Vec<String> {
    entries
        .iter()
        .filter_map(|e| e.label().map(str::to_string))
        .collect()
}

impl CatalogSource for SisClient {
    fn sections_for_term(&self, school: &str, period: Period) -> Result<Vec<Section>, SisError> {
        self.classes(&ClassQuery::School {
            school,
            term: period.into(),
        })
    }

    fn course_history(&self, course: &CourseCode) -> Result<Vec<Section>, SisError> {
        self.classes(&ClassQuery::Course {
            course,
            section: None,
            term: None,
        })
    }

    fn section_history(&self, course: &CourseCode, section: &str) -> Result<Vec<Section>, SisError> {
        self.classes(&ClassQuery::Course {
            course,
            section: Some(section),
            term: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SisClient {
        SisClient::new(
            SisClient::DEFAULT_BASE_URL,
            "secret",
            Duration::ZERO,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_school_term_url_is_encoded() {
        let url = client().classes_url(&ClassQuery::School {
            school: "Whiting School of Engineering",
            term: "FA24".parse::<Period>().unwrap().into(),
        });
        assert_eq!(
            url.as_str(),
            "https://sis.jhu.edu/api/classes/Whiting%20School%20of%20Engineering/Fall%202024"
        );
    }

    #[test]
    fn test_current_alias_url() {
        let url = client().classes_url(&ClassQuery::School {
            school: "Krieger School of Arts and Sciences",
            term: TermSelector::Current,
        });
        assert!(url.path().ends_with("/current"));
    }

    #[test]
    fn test_department_url() {
        let url = client().classes_url(&ClassQuery::Department {
            school: "Krieger School of Arts and Sciences",
            department: "AS Physics & Astronomy",
            term: "SP25".parse::<Period>().unwrap().into(),
        });
        assert!(url.path().contains("/AS%20Physics%20%26%20Astronomy/"));
        assert!(url.path().ends_with("/Spring%202025"));
    }

    #[test]
    fn test_course_and_section_url() {
        let course = CourseCode::new("AS.171.101").unwrap();
        let url = client().classes_url(&ClassQuery::Course {
            course: &course,
            section: Some("01"),
            term: None,
        });
        assert_eq!(url.as_str(), "https://sis.jhu.edu/api/classes/AS17110101");

        let url = client().classes_url(&ClassQuery::Course {
            course: &course,
            section: None,
            term: Some(TermSelector::Current),
        });
        assert_eq!(url.as_str(), "https://sis.jhu.edu/api/classes/AS171101/current");
    }

    #[test]
    fn test_search_url_carries_params() {
        let params = [("School", "Whiting School of Engineering"), ("Term", "Fall 2024")];
        let url = client().classes_url(&ClassQuery::Search(&params));
        assert_eq!(url.path(), "/api/classes");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("School".into(), "Whiting School of Engineering".into()));
        assert_eq!(pairs[1], ("Term".into(), "Fall 2024".into()));
    }

    #[test]
    fn test_urls_never_contain_key() {
        let url = client().classes_url(&ClassQuery::Search(&[("Term", "Fall 2024")]));
        assert!(!url.as_str().contains("secret"));
    }

    #[test]
    fn test_invalid_base_url() {
        let result = SisClient::new("not a url", "k", Duration::ZERO, Duration::from_secs(1));
        assert!(matches!(result, Err(SisError::InvalidUrl(_))));
    }
}
