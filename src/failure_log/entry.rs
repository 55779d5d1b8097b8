//! Failure log entries, their request types and natural keys

use crate::crawler::provinces::province_by_code;
use crate::crawler::task::{CrawlTask, Level, MajorRef, ProvinceRef, SchoolRef};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Why a task was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Portal-level retry ceiling reached
    RetriesExhausted,
    /// Body was not JSON or had no `flag`
    MissingFlag,
    /// Envelope did not carry a usable list
    Malformed,
    /// Transport retry ceiling reached
    Transport,
    /// The record sink rejected a write
    Storage,
}

impl FailureKind {
    fn suffix(&self) -> &'static str {
        match self {
            Self::RetriesExhausted => "",
            Self::MissingFlag => "_missing_flag",
            Self::Malformed => "_malformed",
            Self::Transport => "_transport",
            Self::Storage => "_storage",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        [
            Self::RetriesExhausted,
            Self::MissingFlag,
            Self::Malformed,
            Self::Transport,
            Self::Storage,
        ]
        .into_iter()
        .find(|kind| kind.suffix() == suffix)
    }
}

/// Level plus failure subtype, written as e.g. `major_list` or `school_list_malformed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestType {
    pub level: Level,
    pub kind: FailureKind,
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.level.request_name(), self.kind.suffix())
    }
}

impl FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::all()
            .into_iter()
            .find_map(|level| {
                let suffix = s.strip_prefix(level.request_name())?;
                let kind = FailureKind::from_suffix(suffix)?;
                Some(RequestType { level, kind })
            })
            .ok_or_else(|| format!("unknown request type '{}'", s))
    }
}

/// Identity of a failed request, used to skip duplicate log lines
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NaturalKey {
    Province {
        province_code: String,
        page: String,
    },
    School {
        school_code: String,
        school_name: String,
        page: String,
    },
    Major {
        school_code: String,
        major_code: String,
        major_name: String,
    },
}

/// One abandoned request
#[derive(Debug, Clone, PartialEq)]
pub struct FailureLogEntry {
    pub timestamp: NaiveDateTime,
    pub request_type: RequestType,
    pub params: BTreeMap<String, String>,
    pub xwlxmc: Option<String>,
    pub province_code: Option<String>,
}

impl FailureLogEntry {
    pub fn level(&self) -> Level {
        self.request_type.level
    }

    fn param(&self, key: &str) -> String {
        self.params.get(key).cloned().unwrap_or_default()
    }

    fn province(&self) -> Option<ProvinceRef> {
        let code = self
            .province_code
            .clone()
            .or_else(|| self.params.get("ssdm").cloned())
            .filter(|code| !code.is_empty())?;
        let name = province_by_code(&code)
            .map(|p| p.name.to_string())
            .unwrap_or_else(|| code.clone());
        Some(ProvinceRef { code, name })
    }

    fn page(&self) -> u32 {
        self.params
            .get("curPage")
            .and_then(|p| p.parse().ok())
            .unwrap_or(1)
    }

    pub fn natural_key(&self) -> NaturalKey {
        match self.level() {
            Level::Province => NaturalKey::Province {
                province_code: self.param("ssdm"),
                page: self.param("curPage"),
            },
            Level::School => NaturalKey::School {
                school_code: self.param("dwdm"),
                school_name: self.param("dwmc"),
                page: self.param("curPage"),
            },
            Level::Major => NaturalKey::Major {
                school_code: self.param("dwdm"),
                major_code: self.param("zydm"),
                major_name: self.param("zymc"),
            },
        }
    }

    /// Rebuilds the task that failed, starting on the logged page
    ///
    /// Returns `None` when a parameter the level needs is missing.
    pub fn to_task(&self) -> Option<CrawlTask> {
        let required = |key: &str| self.params.get(key).filter(|v| !v.is_empty()).cloned();

        let task = match self.level() {
            Level::Province => {
                self.params.get("ssdm").filter(|v| !v.is_empty())?;
                CrawlTask::province(self.province()?).at_page(self.page())
            }
            Level::School => CrawlTask::school(SchoolRef {
                code: required("dwdm")?,
                name: self.param("dwmc"),
                province: self.province(),
            })
            .at_page(self.page()),
            Level::Major => CrawlTask::major(MajorRef {
                code: required("zydm")?,
                name: self.param("zymc"),
                school_code: required("dwdm")?,
                school_name: required("dwmc"),
                degree_type: self.xwlxmc.clone().filter(|v| !v.is_empty()),
                province: self.province(),
            }),
        };

        Some(task)
    }
}
