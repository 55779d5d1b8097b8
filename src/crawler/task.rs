//! Crawl tasks: one unit of work per (level, parent, page)
//!
//! The engine keeps tasks on an explicit stack instead of recursing, so every
//! task carries its own pagination and retry state.

use crate::config::PortalConfig;
use std::collections::BTreeMap;
use std::fmt;

/// A rung of the catalogue hierarchy
///
/// Each level names the parent whose children are being listed: a `Province`
/// task lists schools, a `School` task lists majors, a `Major` task fetches details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Province,
    School,
    Major,
}

impl Level {
    /// Name of the request issued at this level, as written to the failure log
    pub fn request_name(&self) -> &'static str {
        match self {
            Self::Province => "school_list",
            Self::School => "major_list",
            Self::Major => "major_detail",
        }
    }

    /// Portal path for this level's request
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Province => "/zsml/rs/dws.do",
            Self::School => "/zsml/rs/dwzys.do",
            Self::Major => "/zsml/rs/yjfxs.do",
        }
    }

    pub fn all() -> [Level; 3] {
        [Self::Province, Self::School, Self::Major]
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.request_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvinceRef {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchoolRef {
    /// `dwdm`
    pub code: String,
    /// `dwmc`
    pub name: String,
    pub province: Option<ProvinceRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MajorRef {
    /// `zydm`
    pub code: String,
    /// `zymc`
    pub name: String,
    /// `dwdm`
    pub school_code: String,
    pub school_name: Option<String>,
    /// `xwlxmc` from the major list, attached to every detail row
    pub degree_type: Option<String>,
    pub province: Option<ProvinceRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    Province(ProvinceRef),
    School(SchoolRef),
    Major(MajorRef),
}

/// A pending request together with its pagination and retry state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub kind: TaskKind,
    pub page: u32,
    pub continue_paging: bool,
    /// Portal-level retries (HTTP errors, rate limiting)
    pub retry: u32,
    /// Transport-level retries (timeouts, resets)
    pub transport_retry: u32,
}

impl CrawlTask {
    fn first_page(kind: TaskKind) -> Self {
        Self {
            kind,
            page: 1,
            continue_paging: true,
            retry: 0,
            transport_retry: 0,
        }
    }

    pub fn province(province: ProvinceRef) -> Self {
        Self::first_page(TaskKind::Province(province))
    }

    pub fn school(school: SchoolRef) -> Self {
        Self::first_page(TaskKind::School(school))
    }

    pub fn major(major: MajorRef) -> Self {
        Self::first_page(TaskKind::Major(major))
    }

    /// Starts at an arbitrary page, used when replaying logged failures
    pub fn at_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn level(&self) -> Level {
        match self.kind {
            TaskKind::Province(_) => Level::Province,
            TaskKind::School(_) => Level::School,
            TaskKind::Major(_) => Level::Major,
        }
    }

    /// Province the task ultimately belongs to, if known
    pub fn province_ref(&self) -> Option<&ProvinceRef> {
        match &self.kind {
            TaskKind::Province(p) => Some(p),
            TaskKind::School(s) => s.province.as_ref(),
            TaskKind::Major(m) => m.province.as_ref(),
        }
    }

    /// Same page again, one retry further along, without advancing past it
    pub fn retry_same_page(mut self) -> Self {
        self.continue_paging = false;
        self.retry += 1;
        self
    }

    /// Following page at the same level with fresh retry counters
    pub fn next_page(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            page: self.page + 1,
            continue_paging: true,
            retry: 0,
            transport_retry: 0,
        }
    }

    /// Row offset of this task's page
    pub fn start(&self, page_size: u32) -> u32 {
        (self.page - 1) * page_size
    }

    /// Form fields posted for this task
    pub fn form(&self, portal: &PortalConfig) -> Vec<(&'static str, String)> {
        let page_size = portal.page_size;
        match &self.kind {
            TaskKind::Province(province) => vec![
                ("ssdm", province.code.clone()),
                ("dwmc", String::new()),
                ("dwdm", String::new()),
                ("xxfs", String::new()),
                ("tydxs", String::new()),
                ("jsggjh", String::new()),
                ("dwlxs[0]", "all".to_string()),
                ("start", self.start(page_size).to_string()),
                ("curPage", self.page.to_string()),
                ("pageSize", page_size.to_string()),
                ("totalPage", String::new()),
                ("totalCount", String::new()),
            ],
            TaskKind::School(school) => vec![
                ("dwdm", school.code.clone()),
                ("dwmc", school.name.clone()),
                ("zydm", String::new()),
                ("zymc", String::new()),
                ("xwlx", String::new()),
                ("mldm", String::new()),
                ("yjxkdm", String::new()),
                ("xxfs", String::new()),
                ("tydxs", String::new()),
                ("jsggjh", String::new()),
                ("start", self.start(page_size).to_string()),
                ("curPage", self.page.to_string()),
                ("pageSize", page_size.to_string()),
                ("totalPage", "0".to_string()),
                ("totalCount", "0".to_string()),
            ],
            TaskKind::Major(major) => vec![
                ("zydm", major.code.clone()),
                ("zymc", major.name.clone()),
                ("dwdm", major.school_code.clone()),
                ("xxfs", String::new()),
                ("dwlxs", String::new()),
                ("tydxs", String::new()),
                ("jsggjh", String::new()),
                ("start", "0".to_string()),
                ("pageSize", portal.detail_page_size.to_string()),
                ("totalCount", "0".to_string()),
            ],
        }
    }

    /// The form as an ordered map, which is what the failure log serializes
    pub fn params(&self, portal: &PortalConfig) -> BTreeMap<String, String> {
        let mut params: BTreeMap<String, String> = self
            .form(portal)
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        // The detail form has no school name; keep it so a replay can fill records.
        if let TaskKind::Major(major) = &self.kind {
            if let Some(school_name) = &major.school_name {
                params.insert("dwmc".to_string(), school_name.clone());
            }
        }

        params
    }
}

impl fmt::Display for CrawlTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TaskKind::Province(p) => write!(f, "schools of {} ({}) page {}", p.name, p.code, self.page),
            TaskKind::School(s) => write!(f, "majors of {} ({}) page {}", s.name, s.code, self.page),
            TaskKind::Major(m) => write!(f, "details of {} {} at {}", m.code, m.name, m.school_code),
        }
    }
}
