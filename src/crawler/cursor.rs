//! Breakpoint cursor for resuming a traversal part-way through
//!
//! A cursor remembers the last processed (province, school, major) and skips
//! siblings until the remembered one comes round again. The matching element
//! itself is processed, as is everything after it.

use crate::crawler::task::Level;
use crate::storage::ResumePoint;

/// Resume position plus the per-level "reached" latches
#[derive(Debug, Clone, Default)]
pub struct BreakpointCursor {
    province: Option<String>,
    school_name: Option<String>,
    major_code: Option<String>,
    reached_school: bool,
    reached_major: bool,
}

impl BreakpointCursor {
    /// Builds a cursor; each level is "reached" up front unless a value is set for it
    pub fn new(
        province: Option<String>,
        school_name: Option<String>,
        major_code: Option<String>,
    ) -> Self {
        let province = province.filter(|p| !p.is_empty());
        let school_name = school_name.filter(|s| !s.is_empty());
        let major_code = major_code.filter(|m| !m.is_empty());

        Self {
            reached_school: school_name.is_none(),
            reached_major: major_code.is_none(),
            province,
            school_name,
            major_code,
        }
    }

    /// A cursor that skips nothing
    pub fn empty() -> Self {
        Self::new(None, None, None)
    }

    pub fn province(&self) -> Option<&str> {
        self.province.as_deref()
    }

    pub fn school_name(&self) -> Option<&str> {
        self.school_name.as_deref()
    }

    pub fn major_code(&self) -> Option<&str> {
        self.major_code.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.province.is_none() && self.school_name.is_none() && self.major_code.is_none()
    }

    /// Decides whether a list item at `level` should be descended into
    ///
    /// While a level has not been reached, only the configured breakpoint value passes,
    /// and passing it latches the level for the rest of this cursor's life. The
    /// province level is gated by the caller's own iteration and always passes here.
    pub fn should_process(&mut self, level: Level, candidate: &str) -> bool {
        let (reached, target) = match level {
            Level::Province => return true,
            Level::School => (&mut self.reached_school, self.school_name.as_deref()),
            Level::Major => (&mut self.reached_major, self.major_code.as_deref()),
        };

        if *reached {
            return true;
        }

        if target == Some(candidate) {
            *reached = true;
            true
        } else {
            false
        }
    }
}

impl From<ResumePoint> for BreakpointCursor {
    fn from(point: ResumePoint) -> Self {
        Self::new(
            Some(point.province),
            Some(point.school_name),
            Some(point.major_code),
        )
    }
}
