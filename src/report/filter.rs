use chrono::NaiveDate;

use super::period::Period;
use crate::model::student::ClassLevel;

/// Which attendance records a report covers. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFilter {
    pub period: Period,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub class: Option<ClassLevel>,
    pub section: Option<String>,
    /// Overrides class and section when set.
    pub student_id: Option<u64>,
}

impl ReportFilter {
    pub fn new(period: Period, start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        Self {
            period,
            start_date,
            end_date,
            class: None,
            section: None,
            student_id: None,
        }
    }

    /// Applies a raw `class` parameter. Values that are not a known class
    /// level leave the report unfiltered by class.
    pub fn with_class(mut self, raw: Option<&str>) -> Self {
        self.class = raw.and_then(|value| value.parse::<ClassLevel>().ok());
        if let (Some(value), None) = (raw, self.class) {
            tracing::debug!(class = value, "Ignoring unrecognised class filter");
        }
        self
    }

    pub fn with_section(mut self, section: Option<&str>) -> Self {
        self.section = section
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        self
    }

    pub fn for_student(mut self, student_id: u64) -> Self {
        self.student_id = Some(student_id);
        self
    }

    /// Class and section live on the student, so they need the join.
    pub fn needs_student_join(&self) -> bool {
        self.student_id.is_none() && (self.class.is_some() || self.section.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ReportFilter {
        ReportFilter::new(Period::Day, None, None)
    }

    #[test]
    fn numeric_and_named_classes_filter() {
        assert_eq!(base().with_class(Some("5")).class, Some(ClassLevel::new(5).unwrap()));
        assert_eq!(base().with_class(Some("-1")).class, Some(ClassLevel::NURSERY));
        assert_eq!(base().with_class(Some("KG")).class, Some(ClassLevel::KG));
    }

    #[test]
    fn invalid_class_is_ignored() {
        assert_eq!(base().with_class(Some("five")).class, None);
        assert_eq!(base().with_class(Some("13")).class, None);
        assert_eq!(base().with_class(Some("")).class, None);
        assert_eq!(base().with_class(None).class, None);
    }

    #[test]
    fn blank_section_is_ignored() {
        assert_eq!(base().with_section(Some("  ")).section, None);
        assert_eq!(base().with_section(Some(" Girls ")).section.as_deref(), Some("Girls"));
    }

    #[test]
    fn join_only_for_student_side_filters() {
        assert!(!base().needs_student_join());
        assert!(base().with_class(Some("3")).needs_student_join());
        assert!(base().with_section(Some("A")).needs_student_join());
        assert!(!base().with_class(Some("3")).for_student(9).needs_student_join());
    }
}
