use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInfo {
    pub id: Uuid,
    pub program_code: String,
    pub program_name: String,
    pub degree_code: Option<String>,
    pub degree_name: Option<String>,
    pub department_code: Option<String>,
    pub department_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstitutionInfo {
    pub id: Uuid,
    pub institution_code: String,
    pub name: String,
}

/// One published result row, decoded from `final_marks` joined with its
/// program metadata.
#[derive(Debug, Clone)]
pub struct FinalMarkRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub program_id: Uuid,
    pub examination_session_id: Option<Uuid>,
    pub institution_id: Option<Uuid>,
    pub percentage: Option<f64>,
    pub grade_points: Option<f64>,
    pub is_pass: bool,
    pub pass_status: Option<String>,
    pub semester: Option<i32>,
    pub program: Option<ProgramInfo>,
    pub institution: Option<InstitutionInfo>,
}

impl FinalMarkRecord {
    pub fn is_absent(&self) -> bool {
        self.pass_status.as_deref() == Some("Absent")
    }
}

#[derive(Debug, Clone)]
pub struct ExaminationSession {
    pub id: Uuid,
    pub session_code: String,
    pub session_name: Option<String>,
    pub academic_year_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct AcademicYear {
    pub id: Uuid,
    pub academic_year: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegreeLevel {
    #[serde(rename = "UG")]
    Ug,
    #[serde(rename = "PG")]
    Pg,
    Diploma,
    Certificate,
    #[default]
    All,
}

impl DegreeLevel {
    pub const ALL_LEVELS: [DegreeLevel; 5] = [
        DegreeLevel::All,
        DegreeLevel::Ug,
        DegreeLevel::Pg,
        DegreeLevel::Diploma,
        DegreeLevel::Certificate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DegreeLevel::Ug => "UG",
            DegreeLevel::Pg => "PG",
            DegreeLevel::Diploma => "Diploma",
            DegreeLevel::Certificate => "Certificate",
            DegreeLevel::All => "All",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DegreeLevel::Ug => "Undergraduate (UG)",
            DegreeLevel::Pg => "Postgraduate (PG)",
            DegreeLevel::Diploma => "Diploma",
            DegreeLevel::Certificate => "Certificate",
            DegreeLevel::All => "All Levels",
        }
    }
}

impl fmt::Display for DegreeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DegreeLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        DegreeLevel::ALL_LEVELS
            .into_iter()
            .find(|level| level.as_str() == value)
            .ok_or_else(|| format!("unknown degree level '{value}'"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultAnalyticsFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub academic_year_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examination_session_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_id: Option<Uuid>,
    pub degree_level: DegreeLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semester: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramResultSummary {
    pub program_id: String,
    pub program_code: String,
    pub program_name: String,
    pub degree_code: String,
    pub degree_name: String,
    pub degree_level: String,
    pub department_code: String,
    pub department_name: String,
    pub regulation_code: String,

    pub total_students_appeared: usize,
    pub total_students_passed: usize,
    pub total_students_failed: usize,
    pub pass_percentage: f64,
    pub fail_percentage: f64,

    pub distinction_count: usize,
    pub first_class_count: usize,
    pub second_class_count: usize,
    pub pass_class_count: usize,
    pub fail_count: usize,

    pub average_percentage: f64,
    pub average_cgpa: f64,
    pub highest_cgpa: f64,
    pub lowest_cgpa: f64,

    pub total_backlogs: usize,
    pub students_with_backlogs: usize,
    pub avg_backlogs_per_student: f64,

    pub is_above_college_average: bool,
    pub variance_from_average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramTrend {
    pub academic_year: String,
    pub program_code: String,
    pub program_name: String,
    pub total_appeared: usize,
    pub total_passed: usize,
    pub pass_percentage: f64,
    pub average_cgpa: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeakProgram {
    pub program_id: String,
    pub program_code: String,
    pub program_name: String,
    pub pass_percentage: f64,
    pub college_average: f64,
    pub variance: f64,
    pub total_backlogs: usize,
    pub critical_subjects: Vec<String>,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramComparisonData {
    pub program_code: String,
    pub program_name: String,
    pub pass_percentage: f64,
    pub average_cgpa: f64,
    pub total_students: usize,
    pub backlogs_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegreeLevelSummary {
    pub degree_level: String,
    pub total_programs: usize,
    pub total_students: usize,
    pub average_pass_percentage: f64,
    pub average_cgpa: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgramAnalysisDashboardData {
    pub programs: Vec<ProgramResultSummary>,
    pub trends: Vec<ProgramTrend>,
    pub weak_programs: Vec<WeakProgram>,
    pub top_programs: Vec<ProgramResultSummary>,
    pub comparison_chart_data: Vec<ProgramComparisonData>,
    pub degree_level_summary: Vec<DegreeLevelSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollegeResultSummary {
    pub institution_id: String,
    pub institution_code: String,
    pub institution_name: String,
    pub academic_year: String,
    pub examination_session: String,
    pub examination_session_code: String,

    pub total_students_appeared: usize,
    pub total_students_passed: usize,
    pub total_students_failed: usize,
    pub total_students_absent: usize,
    pub pass_percentage: f64,
    pub fail_percentage: f64,
    pub absent_percentage: f64,

    pub distinction_count: usize,
    pub first_class_count: usize,
    pub second_class_count: usize,
    pub third_class_count: usize,
    pub pass_class_count: usize,

    pub distinction_percentage: f64,
    pub first_class_percentage: f64,
    pub second_class_percentage: f64,
    pub third_class_percentage: f64,
    pub pass_class_percentage: f64,

    pub average_percentage: f64,
    pub average_gpa: f64,
    pub average_cgpa: f64,
    pub highest_percentage: f64,
    pub lowest_percentage: f64,
    pub median_percentage: f64,

    pub total_backlogs: usize,
    pub students_with_backlogs: usize,
    pub backlog_percentage: f64,
    pub cleared_backlogs: usize,
    pub pending_backlogs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollegeResultTrend {
    pub academic_year: String,
    pub examination_session: String,
    pub total_appeared: usize,
    pub total_passed: usize,
    pub pass_percentage: f64,
    pub average_percentage: f64,
    pub distinction_count: usize,
    pub first_class_count: usize,
}

/// Result counts for one cohort slice.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CohortCounts {
    pub total_appeared: usize,
    pub total_passed: usize,
    pub total_failed: usize,
    pub pass_percentage: f64,
    pub average_percentage: f64,
    pub distinction_count: usize,
    pub first_class_count: usize,
}

// The result tables carry no student demographics, so the gender and
// category breakdowns hold a single `All` row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenderWiseResult {
    pub gender: String,
    #[serde(flatten)]
    pub counts: CohortCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryWiseResult {
    pub category: String,
    #[serde(flatten)]
    pub counts: CohortCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemesterWiseResult {
    pub semester: i32,
    pub semester_name: String,
    pub total_appeared: usize,
    pub total_passed: usize,
    pub pass_percentage: f64,
    pub average_gpa: f64,
    pub backlogs_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPublishStatus {
    Published,
    Processing,
    Pending,
}

impl SessionPublishStatus {
    pub fn from_session_status(status: Option<&str>) -> Self {
        match status {
            Some("Completed") => SessionPublishStatus::Published,
            Some("Active") => SessionPublishStatus::Processing,
            _ => SessionPublishStatus::Pending,
        }
    }
}

/// Per-session counts as read from the store, before percentages.
#[derive(Debug, Clone)]
pub struct SessionResultCounts {
    pub examination_session_id: Uuid,
    pub session_code: String,
    pub session_name: Option<String>,
    pub exam_start_date: Option<NaiveDate>,
    pub session_status: Option<String>,
    pub total_students: i64,
    pub passed_students: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentSessionResult {
    pub examination_session_id: String,
    pub session_code: String,
    pub session_name: String,
    pub exam_date: Option<NaiveDate>,
    pub total_students: i64,
    pub pass_percentage: f64,
    pub status: SessionPublishStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollegeDashboardData {
    pub summary: CollegeResultSummary,
    pub trends: Vec<CollegeResultTrend>,
    pub gender_wise: Vec<GenderWiseResult>,
    pub category_wise: Vec<CategoryWiseResult>,
    pub semester_wise: Vec<SemesterWiseResult>,
    pub recent_sessions: Vec<RecentSessionResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub institutions: Vec<FilterOption>,
    pub academic_years: Vec<FilterOption>,
    pub programs: Vec<FilterOption>,
    pub examination_sessions: Vec<FilterOption>,
    pub regulations: Vec<FilterOption>,
    pub batches: Vec<FilterOption>,
    pub boards: Vec<FilterOption>,
    pub sections: Vec<FilterOption>,
    pub semesters: Vec<FilterOption>,
    pub degree_levels: Vec<FilterOption>,
}
