use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use uuid::Uuid;

use crate::db::ResultStore;
use crate::enrich::{self, SessionIndex, UNKNOWN};
use crate::error::Result;
use crate::models::{
    CategoryWiseResult, CohortCounts, CollegeDashboardData, CollegeResultSummary,
    CollegeResultTrend, DegreeLevelSummary, FinalMarkRecord, GenderWiseResult,
    ProgramAnalysisDashboardData, ProgramComparisonData, ProgramResultSummary, ProgramTrend,
    RecentSessionResult, ResultAnalyticsFilters, SemesterWiseResult, SessionPublishStatus,
    SessionResultCounts, WeakProgram,
};

pub const URGENT_RECOMMENDATION: &str = "Urgent: Comprehensive review and remedial classes required";
pub const ATTENTION_RECOMMENDATION: &str =
    "Attention needed: Additional tutorials and focused teaching recommended";
pub const MONITOR_RECOMMENDATION: &str = "Monitor: Track performance in upcoming sessions";

pub const PROGRAM_FETCH_ERROR: &str = "Failed to fetch program data";
pub const RESULT_FETCH_ERROR: &str = "Failed to fetch result data";

/// Sessions kept in the college trend series.
pub const TREND_SESSIONS: usize = 5;
/// Sessions listed under recent sessions on the college dashboard.
pub const RECENT_SESSIONS: i64 = 5;

/// Cut points used when classifying results and ranking programs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyticsPolicy {
    /// Points below the college average at which a program counts as weak.
    pub weak_margin: f64,
    /// Points below the college average at which a weak program is urgent.
    pub urgent_margin: f64,
    pub distinction_min: f64,
    pub first_class_min: f64,
    pub second_class_min: f64,
    /// Only the college breakdown separates third class from pass class.
    pub third_class_min: f64,
    pub pass_class_min: f64,
    pub top_count: usize,
}

impl Default for AnalyticsPolicy {
    fn default() -> Self {
        Self {
            weak_margin: 10.0,
            urgent_margin: 20.0,
            distinction_min: 75.0,
            first_class_min: 60.0,
            second_class_min: 50.0,
            third_class_min: 40.0,
            pass_class_min: 35.0,
            top_count: 5,
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn ratio_percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Pass rate over the whole filtered set, independent of any grouping.
pub fn college_average(records: &[FinalMarkRecord]) -> f64 {
    let passed = records.iter().filter(|r| r.is_pass).count();
    ratio_percent(passed, records.len())
}

/// Summary for one program partition. `records` must be non-empty and share
/// a program id.
pub fn program_summary(
    records: &[&FinalMarkRecord],
    college_avg: f64,
    policy: &AnalyticsPolicy,
) -> ProgramResultSummary {
    let program = records.first().and_then(|r| r.program.as_ref());
    let program_id = program
        .map(|p| p.id)
        .or_else(|| records.first().map(|r| r.program_id));

    let appeared = records.len();
    let passed: Vec<&FinalMarkRecord> = records.iter().copied().filter(|r| r.is_pass).collect();
    let failed: Vec<&FinalMarkRecord> = records.iter().copied().filter(|r| !r.is_pass).collect();

    let in_band = |min: f64, max: Option<f64>| {
        passed
            .iter()
            .filter_map(|r| r.percentage)
            .filter(|pct| *pct >= min && max.map_or(true, |max| *pct < max))
            .count()
    };
    let distinction_count = in_band(policy.distinction_min, None);
    let first_class_count = in_band(policy.first_class_min, Some(policy.distinction_min));
    let second_class_count = in_band(policy.second_class_min, Some(policy.first_class_min));
    let pass_class_count = in_band(policy.pass_class_min, Some(policy.second_class_min));

    let percentages: Vec<f64> = records.iter().filter_map(|r| r.percentage).collect();
    let grade_points: Vec<f64> = records.iter().filter_map(|r| r.grade_points).collect();

    let highest_cgpa = grade_points.iter().copied().fold(0.0, f64::max);
    // Minimum positive grade point; zero points mean "not graded", not a low score.
    let lowest_cgpa = grade_points
        .iter()
        .copied()
        .filter(|g| *g > 0.0)
        .reduce(f64::min)
        .unwrap_or(0.0);

    let pass_percentage = ratio_percent(passed.len(), appeared);
    let students_with_backlogs = failed
        .iter()
        .map(|r| r.student_id)
        .collect::<HashSet<Uuid>>()
        .len();

    let text = |value: Option<&String>| value.cloned().unwrap_or_default();

    ProgramResultSummary {
        program_id: program_id.map(|id| id.to_string()).unwrap_or_default(),
        program_code: program.map(|p| p.program_code.clone()).unwrap_or_default(),
        program_name: program.map(|p| p.program_name.clone()).unwrap_or_default(),
        degree_code: text(program.and_then(|p| p.degree_code.as_ref())),
        degree_name: text(program.and_then(|p| p.degree_name.as_ref())),
        degree_level: String::new(),
        department_code: text(program.and_then(|p| p.department_code.as_ref())),
        department_name: text(program.and_then(|p| p.department_name.as_ref())),
        regulation_code: String::new(),

        total_students_appeared: appeared,
        total_students_passed: passed.len(),
        total_students_failed: failed.len(),
        pass_percentage: round2(pass_percentage),
        fail_percentage: round2(ratio_percent(failed.len(), appeared)),

        distinction_count,
        first_class_count,
        second_class_count,
        pass_class_count,
        fail_count: failed.len(),

        average_percentage: round2(mean(&percentages)),
        average_cgpa: round2(mean(&grade_points)),
        highest_cgpa,
        lowest_cgpa,

        total_backlogs: failed.len(),
        students_with_backlogs,
        avg_backlogs_per_student: if students_with_backlogs > 0 {
            failed.len() as f64 / students_with_backlogs as f64
        } else {
            0.0
        },

        is_above_college_average: pass_percentage >= college_avg,
        variance_from_average: round2(pass_percentage - college_avg),
    }
}

fn by_pass_percentage_desc(a: &ProgramResultSummary, b: &ProgramResultSummary) -> Ordering {
    b.pass_percentage
        .partial_cmp(&a.pass_percentage)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.program_code.cmp(&b.program_code))
}

/// One summary per program id, best pass rate first.
pub fn summarize_programs(
    records: &[FinalMarkRecord],
    college_avg: f64,
    policy: &AnalyticsPolicy,
) -> Vec<ProgramResultSummary> {
    let mut partitions: HashMap<Uuid, Vec<&FinalMarkRecord>> = HashMap::new();
    for record in records {
        partitions.entry(record.program_id).or_default().push(record);
    }

    let mut programs: Vec<ProgramResultSummary> = partitions
        .values()
        .map(|partition| program_summary(partition, college_avg, policy))
        .collect();
    programs.sort_by(by_pass_percentage_desc);
    programs
}

pub fn recommendation(pass_percentage: f64, college_avg: f64, policy: &AnalyticsPolicy) -> &'static str {
    if pass_percentage < college_avg - policy.urgent_margin {
        URGENT_RECOMMENDATION
    } else if pass_percentage < college_avg - policy.weak_margin {
        ATTENTION_RECOMMENDATION
    } else {
        MONITOR_RECOMMENDATION
    }
}

pub fn weak_programs(
    programs: &[ProgramResultSummary],
    college_avg: f64,
    policy: &AnalyticsPolicy,
) -> Vec<WeakProgram> {
    let threshold = college_avg - policy.weak_margin;

    programs
        .iter()
        .filter(|p| p.pass_percentage < threshold)
        .map(|p| WeakProgram {
            program_id: p.program_id.clone(),
            program_code: p.program_code.clone(),
            program_name: p.program_name.clone(),
            pass_percentage: p.pass_percentage,
            college_average: round2(college_avg),
            variance: p.variance_from_average,
            total_backlogs: p.total_backlogs,
            critical_subjects: Vec::new(),
            recommendation: recommendation(p.pass_percentage, college_avg, policy).to_string(),
        })
        .collect()
}

/// Pass rate per program per academic year, ordered by program code then year.
pub fn program_trends(records: &[FinalMarkRecord], sessions: &SessionIndex) -> Vec<ProgramTrend> {
    let mut groups: BTreeMap<(String, String), Vec<&FinalMarkRecord>> = BTreeMap::new();

    for record in records {
        let program_code = record
            .program
            .as_ref()
            .map(|p| p.program_code.as_str())
            .filter(|code| !code.is_empty())
            .unwrap_or(UNKNOWN)
            .to_string();
        let academic_year = sessions
            .academic_year_or_unknown(record.examination_session_id)
            .to_string();
        groups
            .entry((program_code, academic_year))
            .or_default()
            .push(record);
    }

    groups
        .into_iter()
        .map(|((program_code, academic_year), group)| {
            let passed = group.iter().filter(|r| r.is_pass).count();
            let grade_points: Vec<f64> = group.iter().filter_map(|r| r.grade_points).collect();
            ProgramTrend {
                academic_year,
                program_code,
                program_name: group
                    .first()
                    .and_then(|r| r.program.as_ref())
                    .map(|p| p.program_name.clone())
                    .unwrap_or_default(),
                total_appeared: group.len(),
                total_passed: passed,
                pass_percentage: round2(ratio_percent(passed, group.len())),
                average_cgpa: round2(mean(&grade_points)),
            }
        })
        .collect()
}

/// Rolls programs up by degree name, which stands in for the degree level.
pub fn degree_level_summary(programs: &[ProgramResultSummary]) -> Vec<DegreeLevelSummary> {
    let mut levels: BTreeMap<&str, Vec<&ProgramResultSummary>> = BTreeMap::new();
    for program in programs {
        let level = if program.degree_name.is_empty() {
            UNKNOWN
        } else {
            program.degree_name.as_str()
        };
        levels.entry(level).or_default().push(program);
    }

    levels
        .into_iter()
        .map(|(level, group)| {
            let total_students: usize = group.iter().map(|p| p.total_students_appeared).sum();
            let total_passed: usize = group.iter().map(|p| p.total_students_passed).sum();
            let cgpas: Vec<f64> = group.iter().map(|p| p.average_cgpa).collect();
            DegreeLevelSummary {
                degree_level: level.to_string(),
                total_programs: group.len(),
                total_students,
                average_pass_percentage: round2(ratio_percent(total_passed, total_students)),
                average_cgpa: round2(mean(&cgpas)),
            }
        })
        .collect()
}

pub fn comparison_data(programs: &[ProgramResultSummary]) -> Vec<ProgramComparisonData> {
    programs
        .iter()
        .map(|p| ProgramComparisonData {
            program_code: p.program_code.clone(),
            program_name: p.program_name.clone(),
            pass_percentage: p.pass_percentage,
            average_cgpa: p.average_cgpa,
            total_students: p.total_students_appeared,
            backlogs_count: p.total_backlogs,
        })
        .collect()
}

pub fn build_dashboard(
    records: &[FinalMarkRecord],
    sessions: &SessionIndex,
    policy: &AnalyticsPolicy,
) -> ProgramAnalysisDashboardData {
    if records.is_empty() {
        return ProgramAnalysisDashboardData::default();
    }

    let college_avg = college_average(records);
    let programs = summarize_programs(records, college_avg, policy);
    let weak_programs = weak_programs(&programs, college_avg, policy);
    let top_programs = programs.iter().take(policy.top_count).cloned().collect();
    let trends = program_trends(records, sessions);
    let comparison_chart_data = comparison_data(&programs);
    let degree_level_summary = degree_level_summary(&programs);

    ProgramAnalysisDashboardData {
        programs,
        trends,
        weak_programs,
        top_programs,
        comparison_chart_data,
        degree_level_summary,
    }
}

/// Fetches published results for `filters`, resolves session labels and
/// aggregates them into the program dashboard.
pub async fn load_dashboard(
    store: &dyn ResultStore,
    filters: &ResultAnalyticsFilters,
    policy: &AnalyticsPolicy,
) -> Result<ProgramAnalysisDashboardData> {
    let records = store
        .fetch_final_marks(filters)
        .await
        .inspect_err(|err| tracing::error!(error = %err, "failed to fetch program stats"))
        .map_err(|err| err.fetching(PROGRAM_FETCH_ERROR))?;

    if records.is_empty() {
        return Ok(ProgramAnalysisDashboardData::default());
    }

    let sessions = enrich::load_session_index(store, &records).await;
    tracing::debug!(
        records = records.len(),
        sessions = sessions.len(),
        "aggregating program stats"
    );
    Ok(build_dashboard(&records, &sessions, policy))
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted.get(sorted.len() / 2).copied().unwrap_or(0.0)
}

fn passed_in_band(records: &[&FinalMarkRecord], min: f64, max: Option<f64>) -> usize {
    records
        .iter()
        .filter(|r| r.is_pass)
        .filter_map(|r| r.percentage)
        .filter(|pct| *pct >= min && max.map_or(true, |max| *pct < max))
        .count()
}

/// Institution-wide summary. Session, year and institution labels come from
/// the first record.
pub fn college_summary(
    records: &[FinalMarkRecord],
    sessions: &SessionIndex,
    policy: &AnalyticsPolicy,
) -> CollegeResultSummary {
    let all: Vec<&FinalMarkRecord> = records.iter().collect();
    let appeared = records.len();
    let passed = records.iter().filter(|r| r.is_pass).count();
    let failed: Vec<&FinalMarkRecord> = records
        .iter()
        .filter(|r| !r.is_pass && !r.is_absent())
        .collect();
    let absent = records.iter().filter(|r| r.is_absent()).count();

    let distinction_count = passed_in_band(&all, policy.distinction_min, None);
    let first_class_count = passed_in_band(&all, policy.first_class_min, Some(policy.distinction_min));
    let second_class_count = passed_in_band(&all, policy.second_class_min, Some(policy.first_class_min));
    let third_class_count = passed_in_band(&all, policy.third_class_min, Some(policy.second_class_min));
    let pass_class_count = passed_in_band(&all, policy.pass_class_min, Some(policy.third_class_min));

    let percentages: Vec<f64> = records.iter().filter_map(|r| r.percentage).collect();
    let grade_points: Vec<f64> = records.iter().filter_map(|r| r.grade_points).collect();
    let average_gpa = round2(mean(&grade_points));

    let first = records.first();
    let institution = first.and_then(|r| r.institution.as_ref());
    let session = first
        .and_then(|r| r.examination_session_id)
        .and_then(|id| sessions.session(id));

    CollegeResultSummary {
        institution_id: institution.map(|i| i.id.to_string()).unwrap_or_default(),
        institution_code: institution.map(|i| i.institution_code.clone()).unwrap_or_default(),
        institution_name: institution.map(|i| i.name.clone()).unwrap_or_default(),
        academic_year: session
            .and_then(|s| s.academic_year.clone())
            .unwrap_or_default(),
        examination_session: session
            .and_then(|s| s.session_name.clone())
            .unwrap_or_default(),
        examination_session_code: session.map(|s| s.session_code.clone()).unwrap_or_default(),

        total_students_appeared: appeared,
        total_students_passed: passed,
        total_students_failed: failed.len(),
        total_students_absent: absent,
        pass_percentage: round2(ratio_percent(passed, appeared)),
        fail_percentage: round2(ratio_percent(failed.len(), appeared)),
        absent_percentage: round2(ratio_percent(absent, appeared)),

        distinction_count,
        first_class_count,
        second_class_count,
        third_class_count,
        pass_class_count,

        distinction_percentage: round2(ratio_percent(distinction_count, passed)),
        first_class_percentage: round2(ratio_percent(first_class_count, passed)),
        second_class_percentage: round2(ratio_percent(second_class_count, passed)),
        third_class_percentage: round2(ratio_percent(third_class_count, passed)),
        pass_class_percentage: round2(ratio_percent(pass_class_count, passed)),

        average_percentage: round2(mean(&percentages)),
        average_gpa,
        average_cgpa: average_gpa,
        highest_percentage: percentages.iter().copied().fold(0.0, f64::max),
        // Same rule as lowest_cgpa: zero means "not graded".
        lowest_percentage: percentages
            .iter()
            .copied()
            .filter(|p| *p > 0.0)
            .reduce(f64::min)
            .unwrap_or(0.0),
        median_percentage: median(&percentages),

        total_backlogs: failed.len(),
        students_with_backlogs: failed
            .iter()
            .map(|r| r.student_id)
            .collect::<HashSet<Uuid>>()
            .len(),
        backlog_percentage: round2(ratio_percent(failed.len(), appeared)),
        cleared_backlogs: 0,
        pending_backlogs: failed.len(),
    }
}

/// Per-session pass rates, oldest first, keeping the latest
/// [`TREND_SESSIONS`]. Sessions order by academic year then session code.
pub fn college_trends(
    records: &[FinalMarkRecord],
    sessions: &SessionIndex,
    policy: &AnalyticsPolicy,
) -> Vec<CollegeResultTrend> {
    let mut groups: BTreeMap<(String, String), (String, Vec<&FinalMarkRecord>)> = BTreeMap::new();

    for record in records {
        let label = record
            .examination_session_id
            .and_then(|id| sessions.session(id));
        let academic_year = label
            .and_then(|l| l.academic_year.clone())
            .unwrap_or_default();
        let (code, name) = match label {
            Some(l) => (l.session_code.clone(), l.display_name().to_string()),
            None => (UNKNOWN.to_string(), UNKNOWN.to_string()),
        };
        groups
            .entry((academic_year, code))
            .or_insert_with(|| (name, Vec::new()))
            .1
            .push(record);
    }

    let trends: Vec<CollegeResultTrend> = groups
        .into_iter()
        .map(|((academic_year, _), (examination_session, group))| {
            let passed = group.iter().filter(|r| r.is_pass).count();
            let percentages: Vec<f64> = group.iter().filter_map(|r| r.percentage).collect();
            CollegeResultTrend {
                academic_year,
                examination_session,
                total_appeared: group.len(),
                total_passed: passed,
                pass_percentage: round2(ratio_percent(passed, group.len())),
                average_percentage: round2(mean(&percentages)),
                distinction_count: passed_in_band(&group, policy.distinction_min, None),
                first_class_count: passed_in_band(
                    &group,
                    policy.first_class_min,
                    Some(policy.distinction_min),
                ),
            }
        })
        .collect();

    let skip = trends.len().saturating_sub(TREND_SESSIONS);
    trends.into_iter().skip(skip).collect()
}

/// Counts over the whole set. Absent records count as failed here.
pub fn cohort_counts(records: &[FinalMarkRecord], policy: &AnalyticsPolicy) -> CohortCounts {
    let all: Vec<&FinalMarkRecord> = records.iter().collect();
    let passed = records.iter().filter(|r| r.is_pass).count();
    let percentages: Vec<f64> = records.iter().filter_map(|r| r.percentage).collect();

    CohortCounts {
        total_appeared: records.len(),
        total_passed: passed,
        total_failed: records.len() - passed,
        pass_percentage: round2(ratio_percent(passed, records.len())),
        average_percentage: round2(mean(&percentages)),
        distinction_count: passed_in_band(&all, policy.distinction_min, None),
        first_class_count: passed_in_band(&all, policy.first_class_min, Some(policy.distinction_min)),
    }
}

/// One row per semester, ascending. Records without a semester group under 0.
pub fn semester_wise(records: &[FinalMarkRecord]) -> Vec<SemesterWiseResult> {
    let mut groups: BTreeMap<i32, Vec<&FinalMarkRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.semester.unwrap_or(0)).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(semester, group)| {
            let passed = group.iter().filter(|r| r.is_pass).count();
            let grade_points: Vec<f64> = group.iter().filter_map(|r| r.grade_points).collect();
            SemesterWiseResult {
                semester,
                semester_name: format!("Semester {semester}"),
                total_appeared: group.len(),
                total_passed: passed,
                pass_percentage: round2(ratio_percent(passed, group.len())),
                average_gpa: round2(mean(&grade_points)),
                backlogs_count: group.len() - passed,
            }
        })
        .collect()
}

pub fn recent_sessions(counts: &[SessionResultCounts]) -> Vec<RecentSessionResult> {
    counts
        .iter()
        .map(|session| {
            let pass_percentage = if session.total_students > 0 {
                session.passed_students as f64 / session.total_students as f64 * 100.0
            } else {
                0.0
            };
            RecentSessionResult {
                examination_session_id: session.examination_session_id.to_string(),
                session_code: session.session_code.clone(),
                session_name: session
                    .session_name
                    .clone()
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| session.session_code.clone()),
                exam_date: session.exam_start_date,
                total_students: session.total_students,
                pass_percentage: round2(pass_percentage),
                status: SessionPublishStatus::from_session_status(session.session_status.as_deref()),
            }
        })
        .collect()
}

pub fn build_college_dashboard(
    records: &[FinalMarkRecord],
    sessions: &SessionIndex,
    recent: Vec<RecentSessionResult>,
    policy: &AnalyticsPolicy,
) -> CollegeDashboardData {
    if records.is_empty() {
        return CollegeDashboardData::default();
    }

    let overall = cohort_counts(records, policy);
    CollegeDashboardData {
        summary: college_summary(records, sessions, policy),
        trends: college_trends(records, sessions, policy),
        gender_wise: vec![GenderWiseResult {
            gender: "All".to_string(),
            counts: overall.clone(),
        }],
        category_wise: vec![CategoryWiseResult {
            category: "All".to_string(),
            counts: overall,
        }],
        semester_wise: semester_wise(records),
        recent_sessions: recent,
    }
}

/// Institution-level counterpart of [`load_dashboard`]. A failed recent
/// sessions lookup leaves that list empty.
pub async fn load_college_dashboard(
    store: &dyn ResultStore,
    filters: &ResultAnalyticsFilters,
    policy: &AnalyticsPolicy,
) -> Result<CollegeDashboardData> {
    let records = store
        .fetch_final_marks(filters)
        .await
        .inspect_err(|err| tracing::error!(error = %err, "failed to fetch college stats"))
        .map_err(|err| err.fetching(RESULT_FETCH_ERROR))?;

    if records.is_empty() {
        return Ok(CollegeDashboardData::default());
    }

    let sessions = enrich::load_session_index(store, &records).await;
    let recent = match store
        .recent_sessions(filters.institution_id, RECENT_SESSIONS)
        .await
    {
        Ok(counts) => recent_sessions(&counts),
        Err(err) => {
            tracing::warn!(error = %err, "failed to load recent sessions");
            Vec::new()
        }
    };

    tracing::debug!(records = records.len(), "aggregating college stats");
    Ok(build_college_dashboard(&records, &sessions, recent, policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AcademicYear, ExaminationSession, InstitutionInfo, ProgramInfo};

    fn program(code: &str, degree: &str) -> ProgramInfo {
        ProgramInfo {
            id: Uuid::new_v4(),
            program_code: code.to_string(),
            program_name: format!("{code} Program"),
            degree_code: Some(degree.to_uppercase()),
            degree_name: Some(degree.to_string()),
            department_code: Some("CS".to_string()),
            department_name: Some("Computer Science".to_string()),
        }
    }

    fn record(info: &ProgramInfo, is_pass: bool, percentage: Option<f64>) -> FinalMarkRecord {
        FinalMarkRecord {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            program_id: info.id,
            examination_session_id: None,
            institution_id: None,
            percentage,
            grade_points: percentage.map(|p| p / 10.0),
            is_pass,
            pass_status: Some(if is_pass { "Pass" } else { "Fail" }.to_string()),
            semester: None,
            program: Some(info.clone()),
            institution: None,
        }
    }

    fn cohort(info: &ProgramInfo, appeared: usize, passed: usize) -> Vec<FinalMarkRecord> {
        (0..appeared)
            .map(|i| {
                if i < passed {
                    record(info, true, Some(70.0))
                } else {
                    record(info, false, Some(20.0))
                }
            })
            .collect()
    }

    fn summary_for<'a>(programs: &'a [ProgramResultSummary], code: &str) -> &'a ProgramResultSummary {
        programs
            .iter()
            .find(|p| p.program_code == code)
            .expect("program summary")
    }

    #[test]
    fn two_program_example_flags_the_weak_one_as_urgent() {
        let a = program("A", "Bachelor of Science");
        let b = program("B", "Bachelor of Science");
        let mut records = cohort(&a, 80, 60);
        records.extend(cohort(&b, 20, 4));

        let dashboard = build_dashboard(&records, &SessionIndex::default(), &AnalyticsPolicy::default());

        assert!((college_average(&records) - 64.0).abs() < 1e-9);
        let summary_a = summary_for(&dashboard.programs, "A");
        assert_eq!(summary_a.pass_percentage, 75.0);
        assert!(summary_a.is_above_college_average);
        assert_eq!(summary_a.variance_from_average, 11.0);

        let summary_b = summary_for(&dashboard.programs, "B");
        assert_eq!(summary_b.pass_percentage, 20.0);
        assert!(!summary_b.is_above_college_average);

        assert_eq!(dashboard.weak_programs.len(), 1);
        let weak = &dashboard.weak_programs[0];
        assert_eq!(weak.program_code, "B");
        assert_eq!(weak.college_average, 64.0);
        assert_eq!(weak.variance, -44.0);
        assert_eq!(weak.recommendation, URGENT_RECOMMENDATION);
        assert!(weak.critical_subjects.is_empty());
    }

    #[test]
    fn empty_input_yields_empty_dashboard() {
        let dashboard = build_dashboard(&[], &SessionIndex::default(), &AnalyticsPolicy::default());
        assert!(dashboard.programs.is_empty());
        assert!(dashboard.trends.is_empty());
        assert!(dashboard.weak_programs.is_empty());
        assert!(dashboard.top_programs.is_empty());
        assert!(dashboard.comparison_chart_data.is_empty());
        assert!(dashboard.degree_level_summary.is_empty());
        assert_eq!(college_average(&[]), 0.0);
    }

    #[test]
    fn passed_plus_failed_equals_appeared_and_percent_is_bounded() {
        let mut records = Vec::new();
        for (i, code) in ["P1", "P2", "P3"].iter().enumerate() {
            let info = program(code, "Bachelor of Arts");
            records.extend(cohort(&info, 7 + i * 3, i * 4));
        }

        let avg = college_average(&records);
        for summary in summarize_programs(&records, avg, &AnalyticsPolicy::default()) {
            assert_eq!(
                summary.total_students_passed + summary.total_students_failed,
                summary.total_students_appeared
            );
            assert!((0.0..=100.0).contains(&summary.pass_percentage));
            let expected = round2(
                summary.total_students_passed as f64 / summary.total_students_appeared as f64 * 100.0,
            );
            assert_eq!(summary.pass_percentage, expected);
        }
    }

    #[test]
    fn pass_percentage_rounds_to_two_decimals() {
        let info = program("R", "Bachelor of Science");
        let records = cohort(&info, 3, 1);
        let summary = &summarize_programs(&records, 0.0, &AnalyticsPolicy::default())[0];
        assert_eq!(summary.pass_percentage, 33.33);
        assert_eq!(summary.fail_percentage, 66.67);
    }

    #[test]
    fn college_average_ignores_grouping() {
        let a = program("A", "BSc");
        let b = program("B", "BSc");
        let mut records = cohort(&a, 10, 9);
        records.extend(cohort(&b, 30, 3));
        assert_eq!(college_average(&records), 30.0);
    }

    #[test]
    fn classifies_passed_records_by_percentage_band() {
        let info = program("C", "Bachelor of Science");
        let records = vec![
            record(&info, true, Some(75.0)),
            record(&info, true, Some(91.5)),
            record(&info, true, Some(74.99)),
            record(&info, true, Some(60.0)),
            record(&info, true, Some(55.0)),
            record(&info, true, Some(35.0)),
            record(&info, true, Some(34.0)),
            record(&info, false, Some(80.0)),
            record(&info, true, None),
        ];

        let summary = &summarize_programs(&records, 0.0, &AnalyticsPolicy::default())[0];
        assert_eq!(summary.distinction_count, 2);
        assert_eq!(summary.first_class_count, 2);
        assert_eq!(summary.second_class_count, 1);
        assert_eq!(summary.pass_class_count, 1);
        assert_eq!(summary.fail_count, 1);
    }

    #[test]
    fn backlogs_count_distinct_failed_students() {
        let info = program("D", "Bachelor of Science");
        let repeat_student = Uuid::new_v4();
        let mut records = vec![
            record(&info, false, Some(10.0)),
            record(&info, false, Some(12.0)),
            record(&info, false, Some(14.0)),
            record(&info, true, Some(65.0)),
        ];
        records[0].student_id = repeat_student;
        records[1].student_id = repeat_student;

        let summary = &summarize_programs(&records, 0.0, &AnalyticsPolicy::default())[0];
        assert_eq!(summary.total_backlogs, 3);
        assert_eq!(summary.students_with_backlogs, 2);
        assert_eq!(summary.avg_backlogs_per_student, 1.5);
    }

    #[test]
    fn grade_point_extremes_default_to_zero() {
        let info = program("E", "Bachelor of Science");
        let records = vec![record(&info, true, None), record(&info, false, None)];
        let summary = &summarize_programs(&records, 0.0, &AnalyticsPolicy::default())[0];
        assert_eq!(summary.highest_cgpa, 0.0);
        assert_eq!(summary.lowest_cgpa, 0.0);
        assert_eq!(summary.average_cgpa, 0.0);
        assert_eq!(summary.average_percentage, 0.0);

        let mut records = vec![
            record(&info, true, Some(82.0)),
            record(&info, true, Some(61.0)),
            record(&info, false, Some(0.0)),
        ];
        records[2].grade_points = Some(0.0);
        let summary = &summarize_programs(&records, 0.0, &AnalyticsPolicy::default())[0];
        assert_eq!(summary.highest_cgpa, 8.2);
        assert_eq!(summary.lowest_cgpa, 6.1);
    }

    #[test]
    fn missing_program_metadata_defaults_to_empty_strings() {
        let info = program("F", "Bachelor of Science");
        let mut lone = record(&info, true, Some(50.0));
        lone.program = None;

        let summary = &summarize_programs(&[lone], 100.0, &AnalyticsPolicy::default())[0];
        assert_eq!(summary.program_id, info.id.to_string());
        assert_eq!(summary.program_code, "");
        assert_eq!(summary.degree_name, "");
        assert_eq!(summary.regulation_code, "");
    }

    #[test]
    fn top_programs_are_the_best_five_descending() {
        let mut records = Vec::new();
        for (i, code) in ["G1", "G2", "G3", "G4", "G5", "G6", "G7"].iter().enumerate() {
            let info = program(code, "Bachelor of Science");
            records.extend(cohort(&info, 10, i + 2));
        }

        let dashboard = build_dashboard(&records, &SessionIndex::default(), &AnalyticsPolicy::default());
        let codes: Vec<&str> = dashboard
            .top_programs
            .iter()
            .map(|p| p.program_code.as_str())
            .collect();
        assert_eq!(codes, vec!["G7", "G6", "G5", "G4", "G3"]);
        assert_eq!(dashboard.comparison_chart_data.len(), 7);
    }

    #[test]
    fn fewer_than_five_programs_are_all_top() {
        let info = program("H", "Bachelor of Science");
        let records = cohort(&info, 4, 2);
        let dashboard = build_dashboard(&records, &SessionIndex::default(), &AnalyticsPolicy::default());
        assert_eq!(dashboard.top_programs.len(), 1);
    }

    #[test]
    fn weak_iff_below_average_minus_margin() {
        let policy = AnalyticsPolicy::default();
        let programs: Vec<ProgramResultSummary> = [("W1", 49.99), ("W2", 50.0), ("W3", 70.0)]
            .iter()
            .map(|(code, pct)| {
                let info = program(code, "Bachelor of Science");
                let mut summary = program_summary(&[&record(&info, true, Some(70.0))], 60.0, &policy);
                summary.pass_percentage = *pct;
                summary
            })
            .collect();

        let weak = weak_programs(&programs, 60.0, &policy);
        assert_eq!(weak.len(), 1);
        assert_eq!(weak[0].program_code, "W1");
        assert_eq!(weak[0].recommendation, ATTENTION_RECOMMENDATION);
    }

    #[test]
    fn recommendation_tiers() {
        let policy = AnalyticsPolicy::default();
        assert_eq!(recommendation(39.0, 60.0, &policy), URGENT_RECOMMENDATION);
        assert_eq!(recommendation(40.0, 60.0, &policy), ATTENTION_RECOMMENDATION);
        assert_eq!(recommendation(50.0, 60.0, &policy), MONITOR_RECOMMENDATION);
    }

    #[test]
    fn configurable_margins_change_weak_threshold() {
        let policy = AnalyticsPolicy {
            weak_margin: 5.0,
            ..AnalyticsPolicy::default()
        };
        let a = program("A", "BSc");
        let b = program("B", "BSc");
        let mut records = cohort(&a, 10, 8);
        records.extend(cohort(&b, 10, 6));

        let dashboard = build_dashboard(&records, &SessionIndex::default(), &policy);
        assert_eq!(dashboard.weak_programs.len(), 1);
        assert_eq!(dashboard.weak_programs[0].program_code, "B");
        assert!(build_dashboard(&records, &SessionIndex::default(), &AnalyticsPolicy::default())
            .weak_programs
            .is_empty());
    }

    #[test]
    fn trends_split_by_program_and_academic_year() {
        let info = program("T", "Bachelor of Science");
        let year_a = Uuid::new_v4();
        let year_b = Uuid::new_v4();
        let session_a = Uuid::new_v4();
        let session_b = Uuid::new_v4();
        let sessions = SessionIndex::build(
            &[
                ExaminationSession {
                    id: session_a,
                    session_code: "NOV-2024".to_string(),
                    session_name: None,
                    academic_year_id: Some(year_a),
                },
                ExaminationSession {
                    id: session_b,
                    session_code: "NOV-2025".to_string(),
                    session_name: None,
                    academic_year_id: Some(year_b),
                },
            ],
            &[
                AcademicYear {
                    id: year_a,
                    academic_year: "2024-2025".to_string(),
                },
                AcademicYear {
                    id: year_b,
                    academic_year: "2025-2026".to_string(),
                },
            ],
        );

        let mut records = cohort(&info, 4, 3);
        for r in records.iter_mut().take(2) {
            r.examination_session_id = Some(session_a);
        }
        records[2].examination_session_id = Some(session_b);
        records[3].examination_session_id = Some(Uuid::new_v4());

        let trends = program_trends(&records, &sessions);
        let years: Vec<&str> = trends.iter().map(|t| t.academic_year.as_str()).collect();
        assert_eq!(years, vec!["2024-2025", "2025-2026", UNKNOWN]);
        assert_eq!(trends[0].total_appeared, 2);
        assert_eq!(trends[0].total_passed, 2);
        assert_eq!(trends[0].pass_percentage, 100.0);
        assert_eq!(trends[0].average_cgpa, 7.0);
        assert_eq!(trends[2].total_passed, 0);
        assert!(trends.iter().all(|t| t.program_code == "T"));
    }

    #[test]
    fn degree_levels_roll_up_program_totals() {
        let ug1 = program("U1", "Bachelor of Science");
        let ug2 = program("U2", "Bachelor of Science");
        let pg = program("M1", "Master of Science");
        let mut records = cohort(&ug1, 10, 5);
        records.extend(cohort(&ug2, 30, 27));
        records.extend(cohort(&pg, 5, 5));
        let mut orphan = record(&program("X", ""), true, Some(70.0));
        if let Some(info) = orphan.program.as_mut() {
            info.degree_name = None;
        }
        records.push(orphan);

        let dashboard = build_dashboard(&records, &SessionIndex::default(), &AnalyticsPolicy::default());
        let levels: Vec<&str> = dashboard
            .degree_level_summary
            .iter()
            .map(|l| l.degree_level.as_str())
            .collect();
        assert_eq!(levels, vec!["Bachelor of Science", "Master of Science", UNKNOWN]);

        let bsc = &dashboard.degree_level_summary[0];
        assert_eq!(bsc.total_programs, 2);
        assert_eq!(bsc.total_students, 40);
        assert_eq!(bsc.average_pass_percentage, 80.0);
    }

    fn sessions_by_year(years: &[&str]) -> (SessionIndex, Vec<Uuid>) {
        let mut sessions = Vec::new();
        let mut academic_years = Vec::new();
        for (i, label) in years.iter().enumerate() {
            let year = AcademicYear {
                id: Uuid::new_v4(),
                academic_year: label.to_string(),
            };
            sessions.push(ExaminationSession {
                id: Uuid::new_v4(),
                session_code: format!("S{}", i + 1),
                session_name: None,
                academic_year_id: Some(year.id),
            });
            academic_years.push(year);
        }
        let ids = sessions.iter().map(|s| s.id).collect();
        (SessionIndex::build(&sessions, &academic_years), ids)
    }

    #[test]
    fn college_summary_separates_absent_from_failed() {
        let info = program("A", "Bachelor of Science");
        let mut records: Vec<FinalMarkRecord> = [80.0, 65.0, 55.0, 45.0, 37.0]
            .iter()
            .map(|pct| record(&info, true, Some(*pct)))
            .collect();
        let repeat_student = Uuid::new_v4();
        for _ in 0..2 {
            let mut failed = record(&info, false, Some(20.0));
            failed.student_id = repeat_student;
            records.push(failed);
        }
        let mut absent = record(&info, false, None);
        absent.pass_status = Some("Absent".to_string());
        records.push(absent);

        let institution_id = Uuid::new_v4();
        records[0].institution = Some(InstitutionInfo {
            id: institution_id,
            institution_code: "JKKNCAS".to_string(),
            name: "JKKN College of Arts and Science".to_string(),
        });
        let (sessions, ids) = sessions_by_year(&["2025-2026"]);
        records[0].examination_session_id = Some(ids[0]);

        let summary = college_summary(&records, &sessions, &AnalyticsPolicy::default());

        assert_eq!(summary.institution_id, institution_id.to_string());
        assert_eq!(summary.institution_code, "JKKNCAS");
        assert_eq!(summary.academic_year, "2025-2026");
        assert_eq!(summary.examination_session_code, "S1");

        assert_eq!(summary.total_students_appeared, 8);
        assert_eq!(summary.total_students_passed, 5);
        assert_eq!(summary.total_students_failed, 2);
        assert_eq!(summary.total_students_absent, 1);
        assert_eq!(summary.pass_percentage, 62.5);
        assert_eq!(summary.fail_percentage, 25.0);
        assert_eq!(summary.absent_percentage, 12.5);

        assert_eq!(
            [
                summary.distinction_count,
                summary.first_class_count,
                summary.second_class_count,
                summary.third_class_count,
                summary.pass_class_count,
            ],
            [1, 1, 1, 1, 1]
        );
        assert_eq!(summary.third_class_percentage, 20.0);

        assert_eq!(summary.average_percentage, 46.0);
        assert_eq!(summary.average_gpa, 4.6);
        assert_eq!(summary.average_cgpa, summary.average_gpa);
        assert_eq!(summary.highest_percentage, 80.0);
        assert_eq!(summary.lowest_percentage, 20.0);
        assert_eq!(summary.median_percentage, 45.0);

        assert_eq!(summary.total_backlogs, 2);
        assert_eq!(summary.students_with_backlogs, 1);
        assert_eq!(summary.backlog_percentage, 25.0);
        assert_eq!(summary.cleared_backlogs, 0);
        assert_eq!(summary.pending_backlogs, 2);
    }

    #[test]
    fn college_trends_keep_the_latest_sessions() {
        let info = program("T", "Bachelor of Science");
        let (sessions, ids) = sessions_by_year(&[
            "2019-2020",
            "2020-2021",
            "2021-2022",
            "2022-2023",
            "2023-2024",
            "2024-2025",
        ]);
        let mut records = Vec::new();
        for id in &ids {
            let mut passed = record(&info, true, Some(78.0));
            passed.examination_session_id = Some(*id);
            let mut failed = record(&info, false, Some(30.0));
            failed.examination_session_id = Some(*id);
            records.extend([passed, failed]);
        }

        let trends = college_trends(&records, &sessions, &AnalyticsPolicy::default());

        assert_eq!(trends.len(), TREND_SESSIONS);
        assert_eq!(trends[0].academic_year, "2020-2021");
        assert_eq!(trends[0].examination_session, "S2");
        assert_eq!(trends[4].academic_year, "2024-2025");
        assert!(trends.iter().all(|t| t.total_appeared == 2
            && t.pass_percentage == 50.0
            && t.average_percentage == 54.0
            && t.distinction_count == 1
            && t.first_class_count == 0));
    }

    #[test]
    fn semester_rows_are_ascending_with_unset_as_zero() {
        let info = program("S", "Bachelor of Science");
        let mut records = vec![
            record(&info, true, Some(70.0)),
            record(&info, true, Some(60.0)),
            record(&info, false, Some(20.0)),
            record(&info, true, Some(50.0)),
        ];
        records[0].semester = Some(3);
        records[1].semester = Some(1);
        records[2].semester = Some(1);

        let rows = semester_wise(&records);
        let semesters: Vec<i32> = rows.iter().map(|r| r.semester).collect();
        assert_eq!(semesters, vec![0, 1, 3]);
        assert_eq!(rows[1].semester_name, "Semester 1");
        assert_eq!(rows[1].total_appeared, 2);
        assert_eq!(rows[1].pass_percentage, 50.0);
        assert_eq!(rows[1].average_gpa, 4.0);
        assert_eq!(rows[1].backlogs_count, 1);
    }

    #[test]
    fn recent_sessions_map_status_and_rate() {
        let counts = vec![
            SessionResultCounts {
                examination_session_id: Uuid::new_v4(),
                session_code: "NOV-2025".to_string(),
                session_name: Some("November 2025".to_string()),
                exam_start_date: None,
                session_status: Some("Completed".to_string()),
                total_students: 3,
                passed_students: 2,
            },
            SessionResultCounts {
                examination_session_id: Uuid::new_v4(),
                session_code: "APR-2026".to_string(),
                session_name: None,
                exam_start_date: None,
                session_status: Some("Scheduled".to_string()),
                total_students: 0,
                passed_students: 0,
            },
        ];

        let recent = recent_sessions(&counts);
        assert_eq!(recent[0].pass_percentage, 66.67);
        assert_eq!(recent[0].status, SessionPublishStatus::Published);
        assert_eq!(recent[1].session_name, "APR-2026");
        assert_eq!(recent[1].pass_percentage, 0.0);
        assert_eq!(recent[1].status, SessionPublishStatus::Pending);
        assert_eq!(
            SessionPublishStatus::from_session_status(Some("Active")),
            SessionPublishStatus::Processing
        );
    }

    #[test]
    fn college_breakdowns_hold_one_overall_row() {
        assert_eq!(
            build_college_dashboard(&[], &SessionIndex::default(), Vec::new(), &AnalyticsPolicy::default()),
            CollegeDashboardData::default()
        );

        let info = program("O", "Bachelor of Science");
        let mut records = cohort(&info, 4, 3);
        records[3].pass_status = Some("Absent".to_string());
        let dashboard =
            build_college_dashboard(&records, &SessionIndex::default(), Vec::new(), &AnalyticsPolicy::default());

        assert_eq!(dashboard.gender_wise.len(), 1);
        assert_eq!(dashboard.gender_wise[0].gender, "All");
        assert_eq!(dashboard.gender_wise[0].counts.total_failed, 1);
        assert_eq!(dashboard.summary.total_students_failed, 0);
        assert_eq!(dashboard.category_wise[0].counts, dashboard.gender_wise[0].counts);
    }
}
