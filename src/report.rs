use std::fmt::Write;
use std::io;

use chrono::{DateTime, Utc};

use crate::models::{ProgramAnalysisDashboardData, ResultAnalyticsFilters};

fn scope_label(filters: &ResultAnalyticsFilters) -> String {
    let mut parts = Vec::new();
    if let Some(id) = filters.institution_id {
        parts.push(format!("institution {id}"));
    }
    if let Some(id) = filters.examination_session_id {
        parts.push(format!("session {id}"));
    }
    if let Some(id) = filters.program_id {
        parts.push(format!("program {id}"));
    }
    if let Some(semester) = filters.semester {
        parts.push(format!("semester {semester}"));
    }
    if parts.is_empty() {
        "all published results".to_string()
    } else {
        parts.join(", ")
    }
}

pub fn build_report(
    filters: &ResultAnalyticsFilters,
    generated_at: DateTime<Utc>,
    data: &ProgramAnalysisDashboardData,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Program Result Analysis");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        scope_label(filters),
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Programs");

    if data.programs.is_empty() {
        let _ = writeln!(output, "No published results for this filter.");
    } else {
        let _ = writeln!(
            output,
            "| Program | Degree | Appeared | Passed | Pass % | Avg CGPA | Backlogs |"
        );
        let _ = writeln!(output, "|---|---|---:|---:|---:|---:|---:|");
        for p in &data.programs {
            let _ = writeln!(
                output,
                "| {} {} | {} | {} | {} | {:.2} | {:.2} | {} |",
                p.program_code,
                p.program_name,
                p.degree_name,
                p.total_students_appeared,
                p.total_students_passed,
                p.pass_percentage,
                p.average_cgpa,
                p.total_backlogs
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Programs");
    if data.top_programs.is_empty() {
        let _ = writeln!(output, "No programs to rank.");
    } else {
        for (rank, p) in data.top_programs.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. {} ({:.2}% pass, {} distinctions)",
                rank + 1,
                p.program_code,
                p.pass_percentage,
                p.distinction_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Programs Needing Attention");
    if data.weak_programs.is_empty() {
        let _ = writeln!(output, "No program is more than the weak margin below the college average.");
    } else {
        for weak in &data.weak_programs {
            let _ = writeln!(
                output,
                "- {} at {:.2}% vs college {:.2}% ({:+.2}): {}",
                weak.program_code,
                weak.pass_percentage,
                weak.college_average,
                weak.variance,
                weak.recommendation
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Degree Levels");
    if data.degree_level_summary.is_empty() {
        let _ = writeln!(output, "No degree levels recorded.");
    } else {
        for level in &data.degree_level_summary {
            let _ = writeln!(
                output,
                "- {}: {} programs, {} students, {:.2}% pass, avg CGPA {:.2}",
                level.degree_level,
                level.total_programs,
                level.total_students,
                level.average_pass_percentage,
                level.average_cgpa
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Year Trends");
    if data.trends.is_empty() {
        let _ = writeln!(output, "No trend data.");
    } else {
        for trend in &data.trends {
            let _ = writeln!(
                output,
                "- {} {}: {}/{} passed ({:.2}%)",
                trend.program_code,
                trend.academic_year,
                trend.total_passed,
                trend.total_appeared,
                trend.pass_percentage
            );
        }
    }

    output
}

/// Writes one CSV row per program summary.
pub fn write_program_csv<W: io::Write>(
    writer: W,
    data: &ProgramAnalysisDashboardData,
) -> anyhow::Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    for program in &data.programs {
        csv.serialize(program)?;
    }
    csv.flush()?;
    Ok(data.programs.len())
}
