use std::collections::HashMap;
use std::future::Future;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::error::{AppError, DecodeError, Result};
use crate::models::{
    AcademicYear, ExaminationSession, FilterOption, FinalMarkRecord, InstitutionInfo, ProgramInfo,
    ResultAnalyticsFilters, SessionResultCounts,
};

/// Rows per page when walking `final_marks`.
pub const PAGE_SIZE: i64 = 1000;
/// Hard ceiling on rows read for one request.
pub const MAX_ROWS: usize = 1_000_000;

const FINAL_MARKS_SELECT: &str = "SELECT fm.id, fm.student_id, fm.program_id, \
     fm.examination_session_id, fm.institutions_id, fm.percentage, fm.grade_points, \
     fm.is_pass, fm.pass_status, fm.semester, \
     p.id AS program_ref_id, p.program_code, p.program_name, \
     d.degree_code, d.degree_name, dep.department_code, dep.department_name, \
     i.id AS institution_ref_id, i.institution_code, i.name AS institution_name \
     FROM final_marks fm \
     LEFT JOIN programs p ON p.id = fm.program_id \
     LEFT JOIN degrees d ON d.id = p.degree_id \
     LEFT JOIN departments dep ON dep.id = p.offering_department_id \
     LEFT JOIN institutions i ON i.id = fm.institutions_id";

/// Read access to the result tables. The HTTP layer only sees this trait, so
/// handlers can be driven against any backing store.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn fetch_final_marks(
        &self,
        filters: &ResultAnalyticsFilters,
    ) -> Result<Vec<FinalMarkRecord>>;

    async fn fetch_sessions(&self, ids: &[Uuid]) -> Result<Vec<ExaminationSession>>;

    async fn fetch_academic_years(&self, ids: &[Uuid]) -> Result<Vec<AcademicYear>>;

    async fn institution_options(&self) -> Result<Vec<FilterOption>>;

    async fn academic_year_options(&self) -> Result<Vec<FilterOption>>;

    async fn program_options(&self, institution_id: Option<Uuid>) -> Result<Vec<FilterOption>>;

    async fn session_options(&self, institution_id: Option<Uuid>) -> Result<Vec<FilterOption>>;

    async fn regulation_options(&self) -> Result<Vec<FilterOption>>;

    async fn batch_options(&self, institution_id: Option<Uuid>) -> Result<Vec<FilterOption>>;

    async fn board_options(&self) -> Result<Vec<FilterOption>>;

    /// The `limit` most recent sessions by exam start date, with their
    /// published result counts.
    async fn recent_sessions(
        &self,
        institution_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<SessionResultCounts>>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn final_marks_page(filters: &ResultAnalyticsFilters, offset: i64) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(FINAL_MARKS_SELECT);
    query.push(" WHERE fm.result_status = 'Published' AND fm.is_active = TRUE");

    if let Some(institution_id) = filters.institution_id {
        query.push(" AND fm.institutions_id = ").push_bind(institution_id);
    }
    if let Some(session_id) = filters.examination_session_id {
        query.push(" AND fm.examination_session_id = ").push_bind(session_id);
    }
    if let Some(program_id) = filters.program_id {
        query.push(" AND fm.program_id = ").push_bind(program_id);
    }
    if let Some(semester) = filters.semester {
        query.push(" AND fm.semester = ").push_bind(semester);
    }

    query
        .push(" ORDER BY fm.id LIMIT ")
        .push_bind(PAGE_SIZE)
        .push(" OFFSET ")
        .push_bind(offset);
    query
}

/// Walks a paged source from offset 0 until a page comes back shorter than
/// `page_size`. Stops at `max_rows`, truncating the last page if needed.
pub async fn collect_pages<T, F, Fut>(page_size: i64, max_rows: usize, mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(i64) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut records = Vec::new();
    let mut offset = 0i64;

    loop {
        let page = fetch_page(offset).await?;
        let fetched = page.len();
        records.extend(page);

        if records.len() >= max_rows {
            tracing::warn!(rows = records.len(), max_rows, "row ceiling reached");
            records.truncate(max_rows);
            break;
        }
        if fetched < page_size as usize {
            break;
        }
        offset += page_size;
    }

    Ok(records)
}

fn column<'r, T>(row: &'r PgRow, name: &'static str) -> std::result::Result<T, DecodeError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|err| DecodeError::from_sqlx(name, err))
}

/// NOT NULL columns are still read as `Option` so a NULL surfaces as a
/// decode error naming the column instead of a driver message.
pub fn require<T>(value: Option<T>, column: &'static str) -> std::result::Result<T, DecodeError> {
    value.ok_or_else(|| DecodeError::null(column))
}

pub fn decode_final_mark(row: &PgRow) -> std::result::Result<FinalMarkRecord, DecodeError> {
    let is_pass = require(column(row, "is_pass")?, "is_pass")?;
    let program_ref_id: Option<Uuid> = column(row, "program_ref_id")?;
    let institution_ref_id: Option<Uuid> = column(row, "institution_ref_id")?;

    let program = match program_ref_id {
        Some(id) => Some(ProgramInfo {
            id,
            program_code: column::<Option<String>>(row, "program_code")?.unwrap_or_default(),
            program_name: column::<Option<String>>(row, "program_name")?.unwrap_or_default(),
            degree_code: column(row, "degree_code")?,
            degree_name: column(row, "degree_name")?,
            department_code: column(row, "department_code")?,
            department_name: column(row, "department_name")?,
        }),
        None => None,
    };

    let institution = match institution_ref_id {
        Some(id) => Some(InstitutionInfo {
            id,
            institution_code: column::<Option<String>>(row, "institution_code")?.unwrap_or_default(),
            name: column::<Option<String>>(row, "institution_name")?.unwrap_or_default(),
        }),
        None => None,
    };

    Ok(FinalMarkRecord {
        id: column(row, "id")?,
        student_id: column(row, "student_id")?,
        program_id: column(row, "program_id")?,
        examination_session_id: column(row, "examination_session_id")?,
        institution_id: column(row, "institutions_id")?,
        percentage: column(row, "percentage")?,
        grade_points: column(row, "grade_points")?,
        is_pass,
        pass_status: column(row, "pass_status")?,
        semester: column(row, "semester")?,
        program,
        institution,
    })
}

#[async_trait]
impl ResultStore for PgStore {
    async fn fetch_final_marks(
        &self,
        filters: &ResultAnalyticsFilters,
    ) -> Result<Vec<FinalMarkRecord>> {
        let pool = &self.pool;
        collect_pages(PAGE_SIZE, MAX_ROWS, move |offset| async move {
            let rows = final_marks_page(filters, offset).build().fetch_all(pool).await?;
            let page: Result<Vec<FinalMarkRecord>> = rows
                .iter()
                .map(|row| decode_final_mark(row).map_err(AppError::from))
                .collect();
            page
        })
        .await
    }

    async fn fetch_sessions(&self, ids: &[Uuid]) -> Result<Vec<ExaminationSession>> {
        let rows = sqlx::query(
            "SELECT id, session_code, session_name, academic_year_id \
             FROM examination_sessions WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(ExaminationSession {
                id: column(&row, "id")?,
                session_code: column(&row, "session_code")?,
                session_name: column(&row, "session_name")?,
                academic_year_id: column(&row, "academic_year_id")?,
            });
        }
        Ok(sessions)
    }

    async fn fetch_academic_years(&self, ids: &[Uuid]) -> Result<Vec<AcademicYear>> {
        let rows = sqlx::query("SELECT id, academic_year FROM academic_years WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        let mut years = Vec::with_capacity(rows.len());
        for row in rows {
            years.push(AcademicYear {
                id: column(&row, "id")?,
                academic_year: column(&row, "academic_year")?,
            });
        }
        Ok(years)
    }

    async fn institution_options(&self) -> Result<Vec<FilterOption>> {
        let rows = sqlx::query(
            "SELECT id, institution_code, name FROM institutions \
             WHERE is_active = TRUE ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut options = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = column(&row, "id")?;
            let code: String = column(&row, "institution_code")?;
            let name: String = column(&row, "name")?;
            options.push(FilterOption {
                value: id.to_string(),
                label: format!("{code} - {name}"),
            });
        }
        Ok(options)
    }

    async fn academic_year_options(&self) -> Result<Vec<FilterOption>> {
        let rows = sqlx::query(
            "SELECT id, academic_year FROM academic_years \
             WHERE is_active = TRUE ORDER BY academic_year DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut options = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = column(&row, "id")?;
            options.push(FilterOption {
                value: id.to_string(),
                label: column(&row, "academic_year")?,
            });
        }
        Ok(options)
    }

    async fn program_options(&self, institution_id: Option<Uuid>) -> Result<Vec<FilterOption>> {
        let rows = sqlx::query(
            "SELECT id, program_code, program_name FROM programs \
             WHERE is_active = TRUE AND ($1::uuid IS NULL OR institutions_id = $1) \
             ORDER BY program_name",
        )
        .bind(institution_id)
        .fetch_all(&self.pool)
        .await?;

        let mut options = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = column(&row, "id")?;
            let code: String = column(&row, "program_code")?;
            let name: String = column(&row, "program_name")?;
            options.push(FilterOption {
                value: id.to_string(),
                label: format!("{code} - {name}"),
            });
        }
        Ok(options)
    }

    async fn session_options(&self, institution_id: Option<Uuid>) -> Result<Vec<FilterOption>> {
        let rows = sqlx::query(
            "SELECT id, session_code, session_name FROM examination_sessions \
             WHERE ($1::uuid IS NULL OR institutions_id = $1) \
             ORDER BY exam_start_date DESC NULLS LAST",
        )
        .bind(institution_id)
        .fetch_all(&self.pool)
        .await?;

        let mut options = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = column(&row, "id")?;
            let code: String = column(&row, "session_code")?;
            let name: Option<String> = column(&row, "session_name")?;
            options.push(FilterOption {
                value: id.to_string(),
                label: label_or_code(name, code),
            });
        }
        Ok(options)
    }

    async fn regulation_options(&self) -> Result<Vec<FilterOption>> {
        let rows = sqlx::query(
            "SELECT id, regulation_code, regulation_name FROM regulations \
             WHERE is_active = TRUE ORDER BY regulation_name",
        )
        .fetch_all(&self.pool)
        .await?;
        named_options(&rows, "regulation_code", "regulation_name")
    }

    async fn batch_options(&self, institution_id: Option<Uuid>) -> Result<Vec<FilterOption>> {
        let rows = sqlx::query(
            "SELECT id, batch_code, batch_name FROM batches \
             WHERE is_active = TRUE AND ($1::uuid IS NULL OR institutions_id = $1) \
             ORDER BY batch_name DESC",
        )
        .bind(institution_id)
        .fetch_all(&self.pool)
        .await?;
        named_options(&rows, "batch_code", "batch_name")
    }

    async fn board_options(&self) -> Result<Vec<FilterOption>> {
        let rows = sqlx::query(
            "SELECT id, board_code, board_name FROM boards \
             WHERE is_active = TRUE ORDER BY board_name",
        )
        .fetch_all(&self.pool)
        .await?;
        named_options(&rows, "board_code", "board_name")
    }

    async fn recent_sessions(
        &self,
        institution_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<SessionResultCounts>> {
        let rows = sqlx::query(
            r#"
            SELECT es.id, es.session_code, es.session_name, es.exam_start_date, es.session_status,
                   COUNT(fm.id) AS total_students,
                   COUNT(fm.id) FILTER (WHERE fm.is_pass) AS passed_students
            FROM examination_sessions es
            LEFT JOIN final_marks fm
              ON fm.examination_session_id = es.id
             AND fm.result_status = 'Published'
             AND fm.is_active = TRUE
            WHERE ($1::uuid IS NULL OR es.institutions_id = $1)
            GROUP BY es.id
            ORDER BY es.exam_start_date DESC NULLS LAST
            LIMIT $2
            "#,
        )
        .bind(institution_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(SessionResultCounts {
                examination_session_id: column(&row, "id")?,
                session_code: column(&row, "session_code")?,
                session_name: column(&row, "session_name")?,
                exam_start_date: column(&row, "exam_start_date")?,
                session_status: column(&row, "session_status")?,
                total_students: column(&row, "total_students")?,
                passed_students: column(&row, "passed_students")?,
            });
        }
        Ok(sessions)
    }
}

/// Options labelled by their name, falling back to the code when the name is
/// missing or blank.
fn named_options(
    rows: &[PgRow],
    code_column: &'static str,
    name_column: &'static str,
) -> Result<Vec<FilterOption>> {
    let mut options = Vec::with_capacity(rows.len());
    for row in rows {
        let id: Uuid = column(row, "id")?;
        let code: String = column(row, code_column)?;
        let name: Option<String> = column(row, name_column)?;
        options.push(FilterOption {
            value: id.to_string(),
            label: label_or_code(name, code),
        });
    }
    Ok(options)
}

fn label_or_code(name: Option<String>, code: String) -> String {
    name.filter(|n| !n.trim().is_empty()).unwrap_or(code)
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let institution_id = Uuid::parse_str("6f1c2a9e-0b4d-4a53-9c1e-2d8b7f3a5e10")?;
    sqlx::query(
        r#"
        INSERT INTO institutions (id, institution_code, name)
        VALUES ($1, $2, $3)
        ON CONFLICT (institution_code) DO NOTHING
        "#,
    )
    .bind(institution_id)
    .bind("JKKNCAS")
    .bind("JKKN College of Arts and Science")
    .execute(pool)
    .await?;

    let degrees = vec![
        (Uuid::parse_str("a1b6f0de-3c1e-4f7a-8d2b-11c0e9a4b701")?, "BSC", "Bachelor of Science"),
        (Uuid::parse_str("a1b6f0de-3c1e-4f7a-8d2b-11c0e9a4b702")?, "MSC", "Master of Science"),
    ];
    for (id, code, name) in &degrees {
        sqlx::query(
            "INSERT INTO degrees (id, degree_code, degree_name) VALUES ($1, $2, $3) \
             ON CONFLICT (degree_code) DO NOTHING",
        )
        .bind(id)
        .bind(code)
        .bind(name)
        .execute(pool)
        .await?;
    }

    let departments = vec![
        (Uuid::parse_str("b7e2c4d1-9a0f-4e65-b3c8-52d1f6a0c801")?, "CS", "Computer Science"),
        (Uuid::parse_str("b7e2c4d1-9a0f-4e65-b3c8-52d1f6a0c802")?, "MATH", "Mathematics"),
    ];
    for (id, code, name) in &departments {
        sqlx::query(
            "INSERT INTO departments (id, department_code, department_name) VALUES ($1, $2, $3) \
             ON CONFLICT (department_code) DO NOTHING",
        )
        .bind(id)
        .bind(code)
        .bind(name)
        .execute(pool)
        .await?;
    }

    let programs = vec![
        (
            Uuid::parse_str("c3d9e5f2-1b7a-4c86-a4d9-63e2a7b1d901")?,
            "BSC-CS",
            "B.Sc. Computer Science",
            degrees[0].0,
            departments[0].0,
        ),
        (
            Uuid::parse_str("c3d9e5f2-1b7a-4c86-a4d9-63e2a7b1d902")?,
            "BSC-MATH",
            "B.Sc. Mathematics",
            degrees[0].0,
            departments[1].0,
        ),
        (
            Uuid::parse_str("c3d9e5f2-1b7a-4c86-a4d9-63e2a7b1d903")?,
            "MSC-CS",
            "M.Sc. Computer Science",
            degrees[1].0,
            departments[0].0,
        ),
    ];
    for (id, code, name, degree_id, department_id) in &programs {
        sqlx::query(
            r#"
            INSERT INTO programs
            (id, program_code, program_name, degree_id, offering_department_id, institutions_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (program_code) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(name)
        .bind(degree_id)
        .bind(department_id)
        .bind(institution_id)
        .execute(pool)
        .await?;
    }

    let years = vec![
        (Uuid::parse_str("d4e0f6a3-2c8b-4d97-b5ea-74f3b8c2ea01")?, "2024-2025"),
        (Uuid::parse_str("d4e0f6a3-2c8b-4d97-b5ea-74f3b8c2ea02")?, "2025-2026"),
    ];
    for (id, label) in &years {
        sqlx::query(
            "INSERT INTO academic_years (id, academic_year) VALUES ($1, $2) \
             ON CONFLICT (academic_year) DO NOTHING",
        )
        .bind(id)
        .bind(label)
        .execute(pool)
        .await?;
    }

    let sessions = vec![
        (
            Uuid::parse_str("e5f1a7b4-3d9c-4ea8-86fb-85a4c9d3fb01")?,
            "NOV-2024",
            "November 2024",
            years[0].0,
            NaiveDate::from_ymd_opt(2024, 11, 4).context("invalid date")?,
            "Completed",
        ),
        (
            Uuid::parse_str("e5f1a7b4-3d9c-4ea8-86fb-85a4c9d3fb02")?,
            "NOV-2025",
            "November 2025",
            years[1].0,
            NaiveDate::from_ymd_opt(2025, 11, 3).context("invalid date")?,
            "Active",
        ),
    ];
    for (id, code, name, year_id, start, status) in &sessions {
        sqlx::query(
            r#"
            INSERT INTO examination_sessions
            (id, session_code, session_name, academic_year_id, institutions_id, exam_start_date,
             session_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (session_code) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(name)
        .bind(year_id)
        .bind(institution_id)
        .bind(start)
        .bind(status)
        .execute(pool)
        .await?;
    }

    sqlx::query(
        "INSERT INTO regulations (id, regulation_code, regulation_name) VALUES ($1, $2, $3) \
         ON CONFLICT (regulation_code) DO NOTHING",
    )
    .bind(Uuid::parse_str("f6a2b8c5-4e0d-4fb9-97ac-96b5dae4ac01")?)
    .bind("R2023")
    .bind("Regulation 2023")
    .execute(pool)
    .await?;

    for (id, code, name) in [
        ("f6a2b8c5-4e0d-4fb9-97ac-96b5dae4ad01", "2024-2027", "Batch 2024-2027"),
        ("f6a2b8c5-4e0d-4fb9-97ac-96b5dae4ad02", "2025-2028", "Batch 2025-2028"),
    ] {
        sqlx::query(
            "INSERT INTO batches (id, batch_code, batch_name, institutions_id) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (batch_code) DO NOTHING",
        )
        .bind(Uuid::parse_str(id)?)
        .bind(code)
        .bind(name)
        .bind(institution_id)
        .execute(pool)
        .await?;
    }

    sqlx::query(
        "INSERT INTO boards (id, board_code, board_name) VALUES ($1, $2, $3) \
         ON CONFLICT (board_code) DO NOTHING",
    )
    .bind(Uuid::parse_str("f6a2b8c5-4e0d-4fb9-97ac-96b5dae4ae01")?)
    .bind("UG-SCI")
    .bind("Board of Studies in Science")
    .execute(pool)
    .await?;

    for (p, (program_id, program_code, ..)) in programs.iter().enumerate() {
        for (s, (session_id, session_code, ..)) in sessions.iter().enumerate() {
            for n in 0..20u32 {
                let percentage = 30.0 + f64::from((n * 7 + p as u32 * 11 + s as u32 * 5) % 65);
                let is_pass = percentage >= 35.0;
                let source_key = format!("seed-{program_code}-{session_code}-{n:02}");

                sqlx::query(
                    r#"
                    INSERT INTO final_marks
                    (id, student_id, program_id, examination_session_id, institutions_id,
                     semester, percentage, grade_points, is_pass, pass_status, source_key)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                    ON CONFLICT (source_key) DO NOTHING
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(Uuid::from_u128(((p as u128) << 32) | u128::from(n)))
                .bind(program_id)
                .bind(session_id)
                .bind(institution_id)
                .bind(1 + 2 * s as i32)
                .bind(percentage)
                .bind(percentage / 10.0)
                .bind(is_pass)
                .bind(if is_pass { "Pass" } else { "Fail" })
                .bind(source_key)
                .execute(pool)
                .await?;
            }
        }
    }

    Ok(())
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: Vec<String>,
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<ImportSummary> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_id: Uuid,
        program_code: String,
        session_code: Option<String>,
        semester: Option<i32>,
        percentage: Option<f64>,
        grade_points: Option<f64>,
        is_pass: bool,
        pass_status: Option<String>,
        result_status: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut programs: HashMap<String, Option<(Uuid, Option<Uuid>)>> = HashMap::new();
    let mut sessions: HashMap<String, Option<Uuid>> = HashMap::new();
    let mut summary = ImportSummary::default();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;

        if !programs.contains_key(&row.program_code) {
            let found = sqlx::query(
                "SELECT id, institutions_id FROM programs WHERE program_code = $1",
            )
            .bind(&row.program_code)
            .fetch_optional(pool)
            .await?
            .map(|r| (r.get::<Uuid, _>("id"), r.get::<Option<Uuid>, _>("institutions_id")));
            programs.insert(row.program_code.clone(), found);
        }
        let Some((program_id, institution_id)) = programs[&row.program_code] else {
            summary
                .skipped
                .push(format!("row {}: unknown program_code '{}'", line + 1, row.program_code));
            continue;
        };

        let session_id = match row.session_code.as_deref().filter(|c| !c.is_empty()) {
            Some(code) => {
                if !sessions.contains_key(code) {
                    let found = sqlx::query(
                        "SELECT id FROM examination_sessions WHERE session_code = $1",
                    )
                    .bind(code)
                    .fetch_optional(pool)
                    .await?
                    .map(|r| r.get::<Uuid, _>("id"));
                    sessions.insert(code.to_string(), found);
                }
                match sessions[code] {
                    Some(id) => Some(id),
                    None => {
                        summary
                            .skipped
                            .push(format!("row {}: unknown session_code '{code}'", line + 1));
                        continue;
                    }
                }
            }
            None => None,
        };

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO final_marks
            (id, student_id, program_id, examination_session_id, institutions_id, semester,
             percentage, grade_points, is_pass, pass_status, result_status, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.student_id)
        .bind(program_id)
        .bind(session_id)
        .bind(institution_id)
        .bind(row.semester)
        .bind(row.percentage)
        .bind(row.grade_points)
        .bind(row.is_pass)
        .bind(&row.pass_status)
        .bind(row.result_status.as_deref().unwrap_or("Published"))
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            summary.inserted += 1;
        }
    }

    Ok(summary)
}
