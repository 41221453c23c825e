use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

use crate::db::ResultStore;
use crate::models::{AcademicYear, ExaminationSession, FinalMarkRecord};

pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone)]
pub struct SessionLabel {
    pub session_code: String,
    pub session_name: Option<String>,
    pub academic_year: Option<String>,
}

impl SessionLabel {
    /// Session name, or the code when the name is missing or blank.
    pub fn display_name(&self) -> &str {
        self.session_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.session_code)
    }
}

/// Examination sessions referenced by a result set, each carrying its
/// academic-year label once that is known.
#[derive(Debug, Clone, Default)]
pub struct SessionIndex {
    sessions: HashMap<Uuid, SessionLabel>,
}

impl SessionIndex {
    pub fn build(sessions: &[ExaminationSession], years: &[AcademicYear]) -> Self {
        let years: HashMap<Uuid, &str> = years
            .iter()
            .map(|year| (year.id, year.academic_year.as_str()))
            .collect();

        let sessions = sessions
            .iter()
            .map(|session| {
                let academic_year = session
                    .academic_year_id
                    .and_then(|id| years.get(&id))
                    .map(|label| label.to_string());
                (
                    session.id,
                    SessionLabel {
                        session_code: session.session_code.clone(),
                        session_name: session.session_name.clone(),
                        academic_year,
                    },
                )
            })
            .collect();

        Self { sessions }
    }

    pub fn session(&self, id: Uuid) -> Option<&SessionLabel> {
        self.sessions.get(&id)
    }

    /// Academic year for a session, or `None` when either the session or its
    /// year could not be resolved.
    pub fn academic_year(&self, session_id: Option<Uuid>) -> Option<&str> {
        session_id
            .and_then(|id| self.sessions.get(&id))
            .and_then(|label| label.academic_year.as_deref())
    }

    pub fn academic_year_or_unknown(&self, session_id: Option<Uuid>) -> &str {
        self.academic_year(session_id).unwrap_or(UNKNOWN)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn distinct<I: IntoIterator<Item = Uuid>>(ids: I) -> Vec<Uuid> {
    ids.into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Resolves session and academic-year labels for `records`. Lookup failures
/// are logged and leave the index partially filled; they never fail the
/// caller.
pub async fn load_session_index(store: &dyn ResultStore, records: &[FinalMarkRecord]) -> SessionIndex {
    let session_ids = distinct(records.iter().filter_map(|r| r.examination_session_id));
    if session_ids.is_empty() {
        return SessionIndex::default();
    }

    let sessions = match store.fetch_sessions(&session_ids).await {
        Ok(sessions) => sessions,
        Err(err) => {
            tracing::warn!(error = %err, "failed to load examination sessions");
            return SessionIndex::default();
        }
    };

    let year_ids = distinct(sessions.iter().filter_map(|s| s.academic_year_id));
    let years = if year_ids.is_empty() {
        Vec::new()
    } else {
        match store.fetch_academic_years(&year_ids).await {
            Ok(years) => years,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load academic years");
                Vec::new()
            }
        }
    };

    let index = SessionIndex::build(&sessions, &years);
    if index.len() < session_ids.len() {
        tracing::debug!(
            requested = session_ids.len(),
            found = index.len(),
            "some examination sessions were not found"
        );
    }
    index
}
