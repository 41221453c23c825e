use std::net::SocketAddr;

use clap::Args;
use uuid::Uuid;

use crate::analytics::AnalyticsPolicy;
use crate::models::{DegreeLevel, ResultAnalyticsFilters};

#[derive(Debug, Clone, Args)]
pub struct DatabaseArgs {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Args)]
pub struct PolicyArgs {
    /// Points below the college average that mark a program as weak
    #[arg(long, env = "WEAK_MARGIN", default_value_t = 10.0)]
    pub weak_margin: f64,

    /// Points below the college average that make a weak program urgent
    #[arg(long, env = "URGENT_MARGIN", default_value_t = 20.0)]
    pub urgent_margin: f64,
}

impl PolicyArgs {
    pub fn policy(&self) -> AnalyticsPolicy {
        AnalyticsPolicy {
            weak_margin: self.weak_margin,
            urgent_margin: self.urgent_margin,
            ..AnalyticsPolicy::default()
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,

    #[command(flatten)]
    pub policy: PolicyArgs,
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    #[arg(long)]
    pub institution_id: Option<Uuid>,
    #[arg(long)]
    pub academic_year_id: Option<Uuid>,
    #[arg(long)]
    pub examination_session_id: Option<Uuid>,
    #[arg(long)]
    pub program_id: Option<Uuid>,
    #[arg(long, default_value_t = DegreeLevel::All)]
    pub degree_level: DegreeLevel,
    #[arg(long)]
    pub semester: Option<i32>,
}

impl From<FilterArgs> for ResultAnalyticsFilters {
    fn from(args: FilterArgs) -> Self {
        ResultAnalyticsFilters {
            institution_id: args.institution_id,
            academic_year_id: args.academic_year_id,
            examination_session_id: args.examination_session_id,
            program_id: args.program_id,
            degree_level: args.degree_level,
            semester: args.semester,
        }
    }
}
