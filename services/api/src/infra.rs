use chrono::NaiveDate;
use crm_leave::access::{Directory, DirectoryUser, Role, RoleCatalog, UserId};
use crm_leave::config::LeaveConfig;
use crm_leave::workflows::leave::{InMemoryLeaveStore, LeaveError, LeaveWorkflowService};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type LeaveService = LeaveWorkflowService<InMemoryLeaveStore, Directory>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Accounts registered by `seed_directory`: (id, first, last, role, team, token).
pub(crate) const SEEDED_USERS: [(u64, &str, &str, Role, &str, &str); 7] = [
    (1, "Ada", "Brandt", Role::Admin, "ADMIN_TEAM", "ada-token"),
    (2, "Hana", "Holt", Role::Hr, "HR_TEAM", "hana-token"),
    (3, "Milo", "Grant", Role::Management, "MANAGEMENT_TEAM", "milo-token"),
    (4, "Theo", "Lane", Role::TeamLead, "DEVELOPMENT_TEAM", "theo-token"),
    (5, "Emma", "Stone", Role::Employee, "DEVELOPMENT_TEAM", "emma-token"),
    (6, "Sami", "Okafor", Role::TeamLead, "SALES_TEAM", "sami-token"),
    (7, "Lina", "Park", Role::Employee, "SALES_TEAM", "lina-token"),
];

pub(crate) const DEVELOPMENT_LEAD: UserId = UserId(4);
pub(crate) const DEVELOPER: UserId = UserId(5);
pub(crate) const HR_OFFICER: UserId = UserId(2);
pub(crate) const DIRECTOR: UserId = UserId(3);

/// Organisation used by the standalone service until a CRM directory is wired in.
pub(crate) fn seed_directory() -> Result<Directory, LeaveError> {
    let directory = Directory::new(Arc::new(RoleCatalog::predefined()));
    directory.add_team("ADMIN_TEAM", "System administrators", None);
    directory.add_team("HR_TEAM", "Human resources", None);
    directory.add_team("MANAGEMENT_TEAM", "Company management", None);
    directory.add_team("DEVELOPMENT_TEAM", "Software development", Some(DEVELOPMENT_LEAD));
    directory.add_team("SALES_TEAM", "Sales", Some(UserId(6)));

    for (id, first_name, last_name, role, team, token) in SEEDED_USERS {
        directory.add_user(DirectoryUser::new(id, first_name, last_name, &[role]).in_team(team));
        directory.issue_token(token, UserId(id))?;
    }

    Ok(directory)
}

/// In-memory service with baseline policies for every configured year.
pub(crate) fn seeded_service(config: LeaveConfig) -> Result<LeaveService, LeaveError> {
    let directory = seed_directory()?;
    let service = LeaveWorkflowService::new(
        Arc::new(InMemoryLeaveStore::new()),
        Arc::new(directory),
        config,
    );
    for year in service.config().policy_years_or(service.current_year()) {
        service.initialize_default_policies(year)?;
    }
    Ok(service)
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
