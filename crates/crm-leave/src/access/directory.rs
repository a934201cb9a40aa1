use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use super::catalog::{resolve_permissions, Permission, Role, RoleCatalog};
use super::UserId;

/// Verifies bearer tokens and answers permission questions about users.
pub trait IdentityProvider: Send + Sync {
    fn verify_actor(&self, token: &str) -> Result<UserId, IdentityError>;
    fn has_permission(&self, user: UserId, permission: Permission) -> Result<bool, IdentityError>;
    fn is_team_lead(&self, user: UserId) -> Result<bool, IdentityError>;
}

/// Organisation lookups used to freeze approver chains and label timelines.
pub trait OrgDirectory: Send + Sync {
    /// Lead of the user's primary (first listed) team, if that team has one.
    fn primary_team_lead(&self, user: UserId) -> Result<Option<UserId>, IdentityError>;
    fn display_name(&self, user: UserId) -> Result<Option<String>, IdentityError>;
    /// Active users holding `permission`, in id order.
    fn users_with_permission(&self, permission: Permission) -> Result<Vec<UserId>, IdentityError>;
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("token is missing, expired, or unknown")]
    InvalidToken,
    #[error("{0} is not registered")]
    UnknownUser(UserId),
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<Role>,
    /// Team names; the first entry is the primary team.
    pub teams: Vec<String>,
    pub active: bool,
}

impl DirectoryUser {
    pub fn new(id: u64, first_name: &str, last_name: &str, roles: &[Role]) -> Self {
        Self {
            id: UserId(id),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            roles: roles.to_vec(),
            teams: Vec::new(),
            active: true,
        }
    }

    pub fn in_team(mut self, team: &str) -> Self {
        self.teams.push(team.to_string());
        self
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryTeam {
    pub name: String,
    pub description: String,
    pub team_lead: Option<UserId>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    users: BTreeMap<UserId, DirectoryUser>,
    teams: BTreeMap<String, DirectoryTeam>,
    tokens: HashMap<String, UserId>,
}

/// In-process user/team registry backing both identity seams.
#[derive(Debug, Clone)]
pub struct Directory {
    catalog: Arc<RoleCatalog>,
    state: Arc<RwLock<DirectoryState>>,
}

impl Directory {
    pub fn new(catalog: Arc<RoleCatalog>) -> Self {
        Self {
            catalog,
            state: Arc::new(RwLock::new(DirectoryState::default())),
        }
    }

    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    pub fn add_team(&self, name: &str, description: &str, team_lead: Option<UserId>) {
        let mut state = self.state.write().expect("directory lock poisoned");
        state.teams.insert(
            name.to_string(),
            DirectoryTeam {
                name: name.to_string(),
                description: description.to_string(),
                team_lead,
            },
        );
    }

    pub fn assign_team_lead(&self, team: &str, lead: Option<UserId>) -> Result<(), IdentityError> {
        let mut state = self.state.write().expect("directory lock poisoned");
        match state.teams.get_mut(team) {
            Some(entry) => {
                entry.team_lead = lead;
                Ok(())
            }
            None => Err(IdentityError::Unavailable(format!("team '{team}' not found"))),
        }
    }

    pub fn add_user(&self, user: DirectoryUser) {
        let mut state = self.state.write().expect("directory lock poisoned");
        state.users.insert(user.id, user);
    }

    /// Register an opaque bearer token for an existing user.
    pub fn issue_token(&self, token: &str, user: UserId) -> Result<(), IdentityError> {
        let mut state = self.state.write().expect("directory lock poisoned");
        if !state.users.contains_key(&user) {
            return Err(IdentityError::UnknownUser(user));
        }
        state.tokens.insert(token.to_string(), user);
        Ok(())
    }

    pub fn user(&self, id: UserId) -> Option<DirectoryUser> {
        let state = self.state.read().expect("directory lock poisoned");
        state.users.get(&id).cloned()
    }

    pub fn users(&self) -> Vec<DirectoryUser> {
        let state = self.state.read().expect("directory lock poisoned");
        state.users.values().cloned().collect()
    }

    pub fn permissions_of(&self, id: UserId) -> Result<Vec<Permission>, IdentityError> {
        let state = self.state.read().expect("directory lock poisoned");
        let user = state.users.get(&id).ok_or(IdentityError::UnknownUser(id))?;
        Ok(resolve_permissions(&user.roles, &self.catalog)
            .into_iter()
            .collect())
    }
}

impl IdentityProvider for Directory {
    fn verify_actor(&self, token: &str) -> Result<UserId, IdentityError> {
        let state = self.state.read().expect("directory lock poisoned");
        let user = state
            .tokens
            .get(token.trim())
            .copied()
            .ok_or(IdentityError::InvalidToken)?;
        match state.users.get(&user) {
            Some(record) if record.active => Ok(user),
            _ => Err(IdentityError::InvalidToken),
        }
    }

    fn has_permission(&self, user: UserId, permission: Permission) -> Result<bool, IdentityError> {
        let state = self.state.read().expect("directory lock poisoned");
        let record = state
            .users
            .get(&user)
            .ok_or(IdentityError::UnknownUser(user))?;
        Ok(resolve_permissions(&record.roles, &self.catalog).contains(&permission))
    }

    fn is_team_lead(&self, user: UserId) -> Result<bool, IdentityError> {
        let state = self.state.read().expect("directory lock poisoned");
        Ok(state
            .teams
            .values()
            .any(|team| team.team_lead == Some(user)))
    }
}

impl OrgDirectory for Directory {
    fn primary_team_lead(&self, user: UserId) -> Result<Option<UserId>, IdentityError> {
        let state = self.state.read().expect("directory lock poisoned");
        let record = state
            .users
            .get(&user)
            .ok_or(IdentityError::UnknownUser(user))?;
        Ok(record
            .teams
            .first()
            .and_then(|name| state.teams.get(name))
            .and_then(|team| team.team_lead))
    }

    fn display_name(&self, user: UserId) -> Result<Option<String>, IdentityError> {
        let state = self.state.read().expect("directory lock poisoned");
        Ok(state.users.get(&user).map(DirectoryUser::display_name))
    }

    fn users_with_permission(&self, permission: Permission) -> Result<Vec<UserId>, IdentityError> {
        let state = self.state.read().expect("directory lock poisoned");
        Ok(state
            .users
            .values()
            .filter(|record| {
                record.active
                    && resolve_permissions(&record.roles, &self.catalog).contains(&permission)
            })
            .map(|record| record.id)
            .collect())
    }
}
