use std::collections::BTreeSet;

use tracing::debug;

use crate::limits::{MAX_IN_CLAUSE_IDS, MAX_NAME_LEN};
use crate::model::*;
use crate::page::{order, PageRequest};

use super::{observed, Engine, EngineError};

#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub ids: Vec<String>,
    pub query: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct TeamQuery {
    pub ids: Vec<String>,
    pub query: Option<String>,
    pub created_by: Option<String>,
    pub team_type: Option<TeamType>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct PodQuery {
    pub query: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewTeam {
    pub id: Option<String>,
    pub name: String,
    pub team_type: TeamType,
    pub created_by: Option<String>,
    pub member_ids: BTreeSet<String>,
}

/// Split comma-joined entries (`["a,b", " c "]` → `["a", "b", "c"]`), dropping blanks.
pub fn normalize_ids(ids: &[String]) -> Vec<String> {
    ids.iter()
        .flat_map(|entry| entry.split(','))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn search_term(query: &Option<String>) -> Option<&str> {
    query.as_deref().map(str::trim).filter(|q| !q.is_empty())
}

fn check_ids(ids: &[String]) -> Result<(), EngineError> {
    if ids.len() > MAX_IN_CLAUSE_IDS {
        return Err(EngineError::LimitExceeded("too many ids"));
    }
    Ok(())
}

impl Engine {
    pub async fn get_user(&self, id: &str) -> Result<User, EngineError> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| EngineError::not_found("user", id))
    }

    pub async fn get_team(&self, id: &str) -> Result<Group, EngineError> {
        self.store
            .get_group(&GroupRef::Team(id.to_string()))
            .await?
            .ok_or_else(|| EngineError::not_found("team", id))
    }

    pub async fn get_pod(&self, id: &str) -> Result<Group, EngineError> {
        self.store
            .get_group(&GroupRef::Pod(id.to_string()))
            .await?
            .ok_or_else(|| EngineError::not_found("pod", id))
    }

    /// Ids win over a search term; a search term gets a default window; otherwise
    /// the full directory by display name.
    pub async fn users(&self, query: &UserQuery) -> Result<Vec<User>, EngineError> {
        observed("users", async {
            let ids = normalize_ids(&query.ids);
            if !ids.is_empty() {
                check_ids(&ids)?;
                return Ok(self.store.users_by_ids(&ids).await?);
            }
            if let Some(term) = search_term(&query.query) {
                let page = PageRequest::for_search(query.limit, query.offset, order::USERS)?;
                return Ok(self.store.search_users(term, Some(&page)).await?);
            }
            let page = PageRequest::from_params(query.limit, query.offset, order::USERS)?;
            Ok(self.store.list_users(page.as_ref()).await?)
        })
        .await
    }

    /// Filters apply in a fixed precedence: ids, type with creator, creator,
    /// type, search term, then everything.
    pub async fn teams(&self, query: &TeamQuery) -> Result<Vec<Group>, EngineError> {
        observed("teams", async {
            let ids = normalize_ids(&query.ids);
            if !ids.is_empty() {
                check_ids(&ids)?;
                return Ok(self.store.teams_by_ids(&ids).await?);
            }

            let page = PageRequest::from_params(query.limit, query.offset, order::GROUPS)?;
            let creator = query.created_by.as_deref().filter(|c| !c.trim().is_empty());
            let teams = match (query.team_type, creator) {
                (Some(team_type), Some(creator)) => {
                    self.store
                        .teams_by_type_and_creator(team_type, creator, page.as_ref())
                        .await?
                }
                (None, Some(creator)) => self.store.teams_by_creator(creator, page.as_ref()).await?,
                (Some(team_type), None) => self.store.teams_by_type(team_type, page.as_ref()).await?,
                (None, None) => match search_term(&query.query) {
                    Some(term) => {
                        let page = PageRequest::for_search(query.limit, query.offset, order::GROUPS)?;
                        self.store.search_teams(term, Some(&page)).await?
                    }
                    None => self.store.list_teams(page.as_ref()).await?,
                },
            };
            Ok(teams)
        })
        .await
    }

    pub async fn pods(&self, query: &PodQuery) -> Result<Vec<Group>, EngineError> {
        observed("pods", async {
            if let Some(term) = search_term(&query.query) {
                let page = PageRequest::for_search(query.limit, query.offset, order::GROUPS)?;
                return Ok(self.store.search_pods(term, Some(&page)).await?);
            }
            let page = PageRequest::from_params(query.limit, query.offset, order::GROUPS)?;
            Ok(self.store.list_pods(page.as_ref()).await?)
        })
        .await
    }

    pub async fn save_user(&self, user: User) -> Result<User, EngineError> {
        if user.display_name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("display name too long"));
        }
        Ok(self.store.save_user(user).await?)
    }

    /// Insert or replace a team or pod as given.
    pub async fn save_group(&self, group: Group) -> Result<Group, EngineError> {
        if group.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("group name too long"));
        }
        debug!(
            "save {} {} ({} members)",
            group.group_ref().kind_label(),
            group.id,
            group.member_ids.len()
        );
        Ok(self.store.save_group(group).await?)
    }

    pub async fn save_pod(&self, id: &str, name: &str, member_ids: BTreeSet<String>) -> Result<Group, EngineError> {
        self.save_group(Group {
            id: id.to_string(),
            name: name.to_string(),
            kind: GroupKind::Pod,
            member_ids,
        })
        .await
    }

    pub async fn create_team(&self, new: NewTeam) -> Result<Group, EngineError> {
        observed("create_team", async {
            let team = Group {
                id: new.id.unwrap_or_else(Engine::new_id),
                name: new.name,
                kind: GroupKind::Team {
                    team_type: new.team_type,
                    created_by: new.created_by,
                },
                member_ids: new.member_ids,
            };
            self.save_group(team).await
        })
        .await
    }

    /// Unknown ids are not an error.
    pub async fn delete_team(&self, id: &str) -> Result<(), EngineError> {
        observed("delete_team", async {
            let removed = self.store.delete_group(&GroupRef::Team(id.to_string())).await?;
            debug!("delete team {id}: removed={removed}");
            Ok(())
        })
        .await
    }
}
