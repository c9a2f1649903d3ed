//! Organization and membership model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: Id,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationType {
    Individual,
    Team,
    Enterprise,
}

impl OrganizationType {
    /// Whether `self -> next` is a legal upgrade. The lattice never allows
    /// downgrades: `individual -> {team, enterprise}`, `team ->
    /// enterprise`, `enterprise -> none`.
    pub fn can_upgrade_to(self, next: OrganizationType) -> bool {
        use OrganizationType::*;
        matches!(
            (self, next),
            (Individual, Team) | (Individual, Enterprise) | (Team, Enterprise)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Id,
    pub name: String,
    pub members: Vec<Member>,
    #[serde(rename = "type")]
    pub org_type: OrganizationType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn is_admin(&self, user_id: &str) -> bool {
        self.members
            .iter()
            .any(|m| m.user_id == user_id && m.role == Role::Admin)
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.user_id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_lattice() {
        use OrganizationType::*;
        assert!(Individual.can_upgrade_to(Team));
        assert!(Individual.can_upgrade_to(Enterprise));
        assert!(Team.can_upgrade_to(Enterprise));
        assert!(!Team.can_upgrade_to(Individual));
        assert!(!Enterprise.can_upgrade_to(Team));
        assert!(!Enterprise.can_upgrade_to(Individual));
    }
}
