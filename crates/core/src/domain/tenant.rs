use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Membership role within a tenant, ordered by authority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantRole {
    Viewer,
    Agent,
    Admin,
    Owner,
}

impl TenantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Agent => "agent",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "viewer" => Some(Self::Viewer),
            "agent" => Some(Self::Agent),
            "admin" => Some(Self::Admin),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }

    /// SLA policy management requires admin authority or higher.
    pub fn can_manage_policies(&self) -> bool {
        *self >= Self::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::TenantRole;

    #[test]
    fn roles_round_trip_from_storage_encoding() {
        let cases =
            [TenantRole::Viewer, TenantRole::Agent, TenantRole::Admin, TenantRole::Owner];

        for role in cases {
            assert_eq!(TenantRole::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn only_admin_and_above_manage_policies() {
        assert!(!TenantRole::Viewer.can_manage_policies());
        assert!(!TenantRole::Agent.can_manage_policies());
        assert!(TenantRole::Admin.can_manage_policies());
        assert!(TenantRole::Owner.can_manage_policies());
    }
}
