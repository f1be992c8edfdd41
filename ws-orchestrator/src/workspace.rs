use crate::error::{OrchestratorError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A provisioned workspace, one per employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub workspace_id: String,
    pub employee_id: String,
    pub name: String,
    pub url: String,
    pub status: WorkspaceStatus,

    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum WorkspaceStatus {
    Provisioning,
    Active,
    Error,
    Terminated,
}

impl WorkspaceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceStatus::Provisioning => "provisioning",
            WorkspaceStatus::Active => "active",
            WorkspaceStatus::Error => "error",
            WorkspaceStatus::Terminated => "terminated",
        }
    }

    pub fn can_transition_to(&self, next: WorkspaceStatus) -> bool {
        use WorkspaceStatus::*;

        matches!(
            (self, next),
            (Provisioning, Active)
                | (Provisioning, Error)
                | (Active, Error)
                | (Error, Active)
                | (Provisioning | Active | Error, Terminated)
        )
    }

    /// `next` if the move is allowed, otherwise `InvalidState`.
    pub fn transition(self, next: WorkspaceStatus) -> Result<WorkspaceStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(OrchestratorError::InvalidState { from: self, to: next })
        }
    }
}

impl fmt::Display for WorkspaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Serialize DateTime as RFC 3339 / ISO 8601 string
fn serialize_datetime<S>(dt: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use WorkspaceStatus::*;

    #[test]
    fn test_allowed_transitions() {
        assert_eq!(Provisioning.transition(Active).unwrap(), Active);
        assert_eq!(Provisioning.transition(Error).unwrap(), Error);
        assert_eq!(Active.transition(Error).unwrap(), Error);
        assert_eq!(Error.transition(Active).unwrap(), Active);
        for status in [Provisioning, Active, Error] {
            assert!(status.can_transition_to(Terminated));
        }
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(matches!(
            Active.transition(Provisioning),
            Err(OrchestratorError::InvalidState { from: Active, to: Provisioning })
        ));
        assert!(Terminated.transition(Active).is_err());
        assert!(Terminated.transition(Terminated).is_err());
        assert!(Error.transition(Error).is_err());
    }

    #[test]
    fn test_descriptor_shape() {
        let workspace = Workspace {
            workspace_id: "4c5e".to_string(),
            employee_id: "emp-1".to_string(),
            name: "ada-lovelace".to_string(),
            url: "https://ada.lovelace.innovatech.local".to_string(),
            status: Provisioning,
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        };

        let json = serde_json::to_value(&workspace).unwrap();

        assert_eq!(json["workspaceId"], "4c5e");
        assert_eq!(json["employeeId"], "emp-1");
        assert_eq!(json["status"], "provisioning");
        assert_eq!(json["createdAt"], "2023-11-14T22:13:20+00:00");
    }
}
