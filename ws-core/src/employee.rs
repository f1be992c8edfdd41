use serde::{Deserialize, Serialize};

/// Employee record as owned by the employee store.
///
/// Read-only input for provisioning and DNS naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
    pub role: String,
}
