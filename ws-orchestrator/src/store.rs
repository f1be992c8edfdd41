//! Employee and workspace persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, info, instrument};
use ws_core::Employee;

use crate::error::{OrchestratorError, Result};
use crate::workspace::{Workspace, WorkspaceStatus};

#[async_trait]
pub trait EmployeeStore: Send + Sync {
    async fn get_employee(&self, employee_id: &str) -> Result<Option<Employee>>;
}

#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    /// Insert a new record. A second record for the same employee fails
    /// with `AlreadyProvisioned`.
    async fn create_workspace(&self, workspace: &Workspace) -> Result<()>;

    async fn get_workspace(&self, workspace_id: &str) -> Result<Option<Workspace>>;

    async fn get_workspace_by_employee(&self, employee_id: &str) -> Result<Option<Workspace>>;

    async fn list_workspaces(&self) -> Result<Vec<Workspace>>;

    async fn update_status(&self, workspace_id: &str, status: WorkspaceStatus) -> Result<()>;

    /// Deleting an unknown id is not an error.
    async fn delete_workspace(&self, workspace_id: &str) -> Result<()>;
}

/// Both stores backed by one SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) the database file and bring its schema up to date.
    #[instrument(fields(db_path = %db_path.display()))]
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Workspace database ready");

        Ok(Self::new(pool))
    }

    /// Round-trip to the database, for readiness checks.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn insert_employee(&self, employee: &Employee) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO employees (employee_id, first_name, last_name, email, department, role)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&employee.employee_id)
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(&employee.email)
        .bind(&employee.department)
        .bind(&employee.role)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl EmployeeStore for SqliteStore {
    async fn get_employee(&self, employee_id: &str) -> Result<Option<Employee>> {
        let row = sqlx::query_as::<_, EmployeeRow>("SELECT * FROM employees WHERE employee_id = ?")
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl WorkspaceStore for SqliteStore {
    async fn create_workspace(&self, workspace: &Workspace) -> Result<()> {
        let created_at = workspace.created_at.timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO workspaces (workspace_id, employee_id, name, url, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&workspace.workspace_id)
        .bind(&workspace.employee_id)
        .bind(&workspace.name)
        .bind(&workspace.url)
        .bind(workspace.status)
        .bind(created_at)
        .bind(created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(OrchestratorError::AlreadyProvisioned(workspace.employee_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_workspace(&self, workspace_id: &str) -> Result<Option<Workspace>> {
        let row = sqlx::query_as::<_, WorkspaceRow>("SELECT * FROM workspaces WHERE workspace_id = ?")
            .bind(workspace_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn get_workspace_by_employee(&self, employee_id: &str) -> Result<Option<Workspace>> {
        let row = sqlx::query_as::<_, WorkspaceRow>("SELECT * FROM workspaces WHERE employee_id = ?")
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        let rows = sqlx::query_as::<_, WorkspaceRow>("SELECT * FROM workspaces ORDER BY created_at DESC, name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_status(&self, workspace_id: &str, status: WorkspaceStatus) -> Result<()> {
        let result = sqlx::query("UPDATE workspaces SET status = ?, updated_at = ? WHERE workspace_id = ?")
            .bind(status)
            .bind(Utc::now().timestamp())
            .bind(workspace_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(OrchestratorError::NotFound(workspace_id.to_string()));
        }

        Ok(())
    }

    async fn delete_workspace(&self, workspace_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM workspaces WHERE workspace_id = ?")
            .bind(workspace_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            debug!(workspace_id, "Workspace record already absent");
        }

        Ok(())
    }
}

// Internal row types for sqlx
#[derive(sqlx::FromRow)]
struct EmployeeRow {
    employee_id: String,
    first_name: String,
    last_name: String,
    email: String,
    department: String,
    role: String,
}

#[derive(sqlx::FromRow)]
struct WorkspaceRow {
    workspace_id: String,
    employee_id: String,
    name: String,
    url: String,
    status: WorkspaceStatus,
    created_at: i64,
}

impl From<EmployeeRow> for Employee {
    fn from(row: EmployeeRow) -> Self {
        Self {
            employee_id: row.employee_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            department: row.department,
            role: row.role,
        }
    }
}

impl From<WorkspaceRow> for Workspace {
    fn from(row: WorkspaceRow) -> Self {
        Self {
            workspace_id: row.workspace_id,
            employee_id: row.employee_id,
            name: row.name,
            url: row.url,
            status: row.status,
            created_at: DateTime::from_timestamp(row.created_at, 0).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_db, employee};

    fn workspace(id: &str, employee_id: &str) -> Workspace {
        Workspace {
            workspace_id: id.to_string(),
            employee_id: employee_id.to_string(),
            name: format!("ws-{id}"),
            url: format!("https://{id}.innovatech.local"),
            status: WorkspaceStatus::Provisioning,
            created_at: DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_connect_creates_database_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("state").join("workspaces.db");

        let store = SqliteStore::connect(&db_path).await.unwrap();

        assert!(db_path.exists());
        store.ping().await.unwrap();
        store.insert_employee(&employee("emp-1", "Ada", "Lovelace")).await.unwrap();
        assert!(store.get_employee("emp-1").await.unwrap().is_some());

        drop(store);
        let reopened = SqliteStore::connect(&db_path).await.unwrap();
        assert!(reopened.get_employee("emp-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_workspace_roundtrip() {
        let store = SqliteStore::new(create_test_db().await);
        let record = workspace("w1", "emp-1");

        store.create_workspace(&record).await.unwrap();

        assert_eq!(store.get_workspace("w1").await.unwrap(), Some(record.clone()));
        assert_eq!(store.get_workspace_by_employee("emp-1").await.unwrap(), Some(record));
        assert_eq!(store.get_workspace_by_employee("emp-2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_second_workspace_for_employee_conflicts() {
        let store = SqliteStore::new(create_test_db().await);
        store.create_workspace(&workspace("w1", "emp-1")).await.unwrap();

        let err = store.create_workspace(&workspace("w2", "emp-1")).await.unwrap_err();

        assert!(matches!(err, OrchestratorError::AlreadyProvisioned(id) if id == "emp-1"));
        assert_eq!(store.list_workspaces().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_status() {
        let store = SqliteStore::new(create_test_db().await);
        store.create_workspace(&workspace("w1", "emp-1")).await.unwrap();

        store.update_status("w1", WorkspaceStatus::Active).await.unwrap();

        let stored = store.get_workspace("w1").await.unwrap().unwrap();
        assert_eq!(stored.status, WorkspaceStatus::Active);
        assert!(matches!(
            store.update_status("missing", WorkspaceStatus::Active).await,
            Err(OrchestratorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = SqliteStore::new(create_test_db().await);
        store.create_workspace(&workspace("w1", "emp-1")).await.unwrap();

        store.delete_workspace("w1").await.unwrap();
        store.delete_workspace("w1").await.unwrap();

        assert!(store.list_workspaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_employee_lookup() {
        let store = SqliteStore::new(create_test_db().await);
        let ada = employee("emp-ada", "Ada", "Lovelace");
        store.insert_employee(&ada).await.unwrap();

        assert_eq!(store.get_employee("emp-ada").await.unwrap(), Some(ada));
        assert_eq!(store.get_employee("nobody").await.unwrap(), None);
    }
}
