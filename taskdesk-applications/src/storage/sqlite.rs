//! SQLite storage
//!
//! Tables are created on construction. Timestamps are stored as RFC 3339
//! text, enums as their wire strings.

use super::{Page, TaskOrder, TaskQuery, TaskScope, TaskStorage, UserQuery, UserStorage};
use crate::models::{Task, User};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use taskdesk_core::{QaStatus, TaskdeskError, TaskdeskResult};
use tracing::{debug, error, info};

const USERS_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE COLLATE NOCASE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL,
        assigned_qa TEXT,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        last_login TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
    CREATE INDEX IF NOT EXISTS idx_users_assigned_qa ON users(assigned_qa);
"#;

const TASKS_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        assigned_to TEXT NOT NULL,
        assigned_by TEXT NOT NULL,
        status TEXT NOT NULL,
        priority TEXT NOT NULL,
        priority_rank INTEGER NOT NULL,
        due_date TEXT,
        completed_at TEXT,
        qa_reviewer TEXT,
        qa_status TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_tasks_assigned_to ON tasks(assigned_to);
    CREATE INDEX IF NOT EXISTS idx_tasks_qa_reviewer ON tasks(qa_reviewer);
    CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
"#;

const DUPLICATE_EMAIL: &str = "User already exists with this email.";

/// Open a pool for `database_url`, creating the database file if needed
///
/// In-memory databases are pinned to a single long-lived connection, since
/// every new connection would otherwise see an empty database.
pub async fn connect(database_url: &str) -> TaskdeskResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| TaskdeskError::storage("sqlite", "parse_url", e))?
        .create_if_missing(true);

    let pool_options = if database_url.contains(":memory:") || database_url.contains("mode=memory")
    {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|e| TaskdeskError::storage("sqlite", "connect", e))?;

    info!(database_url = %database_url, "Connected to SQLite");
    Ok(pool)
}

fn storage_err(component: &'static str, operation: &'static str) -> impl Fn(sqlx::Error) -> TaskdeskError {
    move |e| {
        error!(component, operation, error = %e, "SQLite operation failed");
        TaskdeskError::storage(component, operation, e)
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> TaskdeskResult<T>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| TaskdeskError::internal(format!("Failed to get {} column: {}", name, e)))
}

fn parse_column<T: FromStr<Err = String>>(row: &SqliteRow, name: &str) -> TaskdeskResult<T> {
    let raw: String = column(row, name)?;
    raw.parse().map_err(TaskdeskError::internal)
}

fn row_to_user(row: &SqliteRow) -> TaskdeskResult<User> {
    Ok(User {
        id: column(row, "id")?,
        first_name: column(row, "first_name")?,
        last_name: column(row, "last_name")?,
        email: column(row, "email")?,
        password_hash: column(row, "password_hash")?,
        role: parse_column(row, "role")?,
        assigned_qa: column(row, "assigned_qa")?,
        is_active: column(row, "is_active")?,
        last_login: column(row, "last_login")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

fn row_to_task(row: &SqliteRow) -> TaskdeskResult<Task> {
    let qa_status: Option<String> = column(row, "qa_status")?;
    Ok(Task {
        id: column(row, "id")?,
        title: column(row, "title")?,
        description: column(row, "description")?,
        assigned_to: column(row, "assigned_to")?,
        assigned_by: column(row, "assigned_by")?,
        status: parse_column(row, "status")?,
        priority: parse_column(row, "priority")?,
        due_date: column(row, "due_date")?,
        completed_at: column(row, "completed_at")?,
        qa_reviewer: column(row, "qa_reviewer")?,
        qa_status: qa_status
            .map(|s| s.parse::<QaStatus>())
            .transpose()
            .map_err(TaskdeskError::internal)?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

#[derive(Debug, Clone)]
pub struct SqliteUserStorage {
    pool: SqlitePool,
}

impl SqliteUserStorage {
    pub async fn new(pool: SqlitePool) -> TaskdeskResult<Self> {
        sqlx::raw_sql(USERS_SCHEMA)
            .execute(&pool)
            .await
            .map_err(storage_err("sqlite_users", "create_tables"))?;
        debug!("Users table ready");
        Ok(Self { pool })
    }

    fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, query: &'a UserQuery) {
        if query.active_only {
            qb.push(" AND is_active = TRUE");
        }
        if let Some(role) = query.role {
            qb.push(" AND role = ").push_bind(role.as_str());
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = format!(
                "%{}%",
                search.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
            );
            qb.push(" AND (first_name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR last_name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR email LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
    }
}

#[async_trait]
impl UserStorage for SqliteUserStorage {
    async fn insert_user(&self, user: &User) -> TaskdeskResult<()> {
        let query = r#"
            INSERT INTO users (id, first_name, last_name, email, password_hash, role,
                               assigned_qa, is_active, last_login, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

        let result = sqlx::query(query)
            .bind(&user.id)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(&user.assigned_qa)
            .bind(user.is_active)
            .bind(user.last_login)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {
                debug!(user_id = %user.id, "User inserted");
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => Err(TaskdeskError::conflict(DUPLICATE_EMAIL)),
            Err(e) => Err(storage_err("sqlite_users", "insert_user")(e)),
        }
    }

    async fn find_user(&self, id: &str) -> TaskdeskResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err("sqlite_users", "find_user"))?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> TaskdeskResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err("sqlite_users", "find_user_by_email"))?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_users(&self, ids: &[String]) -> TaskdeskResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM users WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err("sqlite_users", "find_users"))?;
        rows.iter().map(row_to_user).collect()
    }

    async fn update_user(&self, user: &User) -> TaskdeskResult<()> {
        let query = r#"
            UPDATE users
            SET first_name = ?, last_name = ?, email = ?, password_hash = ?, role = ?,
                assigned_qa = ?, is_active = ?, last_login = ?, updated_at = ?
            WHERE id = ?
        "#;

        let result = sqlx::query(query)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(&user.assigned_qa)
            .bind(user.is_active)
            .bind(user.last_login)
            .bind(user.updated_at)
            .bind(&user.id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(TaskdeskError::not_found("User")),
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(TaskdeskError::conflict(DUPLICATE_EMAIL)),
            Err(e) => Err(storage_err("sqlite_users", "update_user")(e)),
        }
    }

    async fn list_users(&self, query: &UserQuery) -> TaskdeskResult<Page<User>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM users WHERE 1 = 1");
        Self::push_filters(&mut count, query);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err("sqlite_users", "count_users"))?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM users WHERE 1 = 1");
        Self::push_filters(&mut select, query);
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(query.page.limit as i64)
            .push(" OFFSET ")
            .push_bind(query.page.offset() as i64);

        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err("sqlite_users", "list_users"))?;

        Ok(Page {
            items: rows.iter().map(row_to_user).collect::<TaskdeskResult<_>>()?,
            total: total as u64,
            request: query.page,
        })
    }

    async fn list_team(&self, qa_id: &str) -> TaskdeskResult<Vec<User>> {
        let rows = sqlx::query(
            "SELECT * FROM users WHERE assigned_qa = ? AND role = 'agent' AND is_active = TRUE",
        )
        .bind(qa_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err("sqlite_users", "list_team"))?;
        rows.iter().map(row_to_user).collect()
    }

    async fn count_users(&self) -> TaskdeskResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err("sqlite_users", "count_users"))?;
        Ok(count as u64)
    }

    async fn health_check(&self) -> TaskdeskResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(storage_err("sqlite_users", "health_check"))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SqliteTaskStorage {
    pool: SqlitePool,
}

impl SqliteTaskStorage {
    pub async fn new(pool: SqlitePool) -> TaskdeskResult<Self> {
        sqlx::raw_sql(TASKS_SCHEMA)
            .execute(&pool)
            .await
            .map_err(storage_err("sqlite_tasks", "create_tables"))?;
        debug!("Tasks table ready");
        Ok(Self { pool })
    }

    fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, query: &'a TaskQuery) {
        match &query.scope {
            TaskScope::All => {}
            TaskScope::AssignedTo(id) => {
                qb.push(" AND assigned_to = ").push_bind(id.as_str());
            }
            TaskScope::ReviewedBy(id) => {
                qb.push(" AND qa_reviewer = ").push_bind(id.as_str());
            }
            TaskScope::Team { reviewer, agents } => {
                qb.push(" AND (qa_reviewer = ").push_bind(reviewer.as_str());
                if !agents.is_empty() {
                    qb.push(" OR assigned_to IN (");
                    let mut separated = qb.separated(", ");
                    for agent in agents {
                        separated.push_bind(agent.as_str());
                    }
                    separated.push_unseparated(")");
                }
                qb.push(")");
            }
        }
        if let Some(status) = query.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(priority) = query.priority {
            qb.push(" AND priority = ").push_bind(priority.as_str());
        }
    }
}

#[async_trait]
impl TaskStorage for SqliteTaskStorage {
    async fn insert_task(&self, task: &Task) -> TaskdeskResult<()> {
        let query = r#"
            INSERT INTO tasks (id, title, description, assigned_to, assigned_by, status, priority,
                               priority_rank, due_date, completed_at, qa_reviewer, qa_status,
                               created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

        sqlx::query(query)
            .bind(&task.id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(&task.assigned_to)
            .bind(&task.assigned_by)
            .bind(task.status.as_str())
            .bind(task.priority.as_str())
            .bind(task.priority.rank() as i64)
            .bind(task.due_date)
            .bind(task.completed_at)
            .bind(&task.qa_reviewer)
            .bind(task.qa_status.map(|s| s.as_str()))
            .bind(task.created_at)
            .bind(task.updated_at)
            .execute(&self.pool)
            .await
            .map_err(storage_err("sqlite_tasks", "insert_task"))?;

        debug!(task_id = %task.id, "Task inserted");
        Ok(())
    }

    async fn find_task(&self, id: &str) -> TaskdeskResult<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err("sqlite_tasks", "find_task"))?;
        row.as_ref().map(row_to_task).transpose()
    }

    async fn update_task(&self, task: &Task) -> TaskdeskResult<()> {
        let query = r#"
            UPDATE tasks
            SET title = ?, description = ?, assigned_to = ?, status = ?, priority = ?,
                priority_rank = ?, due_date = ?, completed_at = ?, qa_reviewer = ?,
                qa_status = ?, updated_at = ?
            WHERE id = ?
        "#;

        let done = sqlx::query(query)
            .bind(&task.title)
            .bind(&task.description)
            .bind(&task.assigned_to)
            .bind(task.status.as_str())
            .bind(task.priority.as_str())
            .bind(task.priority.rank() as i64)
            .bind(task.due_date)
            .bind(task.completed_at)
            .bind(&task.qa_reviewer)
            .bind(task.qa_status.map(|s| s.as_str()))
            .bind(task.updated_at)
            .bind(&task.id)
            .execute(&self.pool)
            .await
            .map_err(storage_err("sqlite_tasks", "update_task"))?;

        if done.rows_affected() == 0 {
            return Err(TaskdeskError::not_found("Task"));
        }
        Ok(())
    }

    async fn delete_task(&self, id: &str) -> TaskdeskResult<bool> {
        let done = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err("sqlite_tasks", "delete_task"))?;
        Ok(done.rows_affected() > 0)
    }

    async fn list_tasks(&self, query: &TaskQuery) -> TaskdeskResult<Page<Task>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM tasks WHERE 1 = 1");
        Self::push_filters(&mut count, query);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err("sqlite_tasks", "count_tasks"))?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM tasks WHERE 1 = 1");
        Self::push_filters(&mut select, query);
        select.push(match query.order {
            TaskOrder::Newest => " ORDER BY created_at DESC",
            TaskOrder::Urgency => {
                " ORDER BY priority_rank DESC, due_date IS NULL, due_date ASC, created_at DESC"
            }
        });
        select
            .push(" LIMIT ")
            .push_bind(query.page.limit as i64)
            .push(" OFFSET ")
            .push_bind(query.page.offset() as i64);

        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err("sqlite_tasks", "list_tasks"))?;

        Ok(Page {
            items: rows.iter().map(row_to_task).collect::<TaskdeskResult<_>>()?,
            total: total as u64,
            request: query.page,
        })
    }

    async fn health_check(&self) -> TaskdeskResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(storage_err("sqlite_tasks", "health_check"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTask;
    use crate::storage::PageRequest;
    use chrono::Utc;
    use taskdesk_core::{Role, TaskPriority, TaskStatus};

    fn new_task(title: &str, assigned_to: &str, priority: TaskPriority) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: None,
            assigned_to: assigned_to.to_string(),
            priority,
            due_date: None,
            qa_reviewer: None,
        }
    }

    async fn storages() -> (SqliteUserStorage, SqliteTaskStorage) {
        let pool = connect("sqlite::memory:").await.unwrap();
        (
            SqliteUserStorage::new(pool.clone()).await.unwrap(),
            SqliteTaskStorage::new(pool).await.unwrap(),
        )
    }

    #[tokio::test]
    async fn test_user_round_trip_and_conflict() {
        let (users, _) = storages().await;
        let mut user = User::new("Ann", "Smith", "ann@example.com", "hash", Role::Qa);
        users.insert_user(&user).await.unwrap();

        let loaded = users.find_user_by_email("ann@example.com").await.unwrap().unwrap();
        assert_eq!(loaded.id, user.id);
        assert_eq!(loaded.role, Role::Qa);
        assert!(loaded.is_active);

        let dup = User::new("Ann", "Other", "ANN@example.com", "hash", Role::Agent);
        assert!(matches!(
            users.insert_user(&dup).await,
            Err(TaskdeskError::Conflict { .. })
        ));

        user.is_active = false;
        user.last_login = Some(Utc::now());
        users.update_user(&user).await.unwrap();
        let loaded = users.find_user(&user.id).await.unwrap().unwrap();
        assert!(!loaded.is_active);
        assert!(loaded.last_login.is_some());
    }

    #[tokio::test]
    async fn test_list_users_search_and_pagination() {
        let (users, _) = storages().await;
        for i in 0..3 {
            let user = User::new("Agent", "Smith", &format!("agent{}@example.com", i), "h", Role::Agent);
            users.insert_user(&user).await.unwrap();
        }
        users
            .insert_user(&User::new("Boss", "Jones", "boss@example.com", "h", Role::Manager))
            .await
            .unwrap();

        let page = users
            .list_users(&UserQuery {
                role: None,
                search: Some("SMITH".to_string()),
                active_only: true,
                page: PageRequest::new(Some(1), Some(2), 10),
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.pages(), 2);
    }

    #[tokio::test]
    async fn test_task_round_trip_and_team_scope() {
        let (_, tasks) = storages().await;
        let reviewed = NewTask {
            description: Some("with qa".to_string()),
            qa_reviewer: Some("qa-1".to_string()),
            ..new_task("Reviewed", "agent-x", TaskPriority::Critical)
        }
        .into_task("admin");
        let team = new_task("Team", "agent-team", TaskPriority::Low).into_task("admin");
        let unrelated = new_task("Unrelated", "agent-y", TaskPriority::Medium).into_task("admin");
        for t in [&reviewed, &team, &unrelated] {
            tasks.insert_task(t).await.unwrap();
        }

        let loaded = tasks.find_task(&reviewed.id).await.unwrap().unwrap();
        assert_eq!(loaded.qa_status, Some(QaStatus::PendingReview));
        assert_eq!(loaded.priority, TaskPriority::Critical);

        let page = tasks
            .list_tasks(&TaskQuery {
                scope: TaskScope::Team {
                    reviewer: "qa-1".to_string(),
                    agents: vec!["agent-team".to_string()],
                },
                status: None,
                priority: None,
                order: TaskOrder::Urgency,
                page: PageRequest::new(None, None, 100),
            })
            .await
            .unwrap();
        let titles: Vec<_> = page.items.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Reviewed", "Team"]);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_task() {
        let (_, tasks) = storages().await;
        let mut task = new_task("Ghost", "a", TaskPriority::Medium).into_task("admin");

        assert!(matches!(
            tasks.update_task(&task).await,
            Err(TaskdeskError::NotFound { .. })
        ));
        tasks.insert_task(&task).await.unwrap();
        task.status = TaskStatus::Completed;
        tasks.update_task(&task).await.unwrap();
        assert_eq!(
            tasks.find_task(&task.id).await.unwrap().unwrap().status,
            TaskStatus::Completed
        );
        assert!(tasks.delete_task(&task.id).await.unwrap());
        assert!(tasks.find_task(&task.id).await.unwrap().is_none());
    }
}
