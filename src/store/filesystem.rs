use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{
    check_version, DecisionRecord, EntityKind, ExpenseReport, ExpenseStore, ServiceTicket,
    StoreError, TicketStore, TicketTransitionRecord,
};
use crate::approval::ExpenseWorkflow;
use crate::ticket::TicketState;

/// JSON-document store rooted at a directory.
///
/// Layout: `<root>/expenses/<id>.json` and `<root>/tickets/<id>.json`.
/// Every read-compare-write holds an exclusive advisory lock on
/// `<id>.lock`, so at most one transition per entity is in flight across
/// processes.
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    root: PathBuf,
}

impl FileSystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entity_dir(&self, kind: EntityKind) -> PathBuf {
        match kind {
            EntityKind::Expense => self.root.join("expenses"),
            EntityKind::Ticket => self.root.join("tickets"),
        }
    }

    fn entity_path(&self, kind: EntityKind, id: &str) -> PathBuf {
        self.entity_dir(kind).join(format!("{id}.json"))
    }

    /// Ids become file names; keep them to a safe alphabet.
    fn validate_id(kind: EntityKind, id: &str) -> Result<(), StoreError> {
        let valid = !id.is_empty()
            && id.len() <= 128
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !id.starts_with('.');
        if valid {
            Ok(())
        } else {
            Err(StoreError::InvalidId {
                kind,
                id: id.to_string(),
            })
        }
    }

    /// Run `f` on the entity path while holding the entity's write lock.
    async fn with_entity_lock<T, F>(
        &self,
        kind: EntityKind,
        id: &str,
        f: F,
    ) -> Result<T, StoreError>
    where
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        Self::validate_id(kind, id)?;
        let dir = self.entity_dir(kind);
        let path = self.entity_path(kind, id);
        let lock_path = dir.join(format!("{id}.lock"));

        tokio::task::spawn_blocking(move || -> Result<T, StoreError> {
            fs::create_dir_all(&dir)?;
            let lock_file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            let mut lock = fd_lock::RwLock::new(lock_file);
            let _guard = lock.write().map_err(|e| StoreError::Lock {
                reason: format!("{}: {e}", lock_path.display()),
            })?;
            f(&path)
        })
        .await
        .map_err(|e| StoreError::Lock {
            reason: format!("store task failed: {e}"),
        })?
    }

    async fn load_record<R: DeserializeOwned>(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<R, StoreError> {
        Self::validate_id(kind, id)?;
        let path = self.entity_path(kind, id);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                kind,
                id: id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_records<R: DeserializeOwned>(
        &self,
        kind: EntityKind,
    ) -> Result<Vec<R>, StoreError> {
        let dir = self.entity_dir(kind);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let contents = tokio::fs::read_to_string(&path).await?;
            records.push(serde_json::from_str(&contents)?);
        }
        Ok(records)
    }
}

fn read_record<R: DeserializeOwned>(
    kind: EntityKind,
    id: &str,
    path: &Path,
) -> Result<R, StoreError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
            kind,
            id: id.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Write to a temporary sibling, then rename over the target.
fn write_record<R: Serialize>(path: &Path, record: &R) -> Result<(), StoreError> {
    let serialized = serde_json::to_string_pretty(record)?;
    let temp_file = path.with_extension("json.tmp");
    fs::write(&temp_file, serialized)?;
    fs::rename(&temp_file, path)?;
    Ok(())
}

fn insert_record<R: Serialize>(
    kind: EntityKind,
    id: &str,
    path: &Path,
    record: &R,
) -> Result<(), StoreError> {
    if path.exists() {
        return Err(StoreError::AlreadyExists {
            kind,
            id: id.to_string(),
        });
    }
    write_record(path, record)
}

#[async_trait]
impl ExpenseStore for FileSystemStore {
    async fn insert_expense(&self, report: &ExpenseReport) -> Result<(), StoreError> {
        let record = report.clone();
        let id = report.id.clone();
        self.with_entity_lock(EntityKind::Expense, &report.id, move |path| {
            insert_record(EntityKind::Expense, &id, path, &record)
        })
        .await?;

        info!(expense_id = %report.id, root = ?self.root, "Expense created");
        Ok(())
    }

    async fn load_expense(&self, id: &str) -> Result<ExpenseReport, StoreError> {
        self.load_record(EntityKind::Expense, id).await
    }

    async fn list_expenses(&self) -> Result<Vec<ExpenseReport>, StoreError> {
        self.list_records(EntityKind::Expense).await
    }

    async fn save_expense(
        &self,
        id: &str,
        workflow: &ExpenseWorkflow,
        decision: &DecisionRecord,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let owned_id = id.to_string();
        let workflow = *workflow;
        let decision = decision.clone();

        let version = self
            .with_entity_lock(EntityKind::Expense, id, move |path| {
                let mut report: ExpenseReport = read_record(EntityKind::Expense, &owned_id, path)?;
                check_version(EntityKind::Expense, &owned_id, expected_version, report.version)?;

                report.workflow = workflow;
                report.updated_at = decision.decided_at;
                report.history.push(decision);
                report.version += 1;

                write_record(path, &report)?;
                Ok(report.version)
            })
            .await?;

        debug!(expense_id = %id, version, "Expense saved");
        Ok(version)
    }
}

#[async_trait]
impl TicketStore for FileSystemStore {
    async fn insert_ticket(&self, ticket: &ServiceTicket) -> Result<(), StoreError> {
        let record = ticket.clone();
        let id = ticket.id.clone();
        self.with_entity_lock(EntityKind::Ticket, &ticket.id, move |path| {
            insert_record(EntityKind::Ticket, &id, path, &record)
        })
        .await?;

        info!(ticket_id = %ticket.id, root = ?self.root, "Ticket created");
        Ok(())
    }

    async fn load_ticket(&self, id: &str) -> Result<ServiceTicket, StoreError> {
        self.load_record(EntityKind::Ticket, id).await
    }

    async fn list_tickets(&self) -> Result<Vec<ServiceTicket>, StoreError> {
        self.list_records(EntityKind::Ticket).await
    }

    async fn save_ticket(
        &self,
        id: &str,
        state: TicketState,
        technician: Option<String>,
        transition: &TicketTransitionRecord,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let owned_id = id.to_string();
        let transition = transition.clone();

        let version = self
            .with_entity_lock(EntityKind::Ticket, id, move |path| {
                let mut ticket: ServiceTicket = read_record(EntityKind::Ticket, &owned_id, path)?;
                check_version(EntityKind::Ticket, &owned_id, expected_version, ticket.version)?;

                ticket.state = state;
                ticket.technician = technician;
                ticket.updated_at = transition.at;
                ticket.history.push(transition);
                ticket.version += 1;

                write_record(path, &ticket)?;
                Ok(ticket.version)
            })
            .await?;

        debug!(ticket_id = %id, version, "Ticket saved");
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::TicketAction;
    use chrono::Utc;
    use tempfile::TempDir;

    fn transition(from: TicketState, to: TicketState) -> TicketTransitionRecord {
        TicketTransitionRecord {
            action: TicketAction::Advance(None),
            actor: "dispatch".to_string(),
            from,
            to,
            technician: Some("tomas".to_string()),
            at: Utc::now(),
            correlation_id: None,
        }
    }

    #[tokio::test]
    async fn test_round_trip_through_disk() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSystemStore::new(temp_dir.path());

        store
            .insert_ticket(&ServiceTicket::new("t-100", "Acme", "Leaking valve"))
            .await
            .unwrap();
        let version = store
            .save_ticket(
                "t-100",
                TicketState::TechnicianAssigned,
                Some("tomas".to_string()),
                &transition(TicketState::Started, TicketState::TechnicianAssigned),
                0,
            )
            .await
            .unwrap();
        assert_eq!(version, 1);

        let ticket = store.load_ticket("t-100").await.unwrap();
        assert_eq!(ticket.state, TicketState::TechnicianAssigned);
        assert_eq!(ticket.technician.as_deref(), Some("tomas"));
        assert_eq!(ticket.history.len(), 1);
        assert!(temp_dir.path().join("tickets").join("t-100.json").exists());
    }

    #[tokio::test]
    async fn test_stale_save_conflicts() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSystemStore::new(temp_dir.path());
        store
            .insert_ticket(&ServiceTicket::new("t-1", "Acme", "Noise"))
            .await
            .unwrap();

        let record = transition(TicketState::Started, TicketState::TechnicianAssigned);
        store
            .save_ticket("t-1", TicketState::TechnicianAssigned, None, &record, 0)
            .await
            .unwrap();
        let err = store
            .save_ticket("t-1", TicketState::TechnicianAssigned, None, &record, 0)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::ConcurrencyConflict {
                expected: 0,
                found: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSystemStore::new(temp_dir.path());

        for id in ["../escape", "", ".hidden", "a/b"] {
            assert!(matches!(
                store.load_expense(id).await,
                Err(StoreError::InvalidId { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_list_on_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSystemStore::new(temp_dir.path().join("never-created"));
        assert!(store.list_expenses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_ignores_lock_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSystemStore::new(temp_dir.path());
        store
            .insert_expense(&ExpenseReport::new("b", "Hotel", "erin", "2026-10", 1))
            .await
            .unwrap();
        store
            .insert_expense(&ExpenseReport::new("a", "Taxi", "erin", "2026-10", 1))
            .await
            .unwrap();

        let ids: Vec<_> = store.list_expenses().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }
}
