//! JSONL repository for helpdesk tickets
//!
//! One ticket per line in .helpdesk/tickets.jsonl. Every save rewrites the
//! file through a temporary sibling and a rename, so a failed write leaves
//! the previous contents intact.
//!
//! Several processes may open the same directory. A save holds an exclusive
//! lock on .helpdesk/tickets.lock, re-reads the file, and merges the ticket
//! into what is on disk. If the disk copy of that ticket is not the one this
//! handle last saw, the save fails with [`Error::Conflict`].

use crate::{Config, Error, Repository, Result, Ticket};
use fs4::fs_std::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

pub const HELPDESK_DIR: &str = ".helpdesk";
const TICKETS_FILE: &str = "tickets.jsonl";
const CONFIG_FILE: &str = "config.toml";
const LOCK_FILE: &str = "tickets.lock";

/// JSONL-backed ticket repository
pub struct JsonlRepository {
    root: PathBuf,
    tickets: Mutex<BTreeMap<String, Ticket>>,
}

impl JsonlRepository {
    /// Find and open the repository for the current directory
    pub fn open() -> Result<Self> {
        let root = Self::find_root(&std::env::current_dir()?)?;
        Self::open_at(&root)
    }

    /// Open the repository rooted at `root` (the directory holding .helpdesk)
    pub fn open_at(root: &Path) -> Result<Self> {
        let dir = root.join(HELPDESK_DIR);
        if !dir.exists() {
            return Err(Error::NotInitialized);
        }
        let repo = Self {
            root: root.to_path_buf(),
            tickets: Mutex::new(BTreeMap::new()),
        };
        let loaded = repo.read_file()?;
        *repo.tickets.lock().unwrap_or_else(PoisonError::into_inner) = loaded;
        Ok(repo)
    }

    /// Initialize a new repository in `root`
    pub fn init(root: &Path, prefix: &str) -> Result<Self> {
        let dir = root.join(HELPDESK_DIR);
        if dir.exists() {
            return Err(Error::AlreadyInitialized(dir.display().to_string()));
        }

        let config = Config {
            id_prefix: prefix.to_string(),
            ..Config::default()
        };
        config.validate()?;

        fs::create_dir_all(&dir)?;
        fs::write(dir.join(CONFIG_FILE), Config::default_with_comments(prefix))?;
        fs::write(dir.join(TICKETS_FILE), "")?;

        Ok(Self {
            root: root.to_path_buf(),
            tickets: Mutex::new(BTreeMap::new()),
        })
    }

    /// Find the directory containing .helpdesk, walking up from `start`
    pub fn find_root(start: &Path) -> Result<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            if current.join(HELPDESK_DIR).exists() {
                return Ok(current);
            }
            if !current.pop() {
                return Err(Error::NotInitialized);
            }
        }
    }

    /// Path to the .helpdesk directory
    pub fn helpdesk_dir(&self) -> PathBuf {
        self.root.join(HELPDESK_DIR)
    }

    /// Path to tickets.jsonl
    pub fn tickets_path(&self) -> PathBuf {
        self.helpdesk_dir().join(TICKETS_FILE)
    }

    /// Path to config.toml
    pub fn config_path(&self) -> PathBuf {
        self.helpdesk_dir().join(CONFIG_FILE)
    }

    /// Load the config stored next to the tickets
    pub fn config(&self) -> Result<Config> {
        Config::load(&self.config_path())
    }

    /// Exclusive writer lock, released when the returned file is dropped
    fn lock_writers(&self) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.helpdesk_dir().join(LOCK_FILE))?;
        FileExt::lock_exclusive(&file)?;
        Ok(file)
    }

    fn read_file(&self) -> Result<BTreeMap<String, Ticket>> {
        let path = self.tickets_path();
        let mut tickets = BTreeMap::new();
        if !path.exists() {
            return Ok(tickets);
        }

        let reader = BufReader::new(File::open(&path)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let ticket: Ticket = serde_json::from_str(&line)?;
            tickets.insert(ticket.id.clone(), ticket);
        }

        Ok(tickets)
    }

    fn write_file(&self, tickets: &BTreeMap<String, Ticket>) -> Result<()> {
        let path = self.tickets_path();
        let tmp = path.with_extension("jsonl.tmp");

        let result = (|| -> Result<()> {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            for ticket in tickets.values() {
                serde_json::to_writer(&mut writer, ticket)?;
                writeln!(writer)?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
            Ok(())
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl Repository for JsonlRepository {
    fn load(&self, id: &str) -> Result<Option<Ticket>> {
        let tickets = self.tickets.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(tickets.get(id).cloned())
    }

    fn save(&self, ticket: &Ticket) -> Result<()> {
        let mut tickets = self.tickets.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = self.lock_writers()?;

        let mut on_disk = self.read_file()?;
        if let Some(current) = on_disk.get(&ticket.id)
            && tickets.get(&ticket.id) != Some(current)
        {
            warn!(ticket = %ticket.id, "ticket changed on disk since it was loaded");
            return Err(Error::Conflict(ticket.id.clone()));
        }

        on_disk.insert(ticket.id.clone(), ticket.clone());
        self.write_file(&on_disk)?;
        *tickets = on_disk;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Ticket>> {
        let tickets = self.tickets.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(tickets.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, Priority, Requester};
    use chrono::Utc;

    fn ticket(id: &str) -> Ticket {
        Ticket::new(
            id.to_string(),
            "Server keeps crashing".to_string(),
            "Memory errors before each crash".to_string(),
            Category::GameServer,
            Priority::High,
            Requester {
                id: "1".to_string(),
                name: "John Doe".to_string(),
                email: "john@example.com".to_string(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_init_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonlRepository::init(dir.path(), "SUP").unwrap();
        assert!(repo.tickets_path().exists());
        assert_eq!(repo.config().unwrap().id_prefix, "SUP");

        let err = JsonlRepository::init(dir.path(), "SUP").err().unwrap();
        assert!(matches!(err, Error::AlreadyInitialized(_)));
    }

    #[test]
    fn test_open_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonlRepository::open_at(dir.path()).err().unwrap();
        assert!(matches!(err, Error::NotInitialized));
    }

    #[test]
    fn test_save_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonlRepository::init(dir.path(), "TKT").unwrap();
        repo.save(&ticket("TKT-001")).unwrap();
        let mut second = ticket("TKT-002");
        second.close(Utc::now());
        repo.save(&second).unwrap();

        let reopened = JsonlRepository::open_at(dir.path()).unwrap();
        assert_eq!(reopened.load_all().unwrap().len(), 2);
        let loaded = reopened.load("TKT-002").unwrap().unwrap();
        assert_eq!(loaded, second);
    }

    #[test]
    fn test_find_root_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        JsonlRepository::init(dir.path(), "TKT").unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(JsonlRepository::find_root(&nested).unwrap(), dir.path());
    }

    #[test]
    fn test_failed_write_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonlRepository::init(dir.path(), "TKT").unwrap();
        repo.save(&ticket("TKT-001")).unwrap();

        // A directory squatting on the temp path makes File::create fail
        fs::create_dir(repo.tickets_path().with_extension("jsonl.tmp")).unwrap();
        assert!(repo.save(&ticket("TKT-002")).is_err());

        assert!(repo.load("TKT-002").unwrap().is_none());
        let reopened = JsonlRepository::open_at(dir.path()).unwrap();
        assert_eq!(reopened.load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_two_handles_keep_each_others_tickets() {
        let dir = tempfile::tempdir().unwrap();
        JsonlRepository::init(dir.path(), "TKT").unwrap();
        let a = JsonlRepository::open_at(dir.path()).unwrap();
        let b = JsonlRepository::open_at(dir.path()).unwrap();

        a.save(&ticket("TKT-001")).unwrap();
        b.save(&ticket("TKT-002")).unwrap();

        let reopened = JsonlRepository::open_at(dir.path()).unwrap();
        let ids: Vec<String> = reopened
            .load_all()
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, ["TKT-001", "TKT-002"]);
    }

    #[test]
    fn test_id_taken_by_other_handle_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        JsonlRepository::init(dir.path(), "TKT").unwrap();
        let a = JsonlRepository::open_at(dir.path()).unwrap();
        let b = JsonlRepository::open_at(dir.path()).unwrap();

        let first = ticket("TKT-001");
        a.save(&first).unwrap();
        let err = b.save(&ticket("TKT-001")).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let reopened = JsonlRepository::open_at(dir.path()).unwrap();
        assert_eq!(reopened.load("TKT-001").unwrap(), Some(first));
    }

    #[test]
    fn test_stale_update_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let a = JsonlRepository::init(dir.path(), "TKT").unwrap();
        let original = ticket("TKT-001");
        a.save(&original).unwrap();
        let b = JsonlRepository::open_at(dir.path()).unwrap();

        let mut closed = original.clone();
        closed.close(Utc::now());
        a.save(&closed).unwrap();

        let mut renamed = original;
        renamed.set_subject("Crashes after update".to_string()).unwrap();
        assert!(matches!(b.save(&renamed), Err(Error::Conflict(_))));

        // The same handle keeps saving its own changes
        closed.set_priority(Priority::Urgent, Utc::now());
        a.save(&closed).unwrap();
        let reopened = JsonlRepository::open_at(dir.path()).unwrap();
        assert_eq!(reopened.load("TKT-001").unwrap(), Some(closed));
    }
}
