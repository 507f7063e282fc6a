//! Ticket store: the single mutation surface for tickets
//!
//! Each ticket sits behind its own mutex, so operations on one ticket are
//! totally ordered while different tickets proceed in parallel. A mutation
//! runs against a draft copy, is written through the repository, and only
//! then replaces the live ticket. A failed validation or a failed save
//! leaves the ticket exactly as it was.

use crate::{
    Assignee, Author, Category, Config, Error, ErrorKind, Message, Priority, Repository,
    Requester, Result, Ticket,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Input for [`TicketStore::create_ticket`]
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub subject: String,
    pub description: String,
    pub category: Category,
    /// Falls back to the configured default priority
    pub priority: Option<Priority>,
    pub requester: Requester,
}

/// Input for [`TicketStore::append_message`]
#[derive(Debug, Clone)]
pub struct AppendMessage {
    pub content: String,
    pub is_staff: bool,
    pub author: Author,
    pub attachments: Vec<String>,
    /// Allow the append to reopen a closed ticket
    pub reopen: bool,
}

impl AppendMessage {
    pub fn staff(author: Author, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_staff: true,
            author,
            attachments: Vec::new(),
            reopen: false,
        }
    }

    pub fn requester(author: Author, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_staff: false,
            author,
            attachments: Vec::new(),
            reopen: false,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn reopening(mut self) -> Self {
        self.reopen = true;
        self
    }
}

type Slot = Arc<Mutex<Ticket>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Ticket> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Canonical ticket collection
pub struct TicketStore<R: Repository> {
    repo: R,
    config: Config,
    tickets: RwLock<HashMap<String, Slot>>,
    next_seq: Mutex<u64>,
    generation: AtomicU64,
}

impl<R: Repository> TicketStore<R> {
    /// Open a store over `repo`, loading every persisted ticket
    pub fn open(repo: R, config: Config) -> Result<Self> {
        config.validate()?;
        let loaded = repo.load_all()?;
        let next_seq = crate::id::next_seq(&config.id_prefix, loaded.iter().map(|t| t.id.as_str()));

        info!(tickets = loaded.len(), next_seq, "opened ticket store");

        let tickets = loaded
            .into_iter()
            .map(|t| (t.id.clone(), Arc::new(Mutex::new(t))))
            .collect();

        Ok(Self {
            repo,
            config,
            tickets: RwLock::new(tickets),
            next_seq: Mutex::new(next_seq),
            generation: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Counter bumped after every committed mutation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.read_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// File a new ticket. It starts open with the description as its only message.
    pub fn create_ticket(&self, new: NewTicket) -> Result<Ticket> {
        // Held until the ticket is visible so sequence numbers are never reused
        let mut seq = self.next_seq.lock().unwrap_or_else(PoisonError::into_inner);
        let id = crate::id::ticket_id(&self.config.id_prefix, self.config.id_width, *seq);

        let ticket = Ticket::new(
            id.clone(),
            new.subject,
            new.description,
            new.category,
            new.priority.unwrap_or(self.config.default_priority),
            new.requester,
            Utc::now(),
        )?;

        let mut map = self.tickets.write().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(&id) {
            return Err(Error::Other(format!("ticket id {} already in use", id)));
        }
        if let Err(e) = self.repo.save(&ticket) {
            warn!(ticket = %id, error = %e, "failed to persist new ticket");
            // Another writer took this id; move past it for the next attempt
            if e.kind() == ErrorKind::Conflict {
                *seq += 1;
            }
            return Err(e);
        }
        map.insert(id.clone(), Arc::new(Mutex::new(ticket.clone())));
        *seq += 1;
        self.generation.fetch_add(1, Ordering::AcqRel);

        debug!(ticket = %id, category = %ticket.category, "created ticket");
        Ok(ticket)
    }

    /// Append a message to a ticket's thread and advance its status
    pub fn append_message(&self, ticket_id: &str, msg: AppendMessage) -> Result<Message> {
        let AppendMessage {
            content,
            is_staff,
            author,
            attachments,
            reopen,
        } = msg;
        self.mutate(ticket_id, "append_message", |t| {
            t.append_message(content, is_staff, author, attachments, reopen, Utc::now())
                .cloned()
        })
    }

    pub fn set_priority(&self, ticket_id: &str, priority: Priority) -> Result<Ticket> {
        self.mutate(ticket_id, "set_priority", |t| {
            t.set_priority(priority, Utc::now());
            Ok(t.clone())
        })
    }

    /// Assign (or reassign) a ticket to a staff member
    pub fn assign(&self, ticket_id: &str, assignee: Assignee) -> Result<Ticket> {
        self.mutate(ticket_id, "assign", |t| {
            t.assign(assignee, Utc::now());
            Ok(t.clone())
        })
    }

    /// Close a ticket. Closing a closed ticket changes nothing.
    pub fn close(&self, ticket_id: &str) -> Result<Ticket> {
        self.mutate(ticket_id, "close", |t| {
            t.close(Utc::now());
            Ok(t.clone())
        })
    }

    pub fn reopen(&self, ticket_id: &str) -> Result<Ticket> {
        self.mutate(ticket_id, "reopen", |t| {
            t.reopen(Utc::now())?;
            Ok(t.clone())
        })
    }

    pub fn set_subject(&self, ticket_id: &str, subject: String) -> Result<Ticket> {
        self.mutate(ticket_id, "set_subject", |t| {
            t.set_subject(subject)?;
            Ok(t.clone())
        })
    }

    /// Record a satisfaction rating on a closed ticket
    pub fn rate(&self, ticket_id: &str, rating: u8) -> Result<Ticket> {
        self.mutate(ticket_id, "rate", |t| {
            t.rate(rating)?;
            Ok(t.clone())
        })
    }

    /// Snapshot of a single ticket
    pub fn get_ticket(&self, ticket_id: &str) -> Result<Ticket> {
        let slot = self.slot(ticket_id)?;
        let ticket = lock(&slot).clone();
        Ok(ticket)
    }

    /// Snapshot of every ticket, each one taken between mutations
    pub fn snapshot(&self) -> Vec<Ticket> {
        let map = self.read_map();
        map.values().map(|slot| lock(slot).clone()).collect()
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Slot>> {
        self.tickets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, ticket_id: &str) -> Result<Slot> {
        self.read_map()
            .get(ticket_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(ticket_id.to_string()))
    }

    fn mutate<T>(
        &self,
        ticket_id: &str,
        action: &'static str,
        op: impl FnOnce(&mut Ticket) -> Result<T>,
    ) -> Result<T> {
        let slot = self.slot(ticket_id)?;
        let mut live = lock(&slot);

        let mut draft = live.clone();
        let out = op(&mut draft)?;
        if draft == *live {
            return Ok(out);
        }

        if let Err(e) = self.repo.save(&draft) {
            warn!(
                ticket = %ticket_id,
                action,
                error = %e,
                "failed to persist ticket, change discarded"
            );
            return Err(e);
        }

        let from = live.status;
        *live = draft;
        self.generation.fetch_add(1, Ordering::AcqRel);
        debug!(ticket = %ticket_id, action, from = %from, to = %live.status, "ticket updated");
        Ok(out)
    }
}
