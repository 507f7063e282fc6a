//! Persistence seam for the ticket store
//!
//! The store keeps its working set in memory and writes each committed
//! ticket through a [`Repository`]. Backends decide how tickets are kept.

use crate::{Result, Ticket};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Storage backend for tickets
pub trait Repository: Send + Sync {
    /// Load a single ticket, `None` when absent
    fn load(&self, id: &str) -> Result<Option<Ticket>>;

    /// Insert or replace a ticket. Must be all-or-nothing.
    fn save(&self, ticket: &Ticket) -> Result<()>;

    /// Load every stored ticket
    fn load_all(&self) -> Result<Vec<Ticket>>;
}

impl<R: Repository + ?Sized> Repository for std::sync::Arc<R> {
    fn load(&self, id: &str) -> Result<Option<Ticket>> {
        (**self).load(id)
    }

    fn save(&self, ticket: &Ticket) -> Result<()> {
        (**self).save(ticket)
    }

    fn load_all(&self) -> Result<Vec<Ticket>> {
        (**self).load_all()
    }
}

/// In-memory backend, used by tests and embedders without durable storage
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tickets: RwLock<HashMap<String, Ticket>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the repository with existing tickets
    pub fn with_tickets(tickets: impl IntoIterator<Item = Ticket>) -> Self {
        let tickets = tickets.into_iter().map(|t| (t.id.clone(), t)).collect();
        Self {
            tickets: RwLock::new(tickets),
        }
    }

    pub fn len(&self) -> usize {
        self.tickets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Repository for MemoryRepository {
    fn load(&self, id: &str) -> Result<Option<Ticket>> {
        let tickets = self.tickets.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tickets.get(id).cloned())
    }

    fn save(&self, ticket: &Ticket) -> Result<()> {
        let mut tickets = self.tickets.write().unwrap_or_else(PoisonError::into_inner);
        tickets.insert(ticket.id.clone(), ticket.clone());
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Ticket>> {
        let tickets = self.tickets.read().unwrap_or_else(PoisonError::into_inner);
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
            "Invoice question".to_string(),
            "Extra charge on my invoice".to_string(),
            Category::Billing,
            Priority::Medium,
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
    fn test_save_and_load() {
        let repo = MemoryRepository::new();
        assert!(repo.is_empty());
        repo.save(&ticket("TKT-001")).unwrap();
        repo.save(&ticket("TKT-002")).unwrap();

        assert_eq!(repo.len(), 2);
        assert_eq!(repo.load("TKT-001").unwrap().unwrap().id, "TKT-001");
        assert!(repo.load("TKT-404").unwrap().is_none());
        assert_eq!(repo.load_all().unwrap().len(), 2);
    }

    #[test]
    fn test_save_replaces() {
        let repo = MemoryRepository::with_tickets([ticket("TKT-001")]);
        let mut updated = ticket("TKT-001");
        updated.close(Utc::now());
        repo.save(&updated).unwrap();
        assert_eq!(repo.len(), 1);
        assert!(repo.load("TKT-001").unwrap().unwrap().status.is_closed());
    }
}
