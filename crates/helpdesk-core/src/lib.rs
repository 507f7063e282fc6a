//! helpdesk-core: ticket lifecycle and conversation core for the helpdesk portal
//!
//! Owns the canonical ticket collection, the status state machine and the
//! append-only message thread. Rendering, auth and transport live elsewhere.

pub mod config;
pub mod error;
pub mod id;
pub mod jsonl;
pub mod query;
pub mod repository;
pub mod store;
pub mod ticket;

pub use config::Config;
pub use error::{Error, ErrorKind};
pub use jsonl::JsonlRepository;
pub use query::{QueryEngine, SortOrder, StaffPerformance, StatusFilter, TicketFilter, TicketStats};
pub use repository::{MemoryRepository, Repository};
pub use store::{AppendMessage, NewTicket, TicketStore};
pub use ticket::{Assignee, Author, Category, Message, Priority, Requester, Status, Ticket};

/// Result type for helpdesk operations
pub type Result<T> = std::result::Result<T, Error>;
