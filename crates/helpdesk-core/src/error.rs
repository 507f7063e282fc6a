//! Error types for helpdesk

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Ticket not found: {0}")]
    NotFound(String),

    #[error("Ticket {0} is closed")]
    ClosedTicket(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Ticket {0} was changed by another writer")]
    Conflict(String),

    #[error("Store not initialized. Run 'helpdesk init' first.")]
    NotInitialized,

    #[error("Store already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification callers use to pick a user-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    ClosedTicket,
    InvalidState,
    Conflict,
    Storage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::ClosedTicket(_) => ErrorKind::ClosedTicket,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::Conflict(_) => ErrorKind::Conflict,
            _ => ErrorKind::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind() {
        assert_eq!(Error::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(Error::ClosedTicket("TKT-001".into()).kind(), ErrorKind::ClosedTicket);
        assert_eq!(Error::Conflict("TKT-001".into()).kind(), ErrorKind::Conflict);
        assert_eq!(Error::NotInitialized.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_display() {
        let err = Error::ClosedTicket("TKT-004".to_string());
        assert_eq!(err.to_string(), "Ticket TKT-004 is closed");
    }
}
