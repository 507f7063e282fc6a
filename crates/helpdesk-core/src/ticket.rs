//! Ticket data model for helpdesk
//!
//! A ticket is a support request with a lifecycle status and an append-only
//! conversation thread. Status transitions live here so every caller goes
//! through the same table.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Ticket status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Open,
    /// Staff replied last
    Answered,
    /// Requester replied to an answer, staff owes a response
    Waiting,
    Closed,
}

impl Status {
    pub fn is_active(&self) -> bool {
        !self.is_closed()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Status::Closed)
    }

    /// Status after a message is appended to a ticket in this status.
    ///
    /// Closed tickets never reach this point; reopening happens first.
    pub fn after_append(self, is_staff: bool) -> Status {
        match (self, is_staff) {
            (Status::Open | Status::Waiting, true) => Status::Answered,
            (Status::Answered, false) => Status::Waiting,
            (status, _) => status,
        }
    }
}

impl std::str::FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Status::Open),
            "answered" => Ok(Status::Answered),
            "waiting" => Ok(Status::Waiting),
            "closed" => Ok(Status::Closed),
            _ => Err(Error::Validation(format!("unknown status: {}", s))),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Open => write!(f, "open"),
            Status::Answered => write!(f, "answered"),
            Status::Waiting => write!(f, "waiting"),
            Status::Closed => write!(f, "closed"),
        }
    }
}

/// Ticket priority, ordered from least to most pressing
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl std::str::FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(Error::Validation(format!("unknown priority: {}", s))),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
        }
    }
}

/// Support category a ticket is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Billing,
    Technical,
    GameServer,
    Account,
    General,
}

impl Category {
    /// Human label shown by category pickers
    pub fn label(&self) -> &'static str {
        match self {
            Category::Billing => "Billing Support",
            Category::Technical => "Technical Support",
            Category::GameServer => "Game Server Support",
            Category::Account => "Account Help",
            Category::General => "General Inquiry",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "billing" => Ok(Category::Billing),
            "technical" => Ok(Category::Technical),
            "game-server" | "game_server" | "gameserver" => Ok(Category::GameServer),
            "account" => Ok(Category::Account),
            "general" => Ok(Category::General),
            _ => Err(Error::Validation(format!("unknown category: {}", s))),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Billing => write!(f, "billing"),
            Category::Technical => write!(f, "technical"),
            Category::GameServer => write!(f, "game-server"),
            Category::Account => write!(f, "account"),
            Category::General => write!(f, "general"),
        }
    }
}

/// Identity snapshot of the person who filed a ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Identity snapshot of a message sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl From<&Requester> for Author {
    fn from(requester: &Requester) -> Self {
        Self {
            id: requester.id.clone(),
            name: requester.name.clone(),
            avatar: None,
        }
    }
}

/// Staff member a ticket is assigned to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    pub id: String,
    pub name: String,
}

/// One entry in a ticket's conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within the owning ticket (msg-N)
    pub id: String,

    pub content: String,

    pub created_at: DateTime<Utc>,

    /// Written by staff rather than the requester
    pub is_staff: bool,

    pub author: Author,

    /// Opaque references into external attachment storage
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

/// Core ticket structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique identifier (PREFIX-NNN)
    pub id: String,

    pub subject: String,

    /// Opening description, also the first message of the thread
    pub description: String,

    pub category: Category,

    pub status: Status,

    pub priority: Priority,

    pub created_at: DateTime<Utc>,

    /// Refreshed whenever status, priority, assignment or the thread changes
    pub updated_at: DateTime<Utc>,

    /// When the ticket was last closed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,

    pub user: Requester,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Assignee>,

    /// Assignee at the moment the ticket was last closed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<Assignee>,

    /// Requester satisfaction rating (1-5), given after closure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,

    /// Conversation in chronological order
    pub messages: Vec<Message>,
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

impl Ticket {
    /// Create a new open ticket whose thread starts with the description
    pub fn new(
        id: String,
        subject: String,
        description: String,
        category: Category,
        priority: Priority,
        user: Requester,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        require_text("subject", &subject)?;
        require_text("description", &description)?;

        let opening = Message {
            id: crate::id::message_id(1),
            content: description.clone(),
            created_at: now,
            is_staff: false,
            author: Author::from(&user),
            attachments: Vec::new(),
        };

        Ok(Self {
            id,
            subject,
            description,
            category,
            status: Status::Open,
            priority,
            created_at: now,
            updated_at: now,
            closed_at: None,
            user,
            assigned_to: None,
            resolved_by: None,
            rating: None,
            messages: vec![opening],
        })
    }

    /// Whether the given identity filed this ticket
    pub fn is_owned_by(&self, requester_id: &str) -> bool {
        self.user.id == requester_id
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Append a message and advance the status.
    ///
    /// A closed ticket only accepts the message when `reopen` is set, in
    /// which case it moves back to open before the append transition applies.
    /// Nothing is modified when an error is returned.
    pub fn append_message(
        &mut self,
        content: String,
        is_staff: bool,
        author: Author,
        attachments: Vec<String>,
        reopen: bool,
        now: DateTime<Utc>,
    ) -> Result<&Message> {
        require_text("content", &content)?;
        if self.status.is_closed() && !reopen {
            return Err(Error::ClosedTicket(self.id.clone()));
        }

        // Thread timestamps never go backwards, even if the clock does
        let created_at = self
            .last_message()
            .map_or(now, |last| last.created_at.max(now));

        if self.status.is_closed() {
            self.clear_resolution();
        }
        self.status = self.status.after_append(is_staff);
        self.messages.push(Message {
            id: crate::id::message_id(self.messages.len() + 1),
            content,
            created_at,
            is_staff,
            author,
            attachments,
        });
        self.touch(created_at);

        Ok(&self.messages[self.messages.len() - 1])
    }

    /// Mark as closed. Returns false when already closed.
    pub fn close(&mut self, now: DateTime<Utc>) -> bool {
        if self.status.is_closed() {
            return false;
        }
        self.status = Status::Closed;
        self.closed_at = Some(now);
        self.resolved_by = self.assigned_to.clone();
        self.touch(now);
        true
    }

    /// Move a closed ticket back to open
    pub fn reopen(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.status.is_closed() {
            return Err(Error::InvalidState(format!(
                "cannot reopen {}: ticket is {}",
                self.id, self.status
            )));
        }
        self.clear_resolution();
        self.touch(now);
        Ok(())
    }

    /// Back to open; closure data and any rating belong to the old resolution
    fn clear_resolution(&mut self) {
        self.status = Status::Open;
        self.closed_at = None;
        self.resolved_by = None;
        self.rating = None;
    }

    pub fn set_priority(&mut self, priority: Priority, now: DateTime<Utc>) {
        self.priority = priority;
        self.touch(now);
    }

    pub fn assign(&mut self, assignee: Assignee, now: DateTime<Utc>) {
        self.assigned_to = Some(assignee);
        self.touch(now);
    }

    /// Rename the ticket. Subject edits do not count as activity.
    pub fn set_subject(&mut self, subject: String) -> Result<()> {
        require_text("subject", &subject)?;
        self.subject = subject;
        Ok(())
    }

    /// Record the requester's satisfaction with a closed ticket
    pub fn rate(&mut self, rating: u8) -> Result<()> {
        if !(1..=5).contains(&rating) {
            return Err(Error::Validation(format!(
                "rating must be between 1 and 5, got {}",
                rating
            )));
        }
        if !self.status.is_closed() {
            return Err(Error::InvalidState(format!(
                "cannot rate {}: ticket is {}",
                self.id, self.status
            )));
        }
        self.rating = Some(rating);
        Ok(())
    }

    /// Time from creation to the first staff reply
    pub fn first_response_time(&self) -> Option<Duration> {
        self.messages
            .iter()
            .find(|m| m.is_staff)
            .map(|m| m.created_at - self.created_at)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = self.updated_at.max(now);
    }
}

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] [{}] {} - {}",
            self.id, self.priority, self.category, self.status, self.subject
        )
    }
}
