//! Query engine: filtered, ordered, read-only views over the ticket store
//!
//! Nothing here mutates a ticket. Aggregates are recomputed from a fresh
//! snapshot unless the store generation and calendar day both match the
//! cached value.

use crate::{Assignee, Category, Priority, Repository, Status, Ticket, TicketStore};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Status predicate of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Only(Status),
}

impl StatusFilter {
    pub fn matches(&self, status: Status) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(s) => *s == status,
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        s.parse().map(StatusFilter::Only)
    }
}

/// Result ordering. Ties are always broken by id ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Most recently updated first
    #[default]
    RecentlyUpdated,
    /// Most recently created first
    Newest,
    /// Most pressing priority first, then most recently updated
    Priority,
}

impl std::str::FromStr for SortOrder {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "updated" | "recently_updated" | "recent" => Ok(SortOrder::RecentlyUpdated),
            "newest" | "created" => Ok(SortOrder::Newest),
            "priority" => Ok(SortOrder::Priority),
            _ => Err(crate::Error::Validation(format!("unknown sort order: {}", s))),
        }
    }
}

/// Listing options. Every field that is set must match (logical AND).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketFilter {
    pub status: StatusFilter,
    /// Case-insensitive substring of id or subject; empty matches all
    pub search_text: String,
    /// Restrict to one requester's tickets
    pub requester_id: Option<String>,
    pub exclude_status: Option<Status>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub assignee_id: Option<String>,
    pub sort: SortOrder,
}

impl TicketFilter {
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = StatusFilter::Only(status);
        self
    }

    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search_text = text.into();
        self
    }

    pub fn for_requester(mut self, requester_id: impl Into<String>) -> Self {
        self.requester_id = Some(requester_id.into());
        self
    }

    pub fn excluding(mut self, status: Status) -> Self {
        self.exclude_status = Some(status);
        self
    }

    pub fn sorted_by(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Admin "needs attention" queue: everything not closed
    pub fn needs_attention() -> Self {
        Self::default().excluding(Status::Closed)
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.status.matches(ticket.status)
            && self.matches_search(ticket)
            && self
                .requester_id
                .as_deref()
                .is_none_or(|id| ticket.is_owned_by(id))
            && self.exclude_status.is_none_or(|s| ticket.status != s)
            && self.category.is_none_or(|c| ticket.category == c)
            && self.priority.is_none_or(|p| ticket.priority == p)
            && self.assignee_id.as_deref().is_none_or(|id| {
                ticket.assigned_to.as_ref().is_some_and(|a| a.id == id)
            })
    }

    fn matches_search(&self, ticket: &Ticket) -> bool {
        if self.search_text.is_empty() {
            return true;
        }
        let needle = self.search_text.to_lowercase();
        ticket.id.to_lowercase().contains(&needle)
            || ticket.subject.to_lowercase().contains(&needle)
    }

    fn compare(&self, a: &Ticket, b: &Ticket) -> Ordering {
        let primary = match self.sort {
            SortOrder::RecentlyUpdated => b.updated_at.cmp(&a.updated_at),
            SortOrder::Newest => b.created_at.cmp(&a.created_at),
            SortOrder::Priority => b
                .priority
                .cmp(&a.priority)
                .then_with(|| b.updated_at.cmp(&a.updated_at)),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }

    /// Filter and order an owned set of tickets
    pub fn apply(&self, tickets: Vec<Ticket>) -> Vec<Ticket> {
        let mut matched: Vec<Ticket> = tickets.into_iter().filter(|t| self.matches(t)).collect();
        matched.sort_by(|a, b| self.compare(a, b));
        matched
    }
}

/// Aggregate numbers for dashboards
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketStats {
    pub total: usize,
    pub open: usize,
    pub answered: usize,
    pub waiting: usize,
    pub closed: usize,
    pub created_today: usize,
    pub resolved_today: usize,
    /// Mean time from creation to first staff reply, in seconds
    pub avg_response_secs: Option<i64>,
    /// Number of tickets carrying a rating
    pub rated: usize,
    /// Percent of rated tickets at or above the satisfaction threshold
    pub satisfaction_rate: Option<f64>,
}

impl TicketStats {
    /// Compute statistics over `tickets` as of `now` (UTC calendar day)
    pub fn compute(tickets: &[Ticket], now: DateTime<Utc>, satisfaction_threshold: u8) -> Self {
        let today = now.date_naive();
        let count = |status: Status| tickets.iter().filter(|t| t.status == status).count();

        let responses: Vec<i64> = tickets
            .iter()
            .filter_map(|t| t.first_response_time())
            .map(|d| d.num_seconds())
            .collect();
        let avg_response_secs = (!responses.is_empty())
            .then(|| responses.iter().sum::<i64>() / responses.len() as i64);

        let ratings: Vec<u8> = tickets.iter().filter_map(|t| t.rating).collect();
        let satisfied = ratings
            .iter()
            .filter(|r| **r >= satisfaction_threshold)
            .count();
        let satisfaction_rate =
            (!ratings.is_empty()).then(|| satisfied as f64 * 100.0 / ratings.len() as f64);

        Self {
            total: tickets.len(),
            open: count(Status::Open),
            answered: count(Status::Answered),
            waiting: count(Status::Waiting),
            closed: count(Status::Closed),
            created_today: tickets
                .iter()
                .filter(|t| t.created_at.date_naive() == today)
                .count(),
            resolved_today: tickets
                .iter()
                .filter(|t| t.status.is_closed())
                .filter(|t| t.closed_at.is_some_and(|c| c.date_naive() == today))
                .count(),
            avg_response_secs,
            rated: ratings.len(),
            satisfaction_rate,
        }
    }
}

/// Per staff member workload summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffPerformance {
    pub staff_id: String,
    pub name: String,
    pub assigned: usize,
    pub resolved: usize,
    pub avg_rating: Option<f64>,
}

impl StaffPerformance {
    /// Summaries for every assignee or resolver, busiest closer first
    ///
    /// `assigned` counts current assignments. `resolved` and the ratings are
    /// credited to whoever held the ticket when it was closed.
    pub fn compute(tickets: &[Ticket]) -> Vec<Self> {
        let mut by_staff: BTreeMap<&str, (Self, Vec<u8>)> = BTreeMap::new();
        for ticket in tickets {
            if let Some(assignee) = &ticket.assigned_to {
                staff_entry(&mut by_staff, assignee).0.assigned += 1;
            }
            if ticket.status.is_closed()
                && let Some(resolver) = &ticket.resolved_by
            {
                let (perf, ratings) = staff_entry(&mut by_staff, resolver);
                perf.resolved += 1;
                if let Some(rating) = ticket.rating {
                    ratings.push(rating);
                }
            }
        }

        let mut result: Vec<Self> = by_staff
            .into_values()
            .map(|(mut perf, ratings)| {
                if !ratings.is_empty() {
                    let sum: u32 = ratings.iter().map(|r| u32::from(*r)).sum();
                    perf.avg_rating = Some(f64::from(sum) / ratings.len() as f64);
                }
                perf
            })
            .collect();
        result.sort_by(|a, b| {
            b.resolved
                .cmp(&a.resolved)
                .then_with(|| a.staff_id.cmp(&b.staff_id))
        });
        result
    }
}

fn staff_entry<'m, 'a>(
    by_staff: &'m mut BTreeMap<&'a str, (StaffPerformance, Vec<u8>)>,
    staff: &'a Assignee,
) -> &'m mut (StaffPerformance, Vec<u8>) {
    by_staff.entry(staff.id.as_str()).or_insert_with(|| {
        (
            StaffPerformance {
                staff_id: staff.id.clone(),
                name: staff.name.clone(),
                assigned: 0,
                resolved: 0,
                avg_rating: None,
            },
            Vec::new(),
        )
    })
}

struct CachedStats {
    generation: u64,
    day: NaiveDate,
    stats: TicketStats,
}

/// Read-only views over a shared [`TicketStore`]
pub struct QueryEngine<R: Repository> {
    store: Arc<TicketStore<R>>,
    stats_cache: Mutex<Option<CachedStats>>,
}

impl<R: Repository> QueryEngine<R> {
    pub fn new(store: Arc<TicketStore<R>>) -> Self {
        Self {
            store,
            stats_cache: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<TicketStore<R>> {
        &self.store
    }

    /// Tickets matching `filter`, in the filter's order
    pub fn list(&self, filter: &TicketFilter) -> Vec<Ticket> {
        filter.apply(self.store.snapshot())
    }

    /// Dashboard statistics as of `now`
    pub fn stats(&self, now: DateTime<Utc>) -> TicketStats {
        // Read before snapshotting: a mutation racing the snapshot bumps the
        // generation past this value and forces the next call to recompute.
        let generation = self.store.generation();
        let day = now.date_naive();

        let mut cache = self
            .stats_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.as_ref()
            && cached.generation == generation
            && cached.day == day
        {
            return cached.stats.clone();
        }

        let stats = TicketStats::compute(
            &self.store.snapshot(),
            now,
            self.store.config().satisfaction_threshold,
        );
        *cache = Some(CachedStats {
            generation,
            day,
            stats: stats.clone(),
        });
        stats
    }

    pub fn staff_performance(&self) -> Vec<StaffPerformance> {
        StaffPerformance::compute(&self.store.snapshot())
    }
}
