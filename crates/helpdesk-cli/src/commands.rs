//! CLI command implementations

use crate::Identity;
use anyhow::{Result, bail};
use chrono::Utc;
use colored::Colorize;
use helpdesk_core::{
    AppendMessage, Assignee, Author, Category, Config, JsonlRepository, NewTicket, Priority,
    QueryEngine, Requester, SortOrder, Status, StatusFilter, Ticket, TicketFilter, TicketStore,
};
use std::sync::Arc;
use tracing::debug;

type Store = TicketStore<JsonlRepository>;

fn open_store() -> Result<Store> {
    let repo = JsonlRepository::open()?;
    debug!(dir = %repo.helpdesk_dir().display(), "using helpdesk store");
    let config = repo.config()?;
    if !config.display.colors {
        colored::control::set_override(false);
    }
    Ok(TicketStore::open(repo, config)?)
}

fn config_path() -> Result<std::path::PathBuf> {
    let root = JsonlRepository::find_root(&std::env::current_dir()?)?;
    Ok(root.join(helpdesk_core::jsonl::HELPDESK_DIR).join("config.toml"))
}

fn colored_status(status: Status) -> colored::ColoredString {
    match status {
        Status::Open => "open".cyan(),
        Status::Answered => "answered".green(),
        Status::Waiting => "waiting".yellow(),
        Status::Closed => "closed".dimmed(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
}

fn print_ticket(ticket: &Ticket, json: bool, verb: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(ticket)?);
    } else {
        println!(
            "{} {} {} ({})",
            "✓".green(),
            verb,
            ticket.id,
            colored_status(ticket.status)
        );
    }
    Ok(())
}

pub fn init(prefix: &str) -> Result<()> {
    let repo = JsonlRepository::init(&std::env::current_dir()?, prefix)?;
    println!(
        "{} Initialized helpdesk in {}",
        "✓".green(),
        repo.helpdesk_dir().display()
    );
    println!("  Ticket prefix: {}", prefix);
    Ok(())
}

pub fn create(
    subject: String,
    category: &str,
    priority: Option<String>,
    description: String,
    user: Identity,
    json: bool,
) -> Result<()> {
    let store = open_store()?;
    let priority = priority.map(|p| p.parse::<Priority>()).transpose()?;

    let ticket = store.create_ticket(NewTicket {
        subject,
        description,
        category: category.parse()?,
        priority,
        requester: Requester {
            id: user.id,
            name: user.name,
            email: user.email,
        },
    })?;

    if json {
        println!("{}", serde_json::to_string(&ticket)?);
    } else {
        println!("{} Created ticket: {}", "✓".green(), ticket.id);
        println!("  Subject:  {}", ticket.subject);
        println!("  Category: {}", ticket.category.label());
        println!("  Priority: {}", ticket.priority);
    }

    Ok(())
}

pub fn reply(
    id: &str,
    content: String,
    staff: bool,
    reopen: bool,
    attachments: Vec<String>,
    user: Identity,
    json: bool,
) -> Result<()> {
    let store = open_store()?;
    let author = Author {
        id: user.id,
        name: user.name,
        avatar: user.avatar,
    };
    let message = AppendMessage {
        content,
        is_staff: staff,
        author,
        attachments,
        reopen,
    };

    let appended = match store.append_message(id, message) {
        Ok(m) => m,
        Err(helpdesk_core::Error::ClosedTicket(_)) => {
            bail!("Ticket {} is closed. Pass --reopen to reopen it with this reply.", id)
        }
        Err(e) => return Err(e.into()),
    };
    let ticket = store.get_ticket(id)?;

    if json {
        println!("{}", serde_json::to_string(&appended)?);
    } else {
        println!(
            "{} Added {} to {} ({})",
            "✓".green(),
            appended.id,
            id,
            colored_status(ticket.status)
        );
    }

    Ok(())
}

pub fn close(id: &str, json: bool) -> Result<()> {
    let store = open_store()?;
    let ticket = store.close(id)?;
    print_ticket(&ticket, json, "Closed")
}

pub fn reopen(id: &str, json: bool) -> Result<()> {
    let store = open_store()?;
    let ticket = store.reopen(id)?;
    print_ticket(&ticket, json, "Reopened")
}

pub fn priority(id: &str, priority: &str, json: bool) -> Result<()> {
    let store = open_store()?;
    let ticket = store.set_priority(id, priority.parse()?)?;
    print_ticket(&ticket, json, "Updated priority of")
}

pub fn assign(id: &str, staff_id: String, staff_name: String, json: bool) -> Result<()> {
    let store = open_store()?;
    let ticket = store.assign(
        id,
        Assignee {
            id: staff_id,
            name: staff_name,
        },
    )?;
    print_ticket(&ticket, json, "Assigned")
}

pub fn rename(id: &str, subject: String, json: bool) -> Result<()> {
    let store = open_store()?;
    let ticket = store.set_subject(id, subject)?;
    print_ticket(&ticket, json, "Renamed")
}

pub fn rate(id: &str, rating: u8, json: bool) -> Result<()> {
    let store = open_store()?;
    let ticket = store.rate(id, rating)?;
    print_ticket(&ticket, json, "Rated")
}

pub struct ListArgs {
    pub status: String,
    pub search: String,
    pub requester: Option<String>,
    pub active: bool,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub sort: String,
}

impl ListArgs {
    fn into_filter(self) -> Result<TicketFilter> {
        Ok(TicketFilter {
            status: self.status.parse::<StatusFilter>()?,
            search_text: self.search,
            requester_id: self.requester,
            exclude_status: self.active.then_some(Status::Closed),
            category: self.category.map(|c| c.parse::<Category>()).transpose()?,
            priority: self.priority.map(|p| p.parse::<Priority>()).transpose()?,
            assignee_id: self.assignee,
            sort: self.sort.parse::<SortOrder>()?,
        })
    }
}

pub fn list(args: ListArgs, json: bool) -> Result<()> {
    let store = Arc::new(open_store()?);
    let max_subject = store.config().display.max_subject_length;
    let engine = QueryEngine::new(store);
    let tickets = engine.list(&args.into_filter()?);

    if json {
        println!("{}", serde_json::to_string(&tickets)?);
    } else if tickets.is_empty() {
        println!("No tickets found");
    } else {
        for ticket in &tickets {
            println!(
                "{} [{}] [{}] {} - {} ({} msg)",
                ticket.id.cyan(),
                ticket.priority,
                ticket.category.to_string().blue(),
                colored_status(ticket.status),
                truncate(&ticket.subject, max_subject),
                ticket.messages.len()
            );
        }
    }

    Ok(())
}

pub fn show(id: &str, json: bool) -> Result<()> {
    let store = open_store()?;
    let ticket = store.get_ticket(id)?;
    let date_format = store.config().display.date_format.clone();

    if json {
        println!("{}", serde_json::to_string_pretty(&ticket)?);
        return Ok(());
    }

    println!("{} {}", ticket.id.cyan().bold(), ticket.subject.bold());
    println!();
    println!("Status:    {}", colored_status(ticket.status));
    println!("Priority:  {}", ticket.priority);
    println!("Category:  {}", ticket.category.label());
    println!("Requester: {} <{}>", ticket.user.name, ticket.user.email);
    if let Some(ref assignee) = ticket.assigned_to {
        println!("Assigned:  {}", assignee.name);
    }
    println!("Created:   {}", ticket.created_at.format(&date_format));
    println!("Updated:   {}", ticket.updated_at.format(&date_format));
    if let Some(ref resolver) = ticket.resolved_by {
        println!("Resolved:  {}", resolver.name);
    }
    if let Some(rating) = ticket.rating {
        println!("Rating:    {}/5", rating);
    }

    println!();
    println!("{}", "Conversation:".bold());
    for message in &ticket.messages {
        let who = if message.is_staff {
            format!("{} (staff)", message.author.name).green()
        } else {
            message.author.name.normal()
        };
        println!(
            "  {} {} {}",
            message.id.dimmed(),
            who,
            message.created_at.format(&date_format)
        );
        for line in message.content.lines() {
            println!("    {}", line);
        }
        for attachment in &message.attachments {
            println!("    {} {}", "📎".dimmed(), attachment);
        }
    }

    Ok(())
}

pub fn stats(json: bool) -> Result<()> {
    let engine = QueryEngine::new(Arc::new(open_store()?));
    let stats = engine.stats(Utc::now());

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "Ticket statistics".bold());
    println!("  Total:          {}", stats.total);
    println!("  Open:           {}", stats.open);
    println!("  Answered:       {}", stats.answered);
    println!("  Waiting:        {}", stats.waiting);
    println!("  Closed:         {}", stats.closed);
    println!("  Created today:  {}", stats.created_today);
    println!("  Resolved today: {}", stats.resolved_today);
    match stats.avg_response_secs {
        Some(secs) => println!("  Avg response:   {}", format_duration(secs)),
        None => println!("  Avg response:   -"),
    }
    match stats.satisfaction_rate {
        Some(rate) => println!("  Satisfaction:   {:.0}% ({} rated)", rate, stats.rated),
        None => println!("  Satisfaction:   -"),
    }

    Ok(())
}

fn format_duration(secs: i64) -> String {
    let minutes = secs / 60;
    if minutes < 60 {
        format!("{}m", minutes)
    } else {
        format!("{:.1}h", minutes as f64 / 60.0)
    }
}

pub fn staff(json: bool) -> Result<()> {
    let engine = QueryEngine::new(Arc::new(open_store()?));
    let perf = engine.staff_performance();

    if json {
        println!("{}", serde_json::to_string(&perf)?);
    } else if perf.is_empty() {
        println!("No assigned tickets");
    } else {
        for p in perf {
            let rating = p
                .avg_rating
                .map(|r| format!("{:.1}", r))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{} {} - {} resolved / {} assigned, rating {}",
                p.staff_id.cyan(),
                p.name,
                p.resolved,
                p.assigned,
                rating
            );
        }
    }

    Ok(())
}

/// Show current configuration
pub fn config_show(json: bool) -> Result<()> {
    let config = Config::load(&config_path()?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!("{}", "Current configuration:".bold());
        println!();
        println!("id_prefix = \"{}\"", config.id_prefix);
        println!("id_width = {}", config.id_width);
        println!("default_priority = \"{}\"", config.default_priority);
        println!("satisfaction_threshold = {}", config.satisfaction_threshold);
        println!();
        println!("[display]");
        println!("colors = {}", config.display.colors);
        println!("date_format = \"{}\"", config.display.date_format);
        println!("max_subject_length = {}", config.display.max_subject_length);
    }

    Ok(())
}

/// Reset configuration to defaults, keeping the ID prefix
pub fn config_reset() -> Result<()> {
    let path = config_path()?;
    let prefix = Config::load(&path)?.id_prefix;
    std::fs::write(&path, Config::default_with_comments(&prefix))?;
    println!("{} Configuration reset to defaults", "✓".green());
    Ok(())
}

/// Get a specific config value
pub fn config_get(key: &str, json: bool) -> Result<()> {
    let config = Config::load(&config_path()?)?;
    let config_json = serde_json::to_value(&config)?;

    let mut value = &config_json;
    for part in key.split('.') {
        value = value
            .get(part)
            .ok_or_else(|| anyhow::anyhow!("Unknown config key: {}", key))?;
    }

    if json {
        println!("{}", serde_json::to_string(value)?);
    } else {
        match value {
            serde_json::Value::String(s) => println!("{}", s),
            other => println!("{}", other),
        }
    }

    Ok(())
}

/// Set a config value
pub fn config_set(key: &str, value: &str) -> Result<()> {
    let path = config_path()?;
    let mut config = Config::load(&path)?;

    match key {
        "id_prefix" => config.id_prefix = value.to_string(),
        "id_width" => {
            config.id_width = value
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid width: {}", value))?
        }
        "default_priority" => config.default_priority = value.parse()?,
        "satisfaction_threshold" => {
            config.satisfaction_threshold = value
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid threshold: {}", value))?
        }
        "display.colors" => {
            config.display.colors = value
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid boolean: {}", value))?
        }
        "display.date_format" => config.display.date_format = value.to_string(),
        "display.max_subject_length" => {
            config.display.max_subject_length = value
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid length: {}", value))?
        }
        _ => bail!("Unknown config key: {}", key),
    }

    config.save(&path)?;
    println!("{} Set {} = {}", "✓".green(), key, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Server keeps crashing", 10), "Server ke…");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(42 * 60), "42m");
        assert_eq!(format_duration(90 * 60), "1.5h");
    }

    #[test]
    fn test_list_args_into_filter() {
        let args = ListArgs {
            status: "waiting".to_string(),
            search: "ftp".to_string(),
            requester: Some("1".to_string()),
            active: true,
            category: Some("game-server".to_string()),
            priority: None,
            assignee: None,
            sort: "priority".to_string(),
        };
        let filter = args.into_filter().unwrap();
        assert_eq!(filter.status, StatusFilter::Only(Status::Waiting));
        assert_eq!(filter.exclude_status, Some(Status::Closed));
        assert_eq!(filter.category, Some(Category::GameServer));
        assert_eq!(filter.sort, SortOrder::Priority);
    }

    #[test]
    fn test_list_args_reject_unknown_status() {
        let args = ListArgs {
            status: "pending".to_string(),
            search: String::new(),
            requester: None,
            active: false,
            category: None,
            priority: None,
            assignee: None,
            sort: "updated".to_string(),
        };
        assert!(args.into_filter().is_err());
    }
}
