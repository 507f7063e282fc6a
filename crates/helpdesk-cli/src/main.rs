//! helpdesk - operator console for the support ticket store
//!
//! Works against the JSONL store in .helpdesk/

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "helpdesk")]
#[command(about = "Support ticket lifecycle console")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

/// Identity of whoever is acting
#[derive(Args, Clone)]
pub struct Identity {
    /// Acting user ID
    #[arg(long = "user-id", env = "HELPDESK_USER_ID")]
    pub id: String,

    /// Acting user display name
    #[arg(long = "user-name", env = "HELPDESK_USER_NAME")]
    pub name: String,

    /// Acting user email (used when filing tickets)
    #[arg(long = "user-email", env = "HELPDESK_USER_EMAIL", default_value = "")]
    pub email: String,

    /// Avatar reference shown next to messages
    #[arg(long = "user-avatar", env = "HELPDESK_USER_AVATAR")]
    pub avatar: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new helpdesk store
    Init {
        /// Ticket ID prefix
        #[arg(long, default_value = "TKT")]
        prefix: String,
    },

    /// File a new ticket
    Create {
        /// Ticket subject
        subject: String,

        /// Category (billing, technical, game-server, account, general)
        #[arg(short, long)]
        category: String,

        /// Priority (low, medium, high, urgent)
        #[arg(short, long)]
        priority: Option<String>,

        /// Description, becomes the first message
        #[arg(short, long)]
        description: String,

        #[command(flatten)]
        user: Identity,
    },

    /// Append a message to a ticket
    Reply {
        /// Ticket ID
        id: String,

        /// Message text
        content: String,

        /// Reply as staff
        #[arg(long)]
        staff: bool,

        /// Reopen the ticket if it is closed
        #[arg(long)]
        reopen: bool,

        /// Attachment reference (repeatable)
        #[arg(short, long = "attach")]
        attachments: Vec<String>,

        #[command(flatten)]
        user: Identity,
    },

    /// Close a ticket
    Close {
        /// Ticket ID
        id: String,
    },

    /// Reopen a closed ticket
    Reopen {
        /// Ticket ID
        id: String,
    },

    /// Change a ticket's priority
    Priority {
        /// Ticket ID
        id: String,

        /// New priority (low, medium, high, urgent)
        priority: String,
    },

    /// Assign a ticket to a staff member
    Assign {
        /// Ticket ID
        id: String,

        /// Staff ID
        #[arg(long)]
        staff_id: String,

        /// Staff display name
        #[arg(long)]
        staff_name: String,
    },

    /// Change a ticket's subject
    Rename {
        /// Ticket ID
        id: String,

        /// New subject
        subject: String,
    },

    /// Rate a closed ticket (1-5)
    Rate {
        /// Ticket ID
        id: String,

        rating: u8,
    },

    /// List tickets
    List {
        /// Filter by status (all, open, answered, waiting, closed)
        #[arg(short, long, default_value = "all")]
        status: String,

        /// Search ID and subject
        #[arg(short = 'q', long, default_value = "")]
        search: String,

        /// Only tickets filed by this requester
        #[arg(long)]
        requester: Option<String>,

        /// Hide closed tickets
        #[arg(long)]
        active: bool,

        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,

        /// Filter by priority
        #[arg(short, long)]
        priority: Option<String>,

        /// Only tickets assigned to this staff ID
        #[arg(long)]
        assignee: Option<String>,

        /// Sort order (updated, newest, priority)
        #[arg(long, default_value = "updated")]
        sort: String,
    },

    /// Show a ticket and its conversation
    Show {
        /// Ticket ID
        id: String,
    },

    /// Show dashboard statistics
    Stats,

    /// Show per-staff performance
    Staff,

    /// Show or edit configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Reset to default configuration
    Reset,
    /// Get a specific config value
    Get {
        /// Config key (e.g., "id_prefix", "display.colors")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let json = cli.json;

    match cli.command {
        Commands::Init { prefix } => commands::init(&prefix),
        Commands::Create {
            subject,
            category,
            priority,
            description,
            user,
        } => commands::create(subject, &category, priority, description, user, json),
        Commands::Reply {
            id,
            content,
            staff,
            reopen,
            attachments,
            user,
        } => commands::reply(&id, content, staff, reopen, attachments, user, json),
        Commands::Close { id } => commands::close(&id, json),
        Commands::Reopen { id } => commands::reopen(&id, json),
        Commands::Priority { id, priority } => commands::priority(&id, &priority, json),
        Commands::Assign {
            id,
            staff_id,
            staff_name,
        } => commands::assign(&id, staff_id, staff_name, json),
        Commands::Rename { id, subject } => commands::rename(&id, subject, json),
        Commands::Rate { id, rating } => commands::rate(&id, rating, json),
        Commands::List {
            status,
            search,
            requester,
            active,
            category,
            priority,
            assignee,
            sort,
        } => commands::list(
            commands::ListArgs {
                status,
                search,
                requester,
                active,
                category,
                priority,
                assignee,
                sort,
            },
            json,
        ),
        Commands::Show { id } => commands::show(&id, json),
        Commands::Stats => commands::stats(json),
        Commands::Staff => commands::staff(json),
        Commands::Config { command } => match command {
            Some(ConfigCommands::Show) | None => commands::config_show(json),
            Some(ConfigCommands::Reset) => commands::config_reset(),
            Some(ConfigCommands::Get { key }) => commands::config_get(&key, json),
            Some(ConfigCommands::Set { key, value }) => commands::config_set(&key, &value),
        },
    }
}
