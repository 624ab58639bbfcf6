//! CLI module for the msgsched command-line interface.
//!
//! Every subcommand drives one of the screen controllers in [`crate::views`]:
//! - `register` / `login` / `logout` / `whoami` - session
//! - `orgs list|create|select|invite|accept-invite` - organizations
//! - `messages list|create|update|delete|delivered|failed` - scheduled messages
//! - `config check` - validate the configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::messages::Channel;
use crate::api::orgs::Role;
use crate::config::{Config, Overrides};
use crate::views::{
    format_send_at, AuthMode, AuthView, DashboardView, FormStatus, MessagesView, OrgSelector,
    OrgsView,
};
use crate::AppContext;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "msgsched")]
#[command(author, version, about = "Schedule WhatsApp and SMS messages for your organizations", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "msgsched.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// API URL to connect to (default: http://localhost:4000)
    #[arg(long, env = "MSGSCHED_API_URL")]
    pub api_url: Option<String>,

    /// Directory holding the saved session and organizations
    #[arg(long, env = "MSGSCHED_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        /// Password (can also be set via MSGSCHED_PASSWORD env var)
        #[arg(long, env = "MSGSCHED_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Log in and save the session
    Login {
        #[arg(long)]
        email: String,
        /// Password (can also be set via MSGSCHED_PASSWORD env var)
        #[arg(long, env = "MSGSCHED_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the saved session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Organization commands
    #[command(subcommand)]
    Orgs(OrgsCommands),

    /// Scheduled message commands
    #[command(subcommand)]
    Messages(MessagesCommands),

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Orgs subcommands
#[derive(Subcommand, Debug)]
pub enum OrgsCommands {
    /// List your organizations
    List,
    /// Create an organization and select it
    Create {
        name: String,
        /// Shown locally only
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Select the organization messages are scheduled under
    Select { id: String },
    /// Invite someone to an organization
    Invite {
        org_id: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "member")]
        role: Role,
    },
    /// Join an organization with an invite token
    AcceptInvite { token: String },
}

/// Messages subcommands
#[derive(Subcommand, Debug)]
pub enum MessagesCommands {
    /// List scheduled messages for the selected organization
    List,
    /// Schedule a message
    Create {
        /// Recipient phone number
        #[arg(long)]
        to: String,
        #[arg(long)]
        text: String,
        /// Send time, YYYY-MM-DDTHH:MM local or RFC 3339
        #[arg(long)]
        at: String,
        #[arg(long, default_value = "whatsapp")]
        channel: Channel,
    },
    /// Change a scheduled message
    Update {
        id: String,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        at: Option<String>,
        #[arg(long)]
        channel: Option<Channel>,
    },
    /// Cancel a scheduled message
    Delete { id: String },
    /// List delivered messages
    Delivered,
    /// List messages that could not be delivered
    Failed,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            api_url: self.api_url.clone(),
            data_dir: self.data_dir.clone(),
            log_level: self.log_level.clone(),
        }
    }

    /// Load the configuration file and apply command-line values on top
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(&self.config)?;
        config.apply(self.overrides());
        Ok(config)
    }
}

/// Run a CLI command
pub async fn run_command(cli: &Cli, config: Config) -> Result<()> {
    if let Commands::Config(ConfigCommands::Check) = &cli.command {
        return cmd_config_check(cli, &config);
    }

    let ctx = AppContext::initialize(config).context("Failed to open saved client state")?;
    let result = dispatch(cli, &ctx).await;
    ctx.teardown();
    result
}

async fn dispatch(cli: &Cli, ctx: &Arc<AppContext>) -> Result<()> {
    match &cli.command {
        Commands::Register {
            email,
            name,
            password,
        } => cmd_register(ctx, email, name, password).await,
        Commands::Login { email, password } => cmd_login(ctx, email, password).await,
        Commands::Logout => cmd_logout(ctx),
        Commands::Whoami => cmd_whoami(ctx),
        Commands::Orgs(OrgsCommands::List) => cmd_orgs_list(ctx),
        Commands::Orgs(OrgsCommands::Create { name, description }) => {
            cmd_orgs_create(ctx, name, description).await
        }
        Commands::Orgs(OrgsCommands::Select { id }) => cmd_orgs_select(ctx, id),
        Commands::Orgs(OrgsCommands::Invite {
            org_id,
            email,
            role,
        }) => cmd_orgs_invite(ctx, org_id, email, *role).await,
        Commands::Orgs(OrgsCommands::AcceptInvite { token }) => {
            cmd_orgs_accept(ctx, token).await
        }
        Commands::Messages(MessagesCommands::List) => cmd_messages_list(ctx).await,
        Commands::Messages(MessagesCommands::Create {
            to,
            text,
            at,
            channel,
        }) => cmd_messages_create(ctx, to, text, at, *channel).await,
        Commands::Messages(MessagesCommands::Update {
            id,
            to,
            text,
            at,
            channel,
        }) => {
            let changes = MessageChanges {
                to: to.as_deref(),
                text: text.as_deref(),
                at: at.as_deref(),
                channel: *channel,
            };
            cmd_messages_update(ctx, id, changes).await
        }
        Commands::Messages(MessagesCommands::Delete { id }) => {
            cmd_messages_delete(ctx, id).await
        }
        Commands::Messages(MessagesCommands::Delivered) => cmd_history(ctx, false).await,
        Commands::Messages(MessagesCommands::Failed) => cmd_history(ctx, true).await,
        Commands::Config(ConfigCommands::Check) => Ok(()),
    }
}

/// Turn a handler outcome into a command result
fn finish(ok: bool, status: &FormStatus) -> Result<()> {
    if ok {
        if let Some(success) = &status.success {
            println!("{}", success);
        }
        return Ok(());
    }
    match &status.error {
        Some(error) => anyhow::bail!("{}", error),
        None => anyhow::bail!("Request was cancelled"),
    }
}

async fn cmd_register(ctx: &Arc<AppContext>, email: &str, name: &str, password: &str) -> Result<()> {
    let mut view = AuthView::new(ctx.clone());
    view.set_mode(AuthMode::Register);
    view.form.email = email.to_string();
    view.form.name = name.to_string();
    view.form.password = password.to_string();

    let ok = view.submit().await;
    finish(ok, &view.status)?;
    println!("Account created for {}. Run `msgsched login` to sign in.", email);
    Ok(())
}

async fn cmd_login(ctx: &Arc<AppContext>, email: &str, password: &str) -> Result<()> {
    let mut view = AuthView::new(ctx.clone());
    view.set_mode(AuthMode::Login);
    view.form.email = email.to_string();
    view.form.password = password.to_string();

    let ok = view.submit().await;
    finish(ok, &view.status)?;

    OrgSelector::new(ctx.clone())
        .mount()
        .context("Failed to update saved organizations")?;
    if let Some(user) = ctx.session.user() {
        println!("Logged in as {} <{}>", user.name, user.email);
    }
    Ok(())
}

fn cmd_logout(ctx: &Arc<AppContext>) -> Result<()> {
    let mut view = DashboardView::new(ctx.clone());
    if view.access_denied() {
        println!("Not logged in.");
        return Ok(());
    }
    let ok = view.logout();
    finish(ok, &view.status)?;
    println!("Logged out.");
    Ok(())
}

fn cmd_whoami(ctx: &Arc<AppContext>) -> Result<()> {
    let view = DashboardView::new(ctx.clone());
    if view.access_denied() {
        println!("Not logged in.");
        return Ok(());
    }

    println!();
    for (label, value) in view.details() {
        println!("  {:<6} {}", format!("{}:", label), value);
    }
    if !ctx.session.has_credential() {
        println!();
        println!("[!!] No credential saved. Run `msgsched login` to sign in.");
    }
    println!();
    Ok(())
}

fn cmd_orgs_list(ctx: &Arc<AppContext>) -> Result<()> {
    let selector = OrgSelector::new(ctx.clone());
    selector
        .mount()
        .context("Failed to update saved organizations")?;

    let options = selector.options();
    if options.is_empty() {
        println!("No organizations found.");
        return Ok(());
    }

    println!();
    println!("  {:<36}  {:<24}  {}", "ID", "NAME", "DESCRIPTION");
    println!("{}", "-".repeat(90));
    for (org, selected) in options {
        println!(
            "{} {:<36}  {:<24}  {}",
            if selected { "*" } else { " " },
            org.id,
            truncate(&org.name, 24),
            truncate(org.description.as_deref().unwrap_or("-"), 24)
        );
    }
    println!();
    Ok(())
}

async fn cmd_orgs_create(ctx: &Arc<AppContext>, name: &str, description: &str) -> Result<()> {
    let mut view = OrgsView::new(ctx.clone());
    view.create.name = name.to_string();
    view.create.description = description.to_string();

    let ok = view.create_org().await;
    finish(ok, &view.status)?;
    if let Some(org) = ctx.tenants.selected_org() {
        println!("Selected {} ({})", org.name, org.id);
    }
    Ok(())
}

fn cmd_orgs_select(ctx: &Arc<AppContext>, id: &str) -> Result<()> {
    let selector = OrgSelector::new(ctx.clone());
    selector
        .select(id)
        .with_context(|| format!("Failed to select organization {}", id))?;
    if ctx.tenants.selected_org().is_none() {
        println!("[!!] {} is not in your saved organizations.", id);
    }
    println!("Selected: {}", selector.label());
    Ok(())
}

async fn cmd_orgs_invite(ctx: &Arc<AppContext>, org_id: &str, email: &str, role: Role) -> Result<()> {
    let mut view = OrgsView::new(ctx.clone());
    view.invite.org_id = org_id.to_string();
    view.invite.email = email.to_string();
    view.invite.role = role;

    let ok = view.send_invite().await;
    finish(ok, &view.status)?;
    if let Some(token) = &view.invite_token {
        println!("Invite token: {}", token);
    }
    Ok(())
}

async fn cmd_orgs_accept(ctx: &Arc<AppContext>, token: &str) -> Result<()> {
    let mut view = OrgsView::new(ctx.clone());
    view.accept.invite_token = token.to_string();
    let ok = view.accept_invite().await;
    finish(ok, &view.status)
}

/// Mount the selector and bind a messages screen to the resulting tenant
fn messages_view(ctx: &Arc<AppContext>) -> Result<MessagesView> {
    OrgSelector::new(ctx.clone())
        .mount()
        .context("Failed to update saved organizations")?;
    let view = MessagesView::new(ctx.clone());
    if view.access_denied() {
        anyhow::bail!("Not logged in. Run `msgsched login` first.");
    }
    Ok(view)
}

async fn cmd_messages_list(ctx: &Arc<AppContext>) -> Result<()> {
    let mut view = messages_view(ctx)?;
    let ok = view.load().await;
    finish(ok, &view.status)?;

    if view.messages.is_empty() {
        println!("No scheduled messages.");
        return Ok(());
    }

    println!();
    println!(
        "{:<36}  {:<16}  {:<16}  {:<9}  {}",
        "ID", "RECIPIENT", "SEND AT", "CHANNEL", "MESSAGE"
    );
    println!("{}", "-".repeat(110));
    for message in &view.messages {
        println!(
            "{:<36}  {:<16}  {:<16}  {:<9}  {}",
            message.id,
            truncate(&message.recipient, 16),
            format_send_at(message.send_at),
            message.channel,
            truncate(&message.message, 30)
        );
    }
    println!();
    Ok(())
}

async fn cmd_messages_create(
    ctx: &Arc<AppContext>,
    to: &str,
    text: &str,
    at: &str,
    channel: Channel,
) -> Result<()> {
    let mut view = messages_view(ctx)?;
    view.form.recipient = to.to_string();
    view.form.message = text.to_string();
    view.form.send_at = at.to_string();
    view.form.channel = channel;

    let ok = view.submit().await;
    finish(ok, &view.status)?;
    if let Some(message) = view.messages.last() {
        println!(
            "Scheduled {} for {} via {}",
            message.id,
            format_send_at(message.send_at),
            message.channel
        );
    }
    Ok(())
}

struct MessageChanges<'a> {
    to: Option<&'a str>,
    text: Option<&'a str>,
    at: Option<&'a str>,
    channel: Option<Channel>,
}

async fn cmd_messages_update(ctx: &Arc<AppContext>, id: &str, changes: MessageChanges<'_>) -> Result<()> {
    let mut view = messages_view(ctx)?;
    let ok = view.load().await;
    finish(ok, &view.status)?;

    if !view.edit(id) {
        anyhow::bail!("Scheduled message {} not found", id);
    }
    if let Some(to) = changes.to {
        view.form.recipient = to.to_string();
    }
    if let Some(text) = changes.text {
        view.form.message = text.to_string();
    }
    if let Some(at) = changes.at {
        view.form.send_at = at.to_string();
    }
    if let Some(channel) = changes.channel {
        view.form.channel = channel;
    }

    let ok = view.submit().await;
    finish(ok, &view.status)?;
    println!("Updated {}", id);
    Ok(())
}

async fn cmd_messages_delete(ctx: &Arc<AppContext>, id: &str) -> Result<()> {
    let mut view = messages_view(ctx)?;
    let ok = view.delete(id).await;
    finish(ok, &view.status)?;
    println!("Deleted {}", id);
    Ok(())
}

async fn cmd_history(ctx: &Arc<AppContext>, failed: bool) -> Result<()> {
    let mut view = messages_view(ctx)?;
    let ok = view.load_history().await;
    finish(ok, &view.status)?;

    let rows: Vec<(String, String, i64, Channel, String)> = if failed {
        view.failed
            .iter()
            .map(|m| {
                let detail = m.error.clone().unwrap_or_else(|| m.message.clone());
                (m.id.clone(), m.recipient.clone(), m.failed_at, m.channel, detail)
            })
            .collect()
    } else {
        view.delivered
            .iter()
            .map(|m| (m.id.clone(), m.recipient.clone(), m.sent_at, m.channel, m.message.clone()))
            .collect()
    };

    if rows.is_empty() {
        println!(
            "No {} messages.",
            if failed { "failed" } else { "delivered" }
        );
        return Ok(());
    }

    println!();
    println!(
        "{:<36}  {:<16}  {:<16}  {:<9}  {}",
        "ID",
        "RECIPIENT",
        if failed { "FAILED AT" } else { "SENT AT" },
        "CHANNEL",
        if failed { "ERROR" } else { "MESSAGE" }
    );
    println!("{}", "-".repeat(110));
    for (id, recipient, at, channel, detail) in rows {
        println!(
            "{:<36}  {:<16}  {:<16}  {:<9}  {}",
            id,
            truncate(&recipient, 16),
            format_send_at(at),
            channel,
            truncate(&detail, 30)
        );
    }
    println!();
    Ok(())
}

/// Validate configuration file
fn cmd_config_check(cli: &Cli, config: &Config) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!("Defaults (plus any command-line values) are in effect.");
        println!();
    }

    let warnings = config.validate()?;
    println!("[OK] Configuration is valid!");
    println!();
    println!("=== Configuration Summary ===");
    println!();
    println!("API:");
    println!("  Base URL:     {}", config.api.base_url);
    println!("  Timeout:      {}s", config.api.timeout_secs);
    println!();
    println!("Storage:");
    println!("  Data Dir:     {}", config.storage.data_dir.display());
    println!();
    println!("Logging:");
    println!("  Level:        {}", config.logging.level);

    if !warnings.is_empty() {
        println!();
        println!("=== Warnings ===");
        for warning in &warnings {
            println!("[!!] {}", warning);
        }
    }
    println!();
    Ok(())
}

/// Truncate a string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
