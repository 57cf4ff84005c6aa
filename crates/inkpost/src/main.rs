//! `inkpost` - send HTML email with inline images.
//!
//! Reads HTML from a file or stdin, runs it through the inkpost pipeline and
//! delivers it over SMTP, now or on a schedule.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod args;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use inkpost_core::{Config, EmailService, Recipient, SendRequest, credentials};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "inkpost", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (default: the user config directory)
    #[arg(long, global = true, env = "INKPOST_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Send an email now
    Send {
        #[command(flatten)]
        message: MessageArgs,
    },
    /// Print the prepared HTML (or plaintext) without sending
    Preview {
        /// Subject, used as the document title
        #[arg(short, long, default_value = "")]
        subject: String,
        /// HTML file, or `-` for stdin
        #[arg(value_name = "HTML")]
        html: PathBuf,
        /// Print the plaintext alternative instead
        #[arg(long)]
        plaintext: bool,
    },
    /// Store an email for later delivery
    Schedule {
        #[command(flatten)]
        message: MessageArgs,
        /// When to send, RFC 3339 (e.g. 2025-01-31T09:00:00Z)
        #[arg(long, value_parser = args::parse_time)]
        at: DateTime<Utc>,
    },
    /// Cancel a pending scheduled email
    Cancel {
        /// Schedule id
        id: i64,
    },
    /// List scheduled emails
    Scheduled {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Send every scheduled email that is due, once
    RunDue,
    /// Show recent deliveries
    History {
        /// Number of entries
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: u32,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the SMTP password in the system keyring
    Password {
        #[command(subcommand)]
        action: PasswordAction,
    },
}

#[derive(clap::Args)]
struct MessageArgs {
    /// Recipient, `a@example.com` or `Name <a@example.com>` (repeatable)
    #[arg(short, long, required = true, value_parser = args::parse_recipient)]
    to: Vec<Recipient>,
    /// Subject line
    #[arg(short, long)]
    subject: String,
    /// HTML file, or `-` for stdin
    #[arg(value_name = "HTML")]
    html: PathBuf,
}

impl MessageArgs {
    fn into_request(self) -> anyhow::Result<SendRequest> {
        Ok(SendRequest {
            to: self.to,
            subject: self.subject,
            html: read_html(&self.html)?,
        })
    }
}

#[derive(Subcommand)]
enum PasswordAction {
    /// Store a password read from stdin
    Set,
    /// Remove the stored password
    Delete,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkpost=info,inkpost_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    if let Command::Password { action } = &cli.command {
        password(&config, action)?;
        return Ok(ExitCode::SUCCESS);
    }

    let service = EmailService::from_config(&config)
        .await
        .context("failed to start email service")?;

    run(&service, cli.command).await
}

async fn run(service: &EmailService, command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::Send { message } => {
            let outcome = service.send(&message.into_request()?).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.is_sent() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Preview {
            subject,
            html,
            plaintext,
        } => {
            let prepared = service.preview(&read_html(&html)?, &subject);
            info!(
                attachments = prepared.attachments.len(),
                placeholders = prepared.placeholders,
                "Preview ready"
            );
            if plaintext {
                println!("{}", prepared.plaintext);
            } else {
                println!("{}", prepared.html);
            }
        }
        Command::Schedule { message, at } => {
            let id = service.schedule(&message.into_request()?, at).await?;
            println!("{id}");
        }
        Command::Cancel { id } => {
            if !service.cancel(id).await? {
                bail!("scheduled email {id} is no longer pending");
            }
        }
        Command::Scheduled { json } => {
            let emails = service.schedules().list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&emails)?);
            } else {
                for email in emails {
                    println!(
                        "{:>5}  {}  {:<10}  {}",
                        email.id,
                        email.scheduled_for.to_rfc3339(),
                        email.status,
                        email.subject
                    );
                }
            }
        }
        Command::RunDue => {
            let report = service.process_due(Utc::now()).await?;
            println!("{}", serde_json::to_string(&report)?);
            if report.failed > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::History { limit, json } => {
            let entries = service.history().list_recent(limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in entries {
                    let record = &entry.record;
                    println!(
                        "{:>5}  {}  {:<6}  {}  {}",
                        entry.id,
                        record.created_at.to_rfc3339(),
                        record.status.as_str(),
                        record.recipients.len(),
                        record.subject
                    );
                }
            }
        }
        // Handled before the service starts.
        Command::Password { .. } => {}
    }

    Ok(ExitCode::SUCCESS)
}

fn password(config: &Config, action: &PasswordAction) -> anyhow::Result<()> {
    let host = &config.smtp.host;
    let Some(user) = config.smtp.username.as_deref() else {
        bail!("smtp.username is not set in the configuration");
    };
    if host.is_empty() {
        bail!("smtp.host is not set in the configuration");
    }

    match action {
        PasswordAction::Set => {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            let secret = line.trim_end_matches(['\r', '\n']);
            if secret.is_empty() {
                bail!("no password given on stdin");
            }
            credentials::store_smtp_password(host, user, secret)?;
            info!(host = %host, user, "Password stored");
        }
        PasswordAction::Delete => {
            credentials::delete_smtp_password(host, user)?;
            info!(host = %host, user, "Password removed");
        }
    }
    Ok(())
}

fn read_html(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut html = String::new();
        std::io::stdin().read_to_string(&mut html)?;
        return Ok(html);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
