//! cmsheets CLI - Campaign Manager report sync for spreadsheet tabs
//!
//! Each subcommand is one menu action of the add-on, run against the
//! document named in `cmsheets.toml`.

mod config;
mod http;
mod mail;
mod oauth;
mod sheets;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cmsheets_core::{OAuthDelegate, Session, SyncError, SystemClock};
use cmsheets_store::Database;
use cmsheets_sync::{Addon, LinkRequest, OfflineRun, Services, SyncOutcome, SyncReport};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;
use crate::http::HttpReportingApi;
use crate::mail::OutboxMailer;
use crate::oauth::PropertyOAuth;
use crate::sheets::CsvDirSheets;

#[derive(Parser)]
#[command(name = "cmsheets")]
#[command(author, version, about = "Campaign Manager report sync for spreadsheet tabs", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "CMSHEETS_CONFIG", default_value = "cmsheets.toml")]
    config: PathBuf,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull a report into a tab and link the tab to it
    Link {
        /// Tab id
        tab: String,
        #[arg(long)]
        profile: String,
        #[arg(long)]
        report: String,
        /// Report name shown in summaries
        #[arg(long)]
        name: String,
        #[arg(long)]
        network: Option<String>,
    },

    /// Show the report a tab is linked to
    Linked { tab: String },

    /// Remove the linkage of a tab
    Unlink { tab: String },

    /// Remove the linkage of every tab
    UnlinkAll,

    /// Pull fresh data into one tab
    Refresh { tab: String },

    /// Pull fresh data into every linked tab
    RefreshAll,

    /// Show when a tab was last synced
    LastSync { tab: String },

    /// List CSV reports of a profile, newest first
    Reports { profile: String },

    /// Recurring sync schedule
    #[command(subcommand)]
    Schedule(ScheduleCommand),

    /// Run the scheduled sync now (for cron or systemd timers)
    OfflineSync,

    /// Reporting API authorization
    #[command(subcommand)]
    Auth(AuthCommand),

    /// Manage the tabs of the document
    #[command(subcommand)]
    Tabs(TabsCommand),

    /// Delete jobs, linkages, schedule, token and all stored properties
    Purge {
        /// Required to actually purge
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ScheduleCommand {
    /// Replace the schedule
    Set {
        /// hourly, daily or weekly
        frequency: String,
        /// Hour interval (hourly), hour of day (daily) or weekday name (weekly)
        time: String,
        /// Hour of day (weekly only)
        time2: Option<String>,
    },
    /// Remove the schedule
    Disable,
    /// Show the current schedule
    Show,
}

#[derive(Subcommand)]
enum AuthCommand {
    /// Print the authorization URL
    Url,
    /// Store an access token obtained from the authorization flow
    SetToken {
        token: String,
        /// Token lifetime in seconds
        #[arg(long)]
        expires_in: Option<i64>,
    },
    /// Forget the stored token
    Reset,
    /// Show whether a usable token is stored
    Status,
}

#[derive(Subcommand)]
enum TabsCommand {
    /// Register a tab (or rename an existing one)
    Add { id: String, name: String },
    /// List tabs in document order
    List,
}

struct ConfiguredUser(String);

impl Session for ConfiguredUser {
    fn active_user_email(&self) -> String {
        self.0.clone()
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            if let Some(SyncError::AuthRequired { authorization_url }) =
                err.downcast_ref::<SyncError>()
            {
                eprintln!("error: authorization required");
                eprintln!("Authorize at {authorization_url}, then run `cmsheets auth set-token <TOKEN>`");
            } else {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(&cli.config)?;

    let db = Database::open(&config.storage.database).with_context(|| {
        format!("Failed to open database {}", config.storage.database.display())
    })?;
    let props = db.properties(&config.document.id, &config.user.email);
    let jobs = db.jobs(&config.document.id);
    let oauth = PropertyOAuth::new(&props, config.oauth.clone());
    let api = HttpReportingApi::new(&config.api, &oauth)?;
    let sheets = CsvDirSheets::new(&config.document);
    let mailer = OutboxMailer::new(config.mail.outbox.clone(), config.mail.daily_quota);
    let session = ConfiguredUser(config.user.email.clone());
    let clock = SystemClock;

    let addon = Addon::new(Services {
        store: &props,
        api: &api,
        oauth: &oauth,
        scheduler: &jobs,
        sheets: &sheets,
        mailer: &mailer,
        session: &session,
        clock: &clock,
        time_limit: config.time_limit(),
    });

    match cli.command {
        Commands::Link {
            tab,
            profile,
            report,
            name,
            network,
        } => {
            let summary = addon.pull_report(
                &tab,
                &LinkRequest {
                    profile_id: profile,
                    report_id: report,
                    report_name: name,
                    network_id: network,
                },
            )?;
            println!("{summary}");
        }
        Commands::Linked { tab } => print_or(&addon.linked_report(&tab), "Tab is not linked"),
        Commands::Unlink { tab } => {
            addon.unlink_report(&tab)?;
            println!("Tab {tab} unlinked");
        }
        Commands::UnlinkAll => {
            addon.unlink_all()?;
            println!("All tabs unlinked");
        }
        Commands::Refresh { tab } => match addon.refresh_current(&tab)? {
            SyncOutcome::Unlinked => println!("Tab {tab} is not linked to a report"),
            SyncOutcome::Empty => println!("Report had no rows; tab left unchanged"),
            SyncOutcome::Written { rows, columns, .. } => {
                println!("Wrote {rows} rows x {columns} columns");
            }
        },
        Commands::RefreshAll => {
            let report = addon.refresh_all()?;
            return Ok(report_exit(&report));
        }
        Commands::LastSync { tab } => {
            let details = addon.last_sync_details(&tab);
            println!(
                "Report: {}",
                details.report_name.as_deref().unwrap_or("(not linked)")
            );
            println!(
                "Last sync: {}",
                details.last_sync.as_deref().unwrap_or("never")
            );
        }
        Commands::Reports { profile } => {
            let (reports, token) = addon.report_list(&profile)?;
            for report in &reports {
                println!("{}\t{}", report.id, report.name);
            }
            if let Some(token) = token {
                tracing::debug!(token = %token, "more reports available");
            }
        }
        Commands::Schedule(command) => {
            let text = match command {
                ScheduleCommand::Set {
                    frequency,
                    time,
                    time2,
                } => addon.set_schedule(true, &frequency, &time, time2.as_deref())?,
                ScheduleCommand::Disable => addon.set_schedule(false, "", "", None)?,
                ScheduleCommand::Show => addon.current_schedule()?,
            };
            print_or(&text, "No sync schedule");
        }
        Commands::OfflineSync => match addon.offline_sync()? {
            OfflineRun::AuthRequired { mailed } => {
                eprintln!(
                    "Authorization required; sync skipped{}",
                    if mailed { " (owner notified)" } else { "" }
                );
                return Ok(ExitCode::FAILURE);
            }
            OfflineRun::Synced(report) => return Ok(report_exit(&report)),
        },
        Commands::Auth(command) => match command {
            AuthCommand::Url => println!("{}", oauth.authorization_url()),
            AuthCommand::SetToken { token, expires_in } => {
                oauth.store_token(&token, expires_in.map(chrono::Duration::seconds))?;
                println!("Token stored");
            }
            AuthCommand::Reset => {
                oauth.reset()?;
                println!("Token removed");
            }
            AuthCommand::Status => {
                if oauth.has_access() {
                    println!("Authorized");
                } else {
                    println!("Not authorized: {}", oauth.authorization_url());
                    return Ok(ExitCode::FAILURE);
                }
            }
        },
        Commands::Tabs(command) => match command {
            TabsCommand::Add { id, name } => {
                sheets.add_tab(&id, &name)?;
                println!("Tab {id} ({name}) registered");
            }
            TabsCommand::List => {
                for tab in sheets.tabs()? {
                    println!("{}\t{}", tab.id, tab.name);
                }
            }
        },
        Commands::Purge { yes } => {
            if !yes {
                eprintln!("Refusing to purge without --yes");
                return Ok(ExitCode::FAILURE);
            }
            addon.purge()?;
            println!("All cmsheets data removed from document {}", config.document.id);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_or(text: &str, fallback: &str) {
    if text.is_empty() {
        println!("{fallback}");
    } else {
        println!("{text}");
    }
}

fn report_exit(report: &SyncReport) -> ExitCode {
    println!(
        "{} tab(s) written, {} failed",
        report.written(),
        report.failures().count()
    );
    if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
