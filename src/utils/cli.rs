//! Running the CLI

// Allow exits because in this file we ideally handle all errors with known exit codes
#![allow(clippy::exit)]
// Results are the CLI's output
#![allow(clippy::print_stdout)]

use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::server::api::repos::response::{reserved_handle, BatchReport};
use crate::server::api::state::Production;
use crate::server::app::serve;
use crate::submissions::store::SubmissionStore as _;
use crate::submissions::TaskNumber;
use anyhow::Context as _;
use clap::Parser;
use serde::Serialize;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{
    fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter, Layer as _,
};

/// Prefix of the rolling log file.
const LOG_FILE_PREFIX: &str = "gradesync";

/// Gradesync tracks student assignment repositories and the grading issues
/// filed on them.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value_t = String::from(DEFAULT_CONFIG_PATH))]
    config: String,
    /// Gradesync cli subcommands
    #[command(subcommand)]
    subcommands: Subcommands,
}

///
#[derive(Clone, clap::Subcommand)]
enum Subcommands {
    /// Clone or update the repositories of the given students for a task
    Sync {
        /// Task number.
        #[arg(short, long)]
        task: TaskNumber,
        /// Maximum number of repositories processed at once.
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Student handles.
        #[arg(required = true)]
        students: Vec<String>,
    },
    /// Refresh the grading issues of the given students for a task
    Refresh {
        /// Task number.
        #[arg(short, long)]
        task: TaskNumber,
        /// Maximum number of repositories processed at once.
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Student handles.
        #[arg(required = true)]
        students: Vec<String>,
    },
    /// Open an issue on a student's task repository
    Issue {
        /// Task number.
        #[arg(short, long)]
        task: TaskNumber,
        /// Student handle, also the assignee.
        #[arg(short, long)]
        user: String,
        /// Issue title, e.g. `Komplettera`.
        #[arg(long)]
        title: String,
        /// Issue body.
        #[arg(long, default_value_t = String::new())]
        body: String,
    },
    /// Print every stored record of a student
    Show {
        /// Student handle.
        student: String,
    },
    /// Serve the HTTP API
    Serve {
        /// Port on which to serve the API.
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
}

/// Install the console subscriber and, when `log_dir` is usable, a debug-level
/// rolling file layer.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer().with_filter(console_filter);
    let appender = log_dir.map(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix("log")
            .build(dir)
    });
    match appender {
        Some(Ok(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(LevelFilter::DEBUG);
            tracing_subscriber::registry().with(console).with(file).init();
            Some(guard)
        }
        Some(Err(err)) => {
            tracing_subscriber::registry().with(console).init();
            tracing::warn!("Logging to console only, could not open log directory: {err}");
            None
        }
        None => {
            tracing_subscriber::registry().with(console).init();
            None
        }
    }
}

/// Print `value` as pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => tracing::error!("Could not serialize output: {err}"),
    }
}

/// Read the configuration file, falling back to defaults when it is absent.
fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load(path)
        .with_context(|| format!("could not load configuration from {}", path.display()))
}

/// Exit if a handle would be shadowed by a key of the batch report.
fn ensure_unreserved(students: &[String]) {
    if let Some(user) = reserved_handle(students) {
        tracing::error!("error: user handle '{user}' clashes with a report key");
        std::process::exit(1);
    }
}

/// Build the engines or exit.
fn engines(config: &Config) -> Production {
    Production::from_config(config)
        .context("could not initialize engines")
        .unwrap_or_else(|err| {
            tracing::error!("error: {err:#}");
            std::process::exit(1);
        })
}

/// Main entrypoint to application
///
/// # Errors
/// Errors if the HTTP server fails to bind or run.
pub fn run() -> std::io::Result<()> {
    let cli = Cli::parse();
    let config = match load_config(Path::new(&cli.config)) {
        Ok(config) => config,
        Err(err) => {
            let _guard = init_tracing(None);
            tracing::error!("error: {err:#}");
            std::process::exit(1);
        }
    };
    let _guard = init_tracing(Some(&config.log_dir));
    tracing::debug!("Starting application");

    match cli.subcommands {
        Subcommands::Sync {
            task,
            jobs,
            students,
        } => {
            ensure_unreserved(&students);
            let app = engines(&config);
            let results = app.sync.sync_many(&students, task, jobs.unwrap_or(app.jobs));
            print_json(&BatchReport::from_sync(results));
        }
        Subcommands::Refresh {
            task,
            jobs,
            students,
        } => {
            ensure_unreserved(&students);
            let app = engines(&config);
            let results = app
                .grading
                .refresh_many(&students, task, jobs.unwrap_or(app.jobs));
            print_json(&BatchReport::from_refresh(results));
        }
        Subcommands::Issue {
            task,
            user,
            title,
            body,
        } => {
            let app = engines(&config);
            print_json(&app.grading.create_issue(&user, task, &title, &body));
        }
        Subcommands::Show { student } => {
            let app = engines(&config);
            print_json(&app.store().student(&student).unwrap_or_else(|err| {
                tracing::error!("error: {err}");
                std::process::exit(1);
            }));
        }
        Subcommands::Serve { port } => serve(&config, port)?,
    }
    Ok(())
}
