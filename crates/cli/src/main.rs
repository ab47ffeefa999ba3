//! Mediplus CLI - prescription management from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (the password may also come from MEDIPLUS_PASSWORD)
//! mediplus auth login -e doctor@example.com -p secret
//!
//! # Upload a prescription, overriding a low-stock warning
//! mediplus doctor upload --file rx.pdf --patient-name Asha --patient-id 123 --force
//!
//! # Send a prescription to the pharmacy and watch the estimated wait
//! mediplus patient buy 8d0c... --wait
//!
//! # Watch the pharmacist queue
//! mediplus pharmacist queue --status pending --watch
//! ```
//!
//! # Environment Variables
//!
//! - `MEDIPLUS_API_URL` - Backend base URL
//! - `MEDIPLUS_SESSION_FILE` - Where the session is persisted
//! - `MEDIPLUS_POLL_INTERVAL_SECS` - Queue refresh interval
//! - `MEDIPLUS_LOG_FORMAT` - `json` for structured logs
//! - `RUST_LOG` - Log filter

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use mediplus_client::session::FileSessionStore;
use mediplus_client::{ApiClient, ClientConfig, LogFormat, SessionContext};
use mediplus_core::{InventoryItemId, Role, UserId};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::pharmacist::QueueOptions;
use mediplus_client::desk::StatusFilter;

#[derive(Parser)]
#[command(name = "mediplus")]
#[command(author, version, about = "Mediplus prescription management")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in, sign up, sign out
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// Show where a path leads for the signed-in user
    Route {
        /// View path, e.g. `/admin`
        path: String,
    },
    /// Doctor workspace
    Doctor {
        #[command(subcommand)]
        action: DoctorAction,
    },
    /// Patient workspace
    Patient {
        #[command(subcommand)]
        action: PatientAction,
    },
    /// Pharmacist workspace
    Pharmacist {
        #[command(subcommand)]
        action: PharmacistAction,
    },
    /// Admin workspace
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AuthAction {
    /// Sign in and persist the session
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "MEDIPLUS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Signup {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "MEDIPLUS_PASSWORD", hide_env_values = true)]
        password: String,

        /// `doctor`, `patient`, `pharmacist` or `admin`
        #[arg(short, long, default_value = "patient")]
        role: Role,

        #[arg(long)]
        hospital: Option<String>,
    },
    /// Sign out and forget the session
    Logout,
    /// Show the signed-in user
    Whoami,
}

#[derive(Subcommand)]
enum DoctorAction {
    /// Search prescriptions by patient
    Search {
        #[arg(short, long)]
        name: Option<String>,

        #[arg(short = 'u', long)]
        user_id: Option<UserId>,
    },
    /// Upload a prescription PDF
    Upload {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(long)]
        patient_name: String,

        #[arg(long)]
        patient_id: UserId,

        #[arg(short, long, default_value = "")]
        remarks: String,

        /// Upload even if some medicines are low on stock
        #[arg(long)]
        force: bool,
    },
    /// Download a prescription PDF
    View {
        id: String,

        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum PatientAction {
    /// List your prescriptions
    List,
    /// Send a prescription to the pharmacy
    Buy {
        id: String,

        /// Count down the estimated wait
        #[arg(short, long)]
        wait: bool,
    },
    /// Download a prescription PDF
    Download {
        id: String,

        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Ask the assistant a question
    Ask { prompt: String },
    /// Suggested questions for your next visit
    Suggest,
}

#[derive(Subcommand)]
enum PharmacistAction {
    /// Show the work queue
    Queue {
        /// `all`, `pending`, `preparing` or `picked_up`
        #[arg(short, long, default_value = "all")]
        status: StatusFilter,

        /// Keep refreshing until interrupted
        #[arg(short, long)]
        watch: bool,
    },
    /// Mark a prescription as preparing
    Prepare { id: String },
    /// Confirm pickup with the patient's OTP
    Pickup {
        id: String,

        #[arg(long)]
        otp: String,
    },
    /// All pharmacy orders
    Orders,
    /// Orders awaiting pickup
    Pending,
}

#[derive(Subcommand)]
enum AdminAction {
    /// Manage inventory
    Inventory {
        #[command(subcommand)]
        action: InventoryAction,
    },
    /// Queue statistics over a window (default: today so far)
    Stats {
        /// e.g. `2026-03-01T00:00:00`
        #[arg(long)]
        start: Option<NaiveDateTime>,

        #[arg(long)]
        end: Option<NaiveDateTime>,
    },
    /// Out-of-stock, expired and high-volume alerts
    Alerts,
    /// Inventory usage, prescriptions per doctor, peak days
    Analytics,
}

#[derive(Subcommand)]
enum InventoryAction {
    /// List stock
    List {
        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        unit: Option<String>,
    },
    /// Add a medicine
    Add {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        quantity: i32,

        #[arg(short, long, default_value = "units")]
        unit: String,

        #[arg(short, long, default_value_t = 10)]
        threshold: i32,
    },
    /// Set the stocked quantity
    Update {
        id: InventoryItemId,

        #[arg(short, long)]
        quantity: i32,
    },
    /// Remove a medicine
    Delete { id: InventoryItemId },
    /// Bulk import `medicine_name,quantity,unit` rows
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mediplus_cli=info,mediplus_client=info".into());

    let json = format == LogFormat::Json;
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer =
        (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::from_env()?;
    init_tracing(config.log_format);

    let api = ApiClient::new(&config)?;
    let session = SessionContext::new(api, FileSessionStore::new(&config.session_file));
    session.restore().await?;

    match cli.command {
        Commands::Auth { action } => match action {
            AuthAction::Login { email, password } => {
                commands::auth::login(&session, &email, password).await?;
            }
            AuthAction::Signup {
                name,
                email,
                password,
                role,
                hospital,
            } => {
                commands::auth::signup(&session, &name, &email, password, role, hospital.as_deref())
                    .await?;
            }
            AuthAction::Logout => commands::auth::logout(&session).await?,
            AuthAction::Whoami => commands::auth::whoami(&session).await?,
        },
        Commands::Route { path } => commands::auth::route(&session, &path).await,
        Commands::Doctor { action } => match action {
            DoctorAction::Search { name, user_id } => {
                commands::doctor::search(&session, name.as_deref(), user_id).await?;
            }
            DoctorAction::Upload {
                file,
                patient_name,
                patient_id,
                remarks,
                force,
            } => {
                commands::doctor::upload(&session, &file, patient_name, patient_id, remarks, force)
                    .await?;
            }
            DoctorAction::View { id, out } => {
                commands::doctor::view(&session, id, out).await?;
            }
        },
        Commands::Patient { action } => match action {
            PatientAction::List => commands::patient::list(&session).await?,
            PatientAction::Buy { id, wait } => commands::patient::buy(&session, id, wait).await?,
            PatientAction::Download { id, out } => {
                commands::patient::download(&session, id, out).await?;
            }
            PatientAction::Ask { prompt } => commands::patient::ask(&session, &prompt).await?,
            PatientAction::Suggest => commands::patient::suggest(&session).await?,
        },
        Commands::Pharmacist { action } => match action {
            PharmacistAction::Queue { status, watch } => {
                let options = QueueOptions {
                    filter: status,
                    watch,
                    interval: config.poll_interval,
                };
                commands::pharmacist::queue(&session, options).await?;
            }
            PharmacistAction::Prepare { id } => {
                commands::pharmacist::prepare(&session, id).await?;
            }
            PharmacistAction::Pickup { id, otp } => {
                commands::pharmacist::pickup(&session, id, &otp).await?;
            }
            PharmacistAction::Orders => commands::pharmacist::orders(&session).await?,
            PharmacistAction::Pending => commands::pharmacist::pending(&session).await?,
        },
        Commands::Admin { action } => match action {
            AdminAction::Inventory { action } => match action {
                InventoryAction::List { name, unit } => {
                    commands::admin::inventory(&session, name, unit).await?;
                }
                InventoryAction::Add {
                    name,
                    quantity,
                    unit,
                    threshold,
                } => {
                    commands::admin::add(&session, name, quantity, unit, threshold).await?;
                }
                InventoryAction::Update { id, quantity } => {
                    commands::admin::update(&session, id, quantity).await?;
                }
                InventoryAction::Delete { id } => commands::admin::delete(&session, id).await?,
                InventoryAction::Import { file } => {
                    commands::admin::import(&session, &file).await?;
                }
            },
            AdminAction::Stats { start, end } => {
                commands::admin::stats(&session, start, end).await?;
            }
            AdminAction::Alerts => commands::admin::alerts(&session).await?,
            AdminAction::Analytics => commands::admin::analytics(&session).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_queue_filter() {
        let cli = Cli::try_parse_from([
            "mediplus",
            "pharmacist",
            "queue",
            "--status",
            "preparing",
            "--watch",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Pharmacist {
                action: PharmacistAction::Queue { watch: true, .. }
            })
        ));
    }

    #[test]
    fn test_rejects_unknown_role() {
        let cli = Cli::try_parse_from([
            "mediplus", "auth", "signup", "-n", "A", "-e", "a@b.c", "-p", "x", "-r", "nurse",
        ]);
        assert!(cli.is_err());
    }
}
