use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use lisa_rust::auth::{AutoLoginOutcome, Navigator, Notification, Notifier, Variant};
use lisa_rust::config::ClientOptions;
use lisa_rust::error::Error;
use lisa_rust::licenses::{format_rupiah, ListQuery, SortField, SortOrder};
use lisa_rust::notifications::{SaveOutcome, Schedule};
use lisa_rust::Lisa;

/// Cookie file used when neither --cookie-file nor LISA_COOKIE_FILE is set
const DEFAULT_COOKIE_FILE: &str = ".lisa-session.json";

#[derive(Parser, Debug)]
#[clap(name = "lisa", version)]
#[clap(about = "Command line client for the LISA license monitoring backend", long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Backend base URL. Defaults to LISA_BASE_URL or the LISA_ISDEV choice.
    #[clap(long)]
    base_url: Option<String>,

    /// File holding the session cookies between runs
    #[clap(long)]
    cookie_file: Option<PathBuf>,

    /// Print JSON instead of tables
    #[clap(long)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with a username and password
    Login {
        #[clap(long, env = "LISA_USERNAME")]
        username: String,
        #[clap(long, env = "LISA_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Delete the stored session
    Logout,
    /// Show whether a session is active
    Status,
    /// Run the start-up checks for a launch URL, signing in with its UUID
    Launch { url: String },
    /// List licenses
    Licenses {
        /// Filter by name
        #[clap(long)]
        search: Option<String>,
        #[clap(long, default_value = "1")]
        page: u32,
        #[clap(long, default_value = "10")]
        per_page: u32,
        /// Sort column (name, start_date, end_date, volume, price, total, status)
        #[clap(long)]
        sort: Option<String>,
        /// Sort descending
        #[clap(long)]
        desc: bool,
    },
    /// List email recipients of the expiry report
    Recipients,
    /// Show the report schedule, or replace it
    Schedule {
        /// New schedule as a cron expression, e.g. "0 9,15 * * 1-5"
        #[clap(long)]
        set: Option<String>,
    },
}

struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, n: Notification) {
        let marker = match n.variant {
            Variant::Destructive => "error",
            Variant::Warning => "warning",
            Variant::Success | Variant::Default => "ok",
        };
        eprintln!("[{}] {}: {}", marker, n.title, n.description);
    }
}

struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn navigate(&self, url: &str) {
        eprintln!("Continue at {}", url);
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Error> {
    let mut options = ClientOptions::from_env()?;
    if let Some(base_url) = &cli.base_url {
        options = options.with_base_url(base_url);
    }
    if let Some(path) = cli.cookie_file.clone().or_else(|| options.cookie_file.clone()) {
        options = options.with_cookie_file(path);
    } else {
        options = options.with_cookie_file(DEFAULT_COOKIE_FILE);
    }

    let lisa = Lisa::builder(options)
        .notifier(Arc::new(ConsoleNotifier))
        .navigator(Arc::new(ConsoleNavigator))
        .build()?;

    match cli.command {
        Command::Login { username, password } => {
            let response = lisa.auth().sign_in(&username, &password).await?;
            println!("Signed in as {} ({})", response.name, response.group);
        }
        Command::Logout => {
            lisa.auth().logout();
            println!("Signed out");
        }
        Command::Status => {
            let session = lisa.auth().session();
            let now = lisa.auth().jar().now_millis();
            if lisa.auth().is_authenticated() {
                let remaining = session.remaining_millis(now) / 1000;
                println!(
                    "Signed in as {} ({}), expires in {}m {}s",
                    session.name.as_deref().unwrap_or("unknown"),
                    session.group.as_deref().unwrap_or("-"),
                    remaining / 60,
                    remaining % 60
                );
            } else {
                println!("Not signed in");
            }
        }
        Command::Launch { url } => match lisa.launch(&url).await? {
            AutoLoginOutcome::Authenticated => println!("Signed in"),
            AutoLoginOutcome::Redirect { url } => println!("Redirected to {}", url),
            AutoLoginOutcome::Failed { message } => {
                return Err(Error::general(format!("Automatic login failed: {}", message)))
            }
            AutoLoginOutcome::Skipped => {
                if lisa.auth().is_authenticated() {
                    println!("Already signed in");
                } else {
                    println!("No automatic login attempted");
                }
            }
        },
        Command::Licenses {
            search,
            page,
            per_page,
            sort,
            desc,
        } => {
            let mut query = ListQuery::new()
                .page(page)
                .paginate(per_page)
                .name(search.as_deref().unwrap_or_default());
            if let Some(field) = sort {
                let order = if desc { SortOrder::Desc } else { SortOrder::Asc };
                query = query.sort(field.parse::<SortField>()?, order);
            }

            let result = lisa.licenses().list(&query).await?;
            if cli.json {
                print_json(&result)?;
            } else {
                for license in &result.docs {
                    println!(
                        "{:<14} {:<32} {:<12} {:>18}",
                        license.status().label(),
                        license.name,
                        license.end_date.get(..10).unwrap_or(&license.end_date),
                        format_rupiah(license.jumlah)
                    );
                }
                println!("Page {} of {} ({} licenses)", query.page, result.pages, result.total);
            }
        }
        Command::Recipients => {
            let recipients = lisa.recipients().list().await?;
            if cli.json {
                print_json(&recipients)?;
            } else if recipients.is_empty() {
                println!("No email recipients registered");
            } else {
                for r in &recipients {
                    println!("{:<4} {:<24} {}", r.email_type.as_str(), r.name, r.email);
                }
            }
        }
        Command::Schedule { set: Some(cron) } => {
            let schedule = Schedule::parse(&cron)?;
            let outcome = lisa.schedules().save(&schedule).await?;
            let verb = match outcome {
                SaveOutcome::Created => "Created",
                SaveOutcome::Updated => "Updated",
            };
            println!("{} schedule: {} ({})", verb, schedule, schedule.to_cron());
        }
        Command::Schedule { set: None } => {
            let (job, schedule) = lisa.schedules().current().await?;
            match job {
                Some(job) => println!("{} ({})", schedule, job.time_schedule),
                None => println!("No schedule saved, default is {}", schedule),
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_unauthorized() => {
            eprintln!("Session expired or rejected, run `lisa login` again");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
