use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use event_cal_sync::{
    events::{EventRecord, EventStore, NewEvent},
    storage::config::Config,
    sync::{
        EventMapper, FailurePolicy, SyncEngine, SyncReport, WipeOutcome,
        google_api::GoogleCalendarClient, google_auth::GoogleAuthenticator,
    },
};

#[derive(Parser)]
#[command(name = "event-cal-sync")]
#[command(about = "Mirror the event database into a Google Calendar")]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Wipe the calendar and re-insert every event record
    Sync {
        /// Print what would be inserted without calling the API
        #[arg(long)]
        dry_run: bool,

        /// Keep inserting after a failed insert and report failures at the end
        #[arg(long)]
        keep_going: bool,

        /// Calendar to write to (overrides sync.calendar_id)
        #[arg(long)]
        calendar: Option<String>,
    },
    /// Obtain or refresh the cached credential token
    Auth {
        /// Ignore the cached token and run the browser consent flow
        #[arg(long)]
        reauth: bool,
    },
    /// Print the calendar request bodies generated from the database
    Show {
        /// Only this event id
        id: Option<i64>,
    },
    /// Fill an empty database with a few sample events
    SeedDemo,
}

pub fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_or_create_at(path),
        None => Config::load_or_create(),
    }
    .context("Failed to load config")?;

    config.validate().context("Config is invalid")?;
    Ok(config)
}

fn open_store(config: &Config) -> Result<EventStore> {
    let store = EventStore::open(&config.database.path)
        .with_context(|| format!("Failed to open {}", config.database.path.display()))?;
    store.initialize()?;
    Ok(store)
}

fn load_records(config: &Config) -> Result<Vec<EventRecord>> {
    let records = open_store(config)?
        .load_all()
        .context("Failed to read event records")?;
    Ok(records)
}

pub async fn cmd_sync(
    config: &Config,
    dry_run: bool,
    keep_going: bool,
    calendar: Option<String>,
) -> Result<()> {
    let records = load_records(config)?;
    let mapper = EventMapper::from_config(&config.sync);
    let calendar_id = calendar.unwrap_or_else(|| config.sync.calendar_id.clone());
    let policy = if keep_going || config.sync.continue_on_error {
        FailurePolicy::Continue
    } else {
        FailurePolicy::Abort
    };

    if dry_run {
        println!("Dry run: would wipe '{}' and insert {} events", calendar_id, records.len());
        for (id, body) in mapper.plan(&records) {
            println!("- [{}] {} ({} .. {})", id, body.summary, body.start.date_time, body.end.date_time);
        }
        return Ok(());
    }

    let auth = GoogleAuthenticator::from_config(config)
        .context("Failed to set up Google authentication")?;
    let engine = SyncEngine::<GoogleCalendarClient>::connect(&auth, mapper, calendar_id).await?;

    println!("Syncing {} events into '{}'...", records.len(), engine.calendar_id());
    let report = engine.run(&records, policy).await?;
    print_report(&report);

    if !report.is_clean() {
        bail!("{} events could not be inserted", report.failures.len());
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    match report.wiped {
        WipeOutcome::Cleared => println!("Cleared calendar"),
        WipeOutcome::Deleted(n) => println!("Deleted {} existing entries", n),
    }
    println!("Inserted {} events", report.inserted);
    for failure in &report.failures {
        eprintln!("  failed [{}] {}: {}", failure.record_id, failure.name, failure.error);
    }
}

pub async fn cmd_auth(config: &Config, reauth: bool) -> Result<()> {
    let auth = GoogleAuthenticator::from_config(config)
        .context("Failed to set up Google authentication")?;

    let token = if reauth {
        auth.reauthorize().await?
    } else {
        auth.obtain_token().await?
    };

    println!(
        "Authenticated. Token cached at {} (expires {})",
        config.google.token_cache.display(),
        token.expires_at.format("%Y-%m-%d %H:%M UTC")
    );
    Ok(())
}

pub fn cmd_show(config: &Config, id: Option<i64>) -> Result<()> {
    let records = load_records(config)?;
    let mapper = EventMapper::from_config(&config.sync);

    let plan = mapper.plan(
        records
            .iter()
            .filter(|record| id.is_none_or(|wanted| record.id == wanted)),
    );

    if let Some(wanted) = id
        && plan.is_empty()
    {
        bail!("No event with id {}", wanted);
    }

    for (_, body) in plan {
        println!("{}", serde_json::to_string_pretty(&body)?);
    }
    Ok(())
}

pub fn cmd_seed_demo(config: &Config) -> Result<()> {
    let store = open_store(config)?;

    if store.event_count()? > 0 {
        println!("Database already has events; leaving it alone");
        return Ok(());
    }

    let social = store.insert_event_type("Social")?;
    let talk = store.insert_event_type("Tech Talk")?;
    let ada = store.insert_user("Ada", "Lovelace")?;
    let alan = store.insert_user("Alan", "Turing")?;

    let picnic = store.insert_event(&NewEvent {
        name: "Spring Picnic",
        location: "Memorial Glade",
        event_type_id: social,
        description: "Food and frisbee",
        start_time: "2024-04-20 12:00:00",
        end_time: "2024-04-20 15:00:00",
        rsvp_limit: Some(60),
    })?;
    store.insert_rsvp(picnic, ada)?;
    store.insert_rsvp(picnic, alan)?;

    store.insert_event(&NewEvent {
        name: "Compilers in Practice",
        location: "Soda 306",
        event_type_id: talk,
        description: "An industry talk on production compilers",
        start_time: "2024-04-23T18:00:00-07:00",
        end_time: "2024-04-23T19:30:00-07:00",
        rsvp_limit: None,
    })?;

    println!("Seeded demo events into {}", config.database.path.display());
    Ok(())
}
