mod config;
mod error;

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use policy::{evaluate, Operation, ResourceKind, RuleSet, TrustTier};
use storage::{AuditEntry, DecisionResult, Store};

use config::Config;
use error::{Error, Result};

const CONFIG_FILE: &str = "labelguard.toml";

#[derive(Parser)]
#[command(name = "labelguard")]
#[command(about = "Bell-LaPadula access decisions with a durable audit trail", long_about = None)]
#[command(version)]
struct Cli {
    /// Database path (overrides config and the default data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and seed the default label catalog
    Init,
    /// Assign security labels to a subject
    LabelSubject {
        /// Subject id
        #[arg(long)]
        id: i64,
        /// Security level name (e.g. Secret)
        #[arg(long)]
        level: String,
        /// Category code (e.g. FIN)
        #[arg(long)]
        category: String,
        /// Trust tier: ordinary or administrative
        #[arg(long, default_value = "ordinary")]
        tier: String,
    },
    /// Assign security labels to a resource
    LabelResource {
        /// Resource kind (salary-record, notice)
        #[arg(long)]
        kind: String,
        /// Resource id
        #[arg(long)]
        id: i64,
        /// Security level name
        #[arg(long)]
        level: String,
        /// Category code
        #[arg(long)]
        category: String,
    },
    /// Evaluate an access request and record the decision
    Check {
        /// Subject id
        #[arg(long)]
        subject: i64,
        /// Resource kind (salary-record, notice)
        #[arg(long)]
        kind: String,
        /// Resource id
        #[arg(long)]
        resource: i64,
        /// Requested operation
        #[arg(long, default_value = "read")]
        operation: String,
        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the audit trail
    Log {
        /// Show only the last N entries
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config()?;
    let db_path = db_path(cli.db.as_ref(), &config);

    match cli.command {
        Commands::Init => cmd_init(&db_path),
        Commands::LabelSubject {
            id,
            level,
            category,
            tier,
        } => cmd_label_subject(&db_path, id, &level, &category, &tier),
        Commands::LabelResource {
            kind,
            id,
            level,
            category,
        } => cmd_label_resource(&db_path, &kind, id, &level, &category),
        Commands::Check {
            subject,
            kind,
            resource,
            operation,
            json,
        } => cmd_check(&db_path, &config.rules, subject, &kind, resource, &operation, json),
        Commands::Log { limit } => cmd_log(&db_path, limit),
    }
}

fn cmd_init(db_path: &PathBuf) -> Result<()> {
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let store = Store::open(db_path)?;
    store.seed_defaults()?;
    println!("Catalog seeded at: {}", db_path.display());
    Ok(())
}

fn cmd_label_subject(
    db_path: &PathBuf,
    id: i64,
    level: &str,
    category: &str,
    tier: &str,
) -> Result<()> {
    let tier = match tier {
        "ordinary" => TrustTier::Ordinary,
        "administrative" => TrustTier::Administrative,
        other => return Err(Error::UnknownTier(other.to_string())),
    };

    let store = open_store(db_path)?;
    let level = store.level_by_name(level)?;
    let category = store.category_by_code(category)?;
    store.assign_subject_labels(id, &level, &category, tier)?;
    println!("Subject {id}: {} / {}", level.name, category.code);
    Ok(())
}

fn cmd_label_resource(
    db_path: &PathBuf,
    kind: &str,
    id: i64,
    level: &str,
    category: &str,
) -> Result<()> {
    let kind = ResourceKind::from_str(kind)?;
    let store = open_store(db_path)?;
    let level = store.level_by_name(level)?;
    let category = store.category_by_code(category)?;
    store.assign_resource_labels(kind, id, &level, &category)?;
    println!("Resource {kind}/{id}: {} / {}", level.name, category.code);
    Ok(())
}

fn cmd_check(
    db_path: &PathBuf,
    rules: &RuleSet,
    subject_id: i64,
    kind: &str,
    resource_id: i64,
    operation: &str,
    json: bool,
) -> Result<()> {
    let kind = ResourceKind::from_str(kind)?;
    let operation = Operation::from_str(operation)?;

    let mut store = open_store(db_path)?;
    let subject = store.resolve_subject(subject_id)?;
    let resource = store.resolve_resource(kind, resource_id)?;

    // The catalog minimum is the broadcast floor unless the config set one.
    let rules = rules.clone().or_floor(store.min_weight()?);
    let verdict = evaluate(&rules, &subject, &resource, operation);

    // Record unconditionally. The verdict stands even when the audit write
    // fails; the failure is surfaced, not swallowed.
    let audit_id = match store.record(&subject, &resource, operation, &verdict) {
        Ok(id) => Some(id),
        Err(e) => {
            eprintln!("warning: audit write failed: {e}");
            None
        }
    };

    let result = DecisionResult::new(verdict, audit_id);
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let outcome = if result.allowed { "ALLOW" } else { "DENY" };
        match result.audit_id {
            Some(id) => println!("{outcome} ({}) [audit #{id}]", result.reason),
            None => println!("{outcome} ({}) [unaudited]", result.reason),
        }
    }
    Ok(())
}

fn cmd_log(db_path: &PathBuf, limit: usize) -> Result<()> {
    let store = open_store(db_path)?;
    let entries = store.trail(limit)?;

    if entries.is_empty() {
        println!("No audit entries found.");
        return Ok(());
    }

    println!(
        "{:<6}  {:<16}  {:<8}  {:<18}  {:<4}  {:<4}  {:<6}  RESULT",
        "ID", "TIME", "SUBJECT", "RESOURCE", "SW", "RW", "OP"
    );
    println!("{}", "-".repeat(90));

    for entry in entries {
        print_entry(&entry);
    }

    Ok(())
}

fn print_entry(entry: &AuditEntry) {
    let time = Local
        .from_utc_datetime(&entry.policy.requested_at.naive_utc())
        .format("%Y-%m-%d %H:%M");
    let resource = format!("{}/{}", entry.policy.resource_kind, entry.policy.resource_id);
    let result = match entry.decision.result {
        storage::AccessResult::Allow => entry.decision.result.to_string(),
        storage::AccessResult::Deny => {
            format!("{} ({})", entry.decision.result, entry.decision.reason)
        }
    };
    println!(
        "{:<6}  {:<16}  {:<8}  {:<18}  {:<4}  {:<4}  {:<6}  {result}",
        entry.policy.id,
        time,
        entry.policy.subject_id,
        resource,
        weight(entry.policy.subject_weight),
        weight(entry.policy.resource_weight),
        entry.policy.operation,
    );
}

fn weight(w: Option<i64>) -> String {
    match w {
        Some(w) => w.to_string(),
        None => "-".to_string(),
    }
}

fn open_store(db_path: &PathBuf) -> Result<Store> {
    if !db_path.exists() {
        return Err(Error::DatabaseNotFound {
            path: db_path.clone(),
        });
    }
    Ok(Store::open(db_path)?)
}

fn load_config() -> Result<Config> {
    let config_path = PathBuf::from(CONFIG_FILE);

    if config_path.exists() {
        Ok(Config::load(&config_path)?)
    } else {
        Ok(Config::default_config())
    }
}

fn db_path(flag: Option<&PathBuf>, config: &Config) -> PathBuf {
    flag.cloned()
        .or_else(|| config.database.clone())
        .unwrap_or_else(|| {
            dirs_data_dir()
                .unwrap_or_else(|| ".labelguard".into())
                .join("labelguard.db")
        })
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/labelguard"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("labelguard"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("labelguard"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}
