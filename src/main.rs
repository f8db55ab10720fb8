use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use sqlbridge::config::{self, SavedConnection, Settings};
use sqlbridge::db::{adapter_for, AdapterError, ConnectionParams, DatabaseAdapter, Engine, QueryResult};
use sqlbridge::export;
use tracing_subscriber::EnvFilter;

/// Inspect and query PostgreSQL and MySQL servers
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Use a saved connection profile by name
    #[arg(long, conflicts_with = "url")]
    profile: Option<String>,

    /// Connection URL, e.g. postgres://user@host:5432/db or mysql://user@host/db
    #[arg(long)]
    url: Option<String>,

    /// Switch to this database after connecting
    #[arg(long)]
    database: Option<String>,

    /// Print query results as JSON instead of tab-separated text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List user databases on the server
    Databases,
    /// List tables in the selected database
    Tables,
    /// Show the columns of a table
    Describe { table: String },
    /// Run one SQL statement
    Query { sql: String },
    /// Save the --url connection as a named profile (without its password)
    Save { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let settings = Settings::load()?;
    let mut params = resolve_params(&cli)?;

    if let Command::Save { name } = &cli.command {
        return save_profile(name, params);
    }

    if params.password.is_empty() {
        let env_var = match params.engine() {
            Engine::Postgres => "PGPASSWORD",
            Engine::MySql => "MYSQL_PWD",
        };
        if let Ok(pw) = std::env::var(env_var) {
            params.password = pw;
        } else {
            let prompt = format!("Password for {}: ", params.display_string());
            params.password = rpassword::read_password_from_tty(Some(&prompt))?;
        }
    }

    let mut adapter = adapter_for(params.engine(), settings.timeouts());
    adapter
        .connect(&params)
        .await
        .with_context(|| format!("connecting to {}", params.display_string()))?;

    let outcome = run(adapter.as_mut(), &cli).await;
    adapter.disconnect().await;

    if let Err(err) = &outcome {
        if let Some(AdapterError::QueryFailed(query_err)) = err.downcast_ref::<AdapterError>() {
            eprintln!("{}", query_err.display_full());
            std::process::exit(1);
        }
    }
    outcome
}

fn resolve_params(cli: &Cli) -> Result<ConnectionParams> {
    if let Some(url) = &cli.url {
        return Ok(ConnectionParams::from_url(url)?);
    }
    let Some(name) = &cli.profile else {
        bail!("either --profile or --url is required");
    };
    let profiles = config::load_profiles()?;
    match config::find_profile(&profiles, name) {
        Some(profile) => Ok(profile.params.clone()),
        None => {
            let known: Vec<&str> = profiles.iter().map(|p| p.name.as_str()).collect();
            Err(anyhow!(
                "no saved connection named {:?} (saved: {})",
                name,
                if known.is_empty() { "none".to_string() } else { known.join(", ") }
            ))
        }
    }
}

fn save_profile(name: &str, params: ConnectionParams) -> Result<()> {
    params.validate()?;
    let mut profiles = config::load_profiles()?;
    config::upsert_profile(
        &mut profiles,
        SavedConnection {
            name: name.to_string(),
            params,
        },
    );
    config::save_profiles(&profiles)?;
    eprintln!("Saved connection {:?} to {}", name, config::profiles_path().display());
    Ok(())
}

async fn run(adapter: &mut dyn DatabaseAdapter, cli: &Cli) -> Result<()> {
    if let Some(db) = &cli.database {
        adapter
            .use_database(db)
            .await
            .with_context(|| format!("switching to database {}", db))?;
    }

    match &cli.command {
        Command::Databases => {
            for name in adapter.get_databases().await? {
                println!("{}", name);
            }
        }
        Command::Tables => {
            for name in adapter.get_tables().await? {
                println!("{}", name);
            }
        }
        Command::Describe { table } => {
            let columns = adapter.get_table_info(table).await?;
            if columns.is_empty() {
                bail!("table {} not found in {}", table, adapter.get_current_database());
            }
            println!("column\ttype\tnullable\tdefault\tkey");
            for col in columns {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    col.name,
                    col.full_type(),
                    if col.is_nullable { "YES" } else { "NO" },
                    col.default_value.as_deref().unwrap_or(""),
                    if col.is_primary_key { "PRI" } else { "" },
                );
            }
        }
        Command::Query { sql } => {
            let executed_at = chrono::Utc::now();
            let result = adapter.execute_statement(sql).await?;
            print_result(&result, cli.json, executed_at);
        }
        Command::Save { .. } => {}
    }
    Ok(())
}

fn print_result(result: &QueryResult, json: bool, executed_at: chrono::DateTime<chrono::Utc>) {
    if json {
        println!("{}", export::to_json(result, executed_at));
        return;
    }
    print!("{}", export::to_tsv(result));
    eprintln!("{} ({:.3}s)", result.message, result.execution_time.as_secs_f64());
}
