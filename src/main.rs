use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

mod auth;
mod models;
mod repositories;
mod seed;
mod services;
mod settings;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    /// Run migrations and serve the HTTP API (default).
    Serve,
    /// Apply pending migrations and exit.
    Migrate,
    /// Apply migrations, then insert sample users, catalogs and transactions.
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log4rs)?;

    let settings = settings::Settings::new(&args.config).context("Failed to load settings")?;
    let pool = connect(&settings.mysql).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    log::info!("Database schema is up to date.");

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => services::start_services(pool, settings).await,
        Command::Migrate => Ok(()),
        Command::Seed => seed::run(&pool).await,
    }
}

async fn connect(mysql: &settings::Mysql) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(mysql.max_connections)
        .connect(&mysql.url)
        .await
        .context("Could not connect to database")?;

    log::info!("Connected to MySQL.");
    Ok(pool)
}

fn init_logging(path: &str) -> Result<()> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized from {path}.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {e}");
            Err(anyhow::anyhow!("Could not initialize logging: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let args = Args::parse_from(["revenue-ledger"]);
        assert_eq!(args.config, "config.toml");
        assert_eq!(args.command.unwrap_or(Command::Serve), Command::Serve);
    }

    #[test]
    fn subcommands_and_paths_parse() {
        let args = Args::parse_from(["revenue-ledger", "--config", "prod.toml", "seed"]);
        assert_eq!(args.config, "prod.toml");
        assert_eq!(args.command, Some(Command::Seed));
    }
}
