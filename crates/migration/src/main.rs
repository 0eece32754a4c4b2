//! Applies or reverts the FairShare schema.
//!
//! ```text
//! migration [up [N] | down [N] | fresh | refresh | reset | status]
//! ```
//!
//! The database is taken from `DATABASE_URL`.
use sea_orm::Database;
use sea_orm_migration::prelude::*;

use migration::Migrator;

const DEFAULT_DATABASE_URL: &str = "sqlite:./fairshare.db?mode=rwc";

fn usage() -> ! {
    eprintln!("Usage: migration [up [N] | down [N] | fresh | refresh | reset | status]");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut args = std::env::args().skip(1);
    let cmd = args.next().unwrap_or_else(|| "up".to_string());
    let steps = match args.next() {
        Some(raw) => match raw.parse::<u32>() {
            Ok(steps) => Some(steps),
            Err(_) => usage(),
        },
        None => None,
    };

    let db_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let db = Database::connect(&db_url).await?;

    match cmd.as_str() {
        "up" => Migrator::up(&db, steps).await?,
        "down" => Migrator::down(&db, Some(steps.unwrap_or(1))).await?,
        "fresh" => Migrator::fresh(&db).await?,
        "refresh" => Migrator::refresh(&db).await?,
        "reset" => Migrator::reset(&db).await?,
        "status" => Migrator::status(&db).await?,
        _ => usage(),
    }

    Ok(())
}
