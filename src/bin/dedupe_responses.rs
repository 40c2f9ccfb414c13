//! Flags survey responses re-submitted by the same customer within minutes.
//!
//! `DAYS` (default 7) sets how far back to scan; `APPLY=true` writes the
//! flags, otherwise the run only reports what it would flag.

use happymeter::database::Database;
use happymeter::dedupe;

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let database_url = std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set in environment")?;
    let days: u32 = match std::env::var("DAYS") {
        Ok(value) => value.trim().parse()?,
        Err(_) => 7,
    };
    let apply = std::env::var("APPLY").map(|value| parse_bool(&value)).unwrap_or(false);

    let db = Database::connect(&database_url).await?;
    let report = dedupe::run(&db, days, apply).await?;

    log::info!(
        "Scanned {} responses from the last {} days, {} duplicates{}",
        report.scanned,
        days,
        report.duplicates.len(),
        if report.applied { " flagged" } else { " found (dry run, set APPLY=true to flag)" }
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_flag_accepts_common_truthy_values() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" YES "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }
}
