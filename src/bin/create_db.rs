use tokio_postgres::{Client, NoTls};

#[derive(Debug, thiserror::Error)]
enum CreateDbError {
    #[error("invalid database name '{0}': only ASCII letters, digits and '_' are allowed")]
    InvalidName(String),

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

/// Only plain identifiers are interpolated into `CREATE DATABASE`.
fn checked_database_name(name: &str) -> Result<&str, CreateDbError> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name)
    } else {
        Err(CreateDbError::InvalidName(name.to_string()))
    }
}

/// Creates `name` unless it already exists. Returns whether it was created.
async fn ensure_database(client: &Client, name: &str) -> Result<bool, CreateDbError> {
    let name = checked_database_name(name)?;

    let existing = client
        .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&name])
        .await?;
    if existing.is_some() {
        return Ok(false);
    }

    client.batch_execute(&format!("CREATE DATABASE \"{name}\"")).await?;
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let conn_str = std::env::var("PG_ADMIN_CONN")
        .unwrap_or_else(|_| "host=127.0.0.1 user=postgres dbname=postgres".into());
    let db_name = std::env::var("DB_NAME").unwrap_or_else(|_| "happymeter".into());

    log::info!("Connecting to Postgres to provision '{db_name}'");
    let (client, connection) = tokio_postgres::connect(&conn_str, NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            log::error!("Admin connection error: {e}");
        }
    });

    match ensure_database(&client, &db_name).await {
        Ok(true) => log::info!("Database '{db_name}' created"),
        Ok(false) => log::info!("Database '{db_name}' already exists"),
        Err(e) => {
            log::error!("Could not provision database '{db_name}': {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_plain_identifiers_are_accepted() {
        assert!(checked_database_name("happymeter").is_ok());
        assert!(checked_database_name("happymeter_test_2").is_ok());
        assert!(checked_database_name("").is_err());
        assert!(checked_database_name("happy-meter").is_err());
        assert!(matches!(
            checked_database_name("x\"; DROP DATABASE postgres; --"),
            Err(CreateDbError::InvalidName(name)) if name.starts_with("x\"")
        ));
    }

    #[test]
    fn invalid_names_surface_as_errors() {
        let err = checked_database_name("bad name").unwrap_err();
        assert!(err.to_string().contains("bad name"));
    }
}
