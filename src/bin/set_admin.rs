//! Grant or revoke the admin capability for a user, looked up by e-mail.
//!
//! Usage: `set-admin <email> [true|false]`

use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use venture::config::Config;
use venture::db::{self, Repository};
use venture::errors::AppError;

fn parse_flag(raw: Option<&str>) -> Option<bool> {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        None | Some("true") => Some(true),
        Some("false") => Some(false),
        Some(_) => None,
    }
}

async fn set_admin(repo: &Repository, email: &str, admin: bool) -> Result<String, AppError> {
    let user = repo
        .get_user_by_email(email)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No user with e-mail {}", email)))?;

    repo.set_admin_claim(&user.id, admin).await?;
    repo.set_user_admin_flag(&user.id, admin).await?;
    Ok(user.id)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (Some(email), Some(admin)) = (
        args.first(),
        parse_flag(args.get(1).map(String::as_str)),
    ) else {
        eprintln!("Usage: set-admin <email> [true|false]");
        return ExitCode::from(2);
    };

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = match db::init_database(&config.db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to open database {:?}: {}", config.db_path, e);
            return ExitCode::FAILURE;
        }
    };
    let repo = Repository::new(pool);

    match set_admin(&repo, email, admin).await {
        Ok(user_id) => {
            tracing::info!(user_id = %user_id, email = %email, admin, "Updated admin status");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(email = %email, "Failed to update admin status: {}", e);
            ExitCode::FAILURE
        }
    }
}
