use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use cutline::config::AppConfig;
use cutline::database::entities::UserRole;
use cutline::database::migrations::Migrator;
use cutline::database::{establish_connection, get_database_url};
use cutline::services::{AuthService, UserCreateRequest, UserService};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Db {
        #[clap(subcommand)]
        command: DbCommands,
    },
    User {
        #[clap(subcommand)]
        command: UserCommands,
    },
    Token {
        #[clap(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    Migrate {
        #[clap(subcommand)]
        direction: MigrateDirection,
        /// Defaults to CUTLINE_DATABASE
        #[clap(short, long)]
        database: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum MigrateDirection {
    Up,
    Down,
    Fresh,
}

#[derive(Subcommand, Debug)]
enum UserCommands {
    /// Create an account; used to bootstrap the first admin
    Create {
        #[clap(short, long)]
        name: String,
        #[clap(short, long)]
        role: String,
        #[clap(short, long)]
        password: Option<String>,
        #[clap(short, long)]
        group: Option<String>,
        #[clap(short, long)]
        database: Option<String>,
    },
    SetPassword {
        #[clap(short, long)]
        name: String,
        #[clap(short, long)]
        password: String,
        #[clap(short, long)]
        database: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum TokenCommands {
    /// Verify a token with the configured secret and print its claims
    Inspect { token: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    let config = AppConfig::from_env().context("Invalid configuration")?;

    match cli.command {
        Commands::Db { command } => match command {
            DbCommands::Migrate {
                direction,
                database,
            } => {
                migrate_database(database.as_deref().unwrap_or(&config.database), direction)
                    .await?;
            }
        },
        Commands::User { command } => match command {
            UserCommands::Create {
                name,
                role,
                password,
                group,
                database,
            } => {
                let db = connect(database.as_deref().unwrap_or(&config.database)).await?;
                let role: UserRole = role.parse()?;
                let user = UserService::new(db.clone())
                    .create_user(UserCreateRequest {
                        name,
                        role,
                        user_group: group,
                        note: None,
                    })
                    .await?;

                if let Some(password) = password {
                    AuthService::from_config(db, &config)
                        .set_initial_password(user.id, &password)
                        .await?;
                }
                info!("Created user {} ({}) with id {}", user.name, user.role, user.id);
            }
            UserCommands::SetPassword {
                name,
                password,
                database,
            } => {
                let db = connect(database.as_deref().unwrap_or(&config.database)).await?;
                let user = UserService::new(db.clone()).get_user_by_name(&name).await?;
                AuthService::from_config(db, &config)
                    .set_initial_password(user.id, &password)
                    .await?;
                info!("Password set for {}", user.name);
            }
        },
        Commands::Token { command } => match command {
            TokenCommands::Inspect { token } => {
                let claims = config
                    .token_codec()
                    .verify(&token, Utc::now())
                    .context("Token rejected")?;
                println!("{}", serde_json::to_string_pretty(&claims)?);
            }
        },
    }

    Ok(())
}

async fn connect(database_path: &str) -> Result<sea_orm::DatabaseConnection> {
    let db = establish_connection(&get_database_url(Some(database_path))).await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

async fn migrate_database(database_path: &str, direction: MigrateDirection) -> Result<()> {
    let database_url = get_database_url(Some(database_path));
    let db = establish_connection(&database_url).await?;

    match direction {
        MigrateDirection::Up => {
            info!("Running migrations up");
            Migrator::up(&db, None).await?;
        }
        MigrateDirection::Down => {
            info!("Running migrations down");
            Migrator::down(&db, None).await?;
        }
        MigrateDirection::Fresh => {
            info!("Running fresh migrations (down then up)");
            Migrator::down(&db, None).await?;
            Migrator::up(&db, None).await?;
        }
    }

    info!("Database migration completed");
    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_deref()
        .unwrap_or("info")
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("sqlx=warn,{}", log_level)))
        .without_time()
        .init();
}
