//! CLI module for the roomdesk command-line interface.
//!
//! Without a subcommand (or with `serve`) the binary runs the API server.
//! The remaining subcommands talk to a running server:
//! - `login` / `logout` / `whoami` - Manage the local session
//! - `rooms list|add|edit|delete` - Drive the rooms screen
//! - `users add` - Seed a user directly in the database

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::client::{ApiClient, ClientError, RoomsView, SessionError, SessionStore};
use crate::config::Config;
use crate::db::{Role, Room};

const TOKEN_FILE_NAME: &str = ".roomdesk_token";

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "roomdesk")]
#[command(author, version, about = "Hotel room administration server and client", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "roomdesk.toml", global = true)]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// API URL to connect to
    #[arg(
        long,
        env = "ROOMDESK_API_URL",
        default_value = "http://localhost:8000",
        global = true
    )]
    pub api_url: String,

    /// Bearer token to use instead of the stored session
    #[arg(long, env = "ROOMDESK_TOKEN", global = true)]
    pub token: Option<String>,

    /// Where the session token is stored (default: ~/.roomdesk_token)
    #[arg(long, global = true)]
    pub token_file: Option<PathBuf>,

    /// Keep the session token in memory only
    #[arg(long, global = true)]
    pub no_persist: bool,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Whether this invocation runs the API server
    pub fn is_serve(&self) -> bool {
        matches!(self.command, None | Some(Commands::Serve))
    }
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the API server
    Serve,

    /// Log in and store the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Revoke the current token and forget it
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Room management commands
    #[command(subcommand)]
    Rooms(RoomsCommands),

    /// User management commands (direct database access)
    #[command(subcommand)]
    Users(UsersCommands),
}

/// Rooms subcommands
#[derive(Subcommand, Debug)]
pub enum RoomsCommands {
    /// List all rooms
    List,
    /// Add a room
    Add {
        #[arg(long)]
        number: String,
        /// single, double or suite
        #[arg(long = "type")]
        room_type: String,
        /// Price per night
        #[arg(long)]
        price: String,
        /// available, occupied or maintenance
        #[arg(long, default_value = "available")]
        status: String,
    },
    /// Edit a room; omitted fields keep their current value
    Edit {
        id: i64,
        #[arg(long)]
        number: Option<String>,
        #[arg(long = "type")]
        room_type: Option<String>,
        #[arg(long)]
        price: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Delete a room
    Delete {
        id: i64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Users subcommands
#[derive(Subcommand, Debug)]
pub enum UsersCommands {
    /// Create a user account
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
        /// admin, manager or accountant
        #[arg(long, default_value = "admin")]
        role: String,
    },
}

/// Run a CLI command
pub async fn run_command(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Some(Commands::Login { email, password }) => cmd_login(cli, email, password).await,
        Some(Commands::Logout) => cmd_logout(cli).await,
        Some(Commands::Whoami) => cmd_whoami(cli).await,
        Some(Commands::Rooms(RoomsCommands::List)) => cmd_rooms_list(cli).await,
        Some(Commands::Rooms(RoomsCommands::Add {
            number,
            room_type,
            price,
            status,
        })) => cmd_rooms_add(cli, number, room_type, price, status).await,
        Some(Commands::Rooms(RoomsCommands::Edit {
            id,
            number,
            room_type,
            price,
            status,
        })) => {
            let changes = EditArgs {
                number: number.clone(),
                room_type: room_type.clone(),
                price: price.clone(),
                status: status.clone(),
            };
            cmd_rooms_edit(cli, *id, changes).await
        }
        Some(Commands::Rooms(RoomsCommands::Delete { id, yes })) => {
            cmd_rooms_delete(cli, *id, *yes).await
        }
        Some(Commands::Users(UsersCommands::Add {
            email,
            password,
            name,
            role,
        })) => cmd_users_add(config, email, password, name, role).await,
        None | Some(Commands::Serve) => {
            // Serving is handled in main.rs
            Ok(())
        }
    }
}

// ============================================================================
// Session helpers
// ============================================================================

fn default_token_file() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(TOKEN_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(TOKEN_FILE_NAME))
}

/// Session store for this invocation. An explicit `--token` never touches the
/// stored session.
fn session_store(cli: &Cli) -> SessionStore {
    if cli.no_persist || cli.token.is_some() {
        SessionStore::in_memory()
    } else {
        SessionStore::persistent(cli.token_file.clone().unwrap_or_else(default_token_file))
    }
}

fn api_client(cli: &Cli) -> Result<ApiClient> {
    ApiClient::new(&cli.api_url).context("Failed to create HTTP client")
}

/// Load the session from `--token` or the token file
async fn open_session(cli: &Cli, client: &ApiClient) -> Result<SessionStore> {
    let mut session = session_store(cli);
    let authenticated = match &cli.token {
        Some(token) => {
            session
                .adopt(client, token.clone())
                .await
                .map_err(session_error)?;
            true
        }
        None => session.restore(client).await.map_err(session_error)?,
    };

    if !authenticated {
        anyhow::bail!(
            "Not logged in. Run `roomdesk login` or set the ROOMDESK_TOKEN environment variable."
        );
    }
    Ok(session)
}

fn session_error(e: SessionError) -> anyhow::Error {
    match e {
        SessionError::Client(ClientError::Unauthorized(_)) => {
            anyhow::anyhow!("Authentication failed. Run `roomdesk login` again.")
        }
        SessionError::Client(e) => anyhow::anyhow!(e.user_message()),
        other => other.into(),
    }
}

// ============================================================================
// Session commands
// ============================================================================

async fn cmd_login(cli: &Cli, email: &str, password: &str) -> Result<()> {
    let client = api_client(cli)?;
    let mut session = if cli.no_persist {
        SessionStore::in_memory()
    } else {
        SessionStore::persistent(cli.token_file.clone().unwrap_or_else(default_token_file))
    };

    let landing = session
        .login(&client, email, password)
        .await
        .map_err(|e| match e {
            SessionError::Client(e) => anyhow::anyhow!(e.user_message()),
            other => other.into(),
        })?;

    println!("[OK] Logged in as {}", email);
    println!("Landing view: {:?} ({})", landing, landing.path());
    match session.token_file() {
        Some(path) => println!("Token stored in {}", path.display()),
        None => {
            if let Some(credentials) = session.credentials() {
                println!("Token: {}", credentials.token());
            }
        }
    }
    Ok(())
}

async fn cmd_logout(cli: &Cli) -> Result<()> {
    let client = api_client(cli)?;
    let mut session = session_store(cli);
    let authenticated = match &cli.token {
        Some(token) => session.adopt(&client, token.clone()).await.is_ok(),
        None => session.restore(&client).await.map_err(session_error)?,
    };

    if !authenticated {
        println!("Not logged in.");
        return Ok(());
    }

    session.logout(&client).await.map_err(session_error)?;
    println!("[OK] Logged out");
    Ok(())
}

async fn cmd_whoami(cli: &Cli) -> Result<()> {
    let client = api_client(cli)?;
    let session = open_session(cli, &client).await?;
    let user = session
        .authorize(&client)?
        .current_user()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!();
    println!("ID:      {}", user.id);
    println!("Email:   {}", user.email);
    println!("Name:    {}", user.name);
    println!("Role:    {}", user.role);
    match session.landing() {
        Ok(landing) => println!("Landing: {:?} ({})", landing, landing.path()),
        Err(e) => println!("Landing: - ({})", e),
    }
    println!();
    Ok(())
}

// ============================================================================
// Rooms commands
// ============================================================================

async fn rooms_view(cli: &Cli) -> Result<(ApiClient, RoomsView<ApiClient>)> {
    let client = api_client(cli)?;
    let session = open_session(cli, &client).await?;
    let authed = session.authorize(&client)?;
    Ok((authed.clone(), RoomsView::new(authed)))
}

/// Render the inline error the view recorded, with the server's detail
fn view_failure(view_error: Option<&str>, e: ClientError) -> anyhow::Error {
    let mut message = view_error.unwrap_or("Request failed").to_string();
    match &e {
        ClientError::Validation { errors, .. } if !errors.is_empty() => {
            for (field, messages) in errors {
                for m in messages {
                    message.push_str(&format!("\n  {}: {}", field, m));
                }
            }
        }
        _ => message.push_str(&format!(": {}", e.user_message())),
    }
    anyhow::anyhow!(message)
}

async fn cmd_rooms_list(cli: &Cli) -> Result<()> {
    let (_, mut view) = rooms_view(cli).await?;
    if let Err(e) = view.refresh().await {
        return Err(view_failure(view.error(), e));
    }
    print_rooms(view.rooms());
    Ok(())
}

async fn cmd_rooms_add(
    cli: &Cli,
    number: &str,
    room_type: &str,
    price: &str,
    status: &str,
) -> Result<()> {
    let (_, mut view) = rooms_view(cli).await?;
    view.toggle_form();
    view.fields.room_number = number.to_string();
    view.fields.room_type = room_type.to_string();
    view.fields.price_per_night = price.to_string();
    view.fields.status = status.to_string();

    let room = match view.submit().await {
        Ok(room) => room,
        Err(e) => return Err(view_failure(view.error(), e)),
    };

    println!("[OK] {}", view.success().unwrap_or("Room added"));
    print_rooms(std::slice::from_ref(&room));
    Ok(())
}

struct EditArgs {
    number: Option<String>,
    room_type: Option<String>,
    price: Option<String>,
    status: Option<String>,
}

async fn cmd_rooms_edit(cli: &Cli, id: i64, args: EditArgs) -> Result<()> {
    let (client, mut view) = rooms_view(cli).await?;
    let current = client
        .get_room(id)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    view.edit(&current);
    if let Some(number) = args.number {
        view.fields.room_number = number;
    }
    if let Some(room_type) = args.room_type {
        view.fields.room_type = room_type;
    }
    if let Some(price) = args.price {
        view.fields.price_per_night = price;
    }
    if let Some(status) = args.status {
        view.fields.status = status;
    }

    let room = match view.submit().await {
        Ok(room) => room,
        Err(e) => return Err(view_failure(view.error(), e)),
    };

    println!("[OK] {}", view.success().unwrap_or("Room updated"));
    print_rooms(std::slice::from_ref(&room));
    Ok(())
}

async fn cmd_rooms_delete(cli: &Cli, id: i64, yes: bool) -> Result<()> {
    let (_, mut view) = rooms_view(cli).await?;
    let mut confirm = |prompt: &str| yes || prompt_yes_no(prompt);

    match view.delete(id, &mut confirm).await {
        Ok(true) => {
            println!("[OK] {}", view.success().unwrap_or("Room deleted"));
            Ok(())
        }
        Ok(false) => {
            println!("Cancelled.");
            Ok(())
        }
        Err(e) => Err(view_failure(view.error(), e)),
    }
}

/// Ask on stdin; anything but y/yes is a refusal
fn prompt_yes_no(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => is_yes(&answer),
        Err(_) => false,
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn print_rooms(rooms: &[Room]) {
    if rooms.is_empty() {
        println!("No rooms found.");
        return;
    }

    println!();
    println!(
        "{:<6} {:<12} {:<8} {:>10} {:<12}",
        "ID", "NUMBER", "TYPE", "PRICE", "STATUS"
    );
    println!("{}", "-".repeat(52));
    for room in rooms {
        println!("{}", format_room_row(room));
    }
    println!();
}

fn format_room_row(room: &Room) -> String {
    format!(
        "{:<6} {:<12} {:<8} {:>10.2} {:<12}",
        room.id,
        truncate(&room.room_number, 12),
        room.room_type.as_str(),
        room.price_per_night,
        room.status.as_str()
    )
}

// ============================================================================
// Users commands
// ============================================================================

async fn cmd_users_add(
    config: &Config,
    email: &str,
    password: &str,
    name: &str,
    role: &str,
) -> Result<()> {
    let role: Role = role.parse()?;

    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data directory: {}",
            config.server.data_dir.display()
        )
    })?;
    let pool = crate::db::init(&config.server.data_dir).await?;

    if crate::db::find_user_by_email(&pool, email).await?.is_some() {
        anyhow::bail!("A user with email {} already exists", email);
    }

    let user = crate::auth::create_user(&pool, email, password, name, role).await?;
    println!("[OK] Created {} user {} (id {})", role, user.email, user.id);
    Ok(())
}

/// Truncate a string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
