use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use boardroom::config::Config;
use boardroom::mirror::MirrorFormat;
use boardroom::registry::StoreRegistry;
use boardroom::service::{
    BookingService, CreateBookingRequest, ErrorKind, ServiceError, UpdateBookingRequest,
};

#[derive(Parser)]
#[command(name = "boardroom", version, about = "Meeting room bookings without double-booking")]
struct Cli {
    /// Directory holding one mirror file per site [env: BOARDROOM_DATA_DIR]
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Site whose store to operate on [env: BOARDROOM_SITE]
    #[arg(long, global = true)]
    site: Option<String>,

    /// Mirror format: json or framed [env: BOARDROOM_MIRROR]
    #[arg(long, global = true)]
    format: Option<MirrorFormat>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Book a room
    Create {
        #[arg(long)]
        user: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        room: String,
        /// e.g. 2026-10-20T10:00:00Z
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    /// Show one booking
    Get { id: String },
    /// List bookings by start time
    List {
        #[arg(long)]
        room: Option<String>,
    },
    /// Change any subset of a booking's fields
    Update {
        id: String,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        room: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Cancel a booking
    Delete { id: String },
    /// Remove every booking of the site
    Clear {
        #[arg(long)]
        yes: bool,
    },
    /// List the bookable rooms
    Rooms,
}

fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Validation | ErrorKind::InvalidInterval => 2,
        ErrorKind::Conflict => 3,
        ErrorKind::NotFound => 4,
        ErrorKind::Persistence => 5,
    }
}

/// Bad site names are the caller's mistake; anything else is the disk's.
fn open_error_code(e: &std::io::Error) -> u8 {
    match e.kind() {
        std::io::ErrorKind::InvalidInput => exit_code(ErrorKind::Validation),
        _ => exit_code(ErrorKind::Persistence),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ServiceError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ServiceError::Persistence(e.to_string()))?;
    println!("{text}");
    Ok(())
}

async fn run(service: &BookingService, command: Command) -> Result<(), ServiceError> {
    match command {
        Command::Create {
            user,
            email,
            phone,
            room,
            start,
            end,
        } => {
            let req = CreateBookingRequest {
                user,
                email,
                phone,
                start_time: start,
                end_time: end,
                room,
            };
            let booking = service.create(&req).await?;
            info!("created booking {}", booking.id);
            print_json(&booking)
        }
        Command::Get { id } => print_json(&service.get(&id).await?),
        Command::List { room: Some(room) } => print_json(&service.list_room(&room).await?),
        Command::List { room: None } => print_json(&service.list().await?),
        Command::Update {
            id,
            user,
            email,
            phone,
            room,
            start,
            end,
        } => {
            let req = UpdateBookingRequest {
                user,
                email,
                phone,
                start_time: start,
                end_time: end,
                room,
            };
            print_json(&service.update(&id, &req).await?)
        }
        Command::Delete { id } => {
            service.delete(&id).await?;
            info!("deleted booking {id}");
            Ok(())
        }
        Command::Clear { yes: false } => Err(ServiceError::Validation(vec![
            boardroom::service::FieldError {
                field: "yes",
                message: "Pass --yes to remove every booking".into(),
            },
        ])),
        Command::Clear { yes: true } => {
            service.clear().await?;
            info!("cleared all bookings");
            Ok(())
        }
        Command::Rooms => print_json(&service.rooms()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    boardroom::observability::init_tracing(if cli.verbose { "debug" } else { "warn" });

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(2);
        }
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(site) = cli.site {
        config.site = site;
    }
    if let Some(format) = cli.format {
        config.mirror_format = format;
    }
    debug!(
        "data_dir={} site={} format={:?}",
        config.data_dir.display(),
        config.site,
        config.mirror_format
    );

    let registry = StoreRegistry::new(config.data_dir.clone(), config.mirror_format);
    let store = match registry.get_or_create(&config.site) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("cannot open site {}: {e}", config.site);
            return ExitCode::from(open_error_code(&e));
        }
    };
    let service = BookingService::new(Arc::clone(&store), config.rooms);

    match run(&service, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!("{e}");
            eprintln!("{}", e.user_message());
            ExitCode::from(exit_code(e.kind()))
        }
    }
}
