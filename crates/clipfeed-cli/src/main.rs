//! clipfeed - a command-line client for a short cooking-video service.

mod app;
mod cli;
mod render;

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use cli::{Command, USAGE};

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes buffered log lines on drop.
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let _guard = init_tracing();
    info!(?command, "clipfeed starting");

    let mut app = App::new()?;
    if command.requires_verification() {
        let state = app.start().await;
        if command.requires_session() && !state.is_authenticated() {
            anyhow::bail!("Not logged in. Run `clipfeed login` first.");
        }
    }

    match command {
        Command::Login { username } => app.login(username).await,
        Command::Register { username, email } => app.register(&username, &email).await,
        Command::Logout => {
            app.logout();
            Ok(())
        }
        Command::WhoAmI => app.whoami().await,
        Command::Videos => app.list_videos().await,
        Command::Feed => app.feed().await,
        Command::Play { video_id } => app.play(&video_id).await,
        Command::Upload {
            file,
            title,
            recipe,
            private,
        } => app.upload(file, title, recipe, private).await,
        Command::Profile { user_id } => app.profile(&user_id).await,
        Command::Follow { user_id } => app.set_following(&user_id, true).await,
        Command::Unfollow { user_id } => app.set_following(&user_id, false).await,
        Command::Help => Ok(()),
    }
}
