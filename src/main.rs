use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use recipe_journal::config::Config;
use recipe_journal::{build_app, cli, db};

#[derive(Parser)]
#[command(name = "recipe-journal", about = "Recipe sharing with personal collections")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web server (default)
    Serve,
    /// Register a member from the command line
    CreateMember { username: String, password: String },
    /// Import recipes from a JSON file
    Import {
        file: String,
        #[arg(long)]
        author: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("recipe_journal=info,tower_http=info")),
        )
        .init();

    let args = Cli::parse();
    let config = Config::load();
    let pool = db::init_pool(&config.database_url).await?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let app = build_app(pool, config.secure_cookies, config.media_dir).await?;
            let listener = TcpListener::bind(config.bind_addr).await?;

            tracing::info!("listening on {}", config.bind_addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            tracing::info!("server stopped");
        }
        Command::CreateMember { username, password } => {
            let member = cli::create_member(&pool, &username, &password).await?;
            println!("Created member:");
            println!("  ID: {}", member.id);
            println!("  Username: {}", member.username);
        }
        Command::Import { file, author } => {
            let imported = cli::import_recipes(&pool, &file, &author).await?;
            println!("Imported {imported} recipes");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install terminate handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received terminate signal, shutting down"),
    }
}
