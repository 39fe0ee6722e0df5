use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "quietalarm-cli", version, about = "Quietalarm CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Quiet hours settings
    QuietHours {
        #[command(subcommand)]
        action: commands::quiet_hours::QuietHoursAction,
    },
    /// Engine configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Dispatch one method call, e.g. `call getQuietHours`
    Call {
        /// Method name
        method: String,
        /// Arguments as a JSON object
        args: Option<String>,
    },
    /// Alarm scheduling and delivery
    Alarm {
        #[command(subcommand)]
        action: commands::alarm::AlarmAction,
    },
}

fn main() {
    // stdout carries JSON; logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quietalarm=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::QuietHours { action } => commands::quiet_hours::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Call { method, args } => commands::call::run(method, args),
        Commands::Alarm { action } => commands::alarm::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
