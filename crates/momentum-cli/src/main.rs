use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "momentum", version, about = "Momentum Maker CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daily alarm
    Alarm {
        #[command(subcommand)]
        action: commands::alarm::AlarmAction,
    },
    /// Quiz question set
    Quiz {
        #[command(subcommand)]
        action: commands::quiz::QuizAction,
    },
    /// Failure email settings
    Email {
        #[command(subcommand)]
        action: commands::email::EmailAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Challenge statistics
    Stats {
        /// Also list the most recent challenges
        #[arg(long)]
        recent: Option<usize>,
    },
    /// Run the alarm engine in the foreground
    Run,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Alarm { action } => commands::alarm::run(action),
        Commands::Quiz { action } => commands::quiz::run(action),
        Commands::Email { action } => commands::email::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Stats { recent } => commands::stats::run(recent),
        Commands::Run => commands::run::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
