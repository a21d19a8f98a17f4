//! SwarmOS CLI: run supervisor-routed agent workflows from the terminal.
//!
//! Reuses the same core domain logic (swarm-core) and server bootstrap
//! (swarm-server) that back the HTTP API.

use clap::{Parser, Subcommand};

use swarm_cli::commands::{self, ConfigOverrides};

/// SwarmOS CLI - Supervisor-routed Researcher/Coder agent swarm
#[derive(Parser)]
#[command(name = "swarm", version, about = "SwarmOS CLI - Supervisor-routed agent swarm")]
pub struct Cli {
    /// Path to the SQLite database file
    #[arg(long, global = true, env = "SWARM_DB_PATH")]
    db: Option<String>,

    /// Path to a YAML configuration file (default: $SWARM_CONFIG or ~/.swarm/config.yaml)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Completion provider: "ollama" or "openai"
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model name passed to the completion backend
    #[arg(long, global = true)]
    model: Option<String>,

    /// Base URL of the completion backend
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Maximum number of agent steps per workflow
    #[arg(long, global = true)]
    max_steps: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the SwarmOS HTTP backend server
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },

    /// Submit a prompt and follow the workflow until it finishes
    Run {
        /// The request for the swarm
        #[arg(short = 'p', long = "prompt")]
        prompt: String,
        /// Workflow title (defaults to the prompt's first line)
        #[arg(long)]
        title: Option<String>,
        /// Email of the submitting user (created if missing)
        #[arg(long, default_value = "cli@swarm.local")]
        email: String,
    },

    /// Inspect workflows
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum WorkflowAction {
    /// Show a workflow with its ordered tasks
    Get {
        #[arg(long)]
        id: String,
    },
    /// List workflows, newest first
    List {
        #[arg(long)]
        user_id: Option<String>,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Find or create a user by email
    Create {
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swarm_core=warn,swarm_server=info,swarm_cli=info".into()),
        )
        .init();

    let overrides = ConfigOverrides {
        config_path: cli.config,
        db: cli.db,
        provider: cli.provider,
        model: cli.model,
        base_url: cli.base_url,
        max_steps: cli.max_steps,
    };

    let config = match overrides.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Server { host, port } => commands::server::run(host, port, config).await,

        Commands::Run {
            prompt,
            title,
            email,
        } => {
            let state = commands::init_state(config);
            commands::run::run(&state, &prompt, title.as_deref(), &email)
                .await
                .map(|_| ())
        }

        Commands::Workflow { action } => {
            let state = commands::init_state(config);
            match action {
                WorkflowAction::Get { id } => commands::workflow::get(&state, &id).await,
                WorkflowAction::List { user_id } => {
                    commands::workflow::list(&state, user_id.as_deref()).await
                }
            }
        }

        Commands::User { action } => {
            let state = commands::init_state(config);
            match action {
                UserAction::Create { email } => commands::user::create(&state, &email).await,
            }
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
