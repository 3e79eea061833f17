use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "rollcheck",
    about = "rollcheck — wait for Kubernetes rollouts to stabilize",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the configured resources until they stabilize or fail.
    ///
    /// Exits non-zero when any resource fails, times out, or the check is
    /// interrupted with Ctrl-C.
    Check {
        /// Path to rollcheck.toml
        #[arg(short, long, default_value = "rollcheck.toml")]
        config: PathBuf,
        /// kubeconfig context (overrides status_check.kube_context)
        #[arg(long)]
        context: Option<String>,
        /// Show only a short log tail and write full logs to files
        #[arg(long)]
        mute_logs: bool,
        /// Deadline for every resource, e.g. "2m" (overrides the config)
        #[arg(long)]
        deadline: Option<String>,
    },
    /// Write a rollcheck.toml scaffold for one deployment
    Init {
        /// Deployment name
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
        /// Output path
        #[arg(short, long, default_value = "rollcheck.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rollcheck=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            config,
            context,
            mute_logs,
            deadline,
        } => {
            let opts = commands::check::CheckOptions {
                context,
                mute_logs,
                deadline,
            };
            let ok = commands::check::check(&config, opts).await?;
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Init {
            name,
            namespace,
            output,
        } => commands::init::init(&name, &namespace, &output),
    }
}
