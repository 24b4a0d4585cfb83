use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use proofchain_app::{
    AppConfig, AppError, AppRuntime, ArtifactOutputs, app_version, apply_theme_choice,
    describe_history_entry, verify_file,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "proofchain",
    version = app_version(),
    about = "Verify media authenticity and anchor proofs on-chain"
)]
struct Cli {
    /// Analysis endpoint URL (overrides PROOFCHAIN_ENDPOINT).
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Data directory for history and preferences (overrides PROOFCHAIN_DATA_DIR).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Allow plain-HTTP endpoints.
    #[arg(long, global = true)]
    allow_http: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a file for analysis and print the verdict.
    Verify {
        /// File to verify.
        file: PathBuf,
        /// Write the certificate PNG here when the proof is anchored.
        #[arg(long)]
        certificate: Option<PathBuf>,
        /// Write the explorer-link code PNG here when the proof is anchored.
        #[arg(long)]
        qr: Option<PathBuf>,
    },
    /// List recent anchored verifications, newest first.
    History,
    /// Show the theme preference, set it to `dark` or `light`, or `toggle` it.
    Theme {
        /// New theme value, or `toggle`.
        value: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!(stage = "cli", action = "run", error = %err, "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, AppError> {
    let mut config = AppConfig::from_env();
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    config.allow_insecure_http |= cli.allow_http;

    let runtime = AppRuntime::open(&config)?;

    match cli.command {
        Command::Verify {
            file,
            certificate,
            qr,
        } => {
            let outputs = ArtifactOutputs {
                certificate,
                code: qr,
            };
            let report = verify_file(&runtime, &file, &outputs).await?;
            for line in &report.lines {
                println!("{line}");
            }
            for path in &report.written {
                println!("Wrote {}", path.display());
            }
            if let Some(notice) = &report.notice {
                eprintln!("{notice}");
            }

            let failed = report.result.as_ref().is_none_or(|result| result.is_failure());
            Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
        Command::History => {
            let session = runtime.session.borrow();
            if session.history().is_empty() {
                println!("No verifications recorded yet.");
            }
            for entry in session.history() {
                println!("{}", describe_history_entry(entry));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Theme { value } => {
            let theme = apply_theme_choice(runtime.store(), value.as_deref())?;
            println!("{}", theme.as_str());
            Ok(ExitCode::SUCCESS)
        }
    }
}
