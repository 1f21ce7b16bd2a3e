//! cost-sentry: stop labelled GCP resources when a budget is exceeded
//!
//! Runs as an HTTP harness for Pub/Sub budget notifications, or handles a
//! single notice / dry-run scan from the command line.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use cost_sentry::config::{GcpSettings, MitigationPolicy, SentryConfig};
use cost_sentry::error::ConfigError;
use cost_sentry::gcp::{classify_anyhow_error, GcpError};
use cost_sentry::sentry::{InvocationError, InvocationReport, Orchestrator};
use cost_sentry::server::{self, AppState};
use cost_sentry_common::decode_notice;
use cost_sentry_common::defaults::{
    DEFAULT_PORT, ENV_ACCESS_TOKEN, ENV_LABEL, ENV_MITIGATION_POLICY, ENV_PORT, ENV_PROJECT,
};
use tokio::io::AsyncReadExt;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cost-sentry")]
#[command(about = "Budget-triggered mitigation of labelled GCP resources")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Arguments shared by every command
#[derive(clap::Args, Debug)]
struct SentryArgs {
    /// Project to protect
    #[arg(long, env = ENV_PROJECT)]
    project: String,

    /// Label key opting resources in (`<label>=true`)
    #[arg(long, env = ENV_LABEL)]
    label: String,

    /// Reaction to a failing mitigation
    #[arg(long, env = ENV_MITIGATION_POLICY, value_enum, default_value_t = MitigationPolicy::FailFast)]
    mitigation_policy: MitigationPolicy,

    /// OAuth access token (default: Application Default Credentials)
    #[arg(long, env = ENV_ACCESS_TOKEN, hide_env_values = true)]
    access_token: Option<String>,

    /// Compute Engine API base URL
    #[arg(long)]
    compute_endpoint: Option<String>,

    /// Cloud Run API base URL
    #[arg(long)]
    run_endpoint: Option<String>,
}

impl SentryArgs {
    fn into_parts(self) -> Result<(SentryConfig, GcpSettings), ConfigError> {
        let config = SentryConfig::new(self.project, self.label)
            .with_mitigation_policy(self.mitigation_policy);
        config.validate()?;

        let gcp = GcpSettings {
            access_token: self.access_token,
            compute_endpoint: self.compute_endpoint,
            run_endpoint: self.run_endpoint,
        };
        Ok((config, gcp))
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the Pub/Sub push endpoint
    Serve {
        #[command(flatten)]
        sentry: SentryArgs,

        /// Port to listen on
        #[arg(long, env = ENV_PORT, default_value_t = DEFAULT_PORT)]
        port: u16,
    },

    /// Handle one billing notice and exit
    Invoke {
        #[command(flatten)]
        sentry: SentryArgs,

        /// Path to a notice JSON file, or "-" for stdin
        #[arg(long)]
        notice: String,

        /// The file holds a Pub/Sub push envelope rather than the bare notice
        #[arg(long)]
        envelope: bool,

        /// Output format (table, json)
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// List the resources a mitigation would touch, without changing them
    Scan {
        #[command(flatten)]
        sentry: SentryArgs,

        /// Output format (table, json)
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print the error chain, plus a hint when GCP rejected the credentials
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "\x1b[1;31mError:\x1b[0m {e}");
    for cause in e.chain().skip(1) {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
    }
    if let Some(hint) = credential_hint(e) {
        let _ = writeln!(stderr, "  \x1b[2mHint:\x1b[0m {hint}");
    }
}

fn credential_hint(e: &anyhow::Error) -> Option<&'static str> {
    match classify_anyhow_error(e)? {
        GcpError::Unauthenticated { .. } => Some(
            "pass --access-token or configure Application Default Credentials \
             (gcloud auth application-default login)",
        ),
        GcpError::PermissionDenied { .. } => Some(
            "the credentials need compute.instances.list/stop and \
             run.services.list/getIamPolicy/setIamPolicy on the project",
        ),
        _ => None,
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    match args.command {
        Command::Serve { sentry, port } => {
            let (config, gcp) = sentry.into_parts()?;
            server::run(AppState { config, gcp }, port).await?;
        }

        Command::Invoke {
            sentry,
            notice,
            envelope,
            format,
        } => {
            let (config, gcp) = sentry.into_parts()?;
            handle_invoke(config, gcp, &notice, envelope, format).await?;
        }

        Command::Scan { sentry, format } => {
            let (config, gcp) = sentry.into_parts()?;
            handle_scan(config, gcp, format).await?;
        }
    }

    Ok(())
}

async fn read_notice(path: &str) -> Result<Vec<u8>, ConfigError> {
    if path == "-" {
        let mut bytes = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| ConfigError::io("<stdin>", e))?;
        Ok(bytes)
    } else {
        tokio::fs::read(path)
            .await
            .map_err(|e| ConfigError::io(path, e))
    }
}

fn print_report(report: &InvocationReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Table => {
            println!("{report}");
            for failure in report.failures() {
                println!("  failed: {failure}");
            }
        }
    }
    Ok(())
}

/// Handle the invoke command
async fn handle_invoke(
    config: SentryConfig,
    gcp: GcpSettings,
    notice: &str,
    envelope: bool,
    format: OutputFormat,
) -> Result<()> {
    let payload = read_notice(notice).await?;
    // Decode before connecting so a bad replay file fails without credentials
    let decoded = if envelope {
        Some(decode_notice(&payload).map_err(InvocationError::from).map_err(invocation_error)?)
    } else {
        None
    };
    let gcp = gcp.connect().await?;

    info!(project = %config.project, label = %config.label, "Handling billing notice");
    let orchestrator = Orchestrator::new(config, gcp.compute_client(), gcp.run_client());

    let result = match &decoded {
        Some(notice) => orchestrator.handle_notice(notice).await,
        None => orchestrator.handle_event(&payload).await,
    };
    match result {
        Ok(report) => print_report(&report, format),
        Err(e) => {
            if let Some(report) = e.report() {
                print_report(report, format)?;
            }
            Err(invocation_error(e))
        }
    }
}

fn invocation_error(e: InvocationError) -> anyhow::Error {
    let stage = e.stage();
    anyhow::Error::new(e).context(format!("Invocation failed during {stage}"))
}

/// Handle the scan command
async fn handle_scan(config: SentryConfig, gcp: GcpSettings, format: OutputFormat) -> Result<()> {
    info!(project = %config.project, label = %config.label, "Scanning for labelled resources");

    let gcp = gcp.connect().await?;
    let orchestrator = Orchestrator::new(config, gcp.compute_client(), gcp.run_client());

    let services = orchestrator.scan_services().await?;
    let instances = orchestrator.scan_instances().await?;

    if format == OutputFormat::Json {
        let json = serde_json::json!({
            "services": services,
            "instances": instances,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    if services.is_empty() && instances.is_empty() {
        println!("No labelled resources found.");
        return Ok(());
    }

    println!("{:<20} {:<30} {:<20} {:<10}", "TYPE", "NAME", "PARTITION", "STATUS");
    println!("{}", "-".repeat(80));
    for s in &services {
        println!(
            "{:<20} {:<30} {:<20} {:<10}",
            "cloud-run-service", s.name, s.location, "-"
        );
    }
    for i in &instances {
        println!(
            "{:<20} {:<30} {:<20} {:<10}",
            "compute-instance", i.name, i.zone, i.status
        );
    }
    println!(
        "\nTotal: {} services, {} instances",
        services.len(),
        instances.len()
    );

    Ok(())
}
