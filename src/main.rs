//! Hostcall CLI
//!
//! Entry point for the `hostcall` command-line tool.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hostcall::config::{user_config_path, EffectiveConfig, Settings, PROJECT_CONFIG_FILE};
use hostcall::{
    build_request, CallError, CallManifest, Caller, CommandTransport, Disposition, FailureKind,
};

#[derive(Parser)]
#[command(name = "hostcall")]
#[command(about = "Call remote host programs through typed parameter lists", version)]
struct Cli {
    /// Path to project config file (default: ./hostcall.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Collection used when a manifest names none
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Error-code template for `error_code` parameters (capture or escalate)
    #[arg(long, global = true)]
    error_policy: Option<String>,

    /// Transport command that receives request documents on stdin
    #[arg(long, global = true)]
    transport: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the request document a manifest produces, without dispatching
    Build {
        /// Path to the call manifest (JSON)
        manifest: PathBuf,
    },

    /// Dispatch a manifest through the configured transport
    Invoke {
        /// Path to the call manifest (JSON)
        manifest: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(FailureKind::Validation as i32);
        }
    };
    let settings = match config.settings() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(FailureKind::Validation as i32);
        }
    };

    init_tracing(&settings.log_level);

    match cli.command {
        Commands::Build { manifest } => run_build(&manifest, &settings),
        Commands::Invoke { manifest } => run_invoke(&manifest, &settings),
        Commands::Config => run_config(&config),
    }
}

fn init_tracing(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: logging unavailable: {}", e);
    }
}

fn load_config(cli: &Cli) -> Result<EffectiveConfig, String> {
    let project_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    if cli.config.is_some() && !project_path.exists() {
        return Err(format!("config file not found: {}", project_path.display()));
    }

    let mut overrides = serde_json::Map::new();
    if let Some(ref collection) = cli.collection {
        overrides.insert("default_collection".to_string(), json!(collection));
    }
    if let Some(ref policy) = cli.error_policy {
        overrides.insert("error_policy".to_string(), json!(policy));
    }
    if let Some(ref command) = cli.transport {
        overrides.insert("transport".to_string(), json!({ "command": command }));
    }
    let overrides = (!overrides.is_empty()).then(|| serde_json::Value::Object(overrides));

    let user_path = user_config_path();
    EffectiveConfig::build(user_path.as_deref(), Some(&project_path), overrides)
        .map_err(|e| e.to_string())
}

fn load_manifest(path: &Path) -> CallManifest {
    match CallManifest::load(path) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error loading manifest {}: {}", path.display(), e);
            process::exit(FailureKind::Validation as i32);
        }
    }
}

fn run_build(path: &Path, settings: &Settings) {
    let manifest = load_manifest(path);
    let request = match manifest.to_request(settings.error_policy, &settings.default_collection) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Invalid manifest: {}", e);
            process::exit(FailureKind::Validation as i32);
        }
    };

    let request_id = ulid::Ulid::new().to_string().to_lowercase();
    let document = match build_request(&request, &request_id, settings.protocol_version) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Invalid manifest: {}", e);
            process::exit(FailureKind::Validation as i32);
        }
    };

    match document.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(FailureKind::Protocol as i32);
        }
    }
}

fn run_invoke(path: &Path, settings: &Settings) {
    let manifest = load_manifest(path);
    let request = match manifest.to_request(settings.error_policy, &settings.default_collection) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Invalid manifest: {}", e);
            process::exit(FailureKind::Validation as i32);
        }
    };

    let transport = Arc::new(CommandTransport::new(settings.transport.clone()));
    let caller = Caller::with_settings(transport, settings.caller_settings());

    match caller.invoke_request(&request) {
        Ok(response) => {
            let outcome = json!({
                "succeeded": true,
                "outputs": hostcall::Outputs::from(response).to_json(),
            });
            println!("{}", render(&outcome));
        }
        Err(CallError::Remote(failure)) => {
            let detail = match &failure.disposition {
                Disposition::Captured(outputs) => json!({ "outputs": outputs.to_json() }),
                Disposition::Escalated { joblog } => json!({ "joblog": joblog }),
            };
            let outcome = json!({
                "succeeded": false,
                "exception_id": failure.exception_id,
                "exception_message": failure.message,
                "escalated": failure.is_escalated(),
                "detail": detail,
            });
            println!("{}", render(&outcome));
            process::exit(FailureKind::Remote as i32);
        }
        Err(e) => {
            eprintln!("Call failed ({}): {}", e.phase(), e);
            process::exit(e.exit_code());
        }
    }
}

fn run_config(config: &EffectiveConfig) {
    match config.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn render(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
