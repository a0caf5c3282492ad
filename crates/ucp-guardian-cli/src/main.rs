use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ucp_guardian_core::llm::parse_timeout;
use ucp_guardian_core::{
    archive_migration_guide, export_artifacts, normalize_target_url, render_report, AuditError,
    Auditor, Credential, FileArtifactStore, GeminiClient, GuardianSettings, OutputFormat,
};

#[derive(Parser, Debug)]
#[command(
    name = "ucp-guardian",
    author,
    version,
    about = "AI agent readiness & UCP compliance auditor"
)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON) with a `guardian` table
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Gemini API key used only for this invocation (default: UCP_GUARDIAN_API_KEY)
    #[arg(long = "api-key", value_name = "KEY", global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Audit a storefront URL for AI agent readiness
    Audit {
        /// Storefront URL; `https://` is assumed when no scheme is given
        url: String,
        /// Primary model (search grounded)
        #[arg(long)]
        model: Option<String>,
        /// Model used when the primary attempt fails
        #[arg(long = "fallback-model")]
        fallback_model: Option<String>,
        /// Write ucp.json, migration_guide.md and the report summary here
        #[arg(long = "out-dir", value_name = "DIR")]
        out_dir: Option<PathBuf>,
        /// Archive the migration guide under this directory
        #[arg(long = "archive-dir", value_name = "DIR")]
        archive_dir: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Format::Human)]
        format: Format,
    },
    /// Generate a code snippet that fixes one reported issue
    Patch {
        url: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List Gemini models available to the API key
    Models {
        /// Emit models as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Human,
    Json,
    Yaml,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Human => OutputFormat::Human,
            Format::Json => OutputFormat::Json,
            Format::Yaml => OutputFormat::Yaml,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    guardian: GuardianSection,
}

#[derive(Debug, Default, Deserialize)]
struct GuardianSection {
    api_key: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
    fallback_model: Option<String>,
    patch_model: Option<String>,
    timeout: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let (settings, file_api_key) = resolve_settings(cli.config.as_deref())?;
    let api_key = cli
        .api_key
        .clone()
        .or_else(GuardianSettings::api_key_from_env)
        .or(file_api_key);

    match cli.command {
        Commands::Audit {
            url,
            model,
            fallback_model,
            out_dir,
            archive_dir,
            format,
        } => {
            let mut settings = settings;
            if let Some(fallback_model) = fallback_model {
                settings.fallback_model = fallback_model;
            }
            let model = model.unwrap_or_else(|| settings.model.clone());
            run_audit(
                &settings,
                &url,
                &model,
                api_key.as_deref(),
                out_dir.as_deref(),
                archive_dir,
                format,
            )
            .await?
        }
        Commands::Patch {
            url,
            title,
            description,
        } => run_patch(&settings, &url, &title, &description, api_key.as_deref()).await?,
        Commands::Models { json } => list_models(&settings, api_key.as_deref(), json).await?,
    }
    Ok(())
}

/// Layer defaults < config file < environment. Returns the file's API key separately.
fn resolve_settings(config_path: Option<&Path>) -> Result<(GuardianSettings, Option<String>)> {
    let file = match config_path {
        Some(path) => load_file_config(path)?,
        None => FileConfig::default(),
    };
    let section = file.guardian;
    let mut settings = GuardianSettings::default();
    if let Some(endpoint) = section.endpoint {
        settings.endpoint = endpoint;
    }
    if let Some(model) = section.model {
        settings.model = model;
    }
    if let Some(model) = section.fallback_model {
        settings.fallback_model = model;
    }
    if let Some(model) = section.patch_model {
        settings.patch_model = model;
    }
    if let Some(timeout) = section.timeout {
        settings.timeout = parse_timeout(timeout.trim())
            .with_context(|| format!("invalid guardian.timeout `{timeout}` in config"))?;
    }
    let settings = settings.merge_env(std::env::vars().collect())?;
    Ok((settings, section.api_key))
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let config = config::Config::builder()
        .add_source(config::File::from(path))
        .build()
        .with_context(|| format!("failed to load config file {}", path.display()))?;
    config
        .try_deserialize()
        .with_context(|| format!("invalid configuration in {}", path.display()))
}

async fn run_audit(
    settings: &GuardianSettings,
    url: &str,
    model: &str,
    api_key: Option<&str>,
    out_dir: Option<&Path>,
    archive_dir: Option<PathBuf>,
    format: Format,
) -> Result<()> {
    let url = normalize_target_url(url)?;
    let auditor = Auditor::new(GeminiClient::new(settings)?, settings);

    // A late result after Ctrl-C is dropped, never rendered.
    let outcome = tokio::select! {
        outcome = auditor.perform_audit(&url, model, api_key.unwrap_or_default()) => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("audit interrupted; discarding pending result");
            bail!("audit of {url} interrupted");
        }
    };
    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            report_failure(&err)?;
            return Err(err.into());
        }
    };

    println!("{}", render_report(&result, format.into())?);

    if let Some(dir) = out_dir {
        for path in export_artifacts(&result, dir).await? {
            eprintln!("{} {}", "wrote".green(), path.display());
        }
    }

    if let Some(dir) = archive_dir {
        let store = FileArtifactStore::new(dir);
        match archive_migration_guide(&store, &result).await {
            Ok(path) => info!(%path, "migration guide archived"),
            Err(err) => warn!(error = %format!("{err:#}"), "failed to archive migration guide"),
        }
    }
    Ok(())
}

fn report_failure(err: &AuditError) -> Result<()> {
    match err {
        AuditError::MissingCredential => eprintln!(
            "{}",
            "API KEY REQUIRED: pass --api-key or set UCP_GUARDIAN_API_KEY."
                .red()
                .bold()
        ),
        AuditError::Exhausted { diagnostic, .. } => {
            eprintln!("{}", err.failure_class().advice().red().bold());
            eprintln!("{}", "Diagnostics:".dimmed());
            eprintln!("{}", serde_json::to_string_pretty(diagnostic)?);
        }
    }
    Ok(())
}

async fn run_patch(
    settings: &GuardianSettings,
    url: &str,
    title: &str,
    description: &str,
    api_key: Option<&str>,
) -> Result<()> {
    let url = normalize_target_url(url)?;
    let auditor = Auditor::new(GeminiClient::new(settings)?, settings);
    let patch = auditor
        .generate_patch(&url, title, description, api_key)
        .await?;
    println!("{patch}");
    Ok(())
}

async fn list_models(settings: &GuardianSettings, api_key: Option<&str>, json: bool) -> Result<()> {
    let credential = Credential::new(api_key.unwrap_or_default());
    if !credential.is_usable() {
        bail!("a valid Gemini API key is required to list models");
    }
    let client = GeminiClient::new(settings)?;
    let mut models = client.list_models(&credential).await?;
    models.sort_by(|a, b| a.name.cmp(&b.name));
    if json {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    println!("{} model(s) available", models.len());
    for model in models {
        let display = model
            .display_name
            .map(|name| format!(" ({name})"))
            .unwrap_or_default();
        println!("- {}{}", model.name.bold(), display);
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
