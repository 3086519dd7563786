//! phrasesync command-line tool.
//!
//! Provides subcommands for three-way merging of locale directories and
//! files, diffing them, and moving locale files to and from a PhraseApp
//! project, plus generating / validating configuration files.

mod settings;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing_subscriber::EnvFilter;

use phrasesync_core::config::AppConfig;
use phrasesync_core::merge::{MergeEngine, Operation};
use phrasesync_core::{FileFormat, LocaleUpdater, PhraseAppClient};

use settings::Overrides;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Keep nested locale files in sync with a PhraseApp project.
#[derive(Parser, Debug)]
#[command(
    name = "phrasesync",
    version,
    about = "Merge locale files and synchronize them with PhraseApp"
)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply if it is missing.
    #[arg(short, long, global = true, default_value = "phrasesync.toml")]
    config: PathBuf,

    /// Log debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// PhraseApp API access token.
    #[arg(long, global = true, env = "PHRASEAPP_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// PhraseApp project ID.
    #[arg(long, global = true, env = "PHRASEAPP_PROJECT_ID")]
    project_id: Option<String>,

    /// Read the access token and project ID from a `.phraseapp.yml` file.
    #[arg(long, global = true)]
    credentials: Option<String>,

    /// Locale file format: json, yml or yaml.
    #[arg(long, global = true)]
    file_format: Option<FileFormat>,

    /// Locale that holds every legitimate key.
    #[arg(long, global = true)]
    default_locale: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./phrasesync.toml")]
        output: PathBuf,
    },

    /// Validate the configuration file.
    Validate,

    /// Three-way merge of locale directories; ours wins conflicts.
    Merge {
        ours: PathBuf,
        theirs: PathBuf,
        ancestor: PathBuf,
        result: PathBuf,
    },

    /// Three-way merge of two locale files; ours wins conflicts.
    MergeFile {
        ours: PathBuf,
        theirs: PathBuf,
        result: PathBuf,

        /// Common ancestor file. Without it both files are treated as new.
        #[arg(long)]
        ancestor: Option<PathBuf>,
    },

    /// Show per-locale differences from ours to theirs.
    Diff { ours: PathBuf, theirs: PathBuf },

    /// Download every locale of the project into a directory.
    Download { dir: PathBuf },

    /// Upload a locale directory, removing keys the default locale dropped.
    Upload { dir: PathBuf },

    /// Create a project, upload a locale directory and record its commit.
    Setup {
        #[arg(long)]
        name: String,

        /// Git commit the uploaded locales correspond to.
        #[arg(long)]
        parent_commit: String,

        dir: PathBuf,
    },

    /// Print the ID of the project with the given name.
    Lookup {
        #[arg(long)]
        name: String,
    },

    /// Read or replace the git commit the project is synchronized against.
    ParentCommit {
        #[command(subcommand)]
        action: ParentCommitAction,
    },
}

#[derive(Subcommand, Debug)]
enum ParentCommitAction {
    /// Print the recorded commit.
    Show,
    /// Record a new commit.
    Update {
        /// Commit SHA.
        commit: String,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins, then `--verbose`, then the config file's level.
fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if cli.verbose {
            "debug".to_string()
        } else {
            settings::configured_log_level(&cli.config).unwrap_or_else(|| "warn".to_string())
        };
        EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("warn"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let overrides = Overrides {
        api_key: cli.api_key.clone(),
        project_id: cli.project_id.clone(),
        file_format: cli.file_format,
        default_locale: cli.default_locale.clone(),
        credentials: cli.credentials.clone(),
    };

    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&cli.config, &overrides),
        command => {
            let config = settings::resolve(&cli.config, &overrides)?;
            match command {
                Commands::Merge {
                    ours,
                    theirs,
                    ancestor,
                    result,
                } => cmd_merge(&config, &ours, &theirs, &ancestor, &result),
                Commands::MergeFile {
                    ours,
                    theirs,
                    result,
                    ancestor,
                } => cmd_merge_file(&config, &ours, &theirs, ancestor.as_deref(), &result),
                Commands::Diff { ours, theirs } => cmd_diff(&config, &ours, &theirs),
                Commands::Download { dir } => cmd_download(&config, &dir).await,
                Commands::Upload { dir } => cmd_upload(&config, &dir).await,
                Commands::Setup {
                    name,
                    parent_commit,
                    dir,
                } => cmd_setup(config, &name, &parent_commit, &dir).await,
                Commands::Lookup { name } => cmd_lookup(&config, &name).await,
                Commands::ParentCommit { action } => cmd_parent_commit(&config, action).await,
                Commands::Init { .. } | Commands::Validate => {
                    anyhow::bail!("command does not use the locale settings")
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Updater construction
// ---------------------------------------------------------------------------

/// Updater for local-only commands; its client is never contacted.
fn local_updater(config: &AppConfig) -> Result<LocaleUpdater<PhraseAppClient>> {
    let client = PhraseAppClient::new(&config.phraseapp.api_url, "")
        .context("failed to build HTTP client")?;
    build_updater(config, client)
}

fn remote_updater(config: &AppConfig) -> Result<LocaleUpdater<PhraseAppClient>> {
    let token = config
        .require_access_token()
        .context("an API key is required (--api-key or PHRASEAPP_API_KEY)")?;
    let client = PhraseAppClient::new(&config.phraseapp.api_url, token)
        .context("failed to build PhraseApp client")?;
    build_updater(config, client)
}

fn build_updater(
    config: &AppConfig,
    client: PhraseAppClient,
) -> Result<LocaleUpdater<PhraseAppClient>> {
    let engine = MergeEngine::new(config.locales.delimiter()?);
    Ok(LocaleUpdater::new(
        client,
        config.phraseapp.project_id.clone(),
        config.locales.file_format,
    )
    .with_default_locale(config.locales.default_locale.clone())
    .with_engine(engine))
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# phrasesync configuration
# Command-line flags override every value below.

[phraseapp]
api_url = "https://api.phrase.com/v2"
# Environment variable holding the API access token.
access_token_env = "PHRASEAPP_API_KEY"
# project_id = "your-project-id"

[locales]
# json, yml or yaml
file_format = "json"
default_locale = "en"
path_delimiter = "."

[log]
level = "warn"
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("{}", style::success(&format!("Default configuration written to {}", output.display())));
    println!();
    println!("Next steps:");
    println!("  1. Set project_id, or pass --project-id");
    println!("  2. Export your API token as PHRASEAPP_API_KEY");
    println!(
        "  3. Validate with: phrasesync validate --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path, overrides: &Overrides) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!("{}", style::warn("Config file not found; built-in defaults apply"));
    }
    let config = settings::resolve(config_path, overrides)?;
    println!("{}", style::success("All fields are valid"));

    println!();
    println!("{}", style::header("Configuration summary:"));
    println!("  API URL        : {}", config.phraseapp.api_url);
    println!(
        "  Access token   : {}",
        if config.phraseapp.access_token.is_some() {
            "set"
        } else {
            "NOT SET"
        }
    );
    println!(
        "  Project ID     : {}",
        config.phraseapp.project_id.as_deref().unwrap_or("not set")
    );
    println!("  File format    : {}", config.locales.file_format);
    println!("  Default locale : {}", config.locales.default_locale);
    println!("  Path delimiter : {}", config.locales.path_delimiter);
    println!();
    println!("Configuration is valid.");

    Ok(())
}

fn cmd_merge(
    config: &AppConfig,
    ours: &Path,
    theirs: &Path,
    ancestor: &Path,
    result: &Path,
) -> Result<()> {
    let updater = local_updater(config)?;
    let merged = updater
        .merge_directories(ours, theirs, ancestor, result)
        .context("failed to merge locale directories")?;

    let names: Vec<String> = merged.iter().map(|f| f.filename()).collect();
    println!(
        "{}",
        style::success(&format!(
            "Wrote {} locale file(s) to {}",
            merged.len(),
            result.display()
        ))
    );
    if !names.is_empty() {
        println!("  {}", style::dim(&names.join(", ")));
    }
    Ok(())
}

fn cmd_merge_file(
    config: &AppConfig,
    ours: &Path,
    theirs: &Path,
    ancestor: Option<&Path>,
    result: &Path,
) -> Result<()> {
    let updater = local_updater(config)?;
    updater
        .merge_files(ours, theirs, ancestor, result)
        .context("failed to merge locale files")?;
    println!("{}", style::success(&format!("Wrote {}", result.display())));
    Ok(())
}

fn cmd_diff(config: &AppConfig, ours: &Path, theirs: &Path) -> Result<()> {
    let updater = local_updater(config)?;
    let diffs = updater
        .diff_directories(ours, theirs)
        .context("failed to diff locale directories")?;

    if diffs.is_empty() {
        println!("No differences.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Locale", "Op", "Path", "Ours", "Theirs"]);

    let mut total = 0;
    for locale_diff in &diffs {
        for op in &locale_diff.operations {
            let (before, after) = match op {
                Operation::Add { value, .. } => ("—".to_string(), value.to_string()),
                Operation::Remove { old, .. } => (old.to_string(), "—".to_string()),
                Operation::Change { old, new, .. } => (old.to_string(), new.to_string()),
            };
            table.add_row(vec![
                Cell::new(&locale_diff.locale),
                Cell::new(op.symbol()).fg(style::op_color(op.symbol())),
                Cell::new(op.path()),
                Cell::new(before),
                Cell::new(after),
            ]);
            total += 1;
        }
    }

    println!("{}", table);
    println!();
    println!("{} change(s) across {} locale(s)", total, diffs.len());
    Ok(())
}

async fn cmd_download(config: &AppConfig, dir: &Path) -> Result<()> {
    let updater = remote_updater(config)?;
    let files = updater
        .download_to_directory(dir)
        .await
        .context("failed to download locales")?;
    println!(
        "{}",
        style::success(&format!("Downloaded {} locale(s) to {}", files.len(), dir.display()))
    );
    Ok(())
}

async fn cmd_upload(config: &AppConfig, dir: &Path) -> Result<()> {
    let updater = remote_updater(config)?;
    upload(&updater, dir).await
}

async fn upload(updater: &LocaleUpdater<PhraseAppClient>, dir: &Path) -> Result<()> {
    let outcome = updater
        .upload_directory(dir)
        .await
        .context("failed to upload locales")?;

    for locale in &outcome.created_locales {
        println!("  created locale {}", locale);
    }
    for (locale, upload) in &outcome.uploads {
        println!("  uploaded {} {}", locale, style::dim(&format!("({})", upload.id)));
    }
    match outcome.keys_removed {
        Some(count) => println!("  removed {} key(s) missing from the default locale", count),
        None => println!("{}", style::warn("Key cleanup was rejected by PhraseApp; skipped")),
    }
    println!(
        "{}",
        style::success(&format!("Uploaded {} locale(s)", outcome.uploads.len()))
    );
    Ok(())
}

async fn cmd_setup(config: AppConfig, name: &str, parent_commit: &str, dir: &Path) -> Result<()> {
    let mut updater = remote_updater(&config)?;
    let project_id = updater
        .create_project(name, parent_commit)
        .await
        .with_context(|| format!("failed to create project '{}'", name))?;
    println!(
        "{}",
        style::success(&format!("Created project {} ({})", name, project_id))
    );

    upload(&updater, dir).await?;
    println!("{}", project_id);
    Ok(())
}

async fn cmd_lookup(config: &AppConfig, name: &str) -> Result<()> {
    let updater = remote_updater(config)?;
    let project_id = updater
        .lookup_project(name)
        .await
        .with_context(|| format!("failed to look up project '{}'", name))?;
    println!("{}", project_id);
    Ok(())
}

async fn cmd_parent_commit(config: &AppConfig, action: ParentCommitAction) -> Result<()> {
    let updater = remote_updater(config)?;
    match action {
        ParentCommitAction::Show => {
            let commit = updater
                .read_parent_commit()
                .await
                .context("failed to read parent commit")?;
            println!("{}", commit);
        }
        ParentCommitAction::Update { commit } => {
            updater
                .update_parent_commit(&commit)
                .await
                .context("failed to update parent commit")?;
            println!("{}", style::success(&format!("Parent commit set to {}", commit)));
        }
    }
    Ok(())
}
