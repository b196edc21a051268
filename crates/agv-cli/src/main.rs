//! agv: encrypted document vault CLI
//!
//! Commands:
//!   upload <file> --user <id> --category <c>  - validate, encrypt and store a document
//!   download <id> [--out <path>]              - fetch, decrypt and checksum-verify
//!   delete <id> --user <id>                   - remove a document you own
//!   list --user <id> [--category <c>]         - list documents, newest first
//!   verify <id>                               - audit checksums without the passphrase
//!   orphans --user <id>                       - blobs with no metadata record
//!   status                                    - check the blob backend
//!   config show                               - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use agv_core::config::{expand_tilde, StorageBackend, VaultConfig};
use agv_core::FileObject;
use agv_storage::JsonMetadataStore;
use agv_vault::{Vault, VaultOptions};

type CliVault = Vault<opendal::Operator, JsonMetadataStore>;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "agv",
    version,
    about = "Encrypted document vault",
    long_about = "agv: client-side encrypted storage for KYC, bank statements and land titles"
)]
struct Cli {
    /// Path to agv.toml configuration file
    #[arg(long, short = 'c', env = "AGV_CONFIG", default_value = "~/.config/agv/agv.toml")]
    config: PathBuf,

    /// Log level override (falls back to RUST_LOG, then config)
    #[arg(long, env = "AGV_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate, encrypt and upload a document
    ///
    /// The passphrase is read from AGV_PASSPHRASE or prompted for.
    Upload {
        /// Local file (PDF, JPEG or PNG)
        file: PathBuf,
        /// Owning identity
        #[arg(long, short = 'u', env = "AGV_USER")]
        user: String,
        /// Document category, e.g. kyc or bank_statement
        #[arg(long, short = 't')]
        category: String,
        /// MIME type (default: inferred from the extension)
        #[arg(long)]
        content_type: Option<String>,
        /// Store without encryption
        #[arg(long)]
        plain: bool,
    },

    /// Download, decrypt and verify a document
    Download {
        /// File id returned by upload
        id: String,
        /// Destination path (default: the stored file name in the current dir)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        /// Overwrite an existing destination
        #[arg(long)]
        force: bool,
    },

    /// Delete a document (owner only)
    Delete {
        id: String,
        #[arg(long, short = 'u', env = "AGV_USER")]
        user: String,
    },

    /// List documents owned by a user, newest first
    List {
        #[arg(long, short = 'u', env = "AGV_USER")]
        user: String,
        #[arg(long, short = 't')]
        category: Option<String>,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare stored and recorded checksums (no passphrase needed)
    Verify { id: String },

    /// List blobs under a user's prefix that no record references
    Orphans {
        #[arg(long, short = 'u', env = "AGV_USER")]
        user: String,
    },

    /// Check that the blob backend is reachable
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = VaultConfig::load(&config_path)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log.level);
    init_logging(level, &config.log.format);

    match cli.command {
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
        Commands::Status => cmd_status(&config).await,
        Commands::Upload {
            file,
            user,
            category,
            content_type,
            plain,
        } => {
            let vault = open_vault(&config).await?;
            cmd_upload(&vault, &file, &user, &category, content_type.as_deref(), plain).await
        }
        Commands::Download { id, out, force } => {
            let vault = open_vault(&config).await?;
            cmd_download(&vault, &id, out.as_deref(), force).await
        }
        Commands::Delete { id, user } => {
            let vault = open_vault(&config).await?;
            vault
                .delete_file(&id, &user)
                .await
                .with_context(|| format!("deleting {id}"))?;
            println!("Deleted {id}");
            Ok(())
        }
        Commands::List {
            user,
            category,
            json,
        } => {
            let vault = open_vault(&config).await?;
            cmd_list(&vault, &user, category.as_deref(), json).await
        }
        Commands::Verify { id } => {
            let vault = open_vault(&config).await?;
            cmd_verify(&vault, &id).await
        }
        Commands::Orphans { user } => {
            let vault = open_vault(&config).await?;
            cmd_orphans(&vault, &user).await
        }
    }
}

fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

// ── Vault construction ────────────────────────────────────────────────────────

/// Build the blob operator. S3 credentials come from AWS_ACCESS_KEY_ID and
/// AWS_SECRET_ACCESS_KEY; other backends need none.
fn build_operator(config: &VaultConfig) -> Result<opendal::Operator> {
    let (access_key, secret_key) = if config.storage.backend == StorageBackend::S3 {
        let access_key = std::env::var("AWS_ACCESS_KEY_ID")
            .or_else(|_| std::env::var("AGV_ACCESS_KEY_ID"))
            .context(
                "S3 credentials not set\n\
                 Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY environment variables.",
            )?;
        let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .or_else(|_| std::env::var("AGV_SECRET_ACCESS_KEY"))
            .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
        (access_key, secret_key)
    } else {
        (String::new(), String::new())
    };

    agv_storage::build_from_core_config(&config.storage, &access_key, &secret_key)
        .context("building storage operator")
}

async fn open_vault(config: &VaultConfig) -> Result<CliVault> {
    let op = build_operator(config)?;
    let metadata_path = expand_tilde(&config.metadata.path);
    let metadata = JsonMetadataStore::open(&metadata_path)
        .await
        .with_context(|| format!("opening metadata table: {}", metadata_path.display()))?;

    Ok(Vault::new(op, metadata, VaultOptions::from_config(config)))
}

/// Read the passphrase from AGV_PASSPHRASE, or prompt on the terminal.
fn read_passphrase(confirm: bool) -> Result<SecretString> {
    if let Ok(p) = std::env::var("AGV_PASSPHRASE") {
        if !p.is_empty() {
            return Ok(SecretString::from(p));
        }
    }

    let first = rpassword::prompt_password("Passphrase: ").context("reading passphrase")?;
    if first.is_empty() {
        anyhow::bail!("passphrase must not be empty");
    }
    if confirm {
        let second =
            rpassword::prompt_password("Confirm passphrase: ").context("reading passphrase")?;
        if first != second {
            anyhow::bail!("passphrases do not match");
        }
    }
    Ok(SecretString::from(first))
}

fn infer_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ── `agv upload` ──────────────────────────────────────────────────────────────

async fn cmd_upload(
    vault: &CliVault,
    file: &Path,
    user: &str,
    category: &str,
    content_type: Option<&str>,
    plain: bool,
) -> Result<()> {
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content_type = content_type
        .or_else(|| infer_content_type(file))
        .unwrap_or("application/octet-stream");
    let object = FileObject::new(name, content_type, data);

    let result = if plain {
        vault.upload_file_unencrypted(&object, user, category).await
    } else {
        let passphrase = read_passphrase(true)?;
        let pb = make_spinner("upload");
        pb.set_message(format!("encrypting {}", file.display()));
        let result = vault.upload_file(&object, user, category, &passphrase).await;
        pb.finish_and_clear();
        result
    };
    let receipt = result.with_context(|| format!("uploading {}", file.display()))?;

    println!("Uploaded {}", file.display());
    println!("  id:        {}", receipt.file_id);
    println!("  path:      {}", receipt.storage_path);
    println!("  size:      {}", fmt_bytes(receipt.record.file_size));
    println!("  encrypted: {}", receipt.record.encrypted);
    println!("  sha256:    {}", receipt.record.checksum);
    Ok(())
}

// ── `agv download` ────────────────────────────────────────────────────────────

async fn cmd_download(vault: &CliVault, id: &str, out: Option<&Path>, force: bool) -> Result<()> {
    let record = vault
        .file_record(id)
        .await
        .with_context(|| format!("looking up {id}"))?;

    let passphrase = if record.encrypted {
        read_passphrase(false)?
    } else {
        SecretString::from(String::new())
    };

    let pb = make_spinner("download");
    pb.set_message(format!("fetching {}", record.file_name));
    let result = vault.download_file(id, &passphrase).await;
    pb.finish_and_clear();
    let downloaded = result.with_context(|| format!("downloading {id}"))?;

    let dest = match out {
        Some(path) => path.to_path_buf(),
        None => default_destination(&downloaded.file.name, id),
    };
    if dest.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", dest.display());
    }
    tokio::fs::write(&dest, &downloaded.file.data)
        .await
        .with_context(|| format!("writing {}", dest.display()))?;

    println!("Downloaded {id}");
    println!("  local:  {}", dest.display());
    println!("  size:   {}", fmt_bytes(downloaded.file.size()));
    println!("  sha256: {} (verified)", downloaded.checksum);
    Ok(())
}

/// Local file name for a download: only the final component of the stored name.
fn default_destination(name: &str, id: &str) -> PathBuf {
    match Path::new(name).file_name() {
        Some(base) => PathBuf::from(base),
        _ => PathBuf::from(format!("{id}.download")),
    }
}

// ── `agv list` ────────────────────────────────────────────────────────────────

async fn cmd_list(vault: &CliVault, user: &str, category: Option<&str>, json: bool) -> Result<()> {
    let records = vault
        .list_user_files(user, category)
        .await
        .with_context(|| format!("listing files for {user}"))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&records).context("serializing records")?
        );
        return Ok(());
    }

    if records.is_empty() {
        println!("No files for {user}");
        return Ok(());
    }

    for r in &records {
        println!(
            "{}  {:<16} {:>9}  {}  {}{}",
            r.id,
            r.file_type,
            fmt_bytes(r.file_size),
            r.uploaded_at.format("%Y-%m-%d %H:%M"),
            r.file_name,
            if r.encrypted { "" } else { "  [plain]" },
        );
    }
    println!("{} file(s)", records.len());
    Ok(())
}

// ── `agv verify` ──────────────────────────────────────────────────────────────

async fn cmd_verify(vault: &CliVault, id: &str) -> Result<()> {
    let report = vault
        .verify_file_integrity(id)
        .await
        .with_context(|| format!("verifying {id}"))?;

    println!("File: {}", report.file_id);
    println!("  path:     {}", report.storage_path);
    println!("  recorded: {}", report.recorded_checksum);
    println!("  stored:   {}", report.stored_checksum);

    if !report.matches {
        anyhow::bail!("integrity check failed for {id}");
    }
    println!("  status:   ok");
    Ok(())
}

// ── `agv orphans` ─────────────────────────────────────────────────────────────

async fn cmd_orphans(vault: &CliVault, user: &str) -> Result<()> {
    let orphans = vault
        .find_orphaned_blobs(user)
        .await
        .with_context(|| format!("scanning blobs for {user}"))?;

    if orphans.is_empty() {
        println!("No orphaned blobs under {user}/");
        return Ok(());
    }
    for path in &orphans {
        println!("{path}");
    }
    println!("{} orphaned blob(s)", orphans.len());
    Ok(())
}

// ── `agv status` ──────────────────────────────────────────────────────────────

async fn cmd_status(config: &VaultConfig) -> Result<()> {
    let op = build_operator(config)?;
    let backend = match config.storage.backend {
        StorageBackend::Memory => "memory".to_string(),
        StorageBackend::Fs => format!("fs ({})", expand_tilde(&config.storage.root).display()),
        StorageBackend::S3 => format!("s3 ({}/{})", config.storage.endpoint, config.storage.bucket),
    };

    match agv_storage::check_health(&op).await {
        Ok(health) => {
            println!("storage:  {backend} ok ({} ms)", health.latency.as_millis());
            println!("users:    {}", health.identities);
            if health.loose_objects > 0 {
                println!("warning:  {} object(s) outside any user prefix", health.loose_objects);
            }
            Ok(())
        }
        Err(e) => {
            println!("storage:  {backend} unreachable");
            Err(e)
        }
    }
}

// ── `agv config show` ─────────────────────────────────────────────────────────

fn cmd_config_show(config: &VaultConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
