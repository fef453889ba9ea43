//! drivekit CLI - Command line access to a Google Drive account.
//!
//! Thin wrapper over the file operations facade: every subcommand is one
//! facade call (plus a name lookup when a parent folder is given).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use drivekit_common::Error;
use drivekit_storage::gdrive::{self, CodePrompt, ConsolePrompt, DriveClient, DriveConfig};
use drivekit_storage::{ByteStream, DriveFiles, RemoteFile};

#[derive(Parser)]
#[command(name = "drivekit")]
#[command(about = "drivekit - Google Drive file operations")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Application secret downloaded from the cloud console.
    #[arg(long, global = true)]
    client_secret: Option<PathBuf>,

    /// Token cache written after the first authorization.
    #[arg(long, global = true)]
    token_cache: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize and write the token cache.
    Auth {
        /// Also open the authorization URL in a browser.
        #[arg(long)]
        open: bool,
    },

    /// List files.
    Ls {
        /// Folder name to list (default: everything visible).
        #[arg(short, long)]
        parent: Option<String>,

        /// Stop after at least this many files.
        #[arg(short, long, default_value_t = 100, conflicts_with = "all")]
        max: i64,

        /// List the whole folder (requires --parent).
        #[arg(short, long)]
        all: bool,
    },

    /// Find a file by exact name.
    Find {
        name: String,

        /// Restrict the search to this folder name.
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Download a file by ID.
    Get {
        id: String,

        /// Destination file path.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Create a folder.
    Mkdir {
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Parent folder name.
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Delete a file or folder by ID.
    Rm { id: String },

    /// Upload a local file.
    Put {
        source: PathBuf,

        /// Remote name (default: the source file name).
        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Parent folder name.
        #[arg(short, long)]
        parent: Option<String>,
    },
}

/// Prints the URL, opens it in a browser, then reads the code from stdin.
struct BrowserPrompt;

impl CodePrompt for BrowserPrompt {
    fn prompt(&mut self, auth_url: &str) -> drivekit_common::Result<String> {
        if let Err(e) = open::that(auth_url) {
            tracing::warn!(error = %e, "Could not open a browser");
        }
        ConsolePrompt.prompt(auth_url)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = build_config(cli.client_secret, cli.token_cache);

    match cli.command {
        Commands::Auth { open } => cmd_auth(&config, open).await,

        Commands::Ls { parent, max, all } => {
            let files = open_drive(&config).await?;
            cmd_ls(&files, parent.as_deref(), max, all).await
        }

        Commands::Find { name, parent } => {
            let files = open_drive(&config).await?;
            cmd_find(&files, &name, parent.as_deref()).await
        }

        Commands::Get { id, out } => {
            let files = open_drive(&config).await?;
            cmd_get(&files, &id, &out).await
        }

        Commands::Mkdir {
            name,
            description,
            parent,
        } => {
            let files = open_drive(&config).await?;
            cmd_mkdir(&files, &name, &description, parent.as_deref()).await
        }

        Commands::Rm { id } => {
            let files = open_drive(&config).await?;
            cmd_rm(&files, &id).await
        }

        Commands::Put {
            source,
            name,
            description,
            parent,
        } => {
            let files = open_drive(&config).await?;
            cmd_put(&files, &source, name, &description, parent.as_deref()).await
        }
    }
}

fn build_config(client_secret: Option<PathBuf>, token_cache: Option<PathBuf>) -> DriveConfig {
    let mut config = DriveConfig::default();
    if let Some(path) = client_secret {
        config.client_secret_path = path;
    }
    if let Some(path) = token_cache {
        config.token_cache_path = path;
    }
    config
}

async fn open_drive(config: &DriveConfig) -> Result<DriveFiles<DriveClient>> {
    DriveFiles::connect(config)
        .await
        .context("Unable to get client from config file")
}

/// Resolve an optional folder name to its resource.
async fn resolve_parent(
    files: &DriveFiles<DriveClient>,
    parent: Option<&str>,
) -> Result<Option<RemoteFile>> {
    let Some(name) = parent else {
        return Ok(None);
    };

    let folder = files
        .find_by_name(name, None)
        .await
        .context("Failed to look up parent folder")?
        .with_context(|| format!("Parent folder not found: {}", name))?;

    Ok(Some(folder))
}

fn print_file(file: &RemoteFile) {
    if file.is_folder() {
        println!("  [DIR]  {}  {}/", file.id, file.name);
    } else {
        let size = file
            .size_bytes()
            .map(|s| format!("{} bytes", s))
            .unwrap_or_default();
        println!("  [FILE] {}  {} ({})", file.id, file.name, size);
    }
}

async fn cmd_auth(config: &DriveConfig, open: bool) -> Result<()> {
    info!(
        "Authorizing with {}",
        config.client_secret_path.display()
    );

    let tokens = if open {
        gdrive::authorize(config, &mut BrowserPrompt).await
    } else {
        gdrive::authorize(config, &mut ConsolePrompt).await
    }
    .context("Authorization failed")?;

    let credential = tokens.credential().await;
    println!("Authorized.");
    println!("  Token cache: {}", config.token_cache_path.display());
    if let Some(expiry) = credential.expiry {
        println!("  Access token expires: {}", expiry);
    }

    Ok(())
}

async fn cmd_ls(
    files: &DriveFiles<DriveClient>,
    parent: Option<&str>,
    max: i64,
    all: bool,
) -> Result<()> {
    let folder = resolve_parent(files, parent).await?;

    let listing = if all {
        files.list_all_files(folder.as_ref()).await
    } else {
        files.list_files(folder.as_ref(), max).await
    }
    .context("Failed to list files")?;

    if listing.is_empty() {
        println!("No files found.");
    } else {
        println!("{} file(s):", listing.len());
        for file in &listing {
            print_file(file);
        }
    }

    Ok(())
}

async fn cmd_find(files: &DriveFiles<DriveClient>, name: &str, parent: Option<&str>) -> Result<()> {
    let folder = resolve_parent(files, parent).await?;

    match files
        .find_by_name(name, folder.as_ref())
        .await
        .context("Failed to find file")?
    {
        Some(file) => print_file(&file),
        None => println!("No file named {}", name),
    }

    Ok(())
}

async fn cmd_get(files: &DriveFiles<DriveClient>, id: &str, out: &Path) -> Result<()> {
    info!("Downloading {} to {}", id, out.display());

    let content = files.download(id).await.context("Failed to download file")?;

    tokio::fs::write(out, &content)
        .await
        .context("Failed to write output file")?;

    println!("Downloaded {} ({} bytes)", out.display(), content.len());
    Ok(())
}

async fn cmd_mkdir(
    files: &DriveFiles<DriveClient>,
    name: &str,
    description: &str,
    parent: Option<&str>,
) -> Result<()> {
    let folder = resolve_parent(files, parent).await?;

    let created = files.mkdir(name, description, folder.as_ref()).await?;

    println!("Folder created: {} ({})", created.name, created.id);
    Ok(())
}

async fn cmd_rm(files: &DriveFiles<DriveClient>, id: &str) -> Result<()> {
    files.delete(id).await?;
    println!("Deleted: {}", id);
    Ok(())
}

async fn cmd_put(
    files: &DriveFiles<DriveClient>,
    source: &Path,
    name: Option<String>,
    description: &str,
    parent: Option<&str>,
) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("Source has no file name; pass --name")?,
    };

    let folder = resolve_parent(files, parent).await?;

    let file = tokio::fs::File::open(source)
        .await
        .with_context(|| format!("Failed to open {}", source.display()))?;
    let content: ByteStream = Box::pin(
        ReaderStream::new(file)
            .map_ok(|chunk| chunk.to_vec())
            .map_err(Error::from),
    );

    info!("Uploading {} as {}", source.display(), name);
    let uploaded = files
        .upload(&name, description, content, folder.as_ref())
        .await
        .context("Failed to upload file")?;

    println!("Uploaded: {} ({})", uploaded.name, uploaded.id);
    if let Some(size) = uploaded.size_bytes() {
        println!("  Size: {} bytes", size);
    }
    if let Some(link) = &uploaded.web_content_link {
        println!("  Link: {}", link);
    }
    Ok(())
}
