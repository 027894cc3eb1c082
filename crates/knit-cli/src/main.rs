//! Knit CLI - a small git client that clones over smart HTTP.

use clap::{Parser, Subcommand};
use knit_git::ClientConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::Repo;

/// Knit - clone and inspect git repositories
#[derive(Parser, Debug)]
#[command(name = "knit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the git directory
    #[arg(long, default_value = ".git", global = true)]
    git_dir: PathBuf,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 5, global = true)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty repository
    Init {
        /// Directory to initialize (default: current directory)
        path: Option<PathBuf>,
    },

    /// Show the type or content of an object
    CatFile {
        /// Pretty-print the content
        #[arg(short, conflicts_with = "type_only", required_unless_present = "type_only")]
        pretty: bool,
        /// Show the object type
        #[arg(short = 't')]
        type_only: bool,
        /// Object id or ref name
        object: String,
    },

    /// Compute the id of a file as a blob
    HashObject {
        /// Write the blob into the object database
        #[arg(short)]
        write: bool,
        file: PathBuf,
    },

    /// List the entries of a tree
    LsTree {
        /// Only print entry names
        #[arg(long)]
        name_only: bool,
        /// Tree, commit, or ref name
        tree: String,
    },

    /// Store the working directory as a tree
    WriteTree,

    /// Create a commit object
    CommitTree {
        tree: String,
        /// Parent commit (repeatable)
        #[arg(short, action = clap::ArgAction::Append)]
        parent: Vec<String>,
        /// Commit message
        #[arg(short)]
        message: String,
        /// Author and committer identity
        #[arg(long, default_value = "Knit <knit@localhost>")]
        author: String,
    },

    /// List the refs of a remote repository
    LsRemote { url: String },

    /// Clone a repository over smart HTTP
    Clone {
        url: String,
        /// Destination directory
        dir: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("knit={log_level},knit_git={log_level},knit_storage={log_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let repo = Repo::new(&cli.git_dir);
    let config = ClientConfig {
        timeout: Duration::from_secs(cli.timeout),
        ..ClientConfig::default()
    };
    let mut out = std::io::stdout().lock();

    let result = match cli.command {
        Commands::Init { path } => {
            commands::init(&path.unwrap_or_else(|| PathBuf::from(".")), &mut out)
        }
        Commands::CatFile {
            pretty: true,
            object,
            ..
        } => commands::cat_file_pretty(&repo, &object, &mut out),
        Commands::CatFile {
            type_only, object, ..
        } => {
            // clap requires exactly one of -p and -t
            debug_assert!(type_only);
            commands::cat_file_type(&repo, &object, &mut out)
        }
        Commands::HashObject { write, file } => {
            commands::hash_object(&repo, &file, write, &mut out)
        }
        Commands::LsTree { name_only, tree } => {
            commands::ls_tree(&repo, &tree, name_only, &mut out)
        }
        Commands::WriteTree => commands::write_tree_cmd(&repo, &mut out),
        Commands::CommitTree {
            tree,
            parent,
            message,
            author,
        } => commands::commit_tree(&repo, &tree, &parent, &message, &author, &mut out),
        Commands::LsRemote { url } => commands::ls_remote(&url, &config, &mut out),
        Commands::Clone { url, dir } => commands::clone(&url, dir.as_deref(), &config, &mut out),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}
