use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::daemon::DaemonAction;
use commands::fs::FsAction;
use commands::Session;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "toolwarden",
    version,
    about = "Gatekeeper for filesystem and terminal tools driven by an untrusted caller"
)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Init {
        #[arg(long)]
        path: Option<PathBuf>,
        #[arg(long)]
        force: bool,
    },
    Config {
        #[arg(long)]
        print: bool,
    },
    /// List the allowed root directories.
    Roots,
    /// Show how a path would be authorized.
    CheckPath {
        path: String,
        /// Do not follow a symlink in the last position.
        #[arg(long)]
        entry: bool,
    },
    /// Show whether a command line would be blocked.
    CheckCommand { command: String },
    /// Run a command line inside an allowed directory.
    Exec {
        command: String,
        #[arg(long)]
        cwd: Option<String>,
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Print the process working directory and whether it is allowed.
    Pwd,
    /// Print the environment with sensitive values masked.
    Env,
    Fs {
        #[command(subcommand)]
        action: FsCommand,
    },
    Daemon {
        #[command(subcommand)]
        action: DaemonCommand,
    },
}

#[derive(Subcommand, Debug)]
enum FsCommand {
    Read {
        path: String,
        #[arg(long, default_value = "utf-8")]
        encoding: String,
    },
    Write {
        path: String,
        content: String,
        #[arg(long)]
        no_create_dirs: bool,
    },
    List {
        #[arg(default_value = ".")]
        path: String,
        #[arg(long, short)]
        all: bool,
        #[arg(long, short)]
        recursive: bool,
    },
    Mkdir {
        path: String,
        #[arg(long)]
        no_parents: bool,
    },
    Rm {
        path: String,
        #[arg(long, short)]
        recursive: bool,
    },
    Info {
        path: String,
    },
}

#[derive(Subcommand, Debug)]
enum DaemonCommand {
    Start {
        #[arg(long)]
        socket: Option<PathBuf>,
        #[arg(long)]
        pid: Option<PathBuf>,
    },
    Stop {
        #[arg(long)]
        pid: Option<PathBuf>,
    },
    Ping {
        #[arg(long)]
        socket: Option<PathBuf>,
    },
    Status {
        #[arg(long)]
        socket: Option<PathBuf>,
    },
    SocketPath,
    PidPath,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path, force } => return commands::config::init(path, force),
        Commands::Daemon { action } => {
            let action = match action {
                DaemonCommand::Start { socket, pid } => DaemonAction::Start {
                    socket,
                    pid,
                    config: cli.config,
                },
                DaemonCommand::Stop { pid } => DaemonAction::Stop { pid },
                DaemonCommand::Ping { socket } => DaemonAction::Ping { socket },
                DaemonCommand::Status { socket } => DaemonAction::Status {
                    socket,
                    json: cli.json,
                },
                DaemonCommand::SocketPath => DaemonAction::SocketPath,
                DaemonCommand::PidPath => DaemonAction::PidPath,
            };
            return commands::daemon::execute(action);
        }
        _ => {}
    }

    let config = commands::load_config(cli.config)?;
    toolwarden_core::logging::init(&config.logging.level);

    if let Commands::Config { print } = cli.command {
        if print {
            commands::config::print_effective(&config)?;
        }
        return Ok(());
    }

    let session = Session::open(config, cli.json)?;
    match cli.command {
        Commands::Roots => commands::check::roots(&session),
        Commands::CheckPath { path, entry } => commands::check::check_path(&session, &path, entry),
        Commands::CheckCommand { command } => commands::check::check_command(&session, &command),
        Commands::Exec {
            command,
            cwd,
            timeout,
        } => commands::exec::execute(&session, &command, cwd.as_deref(), timeout),
        Commands::Pwd => commands::exec::current_directory(&session),
        Commands::Env => commands::exec::environment(&session),
        Commands::Fs { action } => {
            let action = match action {
                FsCommand::Read { path, encoding } => FsAction::Read { path, encoding },
                FsCommand::Write {
                    path,
                    content,
                    no_create_dirs,
                } => FsAction::Write {
                    path,
                    content,
                    no_create_dirs,
                },
                FsCommand::List {
                    path,
                    all,
                    recursive,
                } => FsAction::List {
                    path,
                    all,
                    recursive,
                },
                FsCommand::Mkdir { path, no_parents } => FsAction::Mkdir { path, no_parents },
                FsCommand::Rm { path, recursive } => FsAction::Rm { path, recursive },
                FsCommand::Info { path } => FsAction::Info { path },
            };
            commands::fs::execute(&session, action)
        }
        Commands::Init { .. } | Commands::Config { .. } | Commands::Daemon { .. } => Ok(()),
    }
}
