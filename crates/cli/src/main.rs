use clap::{Parser, Subcommand};
use lib::history::{FileHistory, HistoryStore};
use lib::message::Message;
use lib::schedule::{ManualFrameClock, Scheduler};
use serde::Deserialize;
use std::io::BufRead;

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Weft CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Reconcile a stream of backend update events (JSONL: {"add": bool, "message": {...}})
    /// into a transcript and print it as JSONL. Reads the file, or stdin when "-".
    Replay {
        /// Event stream file, or "-" for stdin.
        file: std::path::PathBuf,

        /// Hydrate from this conversation's persisted history before replaying.
        #[arg(long, value_name = "ID")]
        conversation: Option<String>,

        /// Persist the reconciled transcript to history under the conversation id
        /// (a generated id when --conversation is not set).
        #[arg(long)]
        save: bool,

        /// Config file path (default: WEFT_CONFIG_PATH or ~/.weft/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Print a conversation's persisted history as JSONL.
    Show {
        /// Conversation id.
        conversation: String,

        /// Config file path (default: WEFT_CONFIG_PATH or ~/.weft/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

/// One line of a replay stream: an update event as the bridges emit them.
#[derive(Debug, Deserialize)]
struct ReplayEvent {
    #[serde(default)]
    add: bool,
    message: Message,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("weft {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Replay {
            file,
            conversation,
            save,
            config,
        }) => {
            if let Err(e) = run_replay(file, conversation, save, config) {
                log::error!("replay failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Show {
            conversation,
            config,
        }) => {
            if let Err(e) = run_show(conversation, config) {
                log::error!("show failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_replay(
    file: std::path::PathBuf,
    conversation: Option<String>,
    save: bool,
    config_path: Option<std::path::PathBuf>,
) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    let history_dir = lib::config::resolve_history_dir(&config, &path);
    let history = FileHistory::new(&history_dir);

    let mut sched = Scheduler::new(ManualFrameClock::new());
    if let Some(id) = &conversation {
        let persisted = history.page(id, 0, config.transcript.page_size)?;
        log::info!("hydrated {} messages for {}", persisted.len(), id);
        sched.store_mut().hydrate(persisted);
    }

    let mut events = 0usize;
    for line in read_lines(&file)? {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: ReplayEvent = serde_json::from_str(&line)
            .map_err(|e| anyhow::anyhow!("event {}: {}", events + 1, e))?;
        sched.enqueue(event.message, event.add);
        events += 1;
    }
    // Urgent events flushed mid-stream on their own; coalesced ones are still
    // waiting on the frame, so fire it now.
    if let Some(token) = sched.clock_mut().take_due() {
        sched.on_frame(token);
    }

    let transcript = sched.snapshot();
    log::info!(
        "{} events reconciled into {} entries",
        events,
        transcript.len()
    );
    for msg in transcript.iter() {
        println!("{}", serde_json::to_string(msg)?);
    }

    if save {
        let id = conversation
            .unwrap_or_else(|| format!("conv-{}", uuid::Uuid::new_v4()));
        history.replace(&id, &transcript)?;
        eprintln!("saved {} entries to {}", transcript.len(), id);
    }

    Ok(())
}

fn run_show(
    conversation: String,
    config_path: Option<std::path::PathBuf>,
) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    let history_dir = lib::config::resolve_history_dir(&config, &path);
    let history = FileHistory::new(&history_dir);
    for msg in history.page(&conversation, 0, config.transcript.page_size)? {
        println!("{}", serde_json::to_string(&msg)?);
    }
    Ok(())
}

fn read_lines(
    file: &std::path::Path,
) -> anyhow::Result<Box<dyn Iterator<Item = std::io::Result<String>>>> {
    if file.as_os_str() == "-" {
        let stdin = std::io::stdin();
        Ok(Box::new(std::io::BufReader::new(stdin).lines()))
    } else {
        let f = std::fs::File::open(file)
            .map_err(|e| anyhow::anyhow!("opening {}: {}", file.display(), e))?;
        Ok(Box::new(std::io::BufReader::new(f).lines()))
    }
}
