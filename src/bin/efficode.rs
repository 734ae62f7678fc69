//! Efficode CLI binary.
//!
//! # Commands
//!
//! - `run` - Autonomous exploration between a questioner and an answerer
//! - `chat` - Relay operator messages through both peers
//! - `encode` - Build a packet and print its wire form
//! - `decode` - Parse (and decompress) a wire string to JSON

use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use efficode::{
    CancelFlag, Config, Conversation, FileSink, HttpCompletion, OpCode, Packet, PacketCodec,
    ParamValue, Peer, PeerRole, Persona, SessionOutcome, VERSION,
};

#[derive(Parser)]
#[command(name = "efficode")]
#[command(version = VERSION)]
#[command(about = "Efficode - text-framed packets for conversing LLM agents", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/efficode/config.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an exploration on a topic
    Run {
        /// Topic (default from config)
        #[arg(short, long)]
        topic: Option<String>,

        /// Round budget (default from config)
        #[arg(short, long)]
        rounds: Option<usize>,

        /// Questioner name
        #[arg(long, default_value = "Sage")]
        questioner: String,

        /// Answerer name
        #[arg(long, default_value = "Lens")]
        answerer: String,

        /// Transcript directory (default from config)
        #[arg(long)]
        logs_dir: Option<PathBuf>,
    },

    /// Interactive relay; type `exit` or `quit` to finish
    Chat {
        /// Questioner name
        #[arg(long, default_value = "Sage")]
        questioner: String,

        /// Answerer name
        #[arg(long, default_value = "Lens")]
        answerer: String,

        /// Transcript directory (default from config)
        #[arg(long)]
        logs_dir: Option<PathBuf>,
    },

    /// Encode a packet to wire format
    Encode {
        /// Opcode wire name (DID, REQ, DATA, ACK, ERROR)
        #[arg(short, long, default_value = "DATA")]
        op: String,

        /// Parameters as key=value (JSON objects/arrays are kept structured)
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Content parameter (or - for stdin)
        content: Option<String>,

        /// Compress content when worthwhile
        #[arg(long)]
        compress: bool,

        /// Add content metadata and semantic hints, then compress
        #[arg(long, conflicts_with = "compress")]
        optimize: bool,
    },

    /// Decode a wire string to JSON
    Decode {
        /// Wire input (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Sender recorded on the decoded packet
        #[arg(short, long, default_value = "operator")]
        sender: String,

        /// Keep compressed content as-is
        #[arg(long)]
        raw: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Run {
            topic,
            rounds,
            questioner,
            answerer,
            logs_dir,
        } => cmd_run(config, topic, rounds, questioner, answerer, logs_dir),

        Commands::Chat {
            questioner,
            answerer,
            logs_dir,
        } => cmd_chat(config, questioner, answerer, logs_dir),

        Commands::Encode {
            op,
            params,
            content,
            compress,
            optimize,
        } => cmd_encode(&config, &op, &params, content, compress, optimize),

        Commands::Decode {
            input,
            file,
            sender,
            raw,
        } => cmd_decode(&config, input, file, &sender, raw),
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let config = match path.or_else(|| Config::default_path().filter(|p| p.exists())) {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            Config::from_file(path)?
        },
        None => Config::default(),
    };
    Ok(config.apply_env())
}

fn cmd_run(
    mut config: Config,
    topic: Option<String>,
    rounds: Option<usize>,
    questioner: String,
    answerer: String,
    logs_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(rounds) = rounds {
        config.conversation.max_rounds = rounds;
    }
    if let Some(dir) = logs_dir {
        config.transcript.logs_dir = dir;
    }

    let cancel = CancelFlag::new();
    let notice = "Interrupted, finishing after the current turn";
    let outcome = run_interruptible(cancel.clone(), notice, move || {
        let conversation = build_conversation(&config, &questioner, &answerer, cancel)?;
        println!(
            "{} <-> {}: {}",
            conversation.questioner().name(),
            conversation.answerer().name(),
            config.conversation.seed_message(topic.as_deref())
        );
        Ok(conversation.run(topic.as_deref()))
    })?;

    print_transcript(&outcome);
    report(&outcome)
}

fn cmd_chat(
    mut config: Config,
    questioner: String,
    answerer: String,
    logs_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(dir) = logs_dir {
        config.transcript.logs_dir = dir;
    }

    let cancel = CancelFlag::new();
    let notice = "Interrupted, press Enter to save and exit";
    let outcome = run_interruptible(cancel.clone(), notice, move || {
        let mut conversation =
            build_conversation(&config, &questioner, &answerer, cancel.clone())?;
        println!("Type a message, or `exit` to finish.");

        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();
        loop {
            print!("> ");
            io::stdout().flush()?;
            let Some(line) = lines.next().transpose()? else {
                break;
            };
            if cancel.is_cancelled() {
                break;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
                break;
            }

            match conversation.relay(line) {
                Ok(turns) => {
                    for turn in turns.iter().skip(1) {
                        println!("\n{}: {}\n", turn.sender, turn.display_content());
                    }
                },
                Err(e) => {
                    eprintln!("Conversation ended: {e}");
                    break;
                },
            }
        }
        Ok(conversation.finish())
    })?;

    report(&outcome)
}

/// Run a session on a blocking thread while Ctrl-C sets `cancel`.
///
/// The blocking HTTP client must be created off the async runtime, so the
/// whole session (client included) is built inside `session`.
fn run_interruptible<F>(
    cancel: CancelFlag,
    notice: &'static str,
    session: F,
) -> anyhow::Result<SessionOutcome>
where
    F: FnOnce() -> anyhow::Result<SessionOutcome> + Send + 'static,
{
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let mut handle = tokio::task::spawn_blocking(session);

        let joined = tokio::select! {
            joined = &mut handle => joined,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n{notice}");
                cancel.cancel();
                handle.await
            }
        };

        match joined {
            Ok(outcome) => outcome,
            Err(e) => Err(anyhow::anyhow!("session task failed: {}", e)),
        }
    })
}

fn build_conversation(
    config: &Config,
    questioner: &str,
    answerer: &str,
    cancel: CancelFlag,
) -> anyhow::Result<Conversation> {
    let backend = Arc::new(HttpCompletion::from_config(&config.completion)?);
    let codec = PacketCodec::new(config.compression.selector());

    let make_peer = |name: &str, role: PeerRole| {
        Peer::new(Persona::new(name, role), backend.clone())
            .with_codec(codec.clone())
            .with_memory_window(config.conversation.memory_window)
    };

    Ok(Conversation::new(
        make_peer(questioner, PeerRole::Questioner),
        make_peer(answerer, PeerRole::Answerer),
        FileSink::new(&config.transcript.logs_dir),
    )
    .with_config(&config.conversation)
    .with_write_timeout(config.transcript.write_timeout())
    .with_codec(codec)
    .with_cancel_flag(cancel))
}

fn print_transcript(outcome: &SessionOutcome) {
    for turn in outcome.transcript.iter() {
        println!("\n{}: {}", turn.sender, turn.display_content());
    }
}

fn report(outcome: &SessionOutcome) -> anyhow::Result<()> {
    match outcome.abort_reason {
        Some(reason) => eprintln!(
            "\nSession {} aborted ({}) after {} turns",
            outcome.session_id,
            reason,
            outcome.transcript.len()
        ),
        None => eprintln!(
            "\nSession {} finished with {} turns",
            outcome.session_id,
            outcome.transcript.len()
        ),
    }
    if !outcome.persisted {
        anyhow::bail!("transcript was not saved");
    }
    Ok(())
}

fn cmd_encode(
    config: &Config,
    op: &str,
    params: &[String],
    content: Option<String>,
    compress: bool,
    optimize: bool,
) -> anyhow::Result<()> {
    let op_code = OpCode::ALL
        .into_iter()
        .find(|o| o.wire_name().eq_ignore_ascii_case(op))
        .ok_or_else(|| anyhow::anyhow!("Unknown opcode: {}. Use: DID, REQ, DATA, ACK, ERROR", op))?;

    let mut packet = Packet::new(op_code, &config.conversation.operator);
    for pair in params {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Parameter must be key=value: {}", pair))?;
        packet = packet.with_param(key, param_value(value));
    }
    if let Some(content) = content {
        let content = if content == "-" {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        } else {
            content
        };
        packet = packet.with_param("content", param_value(&content));
    }

    let codec = PacketCodec::new(config.compression.selector());
    let wire = if optimize {
        codec.encode(&codec.optimize(packet))
    } else if compress {
        codec.encode_compressed(packet)
    } else {
        codec.encode(&packet)
    };
    println!("{wire}");
    Ok(())
}

fn param_value(raw: &str) -> ParamValue {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) if value.is_object() || value.is_array() => ParamValue::Structured(value),
        _ => ParamValue::Text(raw.to_string()),
    }
}

fn cmd_decode(
    config: &Config,
    input: Option<String>,
    file: Option<PathBuf>,
    sender: &str,
    raw: bool,
) -> anyhow::Result<()> {
    let wire = read_input(input, file)?;
    let codec = PacketCodec::new(config.compression.selector());
    let packet = if raw {
        efficode::protocol::wire::parse(wire.trim_end(), sender)?
    } else {
        codec.decode(wire.trim_end(), sender)?
    };
    println!("{}", serde_json::to_string_pretty(&packet)?);
    Ok(())
}

fn read_input(input: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    if let Some(path) = file {
        Ok(std::fs::read_to_string(path)?)
    } else if let Some(s) = input {
        if s == "-" {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        } else {
            Ok(s)
        }
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    }
}
