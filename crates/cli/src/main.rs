use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use wecom_logger::config;
use wecom_logger::diagnostics::{self, CheckOptions, DiagnosticError};
use wecom_logger::events::{Event, InboundMessage, LauncherType, ReplyEvent};
use wecom_logger::message::{MessageChain, Segment, SourceMeta};
use wecom_logger::plugin::Plugin;
use wecom_logger::sink::MemorySink;

#[derive(Parser)]
#[command(name = "wecom-logger")]
#[command(about = "Reply logger operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: WECOM_LOGGER_CONFIG or ~/.wecom-logger/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Verify the Redis connection: PING, SET/GET/DEL, capped XADD, delayed PING.
    Check {
        /// Redis URL (default: REDIS_URL, then the config's redis.url, then redis://127.0.0.1:16379/0)
        url: Option<String>,

        /// Config file supplying redis settings (default: WECOM_LOGGER_CONFIG or ~/.wecom-logger/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Keep one Redis connection open and PING it periodically.
    Health {
        /// Redis URL (default: REDIS_URL, then the config's redis.url, then redis://127.0.0.1:16379/0)
        url: Option<String>,

        /// Config file supplying redis settings (default: WECOM_LOGGER_CONFIG or ~/.wecom-logger/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Number of checks
        #[arg(long, default_value_t = 6)]
        rounds: usize,

        /// Seconds between checks
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },

    /// Run one inbound message and reply through the plugin and print the logged record.
    Simulate {
        /// Config file path (default: WECOM_LOGGER_CONFIG or ~/.wecom-logger/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// External customer id (sender)
        #[arg(long)]
        customer: String,

        /// Internal agent id (recipient)
        #[arg(long)]
        agent: String,

        /// Inbound message text
        #[arg(long)]
        text: String,

        /// Generated reply text
        #[arg(long)]
        reply: String,

        /// Do not write to Redis; print what would be written
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("wecom-logger {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Check { url, config }) => {
            if !run_check(url, config).await {
                std::process::exit(1);
            }
        }
        Some(Commands::Health {
            url,
            config,
            rounds,
            interval,
        }) => {
            if !run_health(url, config, rounds, interval).await {
                std::process::exit(1);
            }
        }
        Some(Commands::Simulate {
            config,
            customer,
            agent,
            text,
            reply,
            dry_run,
        }) => {
            if let Err(e) = run_simulate(config, customer, agent, text, reply, dry_run).await {
                log::error!("simulate failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(config::default_config_path);
    if wecom_logger::init::init_config_file(&path)? {
        println!("initialized configuration at {}", path.display());
    } else {
        println!("configuration already exists at {}", path.display());
    }
    Ok(())
}

fn print_failure(e: &DiagnosticError) {
    eprintln!("failed: {}", e);
    let hints = e.hints();
    if !hints.is_empty() {
        eprintln!("please check:");
        for (i, hint) in hints.iter().enumerate() {
            eprintln!("  {}. {}", i + 1, hint);
        }
    }
}

/// Redis URL and settings for `check` and `health`, read from the same config as the plugin.
fn check_target(
    url: Option<String>,
    config_path: Option<PathBuf>,
) -> anyhow::Result<(String, config::RedisConfig)> {
    let (config, _) = config::load_config(config_path)?;
    let url = diagnostics::resolve_check_url(url, &config);
    Ok((url, config.redis))
}

async fn run_check(url: Option<String>, config_path: Option<PathBuf>) -> bool {
    let (url, settings) = match check_target(url, config_path) {
        Ok(target) => target,
        Err(e) => {
            log::error!("loading config failed: {:#}", e);
            return false;
        }
    };
    println!("testing redis connection to {}", diagnostics::mask_url(&url));
    let result = diagnostics::check_connection(
        &url,
        &settings,
        &CheckOptions::default(),
        &mut |step: &str| println!("ok: {}", step),
    )
    .await;
    match result {
        Ok(()) => {
            println!("all checks passed");
            true
        }
        Err(e) => {
            print_failure(&e);
            false
        }
    }
}

async fn run_health(
    url: Option<String>,
    config_path: Option<PathBuf>,
    rounds: usize,
    interval: u64,
) -> bool {
    let (url, settings) = match check_target(url, config_path) {
        Ok(target) => target,
        Err(e) => {
            log::error!("loading config failed: {:#}", e);
            return false;
        }
    };
    println!(
        "long-running connection check ({} x {}s) against {}",
        rounds,
        interval,
        diagnostics::mask_url(&url)
    );
    let result = diagnostics::health_loop(
        &url,
        &settings,
        rounds,
        Duration::from_secs(interval),
        &mut |line: &str| println!("{}", line),
    )
    .await;
    match result {
        Ok(()) => {
            println!("long-running connection check passed");
            true
        }
        Err(e) => {
            print_failure(&e);
            false
        }
    }
}

async fn run_simulate(
    config_path: Option<PathBuf>,
    customer: String,
    agent: String,
    text: String,
    reply: String,
    dry_run: bool,
) -> anyhow::Result<()> {
    let (config, _) = config::load_config(config_path)?;
    let memory = Arc::new(MemorySink::new());
    let plugin = if dry_run {
        Plugin::new(config, memory.clone()).await
    } else {
        Plugin::from_config(config).await
    };
    let mut logged_rx = plugin.subscribe();
    let launcher_id = format!("sim-{}", customer);

    let inbound = Event::inbound(InboundMessage {
        launcher_type: LauncherType::Person,
        launcher_id: launcher_id.clone(),
        sender_id: customer.clone(),
        message_chain: MessageChain::new(vec![
            Segment::Source(SourceMeta::with_id(format!("sim-{}", uuid::Uuid::new_v4()))),
            Segment::plain(text),
        ]),
        source_platform_object: Some(serde_json::json!({
            "_internal_recipient": agent,
            "from": customer,
        })),
    });
    let reply = Event::Responded(ReplyEvent {
        launcher_type: LauncherType::Person,
        launcher_id,
        sender_id: customer,
        response_text: reply,
    });

    plugin.on_event(&inbound).await;
    let outcome = plugin.on_event(&reply).await;
    log::debug!(
        "reply dispatched to {} handler(s), default prevented: {}",
        outcome.handled,
        outcome.default_prevented
    );
    let logged = logged_rx.try_recv().context("reply was not logged")?;

    println!("record: {}", logged.record.to_payload()?);
    println!("list:   {}", logged.destinations.list_key);
    println!("stream: {}", logged.destinations.stream_key);

    if dry_run {
        for w in memory.writes().await {
            let fields: Vec<String> = w
                .stream_fields
                .iter()
                .map(|(k, v)| format!("{} {}", k, v))
                .collect();
            println!("would run: RPUSH {} <payload>", w.list_key);
            println!(
                "would run: XADD {} MAXLEN ~ {} * {}",
                w.stream_key,
                w.stream_max_len,
                fields.join(" ")
            );
        }
    }
    if let Some(e) = logged.error {
        anyhow::bail!("writing record: {}", e);
    }
    if !dry_run {
        println!("written to redis");
    }
    Ok(())
}
