mod check_commands;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tokio::task::JoinError,
    tokio_util::sync::CancellationToken,
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    lectern_config::LecternConfig,
    lectern_gateway::{GatewayState, ObserverHub},
    lectern_relay::{RelayConfig, SessionController},
    lectern_sessions::TokioClock,
};

#[derive(Parser)]
#[command(name = "lectern", about = "Lectern: instructor to students Telegram relay")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery in ./ and the user config dir).
    #[arg(long, global = true, env = "LECTERN_CONFIG")]
    config: Option<PathBuf>,

    /// Address the observer gateway binds to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,

    /// Port the observer gateway listens on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Run the bot and the observer gateway (default).
    Run,
    /// Validate the configuration and exit.
    CheckConfig,
}

/// Initialise tracing with an env filter and either human or JSON output.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<(LecternConfig, Option<PathBuf>)> {
    match cli.config {
        Some(ref path) => {
            let config = lectern_config::load_config(path)?;
            Ok((config, Some(path.clone())))
        },
        None => Ok(lectern_config::discover_and_load()),
    }
}

/// Apply command-line overrides on top of the loaded config.
fn apply_cli_overrides(cli: &Cli, config: &mut LecternConfig) {
    if let Some(ref bind) = cli.bind {
        config.gateway.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
}

fn relay_config(config: &LecternConfig, bot_username: Option<&str>) -> RelayConfig {
    RelayConfig {
        instructor: config.instructor.username.clone(),
        session_ttl: config.session.ttl(),
        max_in_flight: config.broadcast.limit(),
        bot_username: bot_username.map(str::to_owned),
    }
}

/// Log how a background task ended after shutdown. Returns `false` if it
/// failed or panicked.
fn log_shutdown(task: &'static str, result: Result<anyhow::Result<()>, JoinError>) -> bool {
    let failure = match result {
        Ok(Ok(())) => return true,
        Ok(Err(e)) => e,
        Err(e) => anyhow::Error::new(e),
    };
    warn!(task, error = %failure, "task failed during shutdown");
    false
}

async fn run(config: LecternConfig, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let report = lectern_config::validate(&config, config_path.as_deref());
    for diagnostic in &report.diagnostics {
        match diagnostic.severity {
            lectern_config::Severity::Error => error!("{diagnostic}"),
            lectern_config::Severity::Warning => warn!("{diagnostic}"),
            lectern_config::Severity::Info => info!("{diagnostic}"),
        }
    }
    if report.has_errors() {
        anyhow::bail!("invalid configuration; run `lectern check-config` for details");
    }

    let bot = lectern_telegram::connect(&config.telegram)
        .await
        .context("failed to connect to Telegram")?;

    let hub = Arc::new(ObserverHub::new());
    let controller = Arc::new(SessionController::new(
        relay_config(&config, bot.username()),
        Arc::new(TokioClock::current()?),
        Arc::new(bot.outbound()),
        hub.clone(),
    )?);
    info!(
        instructor = %config.instructor.username,
        ttl_secs = config.session.ttl_secs,
        "relay ready"
    );

    let cancel = CancellationToken::new();
    let gateway_state = GatewayState::new(hub, controller.registry().clone());
    let mut gateway = tokio::spawn({
        let cancel = cancel.clone();
        let bind = config.gateway.bind.clone();
        let port = config.gateway.port;
        async move { lectern_gateway::start_gateway(&bind, port, gateway_state, cancel).await }
    });
    let mut polling = bot.spawn_polling(controller, cancel.clone());

    let outcome = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            res.context("failed to listen for ctrl-c")
        },
        res = &mut polling => match res {
            Ok(()) => Err(anyhow::anyhow!("telegram polling stopped")),
            Err(e) => Err(e).context("polling task failed"),
        },
        res = &mut gateway => match res {
            Ok(Ok(())) => Err(anyhow::anyhow!("observer gateway stopped")),
            Ok(Err(e)) => Err(e.context("observer gateway failed")),
            Err(e) => Err(e).context("gateway task failed"),
        },
    };

    cancel.cancel();
    if !polling.is_finished() {
        log_shutdown("telegram polling", polling.await.map(Ok));
    }
    if !gateway.is_finished() {
        log_shutdown("observer gateway", gateway.await);
    }
    info!("lectern stopped");
    outcome
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "lectern starting");

    let (mut config, config_path) = load_config(&cli)?;
    apply_cli_overrides(&cli, &mut config);

    match cli.command {
        None | Some(Commands::Run) => run(config, config_path).await,
        Some(Commands::CheckConfig) => check_commands::check_config(&config, config_path.as_deref()),
    }
}
