//! Wiring & DI. Entry point: parse CLI, bootstrap adapters, inject into the orchestrator.
//! No business logic here.

use clap::Parser;
use feedpilot::adapters::ai::{MockGenerator, OpenAiAdapter};
use feedpilot::adapters::cli::{Cli, Command};
use feedpilot::adapters::media::HttpMedia;
use feedpilot::adapters::persistence::{CsvArchive, ReadOnlyState, StateJson};
use feedpilot::adapters::web::{self, AppState};
use feedpilot::adapters::x::{DryRunPublisher, XApi, XFeed, XPublisher};
use feedpilot::ports::{
    ArchivePort, FeedPort, GeneratorPort, MediaPort, PublisherPort, RunTrigger, StatePort,
};
use feedpilot::shared::config::AppConfig;
use feedpilot::shared::logging;
use feedpilot::usecases::{AutoSchedule, Orchestrator, OrchestratorSettings, Pipeline};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

/// Exit code for bad input or configuration.
const EXIT_USAGE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_USAGE)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| ".".into());
    let env_loaded = dotenv::dotenv();
    let cfg = AppConfig::load()?;

    if let Err(e) = logging::init(&cfg.log_path()) {
        warn!(path = %cfg.log_path().display(), error = %e, "log file unavailable, logging to stderr only");
    }
    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    match cli.command {
        Command::Check { dry_run } => Ok(check(&cfg, dry_run)),
        Command::Status => {
            let state = StateJson::new(cfg.state_path()).load().await;
            println!("{}", serde_json::to_string_pretty(&state)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Run(args) => {
            let input = match args.to_input() {
                Ok(input) => input,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return Ok(ExitCode::from(e.exit_code()));
                }
            };
            require_credentials(&cfg, args.dry_run)?;
            let orchestrator = build_orchestrator(&cfg, args.dry_run)?;
            match orchestrator.trigger(input, args.force).await {
                Ok(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    Ok(ExitCode::from(result.exit_code()))
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    Ok(ExitCode::from(e.exit_code()))
                }
            }
        }
        Command::Serve { port } => {
            require_credentials(&cfg, false)?;
            let orchestrator: Arc<dyn RunTrigger> = Arc::new(build_orchestrator(&cfg, false)?);
            let mut cfg = cfg;
            if port.is_some() {
                cfg.server_port = port;
            }
            let state = AppState::new(orchestrator, cfg.log_path());
            web::serve(&cfg.server_addr(), state).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn require_credentials(cfg: &AppConfig, dry_run: bool) -> anyhow::Result<()> {
    let missing = cfg.missing_credentials(dry_run);
    if !missing.is_empty() {
        anyhow::bail!("Set {} (env or .env)", missing.join(", "));
    }
    Ok(())
}

fn check(cfg: &AppConfig, dry_run: bool) -> ExitCode {
    println!("data dir:        {}", cfg.data_dir_or_default().display());
    println!("min interval:    {} min", cfg.min_interval().num_minutes());
    match cfg.daily_post_limit {
        Some(limit) => println!("daily post cap:  {}", limit),
        None => println!("daily post cap:  none"),
    }
    println!("X API:           {}", cfg.x_api_base_or_default());
    if cfg.is_ai_configured() {
        println!("AI:              {} ({})", cfg.ai_model_or_default(), cfg.ai_api_url_or_default());
    } else {
        println!("AI:              not configured, mock generator in use");
    }
    let targets = cfg.targets_list();
    println!(
        "targets:         {}",
        if targets.is_empty() { "none".to_string() } else { targets.join(", ") }
    );

    let missing = cfg.missing_credentials(dry_run);
    if missing.is_empty() {
        println!("configuration OK");
        ExitCode::SUCCESS
    } else {
        println!("missing: {}", missing.join(", "));
        ExitCode::from(EXIT_USAGE)
    }
}

fn build_orchestrator(cfg: &AppConfig, dry_run: bool) -> anyhow::Result<Orchestrator> {
    let retry = cfg.retry_policy();
    let timeout = cfg.http_timeout();
    let thread_parts = cfg.thread_parts_or_default();

    // --- Platform ---
    let read_api = XApi::new(
        cfg.x_api_base_or_default(),
        cfg.x_read_token().unwrap_or_default(),
        timeout,
    )?;
    let feed: Arc<dyn FeedPort> = Arc::new(XFeed::new(read_api).with_retry(retry));

    let publisher: Arc<dyn PublisherPort> = if dry_run {
        info!("dry run: nothing will be published or persisted");
        Arc::new(DryRunPublisher::new())
    } else {
        let write_api = XApi::new(
            cfg.x_api_base_or_default(),
            cfg.x_access_token().unwrap_or_default(),
            timeout,
        )?;
        Arc::new(
            XPublisher::new(write_api)
                .with_min_delay(cfg.publish_delay())
                .with_retry(retry),
        )
    };

    // --- Content generator ---
    let generator: Arc<dyn GeneratorPort> = if cfg.is_ai_configured() {
        info!(
            model = %cfg.ai_model_or_default(),
            url = %cfg.ai_api_url_or_default(),
            "AI generation enabled with OpenAI-compatible adapter"
        );
        Arc::new(
            OpenAiAdapter::new(
                cfg.ai_api_url_or_default(),
                cfg.ai_api_key().unwrap_or_default(),
                cfg.ai_model_or_default(),
                timeout,
            )?
            .with_fallback_model(cfg.ai_fallback_model())
            .with_thread_parts(thread_parts)
            .with_min_interval(cfg.ai_min_interval())
            .with_retry(retry),
        )
    } else {
        warn!("FEEDPILOT_AI_API_KEY not set, using mock generator");
        Arc::new(MockGenerator::new().with_thread_parts(thread_parts))
    };

    let media: Arc<dyn MediaPort> =
        Arc::new(HttpMedia::new(cfg.media_dir(), timeout)?.with_retry(retry));

    // --- State: lock + atomic JSON; read-only for dry runs ---
    let state_file: Arc<dyn StatePort> =
        Arc::new(StateJson::new(cfg.state_path()).with_stale_after(cfg.lock_stale_after()));
    let state: Arc<dyn StatePort> = if dry_run {
        Arc::new(ReadOnlyState::new(state_file))
    } else {
        state_file
    };

    let mut pipeline = Pipeline::new(feed, generator, publisher, media)
        .with_topics(cfg.topics_list())
        .with_thread_parts(thread_parts)
        .with_media_retention(cfg.media_retention());
    if cfg.archive_enabled() {
        let archive: Arc<dyn ArchivePort> = Arc::new(CsvArchive::new(cfg.archive_path()));
        pipeline = pipeline.with_archive(archive);
    }

    let schedule = AutoSchedule {
        thread_hour: cfg.thread_hour_or_default(),
        engagement_hours: cfg.engagement_hours_list(),
        targets: cfg.targets_list(),
        default_query: cfg.default_query.clone(),
    };
    let settings = OrchestratorSettings {
        min_interval: cfg.min_interval(),
        daily_post_limit: cfg.daily_post_limit,
        jitter_max: cfg.jitter_max(),
        fetch_limit: cfg.fetch_limit_or_default(),
        reply_count: cfg.reply_count_or_default(),
    };
    info!(
        state = %cfg.state_path().display(),
        min_interval_min = settings.min_interval.num_minutes(),
        "orchestrator ready"
    );

    Ok(Orchestrator::new(pipeline, state, schedule, settings))
}
