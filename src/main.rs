//! ticketsmith - main entry point.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ticketsmith::{
    agent::Engine,
    config::Config,
    llm::create_llm_provider,
    tools::{builtin::register_builtin_tools, ToolRegistry},
    tracker::{HttpTaskSource, TaskSource},
    workspace,
};

#[derive(Parser, Debug)]
#[command(name = "ticketsmith")]
#[command(about = "Autonomous agent that resolves tracker tickets with specialist profiles")]
#[command(version)]
struct Args {
    /// Run a single polling cycle and exit
    #[arg(long)]
    once: bool,

    /// Skip repository bootstrapping (assume the workspace exists)
    #[arg(long)]
    no_bootstrap: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ticketsmith=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    tracing::info!("starting ticketsmith...");

    let config = Config::from_env()?;

    if !args.no_bootstrap {
        workspace::ensure_repository(&config.engine.workdir, config.engine.repo_url.as_deref())
            .await?;
    }

    let llm = create_llm_provider(&config.llm)?;
    tracing::info!(model = %llm.model_name(), "LLM provider initialized");

    let mut registry = ToolRegistry::new(config.engine.max_tool_result_bytes);
    register_builtin_tools(
        &mut registry,
        &config.engine.workdir,
        config.engine.push_token.clone(),
    );

    let engine = Engine::new(llm, Arc::new(registry), config.engine.clone());
    let tracker = HttpTaskSource::new(config.tracker.clone());

    let mut interval = tokio::time::interval(config.tracker.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        if let Err(error) = run_cycle(&engine, &tracker).await {
            tracing::error!(%error, "polling cycle failed");
        }

        if args.once {
            break;
        }
    }

    tracing::info!("ticketsmith shutdown complete");
    Ok(())
}

/// One polling cycle: fetch a ticket, run it, report the outcome.
async fn run_cycle(engine: &Engine, tracker: &HttpTaskSource) -> anyhow::Result<()> {
    let Some(ticket) = tracker.fetch_next_ticket().await? else {
        tracing::debug!("no open tickets");
        return Ok(());
    };

    tracing::info!(ticket = %ticket.id, title = %ticket.title, "picked up ticket");

    if let Err(error) = tracker
        .post_comment(&ticket.id, "Agent processing started...")
        .await
    {
        tracing::warn!(%error, "could not announce run start");
    }

    let result = engine.run_ticket(&ticket).await;

    tracing::info!(
        ticket = %ticket.id,
        success = result.success,
        turns = result.turns,
        "run finished"
    );

    tracker.report_outcome(&ticket.id, &result).await?;
    Ok(())
}
