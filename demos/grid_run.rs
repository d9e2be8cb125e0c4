//! Run a small parameter grid and follow it live
//!
//! Streams SSE frames for the run to stdout, then prints the best responses
//! and the CSV export.
//!
//! Run with: cargo run --example grid_run -- [config.toml]
//!
//! Without a config file the mock backend is used unless `GRIDLAB_API_KEY`
//! (or `GROQ_API_KEY`) is set.

use std::sync::Arc;

use anyhow::Context;
use gridlab::config::{Config, ProviderKind};
use gridlab::events::sse::SseStream;
use gridlab::events::{ChannelBroadcaster, RunSubscription};
use gridlab::experiment::{new_id, ExperimentRecord, MemoryRepository, Repository};
use gridlab::export::{collect_rows, to_csv};
use gridlab::generation::{GenerationGateway, HttpGateway, MockGateway};
use gridlab::grid::GridSpec;
use gridlab::orchestrator::RunOrchestrator;
use gridlab::rank::best_responses;
use gridlab::telemetry::init_tracing;

const PROMPT: &str = "Explain how card payment settlement works, including chargebacks and refunds. \
                      Answer in at least 30 lines.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(None)?;

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("loading {path}"))?,
        None => Config::from_env()?,
    };

    match config.provider {
        ProviderKind::Mock => {
            let gateway = MockGateway::with_latency(config.mock_latency());
            drive(&config, gateway).await
        }
        ProviderKind::Http => {
            let gateway = HttpGateway::new(
                config.provider_base_url.as_str(),
                config.api_key.clone().unwrap_or_default(),
                config.generation_timeout(),
            )?;
            drive(&config, gateway).await
        }
    }
}

async fn drive<G: GenerationGateway + 'static>(config: &Config, gateway: G) -> anyhow::Result<()> {
    let repository = Arc::new(MemoryRepository::new());
    let events = Arc::new(ChannelBroadcaster::new(config.event_capacity));

    let experiment_id = new_id();
    let grid = GridSpec {
        temperature: Some(vec![0.2, 0.7]),
        top_p: Some(vec![0.9]),
        samples: Some(2),
        ..GridSpec::default()
    };
    repository
        .create_experiment(
            ExperimentRecord::builder(
                experiment_id.as_str(),
                "Settlement explainer",
                PROMPT,
                config.model.as_str(),
            )
            .grid_spec(grid)
            .build(),
        )
        .await?;

    let mut builder = RunOrchestrator::builder(
        Arc::clone(&repository),
        Arc::new(gateway),
        Arc::clone(&events),
    )
    .scorer(config.scorer())
    .quality_mode(config.quality_mode)
    .min_token_budget(config.min_token_budget)
    .scoring_timeout(config.scoring_timeout());
    if let Some(seed) = config.master_seed {
        builder = builder.master_seed(seed);
    }
    let orchestrator = Arc::new(builder.build());

    let rx = events.subscribe();
    let (run, handle) = orchestrator.launch(&experiment_id, None).await?;
    println!("run {} started ({} units)", run.run_id(), run.total_units());

    let mut stream =
        SseStream::with_keep_alive(RunSubscription::new(rx, run.run_id()), config.keep_alive());
    while let Some(frame) = stream.next_frame().await? {
        print!("{frame}");
    }

    let run = handle.await.context("run task panicked")??;
    println!("run {} finished: {}", run.run_id(), run.status());

    for ranked in best_responses(repository.as_ref(), run.run_id(), 2).await? {
        let params = ranked.response.params();
        println!(
            "#{} quality={:.3} temperature={} seed={:?}",
            ranked.response.sequence(),
            ranked.overall_quality(),
            params.temperature,
            params.seed,
        );
    }

    print!("{}", to_csv(&collect_rows(repository.as_ref(), &experiment_id).await?)?);
    Ok(())
}
