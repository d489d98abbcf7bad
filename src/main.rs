mod cli;

use clap::Parser;
use cli::Cli;
use shardstream::client::demo::DemoStreamClient;
use shardstream::{AppConfig, AppResult, IdentityDecoder, StreamPartition, SupplierFacade};
use shardstream::metrics::SupplierMetrics;
use shardstream::prometheus::{config::PrometheusConfig, server::run_metrics_server};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.level))
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cli.workers)
        .enable_all()
        .build()
        .map_err(|e| shardstream::AppError::Internal(format!("failed to build runtime: {e}")))?;

    runtime.block_on(run(cli, config))
}

async fn run(cli: Cli, config: AppConfig) -> AppResult<()> {
    let metrics = Arc::new(SupplierMetrics::new()?);

    if config.metrics.enabled {
        let metrics_for_server = metrics.clone();
        let prom_cfg = PrometheusConfig::from(&config.metrics);
        tokio::spawn(async move {
            if let Err(e) = run_metrics_server(prom_cfg, move || metrics_for_server.encode_text()).await {
                tracing::error!(error = %e, "metrics server exited");
            }
        });
    }

    let partition_ids: Vec<String> = (0..cli.partitions)
        .map(|i| format!("{}-{i}", cli.stream))
        .collect();

    let client = Arc::new(DemoStreamClient::new(partition_ids.clone()));
    for (i, partition_id) in partition_ids.iter().enumerate() {
        client.script(
            partition_id,
            vec!["seq-0", "seq-1", "seq-2", "seq-3", "seq-4"],
            true,
            Vec::new(),
        );
        tracing::info!(partition = %partition_id, index = i, "scripted demo partition");
    }

    let facade = SupplierFacade::new(
        cli.stream.clone(),
        client,
        Some(Arc::new(IdentityDecoder)),
        config.supplier.clone(),
        metrics,
    )?;

    let partitions: Vec<StreamPartition> = partition_ids
        .iter()
        .map(|p| StreamPartition::new(cli.stream.clone(), p.clone()))
        .collect();
    facade.assign(partitions.iter().cloned().collect())?;
    facade.seek_to_earliest(&partitions).await?;
    facade.start().await?;

    for round in 0..cli.poll_rounds {
        let records = facade.poll(Duration::from_millis(500)).await?;
        for record in &records {
            if record.is_end_of_shard() {
                tracing::info!(partition = %record.partition_id, round, "end of shard");
            } else {
                tracing::info!(
                    partition = %record.partition_id,
                    sequence = %record.sequence_number,
                    payloads = record.payloads.len(),
                    round,
                    "delivered record"
                );
            }
        }
    }

    facade.close().await?;
    Ok(())
}
