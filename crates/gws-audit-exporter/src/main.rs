// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, error, info};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use gws_audit::{
    config::{Config, LogConfig, LogFormat},
    feed::ReportsClient,
    kafka::KafkaProducer,
    pipeline::Pipeline,
    token::TokenFactory,
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
pub async fn main() -> ExitCode {
    if let Err(e) = init_logging(&LogConfig::from_env()) {
        eprintln!("Unable to set up logging: {e:#}");
        return ExitCode::FAILURE;
    }
    debug!("Logging subsystem enabled");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env().context("Error reading configuration")?;
    let poll_config = Arc::new(config.poll);
    let broker_config = Arc::new(config.broker);

    let tokens = TokenFactory::service_account(&poll_config.credentials_file, &poll_config.subject)
        .await
        .context("Unable to create JWT")?;

    let feed = ReportsClient::new(
        &poll_config.api_url,
        &poll_config.user_key,
        tokens,
        poll_config.proxy_url.as_deref(),
        poll_config.request_timeout,
    )
    .context("Unable to create GWS client")?;

    let (producer, reports) =
        KafkaProducer::new(&broker_config).context("Failed to create producer")?;

    let handle = Pipeline::new(
        Arc::clone(&poll_config),
        Arc::clone(&broker_config),
        Arc::new(feed),
        Arc::new(producer),
    )
    .start(reports)?;

    let reason = handle.wait_for_shutdown().await;
    info!("Shutting down: {reason:?}");

    let stats = handle.shutdown(SHUTDOWN_TIMEOUT).await?;
    if let Some(forward) = stats.forward {
        info!(
            forwarded = forward.forwarded,
            dropped = forward.dropped,
            "Forwarding totals"
        );
    }
    Ok(())
}

fn init_logging(log: &LogConfig) -> anyhow::Result<()> {
    let env_filter = format!(
        "h2=off,hyper=off,hyper_util=off,rustls=off,reqwest=warn,{}",
        log.level
    );
    let filter = EnvFilter::try_new(env_filter).context("could not parse log level")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    match log.format {
        LogFormat::Json => builder.json().finish().try_init()?,
        LogFormat::Text => builder.finish().try_init()?,
    }
    Ok(())
}
