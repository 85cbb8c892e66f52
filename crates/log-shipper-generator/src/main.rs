// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;

use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use log_shipper::{
    config::{ShipperConfig, ENV_BACKEND_URL, ENV_LOG_LEVEL},
    layer::ShipperLayer,
    service::LogShipper,
};

/// Roughly one update per frame at 60 fps.
const UPDATE_INTERVAL: Duration = Duration::from_millis(16);

#[tokio::main]
pub async fn main() {
    let config = match ShipperConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            let log_level = env::var(ENV_LOG_LEVEL)
                .map(|val| val.to_lowercase())
                .unwrap_or("info".to_string());
            init_logging(&log_level, None);
            error!("Error creating config on log shipper startup: {e}");
            return;
        }
    };

    let (shipper, service) = match LogShipper::new(config.clone()) {
        Ok(pair) => pair,
        Err(e) => {
            init_logging(&config.log_level, None);
            error!("Error creating log shipper: {e}");
            return;
        }
    };

    init_logging(&config.log_level, Some(ShipperLayer::new(shipper.clone())));
    debug!("Logging subsystem enabled");

    if shipper.is_active() {
        info!(
            "Shipping logs for session {} to {}",
            shipper.session_id(),
            config.backend_url.as_deref().unwrap_or_default()
        );
    } else {
        warn!("{ENV_BACKEND_URL} is not set, generated logs will not be shipped");
    }

    let cancel = CancellationToken::new();
    let service_task = tokio::spawn(service.run(cancel.clone()));

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C, shutting down"),
            Err(e) => {
                error!("Unable to listen for shutdown signal: {e}");
                return;
            }
        }
        signal_cancel.cancel();
    });

    let mut update_interval = interval(UPDATE_INTERVAL);
    update_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut update_count: u64 = 0;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = update_interval.tick() => {
                update_count += 1;
                update(update_count);
            }
        }
    }

    if let Err(e) = service_task.await {
        error!("Log shipper task failed: {e}");
    }
    debug!(
        "Stopped after {update_count} updates, {} records evicted",
        shipper.evicted()
    );
}

fn init_logging(log_level: &str, shipper_layer: Option<ShipperLayer<LogShipper>>) {
    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"))
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_thread_names(false)
                .with_thread_ids(false)
                .with_line_number(false)
                .with_file(false)
                .with_target(true)
                .without_time(),
        )
        .with(shipper_layer);

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

/// Emits the synthetic traffic for one update.
fn update(update_count: u64) {
    let span = info_span!("update", update_count);
    let _entered = span.enter();

    if update_count % 50 == 0 {
        info!("updateCount == {update_count}");
    }

    match update_count % 73 {
        12 => warn!("updateCount == {update_count}"),
        27 => error!("updateCount == {update_count}"),
        29 => error!("Assertion failed: updateCount == {update_count}"),
        33 => {
            load_frame_budget("sixteen", update_count);
        }
        37 => {
            if let Err(e) = lookup_player(None) {
                error!("Unhandled error: {e}, updateCount == {update_count}");
            }
        }
        _ => {}
    }
}

/// Parses a frame budget, reporting failures from inside its own span so the
/// shipped call stack includes it.
fn load_frame_budget(raw: &str, update_count: u64) -> Option<u32> {
    let span = info_span!("load_frame_budget");
    let _entered = span.enter();
    match raw.parse() {
        Ok(budget) => Some(budget),
        Err(e) => {
            error!("Unhandled error: {e}, updateCount == {update_count}");
            None
        }
    }
}

fn lookup_player(name: Option<&str>) -> Result<&str, &'static str> {
    name.ok_or("player reference is not set")
}
