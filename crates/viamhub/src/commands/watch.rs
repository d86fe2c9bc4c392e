//! `viamhub watch`: run the polling loop until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tracing::info;
use viamhub_core::Coordinator;

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::readings::{build_source, collect_views, render};
use super::util::Runtime;

pub async fn handle(rt: &Runtime, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let source = build_source(rt, args.source, &args.sensor)?;
    let poll = viamhub_config::profile_to_poll_config(&rt.resolved.profile)?;
    let interval = args.interval.map_or(poll.interval, Duration::from_secs);
    if interval.is_zero() {
        return Err(CliError::Validation {
            field: "interval".into(),
            reason: "must be greater than zero".into(),
        });
    }

    let coordinator = Coordinator::new(Arc::clone(&source.reader), poll)?;
    let color = output::should_color(global.color);

    let address = rt.address().to_owned();
    let quiet = global.quiet;
    let connection_listener = rt.manager.add_connection_listener(move |connected| {
        if !quiet {
            let state = if *connected { "connected" } else { "disconnected" };
            eprintln!(
                "{} {address}: {}",
                Local::now().format("%H:%M:%S"),
                output::paint(state, *connected, color)
            );
        }
    });

    // The listener holds a clone; `shutdown` clears listeners, which drops it.
    let view_source = coordinator.clone();
    let filter = args.sensor.clone();
    let format = global.output;
    coordinator.add_listener(move |_set| {
        let views = collect_views(&view_source, &filter);
        let out = match format {
            OutputFormat::Table => format!(
                "{}\n{}",
                output::dim(&Local::now().format("── %H:%M:%S ──").to_string(), color),
                render(&views, format)
            ),
            OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(&views, true),
            OutputFormat::Plain => render(&views, format),
        };
        output::print_output(&out, quiet);
    });

    if source.cloud.is_none() {
        rt.manager.start().await;
    }
    let first = coordinator.start(interval).await?;
    info!(?first, interval_secs = interval.as_secs(), "watching");

    tokio::signal::ctrl_c().await?;
    info!("interrupted, shutting down");

    rt.manager.remove_connection_listener(connection_listener);
    coordinator.shutdown().await;
    source.shutdown().await;
    Ok(())
}
