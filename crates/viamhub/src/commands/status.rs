//! `viamhub status`: connect once and report the connection state.

use std::fmt::Write as _;

use serde::Serialize;
use viamhub_core::{CapabilityKind, ConnectionSummary, robot_display_name};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util::Runtime;

#[derive(Debug, Serialize)]
struct StatusView {
    profile: String,
    robot: String,
    address: String,
    connected: bool,
    #[serde(flatten)]
    summary: ConnectionSummary,
    motors: usize,
    sensors: usize,
    unknown: usize,
}

fn detail(view: &StatusView, color: bool) -> String {
    let mut out = String::new();
    let state = output::paint(&view.summary.state.to_string(), view.connected, color);
    let _ = writeln!(out, "Robot:      {} ({})", view.robot, view.address);
    let _ = writeln!(out, "Profile:    {}", view.profile);
    let _ = writeln!(out, "State:      {state}");
    if let Some(at) = view.summary.established_at {
        let _ = writeln!(out, "Since:      {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if view.summary.consecutive_failures > 0 {
        let _ = writeln!(
            out,
            "Failures:   {} (next retry window {})",
            view.summary.consecutive_failures,
            output::age(Some(view.summary.next_backoff))
        );
    }
    let _ = write!(
        out,
        "Resources:  {} motors, {} sensors, {} {}",
        view.motors,
        view.sensors,
        view.unknown,
        output::dim("other", color)
    );
    out
}

pub async fn handle(rt: &Runtime, global: &GlobalOpts) -> Result<(), CliError> {
    let connected = rt.manager.ensure_connection().await;
    let summary = rt.manager.summary().await;
    let handles = rt.manager.get_all_capabilities();
    let count = |kind| handles.iter().filter(|h| h.kind() == kind).count();

    let view = StatusView {
        profile: rt.resolved.profile_name.clone(),
        robot: robot_display_name(rt.address()).to_owned(),
        address: rt.address().to_owned(),
        connected,
        summary,
        motors: count(CapabilityKind::Motor),
        sensors: count(CapabilityKind::Sensor),
        unknown: count(CapabilityKind::Unknown),
    };

    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &view,
        |v| detail(v, color),
        |v| v.summary.state.to_string(),
    );
    output::print_output(&out, global.quiet);

    if connected {
        Ok(())
    } else {
        Err(CliError::ConnectionFailed {
            address: view.address,
        })
    }
}
