//! `viamhub motor`: raw motor control and timed cover moves.

use std::sync::Arc;

use tracing::debug;
use viamhub_core::{Cover, CoverConfig, CoverState};

use crate::cli::{GlobalOpts, MotorArgs, MotorCommand};
use crate::error::CliError;
use crate::output;

use super::util::{self, Runtime};

/// Cover settings for `name`, using the profile's timings and direction.
fn cover_config(rt: &Runtime, name: &str) -> CoverConfig {
    let mut profile = rt.resolved.profile.clone();
    profile.motor_names = vec![name.to_owned()];
    viamhub_config::profile_to_cover_configs(&profile)
        .pop()
        .unwrap_or_else(|| CoverConfig::new(name))
}

fn print_state(name: &str, state: CoverState, global: &GlobalOpts) {
    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &state,
        |s| {
            let label = if s.is_closed { "closed" } else { "open" };
            format!(
                "{name}: {} (position {})",
                output::paint(label, !s.is_closed, color),
                s.position
            )
        },
        |s| s.position.to_string(),
    );
    output::print_output(&out, global.quiet);
}

/// Run a cover move, stopping the motor if Ctrl-C arrives first.
async fn timed_move(
    rt: &Runtime,
    name: &str,
    open: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::connect(rt).await?;
    let cover = Arc::new(Cover::new(rt.manager.clone(), cover_config(rt, name)));

    let mover = Arc::clone(&cover);
    let mut run = tokio::spawn(async move {
        if open {
            mover.open().await
        } else {
            mover.close().await
        }
    });

    let joined = tokio::select! {
        res = &mut run => res,
        _ = tokio::signal::ctrl_c() => {
            debug!(motor = %name, "interrupted, stopping");
            cover.stop().await?;
            run.await
        }
    };
    joined.map_err(|e| CliError::ApiError {
        code: "task".into(),
        message: e.to_string(),
    })??;

    print_state(name, cover.state().await, global);
    Ok(())
}

pub async fn handle(rt: &Runtime, args: MotorArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        MotorCommand::Open { name } => timed_move(rt, &name, true, global).await,
        MotorCommand::Close { name } => timed_move(rt, &name, false, global).await,

        MotorCommand::Stop { name } => {
            let motor = util::motor(rt, &name).await?;
            motor.stop().await?;
            if !global.quiet {
                eprintln!("✓ Stopped {name}");
            }
            Ok(())
        }

        MotorCommand::Power { name, power } => {
            if !(-1.0..=1.0).contains(&power) {
                return Err(CliError::Validation {
                    field: "power".into(),
                    reason: format!("{power} is outside -1.0..=1.0"),
                });
            }
            let motor = util::motor(rt, &name).await?;
            motor.set_power(power).await?;
            if !global.quiet {
                eprintln!("✓ {name} power set to {power}");
            }
            Ok(())
        }

        MotorCommand::GoFor {
            name,
            rpm,
            revolutions,
        } => {
            if rpm.abs() < f64::EPSILON || !rpm.is_finite() || !revolutions.is_finite() {
                return Err(CliError::Validation {
                    field: "rpm".into(),
                    reason: "must be a non-zero finite number".into(),
                });
            }
            let motor = util::motor(rt, &name).await?;
            motor.go_for(rpm, revolutions).await?;
            if !global.quiet {
                eprintln!("✓ {name} running {revolutions} revolutions at {rpm} rpm");
            }
            Ok(())
        }
    }
}
