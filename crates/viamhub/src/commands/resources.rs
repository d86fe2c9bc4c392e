//! `viamhub resources`: list what discovery found on the robot.

use serde::Serialize;
use tabled::Tabled;
use viamhub_core::CapabilityKind;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util::{self, Runtime};

#[derive(Debug, Serialize)]
struct ResourceView {
    name: String,
    kind: CapabilityKind,
    /// As reported by the robot; classification is by probing.
    reported: String,
}

#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Reported as")]
    reported: String,
}

pub async fn handle(rt: &Runtime, global: &GlobalOpts) -> Result<(), CliError> {
    util::connect(rt).await?;

    let views: Vec<ResourceView> = rt
        .manager
        .get_all_capabilities()
        .into_iter()
        .map(|h| ResourceView {
            name: h.name().to_owned(),
            kind: h.kind(),
            reported: h.resource.to_string(),
        })
        .collect();

    let out = output::render_list(
        global.output,
        &views,
        |v| ResourceRow {
            name: v.name.clone(),
            kind: v.kind.to_string(),
            reported: v.reported.clone(),
        },
        |v| v.name.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
