//! Read-only diagnostics over the newest stored profile.
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::store::{ProfileStore, StoreError, StoredProfile};
use crate::tool::{ToolCommand, ToolError};

pub const DEFAULT_DUMP_TOOL: &str = "iccdump";
pub const DEFAULT_INSPECT_LINES: usize = 40;

#[derive(Debug, Error)]
pub enum InspectError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

#[derive(Debug, Clone)]
pub struct Inspection {
    pub profile: StoredProfile,
    pub lines: Vec<String>,
    /// Whether the dump had more lines than were kept.
    pub truncated: bool,
}

/// Dumps the structure of the most recent profile, keeping the first
/// `max_lines` lines of the dump tool's output.
pub fn inspect_latest(
    store: &ProfileStore,
    dump_tool: &str,
    max_lines: usize,
    timeout: Option<Duration>,
) -> Result<Inspection, InspectError> {
    let profile = store.latest()?;
    debug!(key = %profile.key, tool = dump_tool, "dumping profile structure");

    let output = ToolCommand::new(dump_tool)
        .args(["-v", "3"])
        .arg(&profile.path)
        .timeout(timeout)
        .run()?;

    let mut all = output.stdout.lines();
    let lines: Vec<String> = all.by_ref().take(max_lines).map(str::to_string).collect();
    let truncated = all.next().is_some();

    Ok(Inspection {
        profile,
        lines,
        truncated,
    })
}
