use std::time::Duration;

use iccstore::{ToolCommand, ToolError};

pub const DISPLAY_QUERY_TOOL: &str = "xrandr";

/// Output names from `xrandr` lines such as `eDP-1 connected primary 1920x1080+0+0`.
pub fn parse_connected_outputs(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter(|line| line.contains(" connected"))
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

pub fn connected_outputs(timeout: Option<Duration>) -> Result<Vec<String>, ToolError> {
    let output = ToolCommand::new(DISPLAY_QUERY_TOOL)
        .arg("--query")
        .timeout(timeout)
        .run()?;
    Ok(parse_connected_outputs(&output.stdout))
}
