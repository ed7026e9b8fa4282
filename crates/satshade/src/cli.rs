use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use shaderfx::SaturationLevel;

#[derive(Parser, Debug)]
#[command(
    name = "satshade",
    author,
    version,
    about = "Adjust screen saturation with a compositor shader and a matching ICC profile"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply a saturation level (0.0 grayscale, 1.0 unchanged, 2.0 maximum).
    Apply(LevelArgs),
    /// Restore unmodified colours (equivalent to `apply 1.0`).
    Reset,
    /// Re-apply the last successfully applied level.
    Restore,
    /// Render the screen shader for a level without applying it.
    Emit(EmitArgs),
    /// Inspect and manage generated ICC profiles.
    Profiles(ProfilesCommand),
    /// Report which external tools are available.
    Doctor,
    /// List connected display outputs.
    Displays,
    /// Show resolved directories and files.
    Where,
}

#[derive(Args, Debug)]
pub struct LevelArgs {
    /// Saturation multiplier; clamped to 0.0-2.0.
    #[arg(value_name = "LEVEL", value_parser = parse_level, allow_hyphen_values = true)]
    pub level: SaturationLevel,
}

#[derive(Args, Debug)]
pub struct EmitArgs {
    /// Saturation multiplier; clamped to 0.0-2.0.
    #[arg(value_name = "LEVEL", value_parser = parse_level, allow_hyphen_values = true)]
    pub level: SaturationLevel,

    /// Write the shader to this path instead of stdout.
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ProfilesCommand {
    #[command(subcommand)]
    pub action: ProfilesAction,
}

#[derive(Subcommand, Debug)]
pub enum ProfilesAction {
    /// List stored profiles, oldest first.
    List {
        /// Emit the listing as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the path of the most recent profile.
    Latest,
    /// Dump the structure of the most recent profile.
    Inspect {
        /// Number of dump lines to show.
        #[arg(long, value_name = "N", default_value_t = iccstore::DEFAULT_INSPECT_LINES)]
        lines: usize,
    },
    /// Delete all but the newest profiles.
    Prune {
        /// Number of profiles to keep.
        #[arg(long, value_name = "N", value_parser = parse_keep)]
        keep: usize,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_level(value: &str) -> Result<SaturationLevel, String> {
    value.parse()
}

fn parse_keep(value: &str) -> Result<usize, String> {
    let keep: usize = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid count '{value}'; expected a positive integer"))?;
    if keep == 0 {
        return Err("must keep at least one profile".to_string());
    }
    Ok(keep)
}
