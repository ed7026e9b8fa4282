use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use pipeline::{ApplyResult, ApplyStatus, ChannelError};
use satconfig::Config;
use shaderfx::SaturationLevel;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::bootstrap::{self, build_pipeline};
use crate::cli::EmitArgs;
use crate::paths::AppPaths;
use crate::state::AppState;

const EXIT_DEGRADED: u8 = 2;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn apply(paths: &AppPaths, config: &Config, level: SaturationLevel) -> Result<ExitCode> {
    bootstrap::bootstrap_filesystem(paths)?;
    let pipeline = build_pipeline(paths, config)?;
    let result = pipeline.apply(level)?;

    report(&result);

    let status = result.status();
    if status != ApplyStatus::Failed {
        let state_file = paths.state_file();
        let mut state = AppState::load_or_default(&state_file)?;
        state.record_apply(level);
        state.persist(&state_file)?;
        debug!(path = %state_file.display(), "recorded applied level");
    }

    Ok(match status {
        ApplyStatus::Applied => ExitCode::SUCCESS,
        ApplyStatus::Degraded => ExitCode::from(EXIT_DEGRADED),
        ApplyStatus::Failed => ExitCode::FAILURE,
    })
}

pub fn reset(paths: &AppPaths, config: &Config) -> Result<ExitCode> {
    apply(paths, config, SaturationLevel::IDENTITY)
}

pub fn restore(paths: &AppPaths, config: &Config) -> Result<ExitCode> {
    let state_file = paths.state_file();
    let state = AppState::load_or_default(&state_file)?;
    let Some(level) = state.last_level else {
        bail!(
            "no saturation level has been applied yet (state file: {})",
            state_file.display()
        );
    };
    apply(paths, config, level)
}

pub fn emit(config: &Config, args: EmitArgs) -> Result<()> {
    let template = bootstrap::load_template(config)?;
    let artifact = shaderfx::emit(&template, args.level)?;

    match args.output {
        Some(path) => {
            artifact
                .persist(&path)
                .with_context(|| format!("failed to write shader to {}", path.display()))?;
            println!("Wrote shader for level {} to {}", artifact.level(), path.display());
        }
        None => print!("{}", artifact.source()),
    }
    Ok(())
}

fn report(result: &ApplyResult) {
    println!("Saturation {}:", result.level);

    match &result.shader {
        Ok(applied) => println!("  shader   applied  {}", applied.path.display()),
        Err(err) => println!("  shader   failed   {err}"),
    }

    match &result.profile {
        Ok(applied) => {
            println!("  profile  applied  {}", applied.stored.path.display());
            if applied.pruned > 0 {
                println!("  removed {} old profile(s)", applied.pruned);
            }
        }
        Err(err) => {
            println!("  profile  failed   {err}");
            if let ChannelError::ActivationFailed { .. } = err {
                warn!("profile was stored but is not the display default");
            }
        }
    }

    for missing in [result.shader.as_ref().err(), result.profile.as_ref().err()]
        .into_iter()
        .flatten()
        .filter_map(ChannelError::missing_tool)
    {
        println!("hint: install '{missing}' or point the configuration at it (see `satshade doctor`)");
    }

    match result.status() {
        ApplyStatus::Applied => {}
        ApplyStatus::Degraded => println!("Saturation partially applied."),
        ApplyStatus::Failed => println!("Saturation could not be applied."),
    }
}
