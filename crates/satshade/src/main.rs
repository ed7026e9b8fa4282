mod bootstrap;
mod cli;
mod displays;
mod paths;
mod run;
mod state;

use std::process::ExitCode;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use cli::{Command, ProfilesAction};
use iccstore::{inspect_latest, ToolCommand};
use paths::AppPaths;
use satconfig::Config;
use serde::Serialize;
use state::AppState;

fn main() -> Result<ExitCode> {
    let cli = cli::parse();
    run::initialise_tracing();

    let paths = AppPaths::discover()?;
    let config = bootstrap::load_config(&paths)?;

    match cli.command {
        Command::Apply(args) => run::apply(&paths, &config, args.level),
        Command::Reset => run::reset(&paths, &config),
        Command::Restore => run::restore(&paths, &config),
        Command::Emit(args) => run::emit(&config, args).map(|()| ExitCode::SUCCESS),
        Command::Profiles(profiles) => {
            handle_profiles_command(&paths, &config, profiles.action).map(|()| ExitCode::SUCCESS)
        }
        Command::Doctor => Ok(run_doctor(&config)),
        Command::Displays => run_displays(&config).map(|()| ExitCode::SUCCESS),
        Command::Where => run_where(&paths, &config).map(|()| ExitCode::SUCCESS),
    }
}

#[derive(Debug, Serialize)]
struct ProfileEntry {
    key: String,
    path: String,
    created: DateTime<Utc>,
    level: Option<f64>,
}

fn handle_profiles_command(paths: &AppPaths, config: &Config, action: ProfilesAction) -> Result<()> {
    let store = bootstrap::profile_store(paths, config);

    match action {
        ProfilesAction::List { json } => {
            let listing = store.list()?;
            if json {
                let entries: Vec<ProfileEntry> = listing
                    .iter()
                    .map(|entry| ProfileEntry {
                        key: entry.key,
                        path: entry.path.display().to_string(),
                        created: entry.created,
                        level: entry.level.map(f64::from),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }

            if listing.is_empty() {
                println!("No profiles stored in {}", store.root().display());
                return Ok(());
            }

            println!("Stored profiles ({}):", store.root().display());
            for entry in &listing {
                let level = entry
                    .level
                    .map(|level| level.to_string())
                    .unwrap_or_else(|| "?".to_string());
                println!(
                    "  {:<50} level={:<6} created={}",
                    entry.key,
                    level,
                    entry.created.to_rfc3339_opts(SecondsFormat::Micros, true)
                );
            }
        }
        ProfilesAction::Latest => {
            let latest = store.latest()?;
            println!("{}", latest.path.display());
        }
        ProfilesAction::Inspect { lines } => {
            let inspection = inspect_latest(&store, &config.profile.dump, lines, config.timeout())?;
            println!("Profile: {}", inspection.profile.path.display());
            for line in &inspection.lines {
                println!("{line}");
            }
            if inspection.truncated {
                println!("... (truncated; use --lines to show more)");
            }
        }
        ProfilesAction::Prune { keep } => {
            let removed = store.prune(keep)?;
            if removed.is_empty() {
                println!("Nothing to prune; at most {keep} profile(s) stored.");
            } else {
                println!("Removed {} profile(s):", removed.len());
                for entry in removed {
                    println!("  {}", entry.path.display());
                }
            }
        }
    }

    Ok(())
}

fn run_doctor(config: &Config) -> ExitCode {
    let mut tools = vec![
        ("session", config.session.command.first().cloned().unwrap_or_default()),
        ("generator", config.profile.generator.clone()),
        ("dump", config.profile.dump.clone()),
        ("displays", displays::DISPLAY_QUERY_TOOL.to_string()),
    ];
    if config.profile.activate {
        tools.push(("activator", config.profile.activator.clone()));
    }

    let mut missing = 0;
    println!("External tools:");
    for (role, program) in tools {
        match ToolCommand::new(program.as_str()).locate() {
            Some(path) => println!("  {role:<10} {program:<12} {}", path.display()),
            None => {
                missing += 1;
                println!("  {role:<10} {program:<12} missing");
            }
        }
    }

    if missing == 0 {
        println!("All tools available.");
        ExitCode::SUCCESS
    } else {
        println!("{missing} tool(s) missing; affected channels will report degraded results.");
        ExitCode::FAILURE
    }
}

fn run_displays(config: &Config) -> Result<()> {
    let outputs = displays::connected_outputs(config.timeout())?;
    if outputs.is_empty() {
        println!("No connected outputs reported by {}", displays::DISPLAY_QUERY_TOOL);
        return Ok(());
    }

    println!("Connected outputs:");
    for output in outputs {
        let marker = if output == config.display.output {
            " (configured)"
        } else {
            ""
        };
        println!("  {output}{marker}");
    }
    Ok(())
}

fn run_where(paths: &AppPaths, config: &Config) -> Result<()> {
    let config_file = paths.config_file();
    println!("Configuration directories:");
    println!("  config:     {}", paths.config_dir().display());
    println!("  data:       {}", paths.data_dir().display());
    println!("  cache:      {}", paths.cache_dir().display());
    println!("  profiles:   {}", paths.profile_dir(config).display());
    println!("  shader:     {}", paths.shader_artifact().display());
    println!(
        "  config file: {}{}",
        config_file.display(),
        if config_file.exists() { "" } else { " (absent; using defaults)" }
    );
    println!("  state:      {}", paths.state_file().display());

    let state = AppState::load_or_default(&paths.state_file())?;
    if let Some(level) = state.last_level {
        match state.last_applied {
            Some(at) => println!("Last applied level: {level} at {}", at.to_rfc3339()),
            None => println!("Last applied level: {level}"),
        }
    }
    Ok(())
}
