//! Command dispatch: profile management, statistics and the probe-select-launch flow.

use crate::cli::{optional_path, Cli};
use crate::config::{Paths, Settings};
use crate::core::network::debug_logger::get_debug_logger;
use crate::core::network::{BatchCoordinator, ProgressReporter, Prober, ResultCache};
use crate::core::{SelectedProfile, SelectionOutcome, Selector};
use crate::launcher::{ActivatedProfile, LaunchError, Launcher};
use crate::profiles::{is_example, parse_index, ProfileStore};
use crate::stats::StatsStore;
use crate::ui::output;
use crate::ui::prompt::{confirm, prompt_new_profile};
use crate::ui::{IndicatifProgress, InquireChooser, LineProgress};
use std::error::Error;
use std::io::IsTerminal;
use std::path::PathBuf;

pub type CommandResult = Result<u8, Box<dyn Error>>;

/// Run one invocation and return the process exit code
pub async fn run(cli: Cli) -> u8 {
    let paths = match Paths::resolve() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("{}", output::failure(&e.to_string()));
            return 1;
        }
    };

    if let Err(e) = paths.ensure_dirs() {
        let message = format!("Cannot create {}: {}", paths.root.display(), e);
        eprintln!("{}", output::failure(&message));
        return 1;
    }

    let stats = StatsStore::new(&paths.stats);
    stats.record_command(cli.command_name());
    get_debug_logger().debug("Commands", &format!("Running '{}'", cli.command_name()));

    match dispatch(&cli, &paths, &stats).await {
        Ok(code) => code,
        Err(e) => {
            get_debug_logger().error("Commands", &e.to_string());
            stats.record_error(cli.command_name(), &e.to_string());
            eprintln!("{}", output::failure(&e.to_string()));
            1
        }
    }
}

async fn dispatch(cli: &Cli, paths: &Paths, stats: &StatsStore) -> CommandResult {
    let store = ProfileStore::new(&paths.providers, &paths.backups);

    if cli.list {
        return list(&store);
    }
    if cli.add {
        return add(&store);
    }
    if let Some(raw) = &cli.remove {
        return remove(&store, raw);
    }
    if let Some(raw) = &cli.set_default {
        return set_default(&store, raw);
    }
    if cli.clear_default {
        store.clear_default()?;
        println!("{}", output::success("Default provider cleared"));
        return Ok(0);
    }
    if let Some(raw) = &cli.export {
        let profiles = store.load()?;
        let path = store.export(&profiles, optional_path(Some(raw.as_str())).as_deref())?;
        println!(
            "{}",
            output::success(&format!(
                "Exported {} provider(s) to {}",
                profiles.len(),
                path.display()
            ))
        );
        return Ok(0);
    }
    if let Some(path) = &cli.import {
        let count = store.import(path, cli.merge)?;
        let mode = if cli.merge { "merged" } else { "imported" };
        let message = format!("{} providers, {} now configured", mode, count);
        println!("{}", output::success(&message));
        return Ok(0);
    }
    if cli.backup {
        let profiles = store.load()?;
        let path = store.backup(&profiles)?;
        let message = format!("Backup written to {}", path.display());
        println!("{}", output::success(&message));
        return Ok(0);
    }
    if cli.list_backups {
        return list_backups(&store);
    }
    if cli.stats {
        output::print_stats(&stats.summary(), &stats.load(), cli.verbose);
        return Ok(0);
    }
    if let Some(raw) = &cli.export_stats {
        let target = optional_path(Some(raw.as_str())).unwrap_or_else(|| {
            let stamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S");
            PathBuf::from(format!("stats-{}.json", stamp))
        });
        let path = stats.export(&target)?;
        let message = format!("Statistics exported to {}", path.display());
        println!("{}", output::success(&message));
        return Ok(0);
    }
    if cli.reset_stats {
        stats.reset()?;
        println!("{}", output::success("Statistics reset"));
        return Ok(0);
    }

    switch(cli, paths, &store).await
}

fn list(store: &ProfileStore) -> CommandResult {
    let profiles = store.load()?;
    output::print_profiles(&profiles);
    Ok(0)
}

fn add(store: &ProfileStore) -> CommandResult {
    let existing: Vec<String> = if store.exists() {
        store.load()?.into_iter().map(|p| p.name).collect()
    } else {
        Vec::new()
    };

    let Some(profile) = prompt_new_profile(&existing, true)? else {
        println!("Cancelled");
        return Ok(0);
    };

    let name = profile.name.clone();
    let profiles = store.add(profile)?;
    let message = format!("Added '{}' as provider {}", name, profiles.len());
    println!("{}", output::success(&message));
    Ok(0)
}

fn remove(store: &ProfileStore, raw: &str) -> CommandResult {
    let profiles = store.load()?;
    let index = parse_index(raw, profiles.len())?;

    if !confirm(&format!("Remove provider '{}'?", profiles[index].name), false) {
        println!("Cancelled");
        return Ok(0);
    }

    store.backup(&profiles)?;
    let removed = store.remove(index)?;
    println!("{}", output::success(&format!("Removed '{}'", removed.name)));
    Ok(0)
}

fn set_default(store: &ProfileStore, raw: &str) -> CommandResult {
    let profiles = store.load()?;
    let index = parse_index(raw, profiles.len())?;
    let profile = store.set_default(index)?;
    let message = format!("'{}' is now the default provider", profile.name);
    println!("{}", output::success(&message));
    Ok(0)
}

fn list_backups(store: &ProfileStore) -> CommandResult {
    let backups = store.list_backups()?;
    if backups.is_empty() {
        println!("No backups found");
        return Ok(0);
    }

    println!("📦 Backups (newest first):");
    for (i, path) in backups.iter().enumerate() {
        println!("  {}. {}", i + 1, path.display());
    }
    Ok(0)
}

/// First run without a providers file
fn first_run(store: &ProfileStore) -> CommandResult {
    println!("{}", output::warning("No providers configured yet"));

    if std::io::stdin().is_terminal() && confirm("Set up your first provider now?", true) {
        if let Some(profile) = prompt_new_profile(&[], false)? {
            store.save(&[profile.with_default(true)])?;
            println!(
                "{}",
                output::success("Provider saved, run ccswitch again to start")
            );
            return Ok(0);
        }
    }

    store.create_example()?;
    println!("Example configuration written to {}", store.path().display());
    println!(
        "{}",
        output::hint("edit it with your real endpoints and keys, or run ccswitch --add")
    );
    Ok(0)
}

/// Probe every provider, select one and hand it to the launcher
async fn switch(cli: &Cli, paths: &Paths, store: &ProfileStore) -> CommandResult {
    if !store.exists() {
        return first_run(store);
    }

    let settings = Settings::load(&paths.settings)?;
    let profiles = store.load()?;
    if is_example(&profiles) {
        println!(
            "{}",
            output::warning("The provider file still contains example values")
        );
        println!("Edit {} first", store.path().display());
        return Ok(1);
    }

    let mut options = settings.prober_options();
    options.exhaustive |= cli.all_capabilities;
    let prober = Prober::new(options)?.with_verbose(cli.verbose);
    let cache = ResultCache::new(&paths.cache)
        .with_freshness_window(settings.cache_window());

    let progress: Box<dyn ProgressReporter> = if cli.verbose {
        Box::new(LineProgress::new(profiles.len()))
    } else {
        Box::new(IndicatifProgress::new(profiles.len(), cli.verbose))
    };

    let coordinator = BatchCoordinator::new(prober, cache)
        .with_progress(progress)
        .with_recorder(Box::new(StatsStore::new(&paths.stats)));

    let outcome = coordinator.run(&profiles, cli.refresh).await;
    if let Some(e) = &outcome.cache_error {
        let message = format!("Could not save probe cache: {}", e);
        println!("{}", output::warning(&message));
    }
    output::print_reports(&outcome.reports, outcome.cache_hits);

    let selection = Selector::select(&outcome.reports, cli.index, &InquireChooser);
    let exit_code = selection.exit_code();
    match selection {
        SelectionOutcome::Selected(selected) => {
            StatsStore::new(&paths.stats).record_provider_use(
                &selected.profile.name,
                true,
                selected.verdict.latency_ms,
            );
            launch(&selected, &settings, cli.env_only)
        }
        SelectionOutcome::Cancelled => {
            println!("Cancelled");
            Ok(exit_code)
        }
        SelectionOutcome::Error(e) => {
            StatsStore::new(&paths.stats).record_error("selection", &e.to_string());
            eprintln!("{}", output::failure(&e.to_string()));
            Ok(exit_code)
        }
    }
}

fn launch(selected: &SelectedProfile, settings: &Settings, env_only: bool) -> CommandResult {
    let activated = ActivatedProfile::from(selected);

    println!();
    let message = format!("Using provider: {}", activated.name);
    println!("{}", output::success(&message));
    for line in activated.masked_env_lines() {
        println!("   {}", line);
    }

    if env_only {
        println!(
            "\n📋 Run these in your shell, then start {}:",
            settings.launch.command
        );
        for line in activated.shell_exports() {
            println!("   {}", line);
        }
        return Ok(0);
    }

    let launcher = Launcher::new(settings.launch.command.clone());
    println!("\n🚀 Starting {}...", launcher.command());

    match launcher.launch(&activated) {
        Ok(status) => Ok(status.code().and_then(|c| u8::try_from(c).ok()).unwrap_or(1)),
        Err(LaunchError::NotFound(command)) => {
            let message = format!("Command '{}' not found", command);
            eprintln!("{}", output::failure(&message));
            eprintln!("   Make sure it is installed and on PATH, or set it manually:");
            for line in activated.shell_exports() {
                eprintln!("   {}", line);
            }
            eprintln!("   {}", command);
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}
