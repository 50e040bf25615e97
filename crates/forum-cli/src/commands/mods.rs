use crate::common::install_mods;
use crate::GlobalOpts;
use clap::Subcommand;
use colored::Colorize;
use forum_config::Config;
use forum_logger as logger;
use forum_models::{builtin_mods, mod_source};
use forum_mods::{LoadPlan, PluginSource};

#[derive(Subcommand, Debug, Clone)]
pub enum ModsAction {
    /// List the mods in the mod directory in load order
    List,
    /// Install every configured mod and report the outcome
    Check,
}

pub fn handle_mods(action: ModsAction, opts: &GlobalOpts) -> Result<(), String> {
    match action {
        ModsAction::List => list_mods(opts),
        ModsAction::Check => check_mods(opts),
    }
}

fn list_mods(opts: &GlobalOpts) -> Result<(), String> {
    let config = Config::load().map_err(|e| format!("Failed to load config: {}", e))?;
    let root = opts.app_root().map_err(|e| format!("{:#}", e))?;
    let source = mod_source(&config.mods, &root);
    let discovered = source.discover().map_err(|e| e.to_string())?;

    if discovered.is_empty() {
        println!("There are no mods in {}.\n", source.dir().display());
        println!(
            "To add a mod, place a {} unit in that directory.",
            "<name>.toml".bold().cyan()
        );
        return Ok(());
    }

    let builtins = builtin_mods();
    let plan = LoadPlan::new(&config.mods.installed, &config.mods.disabled, &discovered);
    println!("{}", "Mods:".bold().green());
    for (position, name) in plan.sequence().enumerate() {
        if !discovered.contains(name) {
            println!(
                " {:>2}. {} {}",
                position + 1,
                name.bold().blue(),
                "(missing)".yellow()
            );
            continue;
        }
        let unit = source.read_unit(name).map_err(|e| e.to_string())?;
        let version = unit.version.clone().or_else(|| {
            builtins
                .get(name)
                .and_then(|plugin| plugin.version().map(String::from))
        });
        let mut line = format!(" {:>2}. {}", position + 1, name.bold().blue());
        if let Some(version) = version {
            line.push_str(&format!(" {}", format!("v{}", version).dimmed()));
        }
        if builtins.get(name).is_some() {
            line.push_str(&format!(" {}", "(built-in)".dimmed()));
        }
        println!("{}", line);
        if let Some(description) = unit.description.as_deref() {
            if opts.verbosity_level() > 0 {
                println!("     {}", description);
            }
        }
    }

    let idle: Vec<&String> = discovered
        .iter()
        .filter(|name| !plan.sequence().any(|planned| planned == name.as_str()))
        .collect();
    for name in idle {
        let reason = if config.mods.disabled.contains(name) {
            "disabled"
        } else {
            "not in load order"
        };
        println!("  -  {} {}", name.dimmed(), format!("({})", reason).yellow());
    }
    Ok(())
}

fn check_mods(opts: &GlobalOpts) -> Result<(), String> {
    let system = install_mods(opts).map_err(|e| format!("{:#}", e))?;
    let report = system.report();

    for name in &report.load.missing {
        logger::warn(&format!("Mod '{}' is in the load order but was not found", name));
    }
    for skipped in &report.load.skipped {
        logger::warn(&format!("Skipped {}: {}", skipped.name, skipped.reason));
    }
    for name in &report.uninstalled {
        logger::warn(&format!("Uninstalled {}: a required mod is missing", name));
    }

    println!("{}", "Installed mods:".bold().green());
    let installed = system.installed_mods();
    if installed.is_empty() {
        println!("  {}", "(none)".yellow());
    }
    for (name, version) in installed {
        println!(
            "  {} {}",
            name.bold().blue(),
            version.map_or_else(|| "unversioned".to_string(), |v| format!("v{}", v)).dimmed()
        );
    }

    let models = system.models().map_err(|e| e.to_string())?;
    logger::success(&format!(
        "Composed {} extendable objects, {} deferred callbacks run",
        models.len(),
        report.callbacks_run
    ));
    Ok(())
}
