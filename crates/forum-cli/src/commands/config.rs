use crate::GlobalOpts;
use clap::Subcommand;
use colored::Colorize;
use forum_config::Config;
use forum_logger as logger;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print every setting
    Show,
    /// Print the path of the config file
    Path,
    /// Print one setting
    Get { key: String },
    /// Change one setting. Lists are comma separated.
    Set { key: String, value: String },
}

pub fn handle_config(action: Option<ConfigAction>, opts: &GlobalOpts) -> Result<(), String> {
    match action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => {
            let config = load()?;
            println!("{}", "Configuration:".bold().green());
            for (key, value) in config.values_iter() {
                println!("  {}: {}", key.cyan(), value);
            }
            if opts.verbosity_level() > 0 {
                println!("  {}: {}", "path".cyan(), Config::path().display());
            }
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", Config::path().display());
            Ok(())
        }
        ConfigAction::Get { key } => {
            let config = load()?;
            let value = config
                .get(&key)
                .ok_or_else(|| format!("Config key '{}' is not set", key))?;
            println!("{}", value);
            Ok(())
        }
        ConfigAction::Set { key, value } => {
            let mut config = load()?;
            config.set(&key, &value).map_err(|e| e.to_string())?;
            config
                .save()
                .map_err(|e| format!("Failed to save config: {}", e))?;
            logger::debug(&format!("Wrote {}", Config::path().display()));
            logger::success(&format!("Set {} = {}", key, value));
            Ok(())
        }
    }
}

fn load() -> Result<Config, String> {
    Config::load().map_err(|e| format!("Failed to load config: {}", e))
}
