use anyhow::Result;
use shared::settings::MentorSettings;
use std::path::PathBuf;

/// Get the config file path
pub fn config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com.local", "Money Mentor", "MoneyMentor")
        .map(|proj| proj.config_dir().join("settings.json"))
}

/// Load settings from disk (defaults when absent), then apply environment
/// overrides.
pub fn load_settings() -> Result<MentorSettings> {
    let mut settings = match config_path() {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading settings");
            MentorSettings::load_from(&path)?
        }
        None => MentorSettings::default(),
    };
    settings.apply_env_overrides();
    Ok(settings)
}
