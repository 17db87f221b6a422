//! Platform-specific paths for sonoplex's configuration file.
//!
//! - Linux: `~/.config/sonoplex/`
//! - macOS: `~/Library/Application Support/sonoplex/`
//! - Windows: `%APPDATA%\sonoplex\`

use std::path::PathBuf;

const APP_NAME: &str = "sonoplex";

/// Returns the user-specific configuration directory, falling back to `.`
/// if the platform config directory cannot be determined.
#[must_use]
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_NAME)
}

/// The conventional path to sonoplex's single config file within
/// [`user_config_dir`].
#[must_use]
pub fn default_config_path() -> PathBuf {
    user_config_dir().join("sonoplex.toml")
}

/// Create `user_config_dir` (and any parents) if it doesn't already exist.
pub fn ensure_user_config_dir() -> crate::error::Result<PathBuf> {
    let dir = user_config_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| crate::error::ConfigError::create_dir(&dir, e))?;
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_config_dir_mentions_app_name() {
        let dir = user_config_dir();
        assert!(dir.to_string_lossy().contains("sonoplex"));
    }

    #[test]
    fn default_config_path_is_inside_user_config_dir() {
        let path = default_config_path();
        assert!(path.starts_with(user_config_dir()));
        assert_eq!(path.file_name().unwrap(), "sonoplex.toml");
    }
}
