//! Well-known locations under the user's home directory.

use std::path::PathBuf;

/// Name of the per-user configuration directory.
pub const CONFIG_DIR_NAME: &str = ".keyward";

/// Environment variable that replaces the configuration directory.
pub const HOME_ENV: &str = "KEYWARD_HOME";

/// Get the user's home directory, if one can be determined.
pub fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let home = std::env::var_os("USERPROFILE");
    #[cfg(not(target_os = "windows"))]
    let home = std::env::var_os("HOME");

    home.filter(|h| !h.is_empty()).map(PathBuf::from)
}

/// The Keyward configuration directory: `$KEYWARD_HOME` when set,
/// otherwise `~/.keyward`.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    home_dir().map(|h| h.join(CONFIG_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_dir_is_absolute_when_home_known() {
        if std::env::var_os(HOME_ENV).is_none()
            && let Some(home) = home_dir()
        {
            assert_eq!(config_dir(), Some(home.join(CONFIG_DIR_NAME)));
        }
    }
}
