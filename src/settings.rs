//! User settings: default tokens per subcommand and named token aliases.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::format::Mode;

const SETTINGS_ENV: &str = "TABX_SETTINGS";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Tokens applied before the user's, keyed by subcommand name.
    pub defaults: HashMap<String, Vec<String>>,
    /// Token lists substituted for `@NAME`.
    pub aliases: HashMap<String, Vec<String>>,
}

/// `$TABX_SETTINGS`, else `<config dir>/tabx/settings.json`.
pub fn default_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(SETTINGS_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("tabx").join("settings.json"))
}

impl Settings {
    /// Read settings from `path`. A missing file gives empty settings.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read settings {}", path.display()));
            }
        };
        serde_json::from_str(&text)
            .with_context(|| format!("invalid settings file {}", path.display()))
    }

    /// Full token list for a run: mode defaults, then user tokens with
    /// aliases expanded. Unknown aliases are kept as written.
    pub fn expand(&self, mode: Mode, tokens: &[String]) -> Vec<String> {
        let defaults = self.defaults.get(mode.name()).into_iter().flatten();
        defaults
            .chain(tokens)
            .flat_map(|token| {
                match token.strip_prefix('@').and_then(|name| self.aliases.get(name)) {
                    Some(expansion) => expansion.clone(),
                    None => vec![token.clone()],
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn tokens(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn load_defaults_and_aliases() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"defaults": {{"csv": ["out..table"]}}, "aliases": {{"lag": ["col[0,4]", "sort[1]:desc"]}}}}"#
        )
        .unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.defaults["csv"], tokens(&["out..table"]));
        assert_eq!(
            settings.expand(Mode::Csv, &tokens(&["@lag", "-outhead"])),
            tokens(&["out..table", "col[0,4]", "sort[1]:desc", "-outhead"])
        );
        assert_eq!(settings.expand(Mode::Json, &tokens(&["keys"])), tokens(&["keys"]));
    }

    #[test]
    fn partial_settings() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"aliases": {{"first": ["row[1:2]"]}}}}"#).unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert!(settings.defaults.is_empty());
        assert_eq!(
            settings.expand(Mode::Csv, &tokens(&["@first", "@unknown"])),
            tokens(&["row[1:2]", "@unknown"])
        );
    }

    #[test]
    fn invalid_file_names_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = Settings::load(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains(&file.path().display().to_string()));
    }
}
