// src/profile.rs

use std::{fs, path::Path};

use indexmap::IndexMap;
use serde::Deserialize;
use strum::IntoEnumIterator;
use tracing::{debug, warn};

use crate::{errors::ProfileError, tweaks::ModuleId};

const BUILTIN_PROFILES: &[(&str, &str)] = &[
    ("competitive.json", include_str!("../profiles/competitive.json")),
    ("balanced.json", include_str!("../profiles/balanced.json")),
];

/// A declarative selection of tweak modules.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub optimizations: Optimizations,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Optimizations {
    #[serde(default)]
    pub power_plan: Toggle,
    #[serde(default)]
    pub services: ServicesOption,
    #[serde(default)]
    pub gaming_features: Toggle,
    #[serde(default)]
    pub nagle_algorithm: Toggle,
    #[serde(default)]
    pub temp_files: Toggle,
}

/// An on/off switch, written either as a bare boolean or as `{"enabled": bool}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "ToggleRepr")]
pub struct Toggle {
    pub enabled: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ToggleRepr {
    Flag(bool),
    Table { enabled: bool },
}

impl From<ToggleRepr> for Toggle {
    fn from(repr: ToggleRepr) -> Self {
        match repr {
            ToggleRepr::Flag(enabled) | ToggleRepr::Table { enabled } => Toggle { enabled },
        }
    }
}

impl From<bool> for Toggle {
    fn from(enabled: bool) -> Self {
        Toggle { enabled }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServicesOption {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub list: Vec<String>,
}

impl Profile {
    pub fn from_json(name: &str, text: &str) -> Result<Self, ProfileError> {
        serde_json::from_str(text).map_err(|source| ProfileError::Parse {
            name: name.to_string(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ProfileError> {
        let text = fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&path.display().to_string(), &text)
    }

    pub fn is_enabled(&self, module: ModuleId) -> bool {
        let opts = &self.optimizations;
        match module {
            ModuleId::PowerPlan => opts.power_plan.enabled,
            ModuleId::Services => opts.services.enabled,
            ModuleId::GamingFeatures => opts.gaming_features.enabled,
            ModuleId::NagleAlgorithm => opts.nagle_algorithm.enabled,
            ModuleId::TempFiles => opts.temp_files.enabled,
        }
    }

    /// Names of the enabled modules, in the order an optimize cycle runs them.
    pub fn enabled_modules(&self) -> Vec<&'static str> {
        ModuleId::iter()
            .filter(|id| self.is_enabled(*id))
            .map(<&'static str>::from)
            .collect()
    }
}

/// Known profiles keyed by id, in load order.
#[derive(Debug, Clone, Default)]
pub struct ProfileCatalog {
    profiles: IndexMap<String, Profile>,
}

impl ProfileCatalog {
    /// The profiles shipped with the binary.
    pub fn builtin() -> Self {
        let mut catalog = Self::default();
        for (name, text) in BUILTIN_PROFILES {
            match Profile::from_json(name, text) {
                Ok(profile) => catalog.insert(profile),
                Err(e) => warn!("Skipping built-in profile: {}", e),
            }
        }
        catalog
    }

    /// Built-in profiles overlaid with every `*.json` file in `dir`.
    ///
    /// A missing directory is not an error. Malformed files are skipped with a warning.
    pub fn load(dir: &Path) -> Self {
        let mut catalog = Self::builtin();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("No profile directory at '{}': {}", dir.display(), e);
                return catalog;
            }
        };

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            match Profile::from_file(&path) {
                Ok(profile) => {
                    debug!("Loaded profile '{}' from '{}'.", profile.id, path.display());
                    catalog.insert(profile);
                }
                Err(e) => warn!("{}", e),
            }
        }
        catalog
    }

    pub fn insert(&mut self, profile: Profile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    pub fn get(&self, id: &str) -> Option<&Profile> {
        self.profiles.get(id)
    }

    /// Resolves `selector` as a profile id, falling back to a path to a profile file.
    pub fn resolve(&self, selector: &str) -> Result<Profile, ProfileError> {
        if let Some(profile) = self.get(selector) {
            return Ok(profile.clone());
        }
        let path = Path::new(selector);
        if path.is_file() {
            return Profile::from_file(path);
        }
        Err(ProfileError::UnknownProfile(selector.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn parses_profile_with_mixed_toggle_shapes() {
        let profile = Profile::from_json(
            "test",
            r#"{
                "id": "custom",
                "name": "Custom",
                "description": "mixed",
                "optimizations": {
                    "power_plan": true,
                    "services": {"enabled": true, "list": ["SysMain", "DiagTrack"]},
                    "gaming_features": {"enabled": false},
                    "nagle_algorithm": {"enabled": true},
                    "temp_files": false
                }
            }"#,
        )
        .unwrap();

        assert!(profile.is_enabled(ModuleId::PowerPlan));
        assert!(profile.is_enabled(ModuleId::Services));
        assert!(!profile.is_enabled(ModuleId::GamingFeatures));
        assert!(profile.is_enabled(ModuleId::NagleAlgorithm));
        assert!(!profile.is_enabled(ModuleId::TempFiles));
        assert_eq!(profile.optimizations.services.list, ["SysMain", "DiagTrack"]);
    }

    #[test]
    fn enabled_modules_follow_cycle_order() {
        let profile = Profile::from_json(
            "test",
            r#"{"id": "x", "name": "X", "optimizations": {"temp_files": true, "power_plan": {"enabled": true}}}"#,
        )
        .unwrap();
        assert_eq!(profile.enabled_modules(), ["power_plan", "temp_files"]);
    }

    #[test]
    fn missing_modules_default_to_disabled() {
        let profile = Profile::from_json("test", r#"{"id": "x", "name": "X"}"#).unwrap();
        assert!(!profile.is_enabled(ModuleId::PowerPlan));
        assert!(profile.optimizations.services.list.is_empty());
    }

    #[test]
    fn builtins_are_valid() {
        let catalog = ProfileCatalog::builtin();
        assert_eq!(catalog.len(), BUILTIN_PROFILES.len());
        let competitive = catalog.get("competitive").unwrap();
        assert!(competitive.is_enabled(ModuleId::PowerPlan));
        assert!(!competitive.optimizations.services.list.is_empty());
    }

    #[test]
    fn directory_profiles_override_builtins_and_bad_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("competitive.json"),
            r#"{"id": "competitive", "name": "Mine", "optimizations": {"power_plan": false}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("broken.json"), "{").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let catalog = ProfileCatalog::load(dir.path());
        assert_eq!(catalog.len(), BUILTIN_PROFILES.len());
        let competitive = catalog.get("competitive").unwrap();
        assert_eq!(competitive.name, "Mine");
        assert!(!competitive.is_enabled(ModuleId::PowerPlan));
    }

    #[test]
    fn resolve_accepts_ids_and_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("extra.json");
        fs::write(&path, r#"{"id": "extra", "name": "Extra"}"#).unwrap();

        let catalog = ProfileCatalog::builtin();
        assert_eq!(catalog.resolve("balanced").unwrap().id, "balanced");
        assert_eq!(catalog.resolve(path.to_str().unwrap()).unwrap().id, "extra");
        assert!(matches!(
            catalog.resolve("nope"),
            Err(ProfileError::UnknownProfile(_))
        ));
    }
}
