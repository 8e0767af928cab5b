//
// Copyright (c) The yangtool Contributors
//
// SPDX-License-Identifier: MIT
//

//! Engine configuration: search-directory and enabled-feature lists, read
//! from a pre-parsed [`EngineConfig`] plus an environment-variable
//! overlay.

use std::path::PathBuf;

use crate::error::{Error, ErrorCode, Result};

/// `YANGTOOL_MODULE_PATH`: colon-separated search directories, applied on
/// top of whatever [`EngineConfig::search_dirs`] already has.
const ENV_MODULE_PATH: &str = "YANGTOOL_MODULE_PATH";
/// `YANGTOOL_FEATURES`: comma-separated `module:feature` pairs to enable.
const ENV_FEATURES: &str = "YANGTOOL_FEATURES";

/// One `module:feature` pair to enable after loading.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FeatureToggle {
    pub module: String,
    pub feature: String,
}

/// Engine bootstrap configuration: where to look for `.yang` files, and
/// which features to turn on once they're loaded.
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    pub search_dirs: Vec<PathBuf>,
    pub enabled_features: Vec<FeatureToggle>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    pub fn with_feature(mut self, module: impl Into<String>, feature: impl Into<String>) -> Self {
        self.enabled_features.push(FeatureToggle {
            module: module.into(),
            feature: feature.into(),
        });
        self
    }

    /// Applies the `YANGTOOL_MODULE_PATH`/`YANGTOOL_FEATURES` environment
    /// overlay on top of whatever was already configured in code, the
    /// overlay winning on conflicts (appended after, search order matters
    /// for `search_dirs`).
    pub fn apply_env_overlay(mut self) -> Self {
        if let Ok(path) = std::env::var(ENV_MODULE_PATH) {
            for dir in path.split(':').filter(|s| !s.is_empty()) {
                self.search_dirs.push(PathBuf::from(dir));
            }
        }
        if let Ok(features) = std::env::var(ENV_FEATURES) {
            for entry in features.split(',').filter(|s| !s.is_empty()) {
                if let Some((module, feature)) = entry.split_once(':') {
                    self.enabled_features.push(FeatureToggle {
                        module: module.to_string(),
                        feature: feature.to_string(),
                    });
                }
            }
        }
        self
    }

    /// Resolves `name.yang` against the configured search directories, in
    /// order, returning the first hit.
    pub fn resolve_module_file(&self, name: &str) -> Result<PathBuf> {
        let filename = format!("{name}.yang");
        for dir in &self.search_dirs {
            let candidate = dir.join(&filename);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Err(Error::fatal(
            ErrorCode::InternalMemory,
            format!("module file '{filename}' not found in configured search directories"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overlay_appends_search_dirs_and_features() {
        // SAFETY: test-local env var, not shared with other tests running
        // the default single-threaded test harness for this module.
        std::env::set_var(ENV_MODULE_PATH, "/a:/b");
        std::env::set_var(ENV_FEATURES, "ietf-interfaces:if-mib");
        let cfg = EngineConfig::new().with_search_dir("/base").apply_env_overlay();
        assert_eq!(cfg.search_dirs, vec![PathBuf::from("/base"), PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(
            cfg.enabled_features,
            vec![FeatureToggle {
                module: "ietf-interfaces".to_string(),
                feature: "if-mib".to_string(),
            }]
        );
        std::env::remove_var(ENV_MODULE_PATH);
        std::env::remove_var(ENV_FEATURES);
    }

    #[test]
    fn resolve_module_file_errors_when_not_found() {
        let cfg = EngineConfig::new().with_search_dir("/nonexistent-dir-for-test");
        assert!(cfg.resolve_module_file("missing").is_err());
    }
}
