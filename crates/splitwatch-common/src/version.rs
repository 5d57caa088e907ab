//! ---
//! sw_section: "01-core-functionality"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Shared primitives and utilities for the core runtime."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use serde::Serialize;

/// Build metadata reported by binaries and the metrics exporter.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VersionInfo {
    pub package: String,
    pub semver: String,
    pub profile: String,
}

impl VersionInfo {
    pub fn current() -> Self {
        let profile = if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        };
        Self {
            package: env!("CARGO_PKG_NAME").to_owned(),
            semver: env!("CARGO_PKG_VERSION").to_owned(),
            profile: profile.to_owned(),
        }
    }

    pub fn cli_string(&self) -> String {
        format!("v{}", self.semver)
    }

    pub fn extended(&self) -> String {
        format!("splitwatch {} ({} build)", self.cli_string(), self.profile)
    }
}
