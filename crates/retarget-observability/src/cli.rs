//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-retarget-core`, `--debug-retarget-transports`,
//! etc. to raise a single crate to debug level.

use std::collections::BTreeSet;
use std::env;

use crate::KNOWN_CRATES;

/// Per-crate debug switches
///
/// # Example
/// ```rust
/// use retarget_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-retarget-core".to_string()]);
/// assert!(flags.is_enabled("retarget-core"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrateDebugFlags {
    pub enabled_crates: BTreeSet<String>,
}

impl CrateDebugFlags {
    /// Parse debug flags from command-line arguments
    ///
    /// Looks for arguments matching `--debug-{crate-name}`; `--debug-all`
    /// enables every known crate. Other arguments are ignored.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = CrateDebugFlags::default();

        for arg in args {
            if arg == "--debug-all" {
                flags.enable_all();
            } else if let Some(crate_name) = arg.strip_prefix("--debug-") {
                flags.enable(crate_name);
            }
        }

        flags
    }

    /// Enable debug output for one crate
    pub fn enable(&mut self, crate_name: &str) {
        self.enabled_crates.insert(crate_name.to_string());
    }

    /// Enable debug output for every known crate
    pub fn enable_all(&mut self) {
        for crate_name in KNOWN_CRATES {
            self.enable(crate_name);
        }
    }

    /// Check if debug is enabled for a specific crate
    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains(crate_name)
    }

    /// Check if debug is enabled for any crate
    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// Get log level for a crate
    pub fn log_level(&self, crate_name: &str) -> tracing::Level {
        if self.is_enabled(crate_name) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Filter directive with `info` as the default level
    pub fn to_filter_string(&self) -> String {
        self.to_filter_string_with("info")
    }

    /// Filter directive for `EnvFilter`
    ///
    /// Format: `retarget_core=debug,retarget_transports=debug,<default_level>`.
    /// Crate names are written with underscores because tracing targets use
    /// the Rust module path.
    pub fn to_filter_string_with(&self, default_level: &str) -> String {
        let mut filters: Vec<String> = self
            .enabled_crates
            .iter()
            .map(|crate_name| format!("{}=debug", crate_name.replace('-', "_")))
            .collect();
        filters.push(default_level.to_string());
        filters.join(",")
    }
}

/// Parse debug flags from process arguments and `RETARGET_DEBUG`
///
/// Environment variable format: comma-separated crate names, e.g.
/// `retarget-core,retarget-transports`, or `all`.
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());
    if let Ok(env_var) = env::var("RETARGET_DEBUG") {
        apply_debug_env(&mut flags, &env_var);
    }
    flags
}

fn apply_debug_env(flags: &mut CrateDebugFlags, value: &str) {
    if value.trim() == "all" {
        flags.enable_all();
        return;
    }
    for crate_name in value.split(',') {
        let crate_name = crate_name.trim();
        if !crate_name.is_empty() {
            flags.enable(crate_name);
        }
    }
}

/// Generate help text for debug flags
pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for specific crate

Available crates:
  {}

Environment Variable:
  RETARGET_DEBUG={{crate-name}}[,{{crate-name}}]  Enable debug for crates (comma-separated)
  RETARGET_DEBUG=all                             Enable debug for all crates

Examples:
  --debug-retarget-core
  --debug-retarget-core --debug-retarget-transports
  RETARGET_DEBUG=retarget-core,retarget-transports
"#,
        KNOWN_CRATES.join(", ")
    )
}
