// ABOUTME: Configuration and constants for the Flowby interpreter
// This module contains version info, run limits, and network/module settings

use std::path::PathBuf;

pub const VERSION: &str = "0.9.0";
pub const WELCOME_MESSAGE: &str = "Flowby v0.9";
pub const WELCOME_SUBTITLE: &str = "A Python-indented DSL for web-automation workflows";
pub const WELCOME_FOOTER: &str = "Type a statement to run it; :help lists builtins. Ctrl-D exits.";

/// Runtime guard rails.
#[derive(Debug, Clone)]
pub struct RunLimits {
    /// Iteration ceiling for a single while loop.
    pub max_loop_iterations: usize,
    /// Whether a function may re-enter itself.
    pub allow_recursion: bool,
    /// Call stack depth ceiling.
    pub max_call_depth: usize,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_loop_iterations: 10_000,
            allow_recursion: false,
            max_call_depth: 64,
        }
    }
}

/// Network settings for the `http` namespace.
#[derive(Debug, Clone, Default)]
pub struct NetConfig {
    /// Whether network I/O is enabled.
    pub enabled: bool,
    /// Allowed network addresses (host or host:port substrings).
    /// Empty = no restrictions (if enabled=true).
    pub allowed_addresses: Vec<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

/// Module loader settings.
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    /// Search roots tried in order when a path is not importer-relative:
    /// `lib/` under the importer, `lib/` under the project root, the user
    /// library dir, then the system library dir.
    pub search_roots: Vec<PathBuf>,
    /// Refuse files without a `library` declaration. When false, top-level
    /// const and function declarations are implicitly exported.
    pub strict_imports: bool,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        let mut search_roots = vec![PathBuf::from("lib")];
        if let Some(home) = std::env::var_os("HOME") {
            search_roots.push(PathBuf::from(home).join(".flowby").join("lib"));
        }
        search_roots.push(PathBuf::from("/usr/local/share/flowby/lib"));
        Self {
            search_roots,
            strict_imports: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = RunLimits::default();
        assert_eq!(limits.max_loop_iterations, 10_000);
        assert!(!limits.allow_recursion);
    }

    #[test]
    fn test_network_disabled_by_default() {
        assert!(!NetConfig::default().enabled);
    }
}
