//! External toolchain discovery.
//!
//! A probe never hard-fails: a missing tool is a normal outcome the
//! pipeline branches on. Detection is two-tier because not every tool
//! implements `--version` (tier one) and not every platform resolves
//! command names the same way (tier two).

use std::process::{Command, Stdio};

/// The tree-sitter CLI: grammar generation, native and web parser builds.
pub const TREE_SITTER: &str = "tree-sitter";

/// Compiler toolchain for the wasm extension module.
pub const CARGO: &str = "cargo";

/// Packaging tool wrapping the core module with host glue.
pub const WASM_PACK: &str = "wasm-pack";

/// Tools assumed present when both detection tiers come up empty. On
/// Windows the npm shim for tree-sitter (`tree-sitter.cmd`) is only
/// resolvable through cmd's PATHEXT handling, which defeats both the
/// direct invocation and the path lookup. Kept deliberately narrow; do
/// not add tools here without the same kind of evidence.
const ASSUME_AVAILABLE: &[&str] = &[TREE_SITTER];

/// One probe per tool per run; not cached.
pub struct ProbeResult {
    pub tool: String,
    pub available: bool,
}

/// OS-family-specific executable lookup, selected once at startup.
pub enum CommandLocator {
    Unix,
    Windows,
}

impl CommandLocator {
    pub fn for_host() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Unix
        }
    }

    /// Whether `name` resolves to an executable on the search path.
    pub fn locate(&self, name: &str) -> bool {
        match self {
            Self::Unix => which::which(name).is_ok(),
            // `where.exe` honors PATHEXT, which plain path scanning misses.
            Self::Windows => Command::new("where")
                .arg(name)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false),
        }
    }
}

pub struct ToolProbe {
    locator: CommandLocator,
}

impl Default for ToolProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolProbe {
    pub fn new() -> Self {
        Self {
            locator: CommandLocator::for_host(),
        }
    }

    /// Classify one tool. Tier one: invoke it with `--version`, output
    /// suppressed, zero exit means available. Tier two: ask the locator.
    pub fn probe(&self, tool: &str) -> ProbeResult {
        let direct = Command::new(tool)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);

        let available = direct || self.locator.locate(tool) || ASSUME_AVAILABLE.contains(&tool);
        ProbeResult {
            tool: tool.to_string(),
            available,
        }
    }
}
