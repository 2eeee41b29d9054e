//! Staged build pipeline for the Cangjie grammar artifacts.
//!
//! Stage order and failure policy:
//! 1. `generate` - tree-sitter parser generation (Abort)
//! 2. `build-native-parser` - native parser in the grammar dir (Abort)
//! 3. probe cargo; missing means the native parser is the whole deliverable
//! 4. `build-wasm-module` - core module for wasm32-unknown-unknown
//! 5. `package-wasm` - wasm-pack wraps the module with host glue
//! 6. strategy walk: packaged module, raw module fallback, placeholder
//! 7. `build-web-grammar` - browser grammar wasm (optional, warn only)
//! 8. place whichever module was produced at both destinations
//!
//! The exit code is non-zero only for a missing grammar directory or a
//! failed Abort stage. Every degradation is reported and still succeeds:
//! the contract is "best achievable artifact, never silently do nothing."

use anyhow::{bail, Result};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::artifact::{self, ArtifactDescriptor};
use crate::config::{BuildConfig, ENV_WASI_SDK_PATH};
use crate::probe::{self, ToolProbe};
use crate::stage::{self, OnFailure, StageSpec};

/// Grammar source directory, relative to the repo root.
pub const GRAMMAR_DIR: &str = "tree-sitter-cangjie";

/// File name of the placed module at both destinations.
pub const MODULE_ARTIFACT: &str = "cangjie.wasm";

/// Where wasm-pack leaves the packaged module, relative to the repo root.
pub const PACKAGED_MODULE: &str = "pkg/cangjie_zed_bg.wasm";

/// Where the raw cargo build leaves the core module.
pub const RAW_MODULE: &str = "target/wasm32-unknown-unknown/release/cangjie_zed.wasm";

/// Browser-oriented grammar wasm, built into the grammar directory.
const WEB_GRAMMAR: &str = "tree-sitter-cangjie.wasm";

/// External tool command names. Overridable so tests can point the
/// pipeline at stub scripts.
pub struct Tools {
    pub tree_sitter: String,
    pub cargo: String,
    pub wasm_pack: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            tree_sitter: probe::TREE_SITTER.to_string(),
            cargo: probe::CARGO.to_string(),
            wasm_pack: probe::WASM_PACK.to_string(),
        }
    }
}

/// Which strategy ultimately produced the placed module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleKind {
    Packaged,
    RawModule,
    Placeholder,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Packaged => "packaged",
            Self::RawModule => "fallback",
            Self::Placeholder => "placeholder",
        })
    }
}

pub struct Pipeline {
    root: PathBuf,
    config: BuildConfig,
    tools: Tools,
    probe: ToolProbe,
}

impl Pipeline {
    pub fn new(root: PathBuf, config: BuildConfig) -> Self {
        Self {
            root,
            config,
            tools: Tools::default(),
            probe: ToolProbe::new(),
        }
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Tools) -> Self {
        self.tools = tools;
        self
    }

    /// Run the whole pipeline. Degradations return `Ok`; only missing
    /// prerequisites and failed Abort stages return `Err`.
    pub fn execute(&self) -> Result<()> {
        let grammar_dir = self.root.join(GRAMMAR_DIR);
        if !grammar_dir.is_dir() {
            bail!(
                "grammar directory missing: {} (run from the repository root)",
                grammar_dir.display()
            );
        }

        println!("=== Building Cangjie grammar artifacts ===");
        eprintln!(
            "[info] wasi-sdk {} at {}",
            self.config.wasi_sdk_version,
            self.config.sdk_path.display()
        );

        if self.config.wasm_only {
            eprintln!("[skip] parser generation/build (--wasm-only)");
        } else {
            self.run_stage(self.generate_stage(&grammar_dir))?;
            self.run_stage(self.native_build_stage(&grammar_dir))?;
        }

        let cargo = self.probe.probe(&self.tools.cargo);
        if !cargo.available {
            eprintln!(
                "[warn] `{}` not found; skipping the wasm module entirely. \
                 The native parser is the only artifact of this run.",
                cargo.tool
            );
            println!("=== Done (native parser only) ===");
            return Ok(());
        }

        let build = stage::run(&self.module_build_stage());
        if !build.succeeded {
            eprintln!(
                "[warn] stage `{}` failed ({}); packaging may still recover",
                build.stage_name, build.exit
            );
        }

        let (kind, source) = self.produce_module();

        // Browser grammar is best effort and never affects the exit code.
        let web = stage::run(&self.web_grammar_stage(&grammar_dir));
        if !web.succeeded {
            eprintln!(
                "[warn] stage `{}` failed ({}); browser grammar skipped",
                web.stage_name, web.exit
            );
        }

        let destinations = vec![
            grammar_dir.join(MODULE_ARTIFACT),
            self.root.join(MODULE_ARTIFACT),
        ];
        match source {
            Some(source) => {
                artifact::place(&ArtifactDescriptor {
                    source,
                    destinations,
                });
            }
            None => {
                eprintln!(
                    "[warn] no wasm module could be produced; writing an empty \
                     placeholder so consumers still find a file"
                );
                artifact::write_placeholder(&destinations);
            }
        }

        println!("=== Done ({kind} module) ===");
        Ok(())
    }

    /// Run one stage and apply its failure policy.
    fn run_stage(&self, spec: StageSpec) -> Result<()> {
        let outcome = stage::run(&spec);
        if outcome.succeeded {
            return Ok(());
        }
        match spec.on_failure {
            OnFailure::Abort => {
                eprintln!("[FAIL] stage `{}`: {}", spec.name, outcome.exit);
                if !outcome.stderr_tail.is_empty() {
                    eprintln!("[FAIL] last stderr lines:");
                    for line in &outcome.stderr_tail {
                        eprintln!("    {line}");
                    }
                }
                bail!("stage `{}` failed ({})", spec.name, outcome.exit)
            }
            OnFailure::Warn | OnFailure::TrySecondary => {
                eprintln!("[warn] stage `{}` failed ({})", spec.name, outcome.exit);
                Ok(())
            }
        }
    }

    /// Walk the module-producing strategies in order and stop at the first
    /// one that yields a file. The placeholder strategy is the terminal
    /// catch-all and is handled by the caller (it has no source file).
    fn produce_module(&self) -> (ModuleKind, Option<PathBuf>) {
        // Strategy 1: packaged module.
        let pack = self.probe.probe(&self.tools.wasm_pack);
        if pack.available {
            let outcome = stage::run(&self.package_stage());
            if outcome.succeeded {
                let packaged = self.root.join(PACKAGED_MODULE);
                if packaged.is_file() {
                    return (ModuleKind::Packaged, Some(packaged));
                }
                eprintln!(
                    "[warn] `{}` reported success but {} is missing; \
                     treating this as a packaging failure",
                    pack.tool, PACKAGED_MODULE
                );
            } else {
                eprintln!(
                    "[warn] stage `{}` failed ({})",
                    outcome.stage_name, outcome.exit
                );
            }
        } else {
            eprintln!(
                "[warn] `{}` not found; the wasm module cannot be packaged for \
                 the host runtime. Install it with: cargo install wasm-pack",
                pack.tool
            );
        }

        // Strategy 2: reinvoke the raw compiler build and take its module
        // as a degraded deliverable.
        eprintln!("[step] falling back to the raw cargo module build");
        let outcome = stage::run(&self.module_build_stage());
        let raw = self.root.join(RAW_MODULE);
        if raw.is_file() {
            eprintln!(
                "[warn] using the unpackaged module {} (no host glue)",
                RAW_MODULE
            );
            return (ModuleKind::RawModule, Some(raw));
        }
        if !outcome.succeeded {
            eprintln!(
                "[warn] fallback stage `{}` failed ({})",
                outcome.stage_name, outcome.exit
            );
        }

        (ModuleKind::Placeholder, None)
    }

    fn generate_stage(&self, grammar_dir: &Path) -> StageSpec {
        StageSpec {
            name: "generate",
            command: vec![self.tools.tree_sitter.clone(), "generate".to_string()],
            working_dir: grammar_dir.to_path_buf(),
            env: Vec::new(),
            optional: false,
            on_failure: OnFailure::Abort,
        }
    }

    fn native_build_stage(&self, grammar_dir: &Path) -> StageSpec {
        StageSpec {
            name: "build-native-parser",
            command: vec![self.tools.tree_sitter.clone(), "build".to_string()],
            working_dir: grammar_dir.to_path_buf(),
            env: Vec::new(),
            optional: false,
            on_failure: OnFailure::Abort,
        }
    }

    fn module_build_stage(&self) -> StageSpec {
        StageSpec {
            name: "build-wasm-module",
            command: vec![
                self.tools.cargo.clone(),
                "build".to_string(),
                "--release".to_string(),
                "--target".to_string(),
                "wasm32-unknown-unknown".to_string(),
            ],
            working_dir: self.root.clone(),
            env: self.sdk_env(),
            optional: false,
            on_failure: OnFailure::TrySecondary,
        }
    }

    fn package_stage(&self) -> StageSpec {
        let mut command = vec![
            self.tools.wasm_pack.clone(),
            "build".to_string(),
            "--release".to_string(),
            "--target".to_string(),
            "nodejs".to_string(),
        ];
        if self.config.disable_wasm_opt {
            // Keeps wasm-pack from downloading binaryen as a side effect.
            command.push("--no-opt".to_string());
        }
        StageSpec {
            name: "package-wasm",
            command,
            working_dir: self.root.clone(),
            env: self.sdk_env(),
            optional: false,
            on_failure: OnFailure::TrySecondary,
        }
    }

    fn web_grammar_stage(&self, grammar_dir: &Path) -> StageSpec {
        StageSpec {
            name: "build-web-grammar",
            command: vec![
                self.tools.tree_sitter.clone(),
                "build".to_string(),
                "--wasm".to_string(),
                "--output".to_string(),
                WEB_GRAMMAR.to_string(),
            ],
            working_dir: grammar_dir.to_path_buf(),
            env: Vec::new(),
            optional: true,
            on_failure: OnFailure::Warn,
        }
    }

    /// Per-stage SDK overlay. Only injected when the variable was absent
    /// from the environment at startup; the process environment itself is
    /// never mutated.
    fn sdk_env(&self) -> Vec<(String, String)> {
        if self.config.inject_sdk_env {
            vec![(
                ENV_WASI_SDK_PATH.to_string(),
                self.config.sdk_path.to_string_lossy().into_owned(),
            )]
        } else {
            Vec::new()
        }
    }
}
