//! # Cangjie grammar build orchestrator
//!
//! Drives the full artifact build for the Cangjie editor extension:
//! generate + build the tree-sitter parser, compile the wasm extension
//! module, package it for the host runtime, and place the result at the
//! canonical destinations. Missing toolchains degrade the run instead of
//! failing it; only a broken parser build (or a missing grammar directory)
//! is fatal.
//!
//! ```bash
//! cangjie-build              # full build
//! cangjie-build --wasm-only  # skip parser generation/build
//! ```

use anyhow::Result;
use clap::Parser;

use cangjie_build::config;
use cangjie_build::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "cangjie-build")]
#[command(about = "Build the Cangjie grammar and its wasm extension module")]
struct Cli {
    /// Skip parser generation/build and run only the wasm module stages.
    #[arg(long)]
    wasm_only: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = std::env::current_dir()?;

    let cfg = config::resolve(
        config::CliFlags {
            wasm_only: cli.wasm_only,
        },
        &config::HostEnv::capture(),
        &root.join(config::MANIFEST_FILE),
    );

    Pipeline::new(root, cfg).execute()
}
