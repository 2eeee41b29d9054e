//! Cross-compilation configuration resolution.
//!
//! The wasm stages need a WASI SDK (its clang compiles `parser.c` and
//! `scanner.c` for wasm32 targets). The SDK location is resolved once per
//! run: an explicit `WASI_SDK_PATH` wins, then the version pin recorded in
//! `toolchain.json`, then the built-in pin. Resolution never fails; anything
//! missing or malformed falls back to the defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Version-pin manifest, relative to the repo root.
pub const MANIFEST_FILE: &str = "toolchain.json";

/// Environment variable naming the WASI SDK install root.
pub const ENV_WASI_SDK_PATH: &str = "WASI_SDK_PATH";

/// Set to `1` to let wasm-pack run its wasm-opt pass. Off by default so
/// packaging does not pull a binaryen download as a side effect.
pub const ENV_WASM_OPT: &str = "CANGJIE_WASM_OPT";

/// Key under `versions` in the manifest.
pub const SDK_VERSION_KEY: &str = "wasi-sdk";

/// Fallback pin when neither the environment nor the manifest says otherwise.
pub const DEFAULT_SDK_VERSION: &str = "29.0";

/// Flags taken verbatim from the CLI.
#[derive(Clone, Copy)]
pub struct CliFlags {
    pub wasm_only: bool,
}

/// The slice of the process environment the resolver consults. Captured as
/// plain values so resolution stays testable without touching global state.
pub struct HostEnv {
    pub sdk_path: Option<String>,
    pub wasm_opt: Option<String>,
}

impl HostEnv {
    pub fn capture() -> Self {
        Self {
            sdk_path: env::var(ENV_WASI_SDK_PATH).ok().filter(|v| !v.is_empty()),
            wasm_opt: env::var(ENV_WASM_OPT).ok(),
        }
    }
}

/// Resolved once at startup; read-only for the rest of the run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub wasm_only: bool,
    pub sdk_path: PathBuf,
    pub wasi_sdk_version: String,
    pub disable_wasm_opt: bool,
    /// True when `WASI_SDK_PATH` was absent from the environment, in which
    /// case the wasm stages get the resolved path injected per-stage.
    pub inject_sdk_env: bool,
}

#[derive(Serialize, Deserialize, Default)]
struct Manifest {
    #[serde(default)]
    versions: BTreeMap<String, String>,
}

/// Resolve the build configuration. Never fails.
pub fn resolve(cli: CliFlags, host: &HostEnv, manifest_path: &Path) -> BuildConfig {
    let version =
        manifest_version(manifest_path).unwrap_or_else(|| DEFAULT_SDK_VERSION.to_string());
    ensure_version_pinned(manifest_path, &version);

    let (sdk_path, inject_sdk_env) = match &host.sdk_path {
        Some(path) => {
            eprintln!("[info] {ENV_WASI_SDK_PATH} set, using {path}");
            (PathBuf::from(path), false)
        }
        None => (default_sdk_path(&version), true),
    };

    BuildConfig {
        wasm_only: cli.wasm_only,
        sdk_path,
        wasi_sdk_version: version,
        disable_wasm_opt: host.wasm_opt.as_deref() != Some("1"),
        inject_sdk_env,
    }
}

fn manifest_version(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    let manifest: Manifest = serde_json::from_str(&text).ok()?;
    manifest.versions.get(SDK_VERSION_KEY).cloned()
}

/// Write the resolved pin back into the manifest if it is missing.
/// Idempotent: a manifest that already carries the key is left untouched,
/// and an absent or malformed manifest is not created or repaired here.
/// Edits the parsed document in place so keys this tool does not model
/// survive the round trip.
fn ensure_version_pinned(path: &Path, version: &str) {
    let Ok(text) = fs::read_to_string(path) else {
        return;
    };
    let Ok(mut doc) = serde_json::from_str::<serde_json::Value>(&text) else {
        return;
    };
    let Some(root) = doc.as_object_mut() else {
        return;
    };
    let versions = root
        .entry("versions")
        .or_insert_with(|| serde_json::json!({}));
    let Some(versions) = versions.as_object_mut() else {
        return;
    };
    if versions.contains_key(SDK_VERSION_KEY) {
        return;
    }

    versions.insert(
        SDK_VERSION_KEY.to_string(),
        serde_json::Value::String(version.to_string()),
    );
    match serde_json::to_string_pretty(&doc) {
        Ok(json) => match fs::write(path, json + "\n") {
            Ok(()) => eprintln!(
                "[info] pinned {SDK_VERSION_KEY} {version} in {}",
                path.display()
            ),
            Err(e) => eprintln!("[warn] could not update {}: {e}", path.display()),
        },
        Err(e) => eprintln!("[warn] could not serialize manifest: {e}"),
    }
}

fn default_sdk_path(version: &str) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(format!("C:/opt/wasi-sdk-{version}"))
    } else {
        PathBuf::from(format!("/opt/wasi-sdk-{version}"))
    }
}
