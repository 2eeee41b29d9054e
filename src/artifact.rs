//! Artifact placement.
//!
//! The produced module is copied to every canonical destination required
//! by consumers. Destinations are independent: one failed copy is reported
//! and does not block the rest. Re-runs overwrite unconditionally.

use std::fs;
use std::path::PathBuf;

/// Where a built module comes from and everywhere it must end up.
pub struct ArtifactDescriptor {
    pub source: PathBuf,
    pub destinations: Vec<PathBuf>,
}

/// Copy the source to each destination in order. Returns how many
/// destinations were written.
pub fn place(descriptor: &ArtifactDescriptor) -> usize {
    let mut placed = 0;
    for dest in &descriptor.destinations {
        match fs::copy(&descriptor.source, dest) {
            Ok(_) => {
                eprintln!("[ok] placed {}", dest.display());
                placed += 1;
            }
            Err(e) => eprintln!("[warn] could not place {}: {e}", dest.display()),
        }
    }
    placed
}

/// Write an empty file at each destination so downstream consumers find a
/// file at all. Same per-destination independence as [`place`].
pub fn write_placeholder(destinations: &[PathBuf]) -> usize {
    let mut written = 0;
    for dest in destinations {
        match fs::write(dest, []) {
            Ok(()) => {
                eprintln!("[warn] PLACEHOLDER written at {} (non-functional)", dest.display());
                written += 1;
            }
            Err(e) => eprintln!("[warn] could not write placeholder {}: {e}", dest.display()),
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_place_copies_to_all_destinations() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("module.wasm");
        fs::write(&source, b"wasm bytes").unwrap();

        let descriptor = ArtifactDescriptor {
            source: source.clone(),
            destinations: vec![tmp.path().join("a.wasm"), tmp.path().join("b.wasm")],
        };
        assert_eq!(place(&descriptor), 2);

        for dest in &descriptor.destinations {
            assert_eq!(fs::read(dest).unwrap(), b"wasm bytes");
        }
    }

    #[test]
    fn test_place_overwrites_existing_files() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("module.wasm");
        fs::write(&source, b"new").unwrap();
        let dest = tmp.path().join("out.wasm");
        fs::write(&dest, b"stale contents").unwrap();

        let descriptor = ArtifactDescriptor {
            source,
            destinations: vec![dest.clone()],
        };
        assert_eq!(place(&descriptor), 1);
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }

    #[cfg(unix)]
    #[test]
    fn test_one_unwritable_destination_does_not_block_the_other() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("module.wasm");
        fs::write(&source, b"wasm bytes").unwrap();

        let locked = tmp.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        let writable_dest = tmp.path().join("out.wasm");
        let descriptor = ArtifactDescriptor {
            source,
            destinations: vec![locked.join("out.wasm"), writable_dest.clone()],
        };
        assert_eq!(place(&descriptor), 1);
        assert_eq!(fs::read(&writable_dest).unwrap(), b"wasm bytes");

        // Restore permissions so TempDir cleanup can remove the directory.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_placeholder_is_empty() {
        let tmp = TempDir::new().unwrap();
        let dests = vec![tmp.path().join("a.wasm"), tmp.path().join("b.wasm")];
        assert_eq!(write_placeholder(&dests), 2);
        for dest in &dests {
            assert_eq!(fs::read(dest).unwrap(), b"");
        }
    }
}
