use crate::dockerignore::{DockerIgnore, DOCKERIGNORE};
use crate::error::Result;
use crate::image::DOCKERFILE;
use std::fs;
use std::hash::Hasher;
use std::path::Path;
use twox_hash::XxHash64;
use walkdir::{DirEntry, WalkDir};

/// Directories that never make it into an image build
const SKIPPED_DIRS: [&str; 1] = [".git"];

/// Content fingerprint of a container build context
///
/// Walks the directory in file name order and hashes every relative path together with the
/// file contents, so renames and edits both change the result while mtimes do not. Files
/// excluded by `.dockerignore` never reach the builder and are left out, except the Dockerfile
/// and `.dockerignore` themselves.
pub fn fingerprint(context: &Path, salt: &str) -> Result<String> {
    let ignore = DockerIgnore::from_context(context)?;
    let mut hasher = XxHash64::default();
    hasher.write(salt.as_bytes());

    for entry in WalkDir::new(context)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
    {
        let entry = entry.map_err(std::io::Error::from)?;

        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(context) else {
            continue;
        };

        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if relative != DOCKERFILE && relative != DOCKERIGNORE && ignore.is_excluded(&relative) {
            log::trace!("Skipping {relative}, excluded by {DOCKERIGNORE}");
            continue;
        }

        let contents = fs::read(entry.path())?;
        log::trace!("Hashing {relative} ({} bytes)", contents.len());

        hasher.write(relative.as_bytes());
        hasher.write_u8(0);
        hasher.write_u64(contents.len() as u64);
        hasher.write(&contents);
    }

    Ok(hash_to_hex(hasher.finish()))
}

/// Short stable hash of an arbitrary string, used in logical IDs
pub fn hash_str(value: &str) -> String {
    let mut hasher = XxHash64::default();
    hasher.write(value.as_bytes());
    hash_to_hex(hasher.finish())
}

fn hash_to_hex(hash: u64) -> String {
    format!("{hash:016x}")
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && SKIPPED_DIRS
            .iter()
            .any(|name| entry.file_name().to_string_lossy() == *name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn context_with(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();

        for (name, contents) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }

        dir
    }

    #[test]
    fn unchanged_context_hashes_the_same() {
        let dir = context_with(&[("Dockerfile", "FROM scratch\n"), ("src/app.py", "print(1)")]);

        let first = fingerprint(dir.path(), "linux/amd64").unwrap();
        let second = fingerprint(dir.path(), "linux/amd64").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 16);
    }

    #[test]
    fn edits_and_renames_change_the_hash() {
        let dir = context_with(&[("Dockerfile", "FROM scratch\n"), ("app.py", "print(1)")]);
        let original = fingerprint(dir.path(), "linux/amd64").unwrap();

        fs::write(dir.path().join("app.py"), "print(2)").unwrap();
        let edited = fingerprint(dir.path(), "linux/amd64").unwrap();
        assert_ne!(original, edited);

        fs::rename(dir.path().join("app.py"), dir.path().join("main.py")).unwrap();
        let renamed = fingerprint(dir.path(), "linux/amd64").unwrap();
        assert_ne!(edited, renamed);
    }

    #[test]
    fn platform_is_part_of_the_hash() {
        let dir = context_with(&[("Dockerfile", "FROM scratch\n")]);

        assert_ne!(
            fingerprint(dir.path(), "linux/amd64").unwrap(),
            fingerprint(dir.path(), "linux/arm64").unwrap()
        );
    }

    #[test]
    fn git_metadata_is_ignored() {
        let dir = context_with(&[("Dockerfile", "FROM scratch\n")]);
        let before = fingerprint(dir.path(), "").unwrap();

        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main").unwrap();

        assert_eq!(before, fingerprint(dir.path(), "").unwrap());
    }

    #[test]
    fn dockerignored_files_are_left_out() {
        let dir = context_with(&[
            ("Dockerfile", "FROM scratch\n"),
            (".dockerignore", "__pycache__\n*.log\n!keep.log\n"),
            ("app.py", "print(1)"),
        ]);

        let before = fingerprint(dir.path(), "").unwrap();

        fs::create_dir_all(dir.path().join("__pycache__")).unwrap();
        fs::write(dir.path().join("__pycache__/app.pyc"), "bytecode").unwrap();
        fs::write(dir.path().join("debug.log"), "noise").unwrap();
        assert_eq!(before, fingerprint(dir.path(), "").unwrap());

        fs::write(dir.path().join("keep.log"), "kept").unwrap();
        assert_ne!(before, fingerprint(dir.path(), "").unwrap());
    }

    #[test]
    fn dockerfile_counts_even_when_ignored() {
        let dir = context_with(&[
            ("Dockerfile", "FROM scratch\n"),
            (".dockerignore", "Dockerfile\n.dockerignore\n"),
        ]);

        let before = fingerprint(dir.path(), "").unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM alpine\n").unwrap();
        assert_ne!(before, fingerprint(dir.path(), "").unwrap());
    }
}
