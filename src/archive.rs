use std::{
    fs::File,
    ops::AddAssign,
    path::{Component, Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractReport {
    pub extracted: usize,
    pub skipped: usize,
    /// Members that would have landed outside the target directory
    pub rejected: usize,
}

impl AddAssign for ExtractReport {
    fn add_assign(&mut self, other: Self) {
        self.extracted += other.extracted;
        self.skipped += other.skipped;
        self.rejected += other.rejected;
    }
}

/// Unpacks `tar_path` next to itself. Members that already exist on disk are left alone, so
/// re-running over the same archives is cheap.
pub fn extract_tar(tar_path: &Path) -> Result<ExtractReport> {
    let dest = tar_path
        .parent()
        .ok_or_else(|| anyhow!("{} has no parent directory", tar_path.display()))?;
    let file = File::open(tar_path)
        .with_context(|| format!("Failed to open archive {}", tar_path.display()))?;
    let mut archive = tar::Archive::new(file);

    let mut report = ExtractReport::default();
    let entries = archive
        .entries()
        .with_context(|| format!("Failed to read archive {}", tar_path.display()))?;
    for entry in entries {
        let mut entry =
            entry.with_context(|| format!("Corrupt entry in {}", tar_path.display()))?;
        let member = entry.path()?.into_owned();

        if escapes_destination(&member) {
            warn!(
                "Refusing to extract {} outside of {}",
                member.display(),
                dest.display()
            );
            report.rejected += 1;
            continue;
        }

        if dest.join(&member).exists() {
            info!("Skipped (already exists): {}", member.display());
            report.skipped += 1;
            continue;
        }

        let unpacked = entry
            .unpack_in(dest)
            .with_context(|| format!("Failed to extract {}", member.display()))?;
        if unpacked {
            info!("Extracted: {}", member.display());
            report.extracted += 1;
        } else {
            warn!(
                "Refusing to extract {} outside of {}",
                member.display(),
                dest.display()
            );
            report.rejected += 1;
        }
    }

    Ok(report)
}

fn escapes_destination(member: &Path) -> bool {
    member.components().any(|c| {
        matches!(
            c,
            Component::RootDir | Component::Prefix(_) | Component::ParentDir
        )
    })
}

/// All `*.tar` files directly inside `dir`, sorted by name.
pub fn find_archives(dir: &Path) -> Result<Vec<PathBuf>> {
    find_with_extension(dir, "tar")
}

/// Extracts every archive in `dir`.
pub fn extract_all(dir: &Path) -> Result<ExtractReport> {
    let mut total = ExtractReport::default();
    for archive in find_archives(dir)? {
        total += extract_tar(&archive)?;
    }
    Ok(total)
}

pub(crate) fn find_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let read_dir = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in read_dir {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_tar(path: &Path, members: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(file);
        for (name, data) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.finish().unwrap();
    }

    #[test]
    fn extracts_members_next_to_archive() {
        let dir = tempfile::tempdir().unwrap();
        let tar_path = dir.path().join("day.tar");
        write_tar(&tar_path, &[("a.h5", b"aaa"), ("b.h5", b"bbb")]);

        let report = extract_tar(&tar_path).unwrap();

        assert_eq!(report.extracted, 2);
        assert_eq!(fs::read(dir.path().join("a.h5")).unwrap(), b"aaa");
        assert_eq!(fs::read(dir.path().join("b.h5")).unwrap(), b"bbb");
    }

    #[test]
    fn existing_members_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let tar_path = dir.path().join("day.tar");
        write_tar(&tar_path, &[("a.h5", b"new"), ("b.h5", b"bbb")]);
        fs::write(dir.path().join("a.h5"), b"old").unwrap();

        let report = extract_tar(&tar_path).unwrap();

        assert_eq!(
            report,
            ExtractReport {
                extracted: 1,
                skipped: 1,
                rejected: 0
            }
        );
        assert_eq!(fs::read(dir.path().join("a.h5")).unwrap(), b"old");
    }

    #[test]
    fn extract_all_only_touches_tar_files() {
        let dir = tempfile::tempdir().unwrap();
        write_tar(&dir.path().join("2.tar"), &[("b.h5", b"b")]);
        write_tar(&dir.path().join("1.tar"), &[("a.h5", b"a")]);
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        assert_eq!(
            find_archives(dir.path()).unwrap(),
            vec![dir.path().join("1.tar"), dir.path().join("2.tar")]
        );

        let first = extract_all(dir.path()).unwrap();
        let second = extract_all(dir.path()).unwrap();

        assert_eq!(first.extracted, 2);
        assert_eq!(second.extracted, 0);
        assert_eq!(second.skipped, 2);
    }

    #[test]
    fn escaping_members_are_rejected_even_if_target_exists() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("data");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("escape.h5"), b"outside").unwrap();

        // tar::Builder refuses `..`, so the member name is written into the header directly
        let tar_path = nested.join("day.tar");
        let mut builder = tar::Builder::new(File::create(&tar_path).unwrap());
        let mut header = tar::Header::new_gnu();
        header.as_old_mut().name[..12].copy_from_slice(b"../escape.h5");
        header.set_size(3);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, &b"bad"[..]).unwrap();
        builder.finish().unwrap();
        drop(builder);

        let report = extract_tar(&tar_path).unwrap();

        assert_eq!(
            report,
            ExtractReport {
                extracted: 0,
                skipped: 0,
                rejected: 1
            }
        );
        assert_eq!(fs::read(dir.path().join("escape.h5")).unwrap(), b"outside");
    }

    #[test]
    fn missing_archive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        assert!(extract_tar(&dir.path().join("nope.tar")).is_err());
    }
}
