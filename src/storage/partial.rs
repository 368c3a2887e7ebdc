// Download target written through a `.part` file

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use log::{debug, warn};
use crate::common::error::Result;

/// Writes go to `<name>.part`; `commit` renames it over the final path.
///
/// Dropping an uncommitted `PartialFile` closes the handle and removes the
/// `.part` file unless it was created with `keep_on_abort`.
pub struct PartialFile {
    writer: Option<BufWriter<File>>,
    part_path: PathBuf,
    final_path: PathBuf,
    keep_on_abort: bool,
}

impl PartialFile {
    pub fn create(final_path: &Path, keep_on_abort: bool) -> Result<Self> {
        let part_path = part_path_for(final_path);
        let file = File::create(&part_path)?;
        debug!("Writing to {:?}", part_path);

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            part_path,
            final_path: final_path.to_path_buf(),
            keep_on_abort,
        })
    }

    pub fn part_path(&self) -> &Path {
        &self.part_path
    }

    /// Flush, close and move into place
    pub fn commit(mut self) -> Result<PathBuf> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&self.part_path, &self.final_path)?;
        Ok(self.final_path.clone())
    }
}

impl Write for PartialFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.writer.as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "partial file already closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        // Not committed: close the handle before touching the path
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
            drop(writer);
            if self.keep_on_abort {
                warn!("Transfer incomplete, partial data kept in {:?}", self.part_path);
            } else if let Err(e) = fs::remove_file(&self.part_path) {
                warn!("Failed to remove {:?}: {}", self.part_path, e);
            }
        }
    }
}

fn part_path_for(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    final_path.with_file_name(format!("{}.part", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_renames() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("data.bin");

        let mut part = PartialFile::create(&target, false).unwrap();
        assert!(part.part_path().ends_with("data.bin.part"));
        part.write_all(b"payload").unwrap();
        part.commit().unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"payload");
        assert!(!dir.path().join("data.bin.part").exists());
    }

    #[test]
    fn test_drop_removes_part_and_keeps_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("data.bin");
        fs::write(&target, b"old").unwrap();

        {
            let mut part = PartialFile::create(&target, false).unwrap();
            part.write_all(b"half").unwrap();
        }

        assert!(!dir.path().join("data.bin.part").exists());
        assert_eq!(fs::read(&target).unwrap(), b"old");
    }

    #[test]
    fn test_keep_on_abort() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("data.bin");

        {
            let mut part = PartialFile::create(&target, true).unwrap();
            part.write_all(b"half").unwrap();
        }

        assert_eq!(fs::read(dir.path().join("data.bin.part")).unwrap(), b"half");
        assert!(!target.exists());
    }
}
