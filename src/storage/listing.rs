// Directory listing

use std::fs;
use std::path::Path;
use crate::common::error::Result;

/// Names of the entries in `dir`, sorted for a stable answer
pub fn list_dir(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Newline separated, one entry per line
pub fn serialize(names: &[String]) -> Vec<u8> {
    let mut out = Vec::with_capacity(names.iter().map(|n| n.len() + 1).sum());
    for name in names {
        out.extend_from_slice(name.as_bytes());
        out.push(b'\n');
    }
    out
}

/// Like `serialize`, but stops before the first entry that would push the
/// output past `cap` bytes. Entries are never cut in half.
pub fn serialize_capped(names: &[String], cap: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(cap);
    for name in names {
        if out.len() + name.len() + 1 > cap {
            log::debug!("Listing truncated at {} of {} entries", count_lines(&out), names.len());
            break;
        }
        out.extend_from_slice(name.as_bytes());
        out.push(b'\n');
    }
    out
}

/// Split a received listing back into names
pub fn parse(data: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(data)
        .split(['\n', '\r'])
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn count_lines(data: &[u8]) -> usize {
    data.iter().filter(|&&b| b == b'\n').count()
}
