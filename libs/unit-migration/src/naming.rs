// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Deterministic target object names

use base64::Engine;
use md5::{Digest, Md5};

/// Name length limit for targets that do not declare their own.
pub const MAX_TARGET_NAME_LEN: usize = 1024;

/// Final path component of `filename`, accepting both separators.
pub fn basename(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
}

fn digest(parts: &[&str]) -> String {
    let mut hasher = Md5::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\0");
        }
        hasher.update(part.as_bytes());
    }
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Target name for item `filename` of unit `unit_id`, at most `max_len`
/// bytes long.
///
/// `{unit_id}-{basename}`; when that is too long the basename is replaced by
/// `base64url(md5(filename))`. A unit id that leaves no room for the digest
/// is cut at a character boundary and the digest then covers both parts.
pub fn target_name(unit_id: &str, filename: &str, max_len: usize) -> String {
    let unit = unit_id.replace(['/', '\\'], "_");
    let name = format!("{}-{}", unit, basename(filename));
    if name.len() <= max_len {
        return name;
    }

    let hashed = format!("{}-{}", unit, digest(&[filename]));
    if hashed.len() <= max_len {
        return hashed;
    }

    let digest = digest(&[unit_id, filename]);
    let mut keep = max_len.saturating_sub(digest.len() + 1).min(unit.len());
    while !unit.is_char_boundary(keep) {
        keep -= 1;
    }
    format!("{}-{}", &unit[..keep], digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_handles_separators() {
        assert_eq!(basename("a/b/c.json"), "c.json");
        assert_eq!(basename("a\\b\\c.json"), "c.json");
        assert_eq!(basename("c.json"), "c.json");
        assert_eq!(basename("dir/"), "");
    }

    #[test]
    fn target_name_uses_unit_and_basename() {
        assert_eq!(
            target_name("U1", "logs/run/perf-lab-report.json", MAX_TARGET_NAME_LEN),
            "U1-perf-lab-report.json"
        );
        assert_eq!(target_name("a/b", "f", MAX_TARGET_NAME_LEN), "a_b-f");
    }

    #[test]
    fn long_names_fall_back_deterministically() {
        let filename = "x".repeat(2000);
        let first = target_name("U1", &filename, MAX_TARGET_NAME_LEN);
        let second = target_name("U1", &filename, MAX_TARGET_NAME_LEN);
        assert_eq!(first, second);
        assert!(first.starts_with("U1-"));
        assert!(first.len() <= MAX_TARGET_NAME_LEN);
        assert_ne!(
            first,
            target_name("U1", &"y".repeat(2000), MAX_TARGET_NAME_LEN)
        );
    }

    #[test]
    fn limit_comes_from_the_caller() {
        let filename = format!("scans/{}.pdf", "a".repeat(286));
        assert_eq!(target_name("U1", &filename, MAX_TARGET_NAME_LEN).len(), 293);

        let short = target_name("U1", &filename, 255);
        assert!(short.starts_with("U1-"));
        assert_eq!(short.len(), "U1-".len() + 22);
        assert_eq!(short, target_name("U1", &filename, 255));
    }

    #[test]
    fn long_unit_ids_are_cut_at_char_boundary() {
        let unit = "\u{e9}".repeat(200);
        let name = target_name(&unit, "a.pdf", 255);
        assert!(name.len() <= 255);
        assert!(name.starts_with('\u{e9}'));
        assert_ne!(name, target_name(&unit, "b.pdf", 255));
        assert_ne!(name, target_name(&format!("{unit}x"), "a.pdf", 255));
    }
}
