//! Duplicate naming for keep-both resolutions
//!
//! Local duplicates follow `name (local copy YYYY-MM-DD XXXXXXXX).ext` and
//! remote duplicates `title (remote copy YYYY-MM-DD XXXXXXXX)`. Remote titles
//! are free text, so no extension is split off them.

use chrono::Utc;
use uuid::Uuid;

/// Generates unique duplicate names
pub struct ConflictNamer;

fn tag(label: &str) -> String {
    let date = Utc::now().format("%Y-%m-%d");
    let short_uuid = &Uuid::new_v4().simple().to_string()[..8];
    format!("({label} {date} {short_uuid})")
}

/// Split `name` into stem and extension (with its dot)
///
/// A leading dot is part of the stem, so `.env` has no extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => name.split_at(pos),
        _ => (name, ""),
    }
}

fn base_title(title: &str) -> &str {
    if title.trim().is_empty() {
        "Untitled"
    } else {
        title
    }
}

/// Short-suffix attempts before falling back to a full UUID
const SHORT_ATTEMPTS: usize = 8;

impl ConflictNamer {
    /// File name for the local duplicate of `file_name`
    ///
    /// `"report.md"` becomes `"report (local copy 2026-10-18 a1b2c3d4).md"`.
    pub fn local_copy(file_name: &str) -> String {
        let (stem, ext) = split_extension(file_name);
        format!("{stem} {}{ext}", tag("local copy"))
    }

    /// Title for the remote duplicate of `title`
    pub fn remote_copy(title: &str) -> String {
        format!("{} {}", base_title(title), tag("remote copy"))
    }

    /// Local duplicate names to try in order
    ///
    /// Yields fresh short-suffix names, then one name carrying a full UUID.
    pub fn local_candidates(file_name: &str) -> impl Iterator<Item = String> + '_ {
        let (stem, ext) = split_extension(file_name);
        (0..SHORT_ATTEMPTS)
            .map(move |_| Self::local_copy(file_name))
            .chain(std::iter::once_with(move || {
                format!("{stem} (local copy {}){ext}", Uuid::new_v4().simple())
            }))
    }

    /// Remote duplicate titles to try in order, as for
    /// [`local_candidates`](Self::local_candidates)
    pub fn remote_candidates(title: &str) -> impl Iterator<Item = String> + '_ {
        (0..SHORT_ATTEMPTS)
            .map(move |_| Self::remote_copy(title))
            .chain(std::iter::once_with(move || {
                format!("{} (remote copy {})", base_title(title), Uuid::new_v4().simple())
            }))
    }

    /// First remote candidate `taken` does not report
    pub fn unique_remote_copy<F>(title: &str, mut taken: F) -> String
    where
        F: FnMut(&str) -> bool,
    {
        let mut last = String::new();
        for candidate in Self::remote_candidates(title) {
            if !taken(&candidate) {
                return candidate;
            }
            last = candidate;
        }
        last
    }
}
