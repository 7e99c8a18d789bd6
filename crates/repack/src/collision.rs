//! Output-name collision handling inside the output archive.
//!
//! Converting `photo.png` and `photo.heic` in the same directory both yields
//! `photo.jpg`; the second gets a numeric suffix instead of silently
//! overwriting the first. Names are compared case-sensitively, matching zip
//! entry semantics.

use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Default)]
pub(crate) struct CollisionMap {
    taken: HashSet<String>,
}

impl CollisionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `desired` as an output entry name, appending `-1`, `-2`, ... to
    /// the stem until the name is free.
    pub fn claim(&mut self, desired: &str) -> String {
        if self.taken.insert(desired.to_string()) {
            return desired.to_string();
        }

        let path = Path::new(desired);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("file");
        let ext = path.extension().and_then(|s| s.to_str());
        let parent = path.parent().filter(|p| !p.as_os_str().is_empty());

        for n in 1.. {
            let file_name = match ext {
                Some(ext) => format!("{stem}-{n}.{ext}"),
                None => format!("{stem}-{n}"),
            };
            let candidate = match parent {
                Some(parent) => parent.join(&file_name).to_string_lossy().into_owned(),
                None => file_name,
            };
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
        unreachable!("suffix space exhausted");
    }
}
