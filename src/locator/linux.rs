//! Linux install conventions.

use std::path::{Path, PathBuf};

use crate::edition::Edition;

use super::VERSIONS;

/// Package-manager and default install roots first, user-local dirs last.
pub fn search_bases(home: Option<&Path>) -> Vec<PathBuf> {
    let mut bases = vec![PathBuf::from("/usr/local/bin"), PathBuf::from("/usr/bin")];
    for root in ["/usr/local", "/opt"] {
        for v in VERSIONS {
            bases.push(Path::new(root).join(format!("stata{v}")));
        }
        bases.push(Path::new(root).join("stata"));
    }
    if let Some(home) = home {
        bases.push(home.join(".local").join("bin"));
        bases.push(home.join("stata"));
    }
    bases
}

pub fn candidate_names(edition: Edition) -> &'static [&'static str] {
    match edition {
        Edition::Mp => &["stata-mp"],
        Edition::Se => &["stata-se"],
        Edition::Be => &["stata-be"],
        Edition::Ic => &["stata-ic"],
        Edition::Default => &["stata"],
        Edition::Unknown => &[],
    }
}
