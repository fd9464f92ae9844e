//! macOS install conventions: Homebrew-style links and app bundles.

use std::path::{Path, PathBuf};

use crate::edition::Edition;

use super::VERSIONS;

pub fn search_bases(home: Option<&Path>) -> Vec<PathBuf> {
    let mut bases = vec![
        PathBuf::from("/usr/local/bin"),
        PathBuf::from("/opt/homebrew/bin"),
        PathBuf::from("/Applications/Stata"),
    ];
    for v in VERSIONS {
        bases.push(PathBuf::from(format!("/Applications/Stata{v}")));
    }
    if let Some(home) = home {
        bases.push(home.join("Applications").join("Stata"));
        bases.push(home.join(".local").join("bin"));
    }
    bases
}

/// Names are relative to a base, so bundle executables can be probed from the
/// folder holding the `.app`.
pub fn candidate_names(edition: Edition) -> &'static [&'static str] {
    match edition {
        Edition::Mp => &["stata-mp", "StataMP.app/Contents/MacOS/stata-mp"],
        Edition::Se => &["stata-se", "StataSE.app/Contents/MacOS/stata-se"],
        Edition::Be => &["stata-be", "StataBE.app/Contents/MacOS/stata-be"],
        Edition::Ic => &["stata-ic", "StataIC.app/Contents/MacOS/stata-ic"],
        Edition::Default => &["stata", "Stata.app/Contents/MacOS/stata"],
        Edition::Unknown => &[],
    }
}
