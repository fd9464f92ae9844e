//! Windows install conventions: versioned folders under Program Files.

use std::{
    env,
    path::{Path, PathBuf},
};

use crate::edition::Edition;

use super::VERSIONS;

pub fn search_bases(home: Option<&Path>) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    for (var, fallback) in [
        ("ProgramFiles", r"C:\Program Files"),
        ("ProgramFiles(x86)", r"C:\Program Files (x86)"),
    ] {
        let root = env::var_os(var)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(fallback));
        if !roots.contains(&root) {
            roots.push(root);
        }
    }
    roots.push(PathBuf::from(r"C:\"));

    let mut bases = Vec::new();
    for root in &roots {
        for v in VERSIONS {
            bases.push(root.join(format!("Stata{v}")));
        }
        bases.push(root.join("Stata"));
    }
    if let Some(home) = home {
        bases.push(home.join("Stata"));
    }
    bases
}

pub fn candidate_names(edition: Edition) -> &'static [&'static str] {
    match edition {
        Edition::Mp => &["StataMP-64.exe", "StataMP.exe"],
        Edition::Se => &["StataSE-64.exe", "StataSE.exe"],
        Edition::Be => &["StataBE-64.exe", "StataBE.exe"],
        Edition::Ic => &["StataIC-64.exe", "StataIC.exe"],
        Edition::Default => &["Stata-64.exe", "Stata.exe"],
        Edition::Unknown => &[],
    }
}
