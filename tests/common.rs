#![allow(dead_code)]

use std::{fs, path::Path};

use stata_runner::Config;

/// Write an executable shell script.
#[cfg(unix)]
pub fn make_exe(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

pub fn empty_config() -> Config {
    Config::from_pairs(Vec::<(String, String)>::new())
}
