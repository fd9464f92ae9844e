//! Stata editions and the ranking used to pick between installations.

use std::{cmp::Ordering, fmt, path::Path, path::PathBuf};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Edition {
    Mp,
    Se,
    Be,
    Ic,
    Default,
    Unknown,
}

impl Edition {
    /// Probe order used by the locator: most capable build first.
    pub const PRIORITY: [Edition; 5] = [
        Edition::Mp,
        Edition::Se,
        Edition::Be,
        Edition::Ic,
        Edition::Default,
    ];

    pub fn rank(self) -> u8 {
        match self {
            Edition::Mp => 5,
            Edition::Se => 4,
            Edition::Be => 3,
            Edition::Ic => 2,
            Edition::Default => 1,
            Edition::Unknown => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Edition::Mp => "mp",
            Edition::Se => "se",
            Edition::Be => "be",
            Edition::Ic => "ic",
            Edition::Default => "default",
            Edition::Unknown => "unknown",
        }
    }

    /// Parse a user-facing edition tag (`mp`, `SE`, ...). Anything else is `Unknown`.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "mp" => Edition::Mp,
            "se" => Edition::Se,
            "be" => Edition::Be,
            "ic" => Edition::Ic,
            "default" => Edition::Default,
            _ => Edition::Unknown,
        }
    }

    /// Infer the edition from an executable or bundle name such as
    /// `stata-mp`, `StataSE-64.exe` or `StataMP.app`.
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        let stem = lower
            .trim_end_matches(".exe")
            .trim_end_matches(".app")
            .trim_end_matches("-64")
            .trim_end_matches("_64");
        let Some(rest) = stem
            .strip_prefix("xstata")
            .or_else(|| stem.strip_prefix("stata"))
        else {
            return Edition::Unknown;
        };
        match rest.trim_start_matches(['-', '_']) {
            "mp" => Edition::Mp,
            "se" => Edition::Se,
            "be" => Edition::Be,
            "ic" => Edition::Ic,
            "" => Edition::Default,
            _ => Edition::Unknown,
        }
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered installation. Identity for ranking purposes is
/// `(edition, version)`; the path is carried along but never compared.
#[derive(Debug, Clone, Serialize)]
pub struct InstalledEdition {
    pub edition: Edition,
    pub version: f64,
    pub path: PathBuf,
}

impl InstalledEdition {
    pub fn new(edition: Edition, version: f64, path: impl Into<PathBuf>) -> Self {
        Self { edition, version, path: path.into() }
    }

    /// Build from an executable path, reading the edition from the file name and
    /// the version from the nearest `StataNN`-style ancestor directory.
    pub fn from_path(path: &Path) -> Self {
        let edition = path
            .file_name()
            .map(|n| Edition::from_file_name(&n.to_string_lossy()))
            .unwrap_or(Edition::Unknown);
        Self::new(edition, version_from_path(path), path)
    }

    pub fn same_rank(&self, other: &InstalledEdition) -> bool {
        compare(self, other) == Ordering::Equal
    }
}

/// Total order over installations: edition rank first, then version.
///
/// Versions are compared with `f64::total_cmp`, so NaN sorts consistently
/// instead of breaking transitivity.
pub fn compare(a: &InstalledEdition, b: &InstalledEdition) -> Ordering {
    a.edition
        .rank()
        .cmp(&b.edition.rank())
        .then_with(|| a.version.total_cmp(&b.version))
}

/// Highest-ranked installation. On ties the first one seen wins, which keeps
/// the result stable with respect to search order.
pub fn best<'a, I>(candidates: I) -> Option<&'a InstalledEdition>
where
    I: IntoIterator<Item = &'a InstalledEdition>,
{
    candidates.into_iter().fold(None, |acc, c| match acc {
        Some(cur) if compare(c, cur) != Ordering::Greater => Some(cur),
        _ => Some(c),
    })
}

/// Sort ascending by rank in place.
pub fn sort(candidates: &mut [InstalledEdition]) {
    candidates.sort_by(compare);
}

/// Reads `18` from `/usr/local/stata18/stata-mp`, `19.5` from
/// `C:\Program Files\Stata19.5\StataMP-64.exe`. Returns 0 when no component
/// carries a version.
pub fn version_from_path(path: &Path) -> f64 {
    path.ancestors()
        .filter_map(|p| p.file_name())
        .find_map(|name| {
            let lower = name.to_string_lossy().to_ascii_lowercase();
            let rest = lower.strip_prefix("stata")?;
            let digits: String = rest
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            digits.trim_end_matches('.').parse::<f64>().ok()
        })
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ed(e: Edition, v: f64, p: &str) -> InstalledEdition {
        InstalledEdition::new(e, v, p)
    }

    #[test]
    fn edition_dominates_version() {
        let mp = ed(Edition::Mp, 10.0, "/a");
        let se = ed(Edition::Se, 99.0, "/b");
        assert_eq!(compare(&mp, &se), Ordering::Greater);
        assert_eq!(compare(&se, &mp), Ordering::Less);
    }

    #[test]
    fn version_breaks_ties_within_edition() {
        let old = ed(Edition::Se, 17.0, "/a");
        let new = ed(Edition::Se, 19.5, "/b");
        assert_eq!(compare(&old, &new), Ordering::Less);
    }

    #[test]
    fn path_is_not_part_of_identity() {
        let a = ed(Edition::Be, 18.0, "/a");
        let b = ed(Edition::Be, 18.0, "/somewhere/else");
        assert_eq!(compare(&a, &b), Ordering::Equal);
        assert!(a.same_rank(&b));
    }

    #[test]
    fn exactly_one_relation_holds() {
        let all = [
            ed(Edition::Mp, 17.0, "/1"),
            ed(Edition::Mp, 18.0, "/2"),
            ed(Edition::Se, 19.0, "/3"),
            ed(Edition::Ic, 14.0, "/4"),
            ed(Edition::Default, 0.0, "/5"),
            ed(Edition::Unknown, 99.0, "/6"),
            ed(Edition::Se, f64::NAN, "/7"),
        ];
        for a in &all {
            assert_eq!(compare(a, a), Ordering::Equal);
            for b in &all {
                assert_eq!(compare(a, b), compare(b, a).reverse());
                for c in &all {
                    if compare(a, b) == Ordering::Less && compare(b, c) == Ordering::Less {
                        assert_eq!(compare(a, c), Ordering::Less);
                    }
                }
            }
        }
    }

    #[test]
    fn best_prefers_mp_over_newer_se() {
        let list = vec![ed(Edition::Mp, 17.0, "/a"), ed(Edition::Se, 19.0, "/b")];
        assert_eq!(best(&list).map(|c| c.path.clone()), Some(PathBuf::from("/a")));

        let mut sorted = list.clone();
        sort(&mut sorted);
        assert_eq!(sorted.last().map(|c| c.path.clone()), Some(PathBuf::from("/a")));
    }

    #[test]
    fn best_keeps_first_on_tie() {
        let list = vec![ed(Edition::Se, 18.0, "/first"), ed(Edition::Se, 18.0, "/second")];
        assert_eq!(best(&list).map(|c| c.path.clone()), Some(PathBuf::from("/first")));
        assert!(best(&Vec::<InstalledEdition>::new()).is_none());
    }

    #[test]
    fn parses_edition_names() {
        assert_eq!(Edition::from_file_name("stata-mp"), Edition::Mp);
        assert_eq!(Edition::from_file_name("StataSE-64.exe"), Edition::Se);
        assert_eq!(Edition::from_file_name("StataBE.app"), Edition::Be);
        assert_eq!(Edition::from_file_name("xstata-ic"), Edition::Ic);
        assert_eq!(Edition::from_file_name("stata"), Edition::Default);
        assert_eq!(Edition::from_file_name("Stata-64.exe"), Edition::Default);
        assert_eq!(Edition::from_file_name("python3"), Edition::Unknown);
        assert_eq!(Edition::parse("MP"), Edition::Mp);
        assert_eq!(Edition::parse("pro"), Edition::Unknown);
    }

    #[test]
    fn reads_version_from_directory() {
        assert_eq!(version_from_path(Path::new("/usr/local/stata18/stata-mp")), 18.0);
        assert_eq!(version_from_path(Path::new("/opt/Stata19.5/bin/stata-se")), 19.5);
        assert_eq!(version_from_path(Path::new("/usr/local/bin/stata")), 0.0);
    }
}
