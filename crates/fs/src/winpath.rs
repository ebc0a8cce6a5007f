//! Windows path handling on plain strings
//!
//! These follow Windows rules on every host so the resolver rewrites paths
//! the same way wherever it runs. Both `\` and `/` are accepted as
//! separators; results always use `\`.
//!
//! Volume names come in three shapes:
//!
//! ```text
//! C:\data\file.txt                     volume "C:"
//! \\host\share\dir\file                volume "\\host\share"
//! \\?\GLOBALROOT\Device\Shadow1\file   volume "\\?\GLOBALROOT"
//! ```

use snapvol_core::VolumeId;

/// Path separator used in every result
pub const SEPARATOR: char = '\\';

const EXTENDED_PREFIX: &str = r"\\?\";
const EXTENDED_UNC_PREFIX: &str = r"\\?\UNC\";

fn is_sep(c: u8) -> bool {
    c == b'\\' || c == b'/'
}

/// Remove an extended-length prefix from a drive path: `\\?\C:\x`
/// becomes `C:\x`.
///
/// Device paths such as `\\?\GLOBALROOT\...` keep their prefix.
pub fn strip_extended_prefix(path: &str) -> &str {
    if let Some(rest) = path.strip_prefix(EXTENDED_PREFIX) {
        if VolumeId::parse(rest).is_some() {
            return rest;
        }
    }
    path
}

/// Like `strip_extended_prefix`, also turning extended UNC paths back into
/// plain UNC paths.
pub fn strip_extended(path: &str) -> String {
    if path.len() >= EXTENDED_UNC_PREFIX.len()
        && path.as_bytes()[..EXTENDED_UNC_PREFIX.len()]
            .eq_ignore_ascii_case(EXTENDED_UNC_PREFIX.as_bytes())
    {
        return format!(r"\\{}", &path[EXTENDED_UNC_PREFIX.len()..]);
    }
    strip_extended_prefix(path).to_string()
}

/// Replace every `/` with `\`
pub fn to_backslashes(path: &str) -> String {
    path.replace('/', "\\")
}

fn volume_name_len(path: &str) -> usize {
    let b = path.as_bytes();
    if b.len() >= 2 && b[1] == b':' && b[0].is_ascii_alphabetic() {
        return 2;
    }
    if b.len() < 3 || !is_sep(b[0]) || !is_sep(b[1]) || is_sep(b[2]) {
        return 0;
    }

    // \\.\device or \\?\device, with \\?\UNC\host\share as a special case
    if b.len() >= 4 && (b[2] == b'.' || b[2] == b'?') && is_sep(b[3]) {
        let rest = &path[4..];
        if rest.len() >= 4
            && rest.as_bytes()[..3].eq_ignore_ascii_case(b"UNC")
            && is_sep(rest.as_bytes()[3])
        {
            return 8 + unc_len(&path[8..]);
        }
        return 4 + element_len(rest);
    }

    2 + unc_len(&path[2..])
}

/// Length of `host\share` at the start of `rest`
fn unc_len(rest: &str) -> usize {
    let host = element_len(rest);
    if host == rest.len() {
        return host;
    }
    host + 1 + element_len(&rest[host + 1..])
}

fn element_len(rest: &str) -> usize {
    rest.bytes().position(is_sep).unwrap_or(rest.len())
}

/// Leading volume name: `C:` for drive paths, `\\host\share` for UNC paths,
/// `\\?\X` for device paths, empty otherwise.
pub fn volume_name(path: &str) -> String {
    to_backslashes(&path[..volume_name_len(path)])
}

/// Drive identifier of `path`, after stripping any extended prefix
pub fn drive_volume(path: &str) -> Option<VolumeId> {
    VolumeId::parse(strip_extended_prefix(path))
}

/// Whether `path` is absolute under Windows rules
///
/// Drive paths need a separator after the colon (`C:x` is drive-relative);
/// UNC and device paths are always absolute.
pub fn is_abs(path: &str) -> bool {
    let len = volume_name_len(path);
    if len == 0 {
        return false;
    }
    if len > 2 {
        return true;
    }
    path.as_bytes().get(len).copied().map_or(false, is_sep)
}

/// Absolute form of `path` relative to the absolute directory `cwd`
///
/// Follows the rules Windows applies when completing a path:
/// - `\x` keeps the volume of `cwd`
/// - `C:x` resolves against `cwd` when `cwd` is on `C:`, else against `C:\`
/// - any other relative path is joined onto `cwd`
///
/// A relative path never gains a second volume inside it.
pub fn abs_from(cwd: &str, path: &str) -> String {
    if is_abs(path) {
        return clean(path);
    }
    if volume_name_len(path) == 2 {
        let (drive, rest) = path.split_at(2);
        let same_drive = volume_name_len(cwd) == 2
            && cwd.as_bytes()[..2].eq_ignore_ascii_case(drive.as_bytes());
        if same_drive {
            return join(&[cwd, rest]);
        }
        return clean(&format!("{}{}{}", drive, SEPARATOR, rest));
    }
    if path.bytes().next().map_or(false, is_sep) {
        return clean(&format!("{}{}", volume_name(cwd), path));
    }
    join(&[cwd, path])
}

/// Whether any element of `path` starts with a drive designator (`C:`)
///
/// A volume-relative remainder holding one cannot be rewritten onto a
/// snapshot root.
pub fn has_drive_element(path: &str) -> bool {
    path.split(|c| c == '\\' || c == '/')
        .any(|element| VolumeId::parse(element).is_some())
}

/// Shortest equivalent path: separators collapsed, `.` removed, `..`
/// resolved lexically. A rooted path never climbs above its root.
///
/// Returns `.` for an empty path.
pub fn clean(path: &str) -> String {
    let vol_len = volume_name_len(path);
    let volume = to_backslashes(&path[..vol_len]);
    let rest = &path[vol_len..];
    let rooted = vol_len > 2 || rest.bytes().next().map_or(false, is_sep);

    let mut parts: Vec<&str> = Vec::new();
    for part in rest.split(|c| c == '\\' || c == '/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().map_or(false, |last| *last != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let mut out = volume;
    if rooted {
        out.push(SEPARATOR);
    }
    out.push_str(&parts.join("\\"));
    if out.is_empty() {
        out.push('.');
    }
    out
}

/// Join non-empty elements with `\` and clean the result
///
/// A bare drive as first element is not followed by a separator, so
/// `join(["C:", "x"])` is the drive-relative `C:x`.
pub fn join<S: AsRef<str>>(elems: &[S]) -> String {
    let parts: Vec<&str> = elems
        .iter()
        .map(AsRef::as_ref)
        .filter(|e| !e.is_empty())
        .collect();
    let Some((first, rest)) = parts.split_first() else {
        return String::new();
    };

    let mut joined = (*first).to_string();
    for (i, part) in rest.iter().enumerate() {
        let bare_drive = i == 0 && volume_name_len(first) == 2 && first.len() == 2;
        if !bare_drive {
            joined.push(SEPARATOR);
        }
        joined.push_str(part);
    }
    clean(&joined)
}

/// Last element of `path`; `.` for an empty path, `\` for a root
pub fn base(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let trimmed = path.trim_end_matches(|c| c == '\\' || c == '/');
    let trimmed = &trimmed[volume_name_len(trimmed)..];
    let name = match trimmed.rfind(|c| c == '\\' || c == '/') {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    };
    if name.is_empty() {
        SEPARATOR.to_string()
    } else {
        name.to_string()
    }
}

/// Everything but the last element, cleaned
pub fn dir(path: &str) -> String {
    let vol_len = volume_name_len(path);
    let volume = to_backslashes(&path[..vol_len]);
    let rest = &path[vol_len..];
    let cut = rest.rfind(|c| c == '\\' || c == '/').map_or(0, |i| i + 1);
    let dir = clean(&rest[..cut]);
    if dir == "." && vol_len > 2 {
        return volume;
    }
    format!("{}{}", volume, dir)
}

/// `path` with exactly one trailing `\` added when it has none
pub fn ensure_trailing_separator(path: &str) -> String {
    if path.ends_with('\\') || path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}{}", path, SEPARATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strip_extended_prefix() {
        assert_eq!(strip_extended_prefix(r"\\?\C:\data"), r"C:\data");
        assert_eq!(strip_extended_prefix(r"C:\data"), r"C:\data");
        assert_eq!(
            strip_extended_prefix(r"\\?\GLOBALROOT\Device\X"),
            r"\\?\GLOBALROOT\Device\X"
        );
        assert_eq!(strip_extended(r"\\?\UNC\host\share\f"), r"\\host\share\f");
    }

    #[test]
    fn test_volume_name_shapes() {
        assert_eq!(volume_name(r"C:\foo\bar"), "C:");
        assert_eq!(volume_name("c:"), "c:");
        assert_eq!(volume_name(r"\\host\share\foo"), r"\\host\share");
        assert_eq!(volume_name("//host/share/foo"), r"\\host\share");
        assert_eq!(volume_name(r"\\?\GLOBALROOT\Device\X"), r"\\?\GLOBALROOT");
        assert_eq!(volume_name(r"\\?\UNC\host\share\x"), r"\\?\UNC\host\share");
        assert_eq!(volume_name(r"\foo"), "");
        assert_eq!(volume_name("foo"), "");
        assert_eq!(volume_name(r"\\\foo"), "");
    }

    #[test]
    fn test_drive_volume() {
        assert_eq!(drive_volume(r"\\?\c:\x").unwrap().as_str(), "C:");
        assert_eq!(drive_volume(r"D:\").unwrap().as_str(), "D:");
        assert!(drive_volume(r"\\host\share").is_none());
        assert!(drive_volume("/home/user").is_none());
    }

    #[test]
    fn test_is_abs() {
        assert!(is_abs(r"C:\"));
        assert!(is_abs("C:/x"));
        assert!(is_abs(r"\\host\share"));
        assert!(is_abs(r"\\?\SnapshotDevice\1"));
        assert!(!is_abs("C:x"));
        assert!(!is_abs(r"\x"));
        assert!(!is_abs("x"));
    }

    #[test]
    fn test_abs_from() {
        let cwd = r"E:\work";
        assert_eq!(abs_from(cwd, r"C:\a\..\b"), r"C:\b");
        assert_eq!(abs_from(cwd, r"sub\file"), r"E:\work\sub\file");
        assert_eq!(abs_from(cwd, r"\data\file.txt"), r"E:\data\file.txt");
        assert_eq!(abs_from(cwd, "/data/file.txt"), r"E:\data\file.txt");
        assert_eq!(abs_from(cwd, "C:file.txt"), r"C:\file.txt");
        assert_eq!(abs_from(cwd, "e:file.txt"), r"E:\work\file.txt");
        assert_eq!(abs_from(cwd, "E:"), r"E:\work");
        assert_eq!(abs_from(r"\\host\share\dir", r"\x"), r"\\host\share\x");
    }

    #[test]
    fn test_has_drive_element() {
        assert!(has_drive_element(r"\work\C:file.txt"));
        assert!(has_drive_element(r"\a\d:\b"));
        assert!(!has_drive_element(r"\data\file.txt"));
        assert!(!has_drive_element(r"\data\file.txt:stream"));
        assert!(!has_drive_element(""));
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean(r"C:\a\\b\.\c\..\d\"), r"C:\a\b\d");
        assert_eq!(clean(r"C:\..\x"), r"C:\x");
        assert_eq!(clean(r"C:..\x"), r"C:..\x");
        assert_eq!(clean("a/../../b"), r"..\b");
        assert_eq!(clean(""), ".");
        assert_eq!(clean(r"C:\"), r"C:\");
        assert_eq!(clean(r"\\?\SnapshotDevice\1\\data"), r"\\?\SnapshotDevice\1\data");
    }

    #[test]
    fn test_join() {
        assert_eq!(
            join(&[r"\\?\SnapshotDevice\1", r"\data\file.txt"]),
            r"\\?\SnapshotDevice\1\data\file.txt"
        );
        assert_eq!(
            join(&[r"\\?\GLOBALROOT\Device\HarddiskVolumeShadowCopy3", r"\"]),
            r"\\?\GLOBALROOT\Device\HarddiskVolumeShadowCopy3"
        );
        assert_eq!(join(&["C:", "x"]), "C:x");
        assert_eq!(join(&["", "a", "", "b"]), r"a\b");
        assert_eq!(join::<&str>(&[]), "");
    }

    #[test]
    fn test_base_and_dir() {
        assert_eq!(base(r"C:\data\file.txt"), "file.txt");
        assert_eq!(base(r"C:\data\"), "data");
        assert_eq!(base(r"C:\"), r"\");
        assert_eq!(base(""), ".");
        assert_eq!(dir(r"C:\data\file.txt"), r"C:\data");
        assert_eq!(dir(r"C:\file.txt"), r"C:\");
        assert_eq!(dir("file.txt"), ".");
        assert_eq!(dir(r"\\host\share"), r"\\host\share");
    }

    #[test]
    fn test_ensure_trailing_separator() {
        assert_eq!(ensure_trailing_separator("C:"), r"C:\");
        assert_eq!(ensure_trailing_separator(r"C:\"), r"C:\");
    }

    fn segment() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_]{1,8}(\\.[a-z]{1,3})?"
    }

    fn relative_path() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![segment(), Just(".".to_string()), Just("..".to_string())],
            0..8,
        )
        .prop_map(|parts| parts.join("\\"))
    }

    proptest! {
        #[test]
        fn prop_clean_is_idempotent(drive in "[A-Z]", rel in relative_path()) {
            let path = format!(r"{}:\{}", drive, rel);
            let once = clean(&path);
            prop_assert_eq!(clean(&once), once.clone());
        }

        #[test]
        fn prop_clean_never_escapes_volume(drive in "[A-Z]", rel in relative_path()) {
            let path = format!(r"{}:\{}", drive, rel);
            let cleaned = clean(&path);
            let root = format!(r"{}:\", drive);
            prop_assert!(cleaned.starts_with(&root));
            prop_assert!(!cleaned.contains(".."));
        }

        #[test]
        fn prop_join_keeps_snapshot_root(
            device in 1u32..1000,
            parts in prop::collection::vec(segment(), 0..6),
        ) {
            let root = format!(r"\\?\GLOBALROOT\Device\HarddiskVolumeShadowCopy{}", device);
            let rest = format!(r"\{}", parts.join("\\"));
            let joined = join(&[root.as_str(), rest.as_str()]);
            prop_assert!(joined.starts_with(&root));
            let expected = if parts.is_empty() {
                root.clone()
            } else {
                format!(r"{}\{}", root, parts.join("\\"))
            };
            prop_assert_eq!(joined, expected);
        }

        #[test]
        fn prop_abs_from_yields_one_volume(
            cwd_drive in "[A-Z]",
            drive in "[A-Z]",
            rel in relative_path(),
            shape in 0u8..3,
        ) {
            let cwd = format!(r"{}:\work", cwd_drive);
            let (path, expected) = match shape {
                0 => (rel.clone(), cwd_drive.clone()),
                1 => (format!(r"\{}", rel), cwd_drive.clone()),
                _ => (format!("{}:{}", drive, rel), drive.clone()),
            };
            let absolute = abs_from(&cwd, &path);
            prop_assert!(is_abs(&absolute), "{} -> {}", path, absolute);
            let volume = drive_volume(&absolute).unwrap();
            prop_assert_eq!(volume.as_str(), format!("{}:", expected));
            prop_assert!(!has_drive_element(&absolute[volume.len()..]));
        }

        #[test]
        fn prop_drive_volume_matches_first_letter(drive in "[a-zA-Z]", rel in relative_path()) {
            let path = format!(r"{}:\{}", drive, rel);
            let volume = drive_volume(&path).unwrap();
            prop_assert_eq!(volume.as_str(), format!("{}:", drive.to_ascii_uppercase()));
        }
    }
}
