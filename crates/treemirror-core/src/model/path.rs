/// Lexical path helpers shared by the mirror and its roots.
///
/// Mirrored paths are compared component by component, never through the
/// filesystem, so symlinks are not resolved here.
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Collapse `.` and `..` components lexically.
///
/// `..` pops the preceding normal component; at the filesystem root it is
/// dropped (`/..` is `/`), and on a relative path with nothing left to pop it
/// is kept. Trailing separators disappear with the component iterator.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            _ => out.push(component),
        }
    }
    out.iter().collect()
}

/// Last path segment, empty for paths without one.
pub(crate) fn file_name(path: &Path) -> &OsStr {
    path.file_name().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_parent_components() {
        assert_eq!(normalize(Path::new("/tmp/root/a/..")), PathBuf::from("/tmp/root"));
        assert_eq!(normalize(Path::new("/tmp/root/../b.txt")), PathBuf::from("/tmp/b.txt"));
        assert_eq!(normalize(Path::new("/tmp/./root/a/./f.txt")), PathBuf::from("/tmp/root/a/f.txt"));
        assert_eq!(normalize(Path::new("/tmp/root/")), PathBuf::from("/tmp/root"));
        assert_eq!(normalize(Path::new("/../tmp")), PathBuf::from("/tmp"));
        assert_eq!(normalize(Path::new("../x/../y")), PathBuf::from("../y"));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(Path::new("/tmp/root/a.txt")), OsStr::new("a.txt"));
        assert_eq!(file_name(Path::new("/")), OsStr::new(""));
    }
}
