use crate::error::{ErrorKind, Result};
use std::path::{Component, Path};

/// Validate and normalize a zip entry name.
///
/// Entry names may contain `/` to create folders, but must never resolve to
/// somewhere outside the archive root. `.` segments and repeated separators
/// are collapsed, `..` is resolved (and rejected if it escapes). Backslashes
/// are treated as separators so the name extracts the same way everywhere.
///
/// ```
/// use resizesuite_archive::validate_name;
/// assert_eq!(validate_name("a//./b/../photo.png").unwrap(), "a/photo.png");
/// assert!(validate_name("../photo.png").is_err());
/// assert!(validate_name("").is_err());
/// ```
pub fn validate_name(name: &str) -> Result<String> {
    let invalid = || ErrorKind::InvalidName(name.to_string());
    if name.contains('\0') {
        exn::bail!(invalid());
    }
    let unified = name.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for component in Path::new(&unified).components() {
        match component {
            Component::Normal(s) => match s.to_str().map(str::trim) {
                Some("") => {},
                Some(s) => segments.push(s),
                None => exn::bail!(invalid()),
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if segments.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
        }
    }
    match segments.is_empty() {
        true => exn::bail!(invalid()),
        false => Ok(segments.join("/")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("photo.png", "photo.png")]
    #[case("/abs/photo.png", "abs/photo.png")]
    #[case("a\\b\\c.png", "a/b/c.png")]
    #[case("a/ b /c.png", "a/b/c.png")]
    #[case("a/b/..", "a")]
    fn test_valid_names(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate_name(input).unwrap(), expected);
    }

    #[rstest]
    #[case("..")]
    #[case("a/../../b")]
    #[case("..\\evil.png")]
    #[case("a\0b")]
    #[case("  ")]
    #[case("./.")]
    fn test_invalid_names(#[case] input: &str) {
        assert_eq!(*validate_name(input).unwrap_err(), ErrorKind::InvalidName(input.to_string()));
    }
}
