use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Path contains parent directory (..)")]
    ContainsParentDir,

    #[error("Path is absolute")]
    AbsolutePath,

    #[error("Path contains invalid component")]
    InvalidComponent,

    #[error("Path contains null byte")]
    NullByte,

    #[error("Path is empty")]
    Empty,

    #[error("Path has no file name")]
    NoFileName,
}

//=====================
// Station path handling
//=====================

// Presigned content paths come from the station and are joined onto the local
// recordings dir, so they must stay relative and below it.
pub fn validate_recording_path(path_str: &str) -> Result<(), ValidationError> {
    if path_str.is_empty() {
        return Err(ValidationError::Empty);
    }

    // \0 would truncate the path at the OS boundary
    if path_str.contains('\0') {
        return Err(ValidationError::NullByte);
    }

    let path = Path::new(path_str);

    for component in path.components() {
        match component {
            Component::Normal(_) => continue,
            Component::ParentDir => return Err(ValidationError::ContainsParentDir),
            Component::RootDir => return Err(ValidationError::AbsolutePath),
            Component::CurDir => continue,
            Component::Prefix(_) => return Err(ValidationError::InvalidComponent), // Windows
        }
    }

    if path_str.ends_with('/') || path.file_name().is_none() {
        return Err(ValidationError::NoFileName);
    }

    Ok(())
}

/// Local file a station path downloads to, directory components preserved
pub fn recording_destination(root: &Path, path_str: &str) -> Result<PathBuf, ValidationError> {
    validate_recording_path(path_str)?;
    Ok(root.join(path_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_nested_relative_paths() {
        assert!(validate_recording_path("clip.mp4").is_ok());
        assert!(validate_recording_path("a/b.mp4").is_ok());
        assert!(validate_recording_path("./20210304/cam1/clip.mp4").is_ok());
        assert!(validate_recording_path("20210304/cam 1/clip-0001.mp4").is_ok());
    }

    #[test]
    fn test_rejects_parent_dir() {
        assert!(matches!(
            validate_recording_path("../escape.mp4"),
            Err(ValidationError::ContainsParentDir)
        ));
        assert!(matches!(
            validate_recording_path("a/../../escape.mp4"),
            Err(ValidationError::ContainsParentDir)
        ));
    }

    #[test]
    fn test_rejects_absolute() {
        assert!(matches!(
            validate_recording_path("/etc/passwd"),
            Err(ValidationError::AbsolutePath)
        ));
        assert!(matches!(
            validate_recording_path("/"),
            Err(ValidationError::AbsolutePath)
        ));
    }

    #[test]
    fn test_rejects_null_byte() {
        assert!(matches!(
            validate_recording_path("clip\0.mp4"),
            Err(ValidationError::NullByte)
        ));
        // null byte used to hide traversal
        assert!(matches!(
            validate_recording_path("clip.mp4\0../x"),
            Err(ValidationError::NullByte)
        ));
    }

    #[test]
    fn test_rejects_empty_and_directory_only() {
        assert!(matches!(
            validate_recording_path(""),
            Err(ValidationError::Empty)
        ));
        assert!(matches!(
            validate_recording_path("a/b/"),
            Err(ValidationError::NoFileName)
        ));
        assert!(matches!(
            validate_recording_path("."),
            Err(ValidationError::NoFileName)
        ));
    }

    #[test]
    fn test_destination_preserves_directories() {
        let root = Path::new("/data/recordings");
        let dest = recording_destination(root, "20210304/cam1/clip.mp4").unwrap();
        assert_eq!(dest, Path::new("/data/recordings/20210304/cam1/clip.mp4"));

        assert!(recording_destination(root, "../x.mp4").is_err());
    }
}
