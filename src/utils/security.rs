use std::fmt;

/// Longest file name most filesystems accept.
const MAX_FILE_NAME_BYTES: usize = 255;

//===============
// Name Handling
//===============
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileNameError {
    Empty,
    TooLong,
    ContainsSeparator,
    ParentOrCurrentDir,
    ControlCharacter,
}

impl fmt::Display for FileNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileNameError::Empty => write!(f, "File name is empty"),
            FileNameError::TooLong => write!(f, "File name is too long"),
            FileNameError::ContainsSeparator => write!(f, "File name contains a path separator"),
            FileNameError::ParentOrCurrentDir => write!(f, "File name is a directory reference"),
            FileNameError::ControlCharacter => {
                write!(f, "File name contains a control character")
            }
        }
    }
}

impl std::error::Error for FileNameError {}

// Names come from the remote peer, so only a single plain component is allowed.
// no: separators, "." or "..", null bytes or other control characters
pub fn validate_file_name(name: &str) -> Result<(), FileNameError> {
    if name.is_empty() {
        return Err(FileNameError::Empty);
    }
    if name.len() > MAX_FILE_NAME_BYTES {
        return Err(FileNameError::TooLong);
    }
    if name == "." || name == ".." {
        return Err(FileNameError::ParentOrCurrentDir);
    }
    if name.contains(['/', '\\']) {
        return Err(FileNameError::ContainsSeparator);
    }
    // rust uses C-style APIs so \0 can end str early
    if name.chars().any(char::is_control) {
        return Err(FileNameError::ControlCharacter);
    }
    Ok(())
}
