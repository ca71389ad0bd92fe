use std::path::{Component, Path};

/// Why a requested display name was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("file name is empty")]
    Empty,

    #[error("file name must not contain path separators: {0}")]
    PathSeparator(String),

    #[error("file name is not a plain file name: {0}")]
    NotAFileName(String),
}

/// Validates a user-supplied file name and returns it trimmed.
///
/// Rejects:
/// - Empty or whitespace-only names
/// - Any `/` or `\` (on every platform)
/// - Names that are not a single normal path component (`.`, `..`, `C:`)
pub fn validate_display_name(name: &str) -> Result<&str, NameError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(NameError::Empty);
    }

    if name.contains(['/', '\\']) {
        return Err(NameError::PathSeparator(name.to_string()));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(NameError::NotAFileName(name.to_string())),
    }
}
