use crate::error::{PackagingError, PackagingErrorKind};

/// Characters that must never appear in a name or URL interpolated into a shell command.
const SHELL_METACHARACTERS: &[char] = &['\'', '"', '\\', '$', '`', '|', ';', '&', '(', ')', '<', '>', '!'];

/// Rejects any input containing shell metacharacters. Every adapter method that interpolates
/// a package name, repository name, or URL into a native command calls this first.
pub fn reject_shell_metacharacters(input: &str) -> Result<(), PackagingError> {
    if let Some(c) = input.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
        return Err(PackagingError::new(PackagingErrorKind::UnsafeInput(format!(
            "input '{input}' contains disallowed character '{c}'"
        ))));
    }
    Ok(())
}

/// Rejects any URL that does not begin with `http://` or `https://`.
pub fn validate_url_scheme(url: &str) -> Result<(), PackagingError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(PackagingError::new(PackagingErrorKind::UnsafeInput(format!(
            "url '{url}' must begin with http:// or https://"
        ))));
    }
    Ok(())
}

/// Combined check used before building a repository: validate the URL scheme and reject
/// shell metacharacters in both the name and the URL.
pub fn validate_repository_inputs(name: &str, url: &str) -> Result<(), PackagingError> {
    reject_shell_metacharacters(name)?;
    reject_shell_metacharacters(url)?;
    validate_url_scheme(url)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_metacharacters() {
        assert!(reject_shell_metacharacters("nginx; rm -rf /").is_err());
        assert!(reject_shell_metacharacters("nginx").is_ok());
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(validate_url_scheme("ftp://example.com").is_err());
        assert!(validate_url_scheme("https://example.com").is_ok());
    }

    #[test]
    fn repository_inputs_combined() {
        assert!(validate_repository_inputs("cuda", "https://developer.download.nvidia.com").is_ok());
        assert!(validate_repository_inputs("cuda`evil`", "https://x").is_err());
        assert!(validate_repository_inputs("cuda", "javascript:alert(1)").is_err());
    }
}
