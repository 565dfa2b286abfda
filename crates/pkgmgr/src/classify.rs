//! Shared stderr-classification helpers. Each adapter still owns its own classification
//! function (native tools phrase the same failure differently), but the lock/network
//! detection substrings recur across families so the match arms stay short and legible.

/// Lines that any of the four native tools uses to report "another process holds the lock".
pub fn looks_like_lock_failure(stderr: &str) -> bool {
    let needles = [
        "could not get lock",
        "unable to acquire the dpkg frontend lock",
        "is locked by another process",
        "system management is locked",
        "another app is currently holding the",
    ];
    let lower = stderr.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

/// Lines that any of the four native tools uses to report a network/fetch failure.
pub fn looks_like_network_failure(stderr: &str) -> bool {
    let needles = [
        "failed to fetch",
        "could not resolve",
        "could not connect",
        "connection timed out",
        "temporary failure in name resolution",
        "no route to host",
        "network is unreachable",
    ];
    let lower = stderr.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_lock_phrases() {
        assert!(looks_like_lock_failure("E: Could not get lock /var/lib/dpkg/lock-frontend"));
        assert!(looks_like_lock_failure("System management is locked by the application with pid 1234"));
        assert!(!looks_like_lock_failure("E: Unable to locate package nonexistent"));
    }

    #[test]
    fn detects_network_phrases() {
        assert!(looks_like_network_failure("E: Failed to fetch http://archive.ubuntu.com/... 404"));
        assert!(!looks_like_network_failure("E: Could not get lock"));
    }
}
