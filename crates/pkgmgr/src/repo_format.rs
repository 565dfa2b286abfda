//! Synthesis and parsing of the two native repository-definition formats used across the four
//! families: Debian `sources.list`-style single-line entries (with optional
//! `[signed-by=...]` bracket options) and RHEL/SUSE INI-style `.repo` files.

use crate::types::Repository;

/// Renders a Debian-style one-line `deb` entry, e.g.:
/// `deb [signed-by=/etc/apt/keyrings/cuda.gpg] https://example.com/ stable main`
pub fn render_deb_entry(repo: &Repository) -> String {
    let mut line = String::from("deb ");
    if let Some(ref key) = repo.gpg_key {
        line.push_str(&format!("[signed-by={key}] "));
    }
    line.push_str(&repo.url);
    line.push(' ');
    line.push_str(repo.distribution.as_deref().unwrap_or("stable"));
    for component in &repo.components {
        line.push(' ');
        line.push_str(component);
    }
    line
}

/// Parses a Debian-style one-line `deb` entry back into a `Repository`. Tolerant of malformed
/// input: returns `None` rather than panicking when the line cannot be parsed as a deb entry.
pub fn parse_deb_entry(line: &str, name: &str) -> Option<Repository> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let rest = line.strip_prefix("deb ").or_else(|| line.strip_prefix("deb-src "))?;
    let mut rest = rest.trim();

    let mut gpg_key = None;
    if let Some(stripped) = rest.strip_prefix('[') {
        let (opts, after) = stripped.split_once(']')?;
        for opt in opts.split_whitespace() {
            if let Some(value) = opt.strip_prefix("signed-by=") {
                gpg_key = Some(value.to_string());
            }
        }
        rest = after.trim();
    }

    let mut parts = rest.split_whitespace();
    let url = parts.next()?.to_string();
    let distribution = parts.next().map(|s| s.to_string());
    let components: Vec<String> = parts.map(|s| s.to_string()).collect();

    Some(Repository {
        name: name.to_string(),
        url,
        enabled: true,
        gpg_key,
        repo_type: Some("deb".to_string()),
        components,
        distribution,
        priority: None,
    })
}

/// Renders an RHEL/SUSE-style `.repo` INI stanza.
pub fn render_ini_repo(repo: &Repository) -> String {
    let mut out = format!("[{}]\n", repo.name);
    out.push_str(&format!("name={}\n", repo.name));
    out.push_str(&format!("baseurl={}\n", repo.url));
    out.push_str(&format!("enabled={}\n", if repo.enabled { 1 } else { 0 }));
    out.push_str(&format!("gpgcheck={}\n", if repo.gpg_key.is_some() { 1 } else { 0 }));
    if let Some(ref key) = repo.gpg_key {
        out.push_str(&format!("gpgkey={key}\n"));
    }
    if let Some(priority) = repo.priority {
        out.push_str(&format!("priority={priority}\n"));
    }
    out
}

/// Parses an RHEL/SUSE-style `.repo` INI stanza. Total: returns `None` when no `[id]` header is
/// present, skips any line that isn't a recognized `key=value` pair instead of erroring.
pub fn parse_ini_repo(contents: &str) -> Option<Repository> {
    let mut lines = contents.lines();
    let header = lines.find(|l| l.trim_start().starts_with('['))?;
    let id = header.trim().trim_start_matches('[').trim_end_matches(']').to_string();

    let mut repo = Repository::new(id, String::new());
    repo.enabled = true;

    for line in lines {
        let line = line.trim();
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        match key {
            "name" => repo.name = value.to_string(),
            "baseurl" => repo.url = value.to_string(),
            "enabled" => repo.enabled = value != "0",
            "gpgkey" => repo.gpg_key = Some(value.to_string()),
            "priority" => repo.priority = value.parse().ok(),
            _ => {}
        }
    }

    if repo.url.is_empty() {
        None
    } else {
        Some(repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deb_entry_round_trips() {
        let mut repo = Repository::new("cuda", "https://developer.download.nvidia.com/compute/cuda/repos/ubuntu2204/x86_64/");
        repo.gpg_key = Some("/etc/apt/keyrings/cuda.gpg".to_string());
        repo.distribution = Some("/".to_string());
        repo.components = vec![];

        let rendered = render_deb_entry(&repo);
        let parsed = parse_deb_entry(&rendered, "cuda").unwrap();
        assert_eq!(parsed.url, repo.url);
        assert_eq!(parsed.gpg_key, repo.gpg_key);
    }

    #[test]
    fn ini_repo_round_trips() {
        let mut repo = Repository::new("cuda-rhel9", "https://developer.download.nvidia.com/compute/cuda/repos/rhel9/x86_64/");
        repo.gpg_key = Some("https://developer.download.nvidia.com/compute/cuda/repos/rhel9/x86_64/D42D0685.pub".to_string());
        repo.priority = Some(50);

        let rendered = render_ini_repo(&repo);
        let parsed = parse_ini_repo(&rendered).unwrap();
        assert_eq!(parsed.name, repo.name);
        assert_eq!(parsed.url, repo.url);
        assert_eq!(parsed.gpg_key, repo.gpg_key);
        assert_eq!(parsed.priority, repo.priority);
    }

    #[test]
    fn parse_ini_repo_is_total_on_garbage() {
        assert!(parse_ini_repo("not a repo file at all").is_none());
        assert!(parse_ini_repo("").is_none());
    }

    #[test]
    fn parse_deb_entry_is_total_on_garbage() {
        assert!(parse_deb_entry("# just a comment", "x").is_none());
        assert!(parse_deb_entry("", "x").is_none());
        assert!(parse_deb_entry("not a deb line", "x").is_none());
    }
}
