use std::fmt;

/// One of the four packaging ecosystems this crate normalizes behind `PackageManager`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Debian,
    Rhel,
    Arch,
    Suse,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Family::Debian => "debian",
            Family::Rhel => "rhel",
            Family::Arch => "arch",
            Family::Suse => "suse",
        };
        write!(f, "{s}")
    }
}

/// A package as reported by the native tool, normalized to a common shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub installed: bool,
    pub repository: Option<String>,
    pub description: Option<String>,
    pub size: i64,
    pub architecture: Option<String>,
    pub dependencies: Vec<String>,
}

impl Package {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Package {
            name: name.into(),
            version: version.into(),
            installed: false,
            repository: None,
            description: None,
            size: 0,
            architecture: None,
            dependencies: Vec::new(),
        }
    }
}

/// One of the on-disk repository-definition formats (`sources.list` entry, `.repo` INI stanza).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
    pub url: String,
    pub enabled: bool,
    pub gpg_key: Option<String>,
    pub repo_type: Option<String>,
    pub components: Vec<String>,
    pub distribution: Option<String>,
    pub priority: Option<i32>,
}

impl Repository {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Repository {
            name: name.into(),
            url: url.into(),
            enabled: true,
            gpg_key: None,
            repo_type: None,
            components: Vec::new(),
            distribution: None,
            priority: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    pub force: bool,
    pub no_confirm: bool,
    pub skip_verify: bool,
    pub download_only: bool,
    pub reinstall: bool,
    pub allow_downgrade: bool,
}

impl InstallOptions {
    /// Default preset for unattended installs: assume yes, no interactive prompts.
    pub fn non_interactive() -> Self {
        InstallOptions {
            no_confirm: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveOptions {
    pub purge: bool,
    pub auto_remove: bool,
    pub no_confirm: bool,
}

impl RemoveOptions {
    pub fn non_interactive() -> Self {
        RemoveOptions {
            no_confirm: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    pub quiet: bool,
    pub force_refresh: bool,
}

impl UpdateOptions {
    pub fn non_interactive() -> Self {
        UpdateOptions::default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    pub include_installed: bool,
    pub exact_match: bool,
    pub limit: Option<usize>,
}

impl SearchOptions {
    pub fn non_interactive() -> Self {
        SearchOptions::default()
    }
}
