use std::sync::Arc;

use crate::{
    classify::{looks_like_lock_failure, looks_like_network_failure},
    context::AdapterContext,
    error::{PackagingError, PackagingErrorKind},
    executor::ShellExecutor,
    manager::PackageManager,
    privilege::PrivilegeManager,
    types::{InstallOptions, Package, RemoveOptions, Repository, SearchOptions, UpdateOptions},
    Family,
};

/// Adapter for Arch-style systems. Arch has no first-class per-repository add/remove CLI the
/// way apt/dnf/zypper do — repositories live as stanzas in `/etc/pacman.conf` that this crate
/// does not rewrite, so the repository-management methods return `RepositoryNotFound`/no-ops
/// rather than touching that file. The builder omits the repository step entirely for this
/// family; see the workflow crate.
pub struct PacmanPackageManager {
    executor: Arc<dyn ShellExecutor>,
    privilege: Arc<dyn PrivilegeManager>,
}

impl PacmanPackageManager {
    pub fn new(executor: Arc<dyn ShellExecutor>, privilege: Arc<dyn PrivilegeManager>) -> Self {
        PacmanPackageManager { executor, privilege }
    }

    fn elevated(&self, ctx: &AdapterContext, cmd: &str, args: &[&str]) -> crate::executor::CommandOutput {
        if ctx.dry_run {
            return crate::executor::CommandOutput {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            };
        }
        if self.privilege.is_root() {
            self.executor.execute(cmd, args)
        } else {
            self.executor.execute_elevated(cmd, args)
        }
    }

    fn classify_install_error(pkgs: &[&str], stderr: &str) -> PackagingError {
        if stderr.contains("target not found") {
            let missing = pkgs.first().copied().unwrap_or("");
            return PackagingError::with_cause(
                PackagingErrorKind::PackageNotFound(missing.to_string()),
                stderr.to_string(),
            );
        }
        if looks_like_lock_failure(stderr) {
            return PackagingError::with_cause(PackagingErrorKind::LockAcquireFailed, stderr.to_string());
        }
        if looks_like_network_failure(stderr) {
            return PackagingError::with_cause(PackagingErrorKind::NetworkUnavailable, stderr.to_string());
        }
        PackagingError::with_cause(
            PackagingErrorKind::InstallFailed(pkgs.join(", ")),
            stderr.to_string(),
        )
    }
}

impl PackageManager for PacmanPackageManager {
    fn name(&self) -> &'static str {
        "pacman"
    }

    fn family(&self) -> Family {
        Family::Arch
    }

    fn is_available(&self) -> bool {
        crate::executor::on_path("pacman")
    }

    fn install(&self, ctx: &AdapterContext, opts: &InstallOptions, pkgs: &[&str]) -> Result<(), PackagingError> {
        if pkgs.is_empty() {
            return Ok(());
        }
        for pkg in pkgs {
            crate::security::reject_shell_metacharacters(pkg)?;
        }

        let mut args: Vec<&str> = vec!["-S"];
        if opts.no_confirm {
            args.push("--noconfirm");
        }
        if opts.skip_verify {
            args.push("--disable-download-timeout");
        }
        args.extend(pkgs.iter().copied());

        let output = self.elevated(ctx, "pacman", &args);
        if output.failed() {
            return Err(Self::classify_install_error(pkgs, &output.stderr));
        }
        Ok(())
    }

    fn remove(&self, ctx: &AdapterContext, opts: &RemoveOptions, pkgs: &[&str]) -> Result<(), PackagingError> {
        if pkgs.is_empty() {
            return Ok(());
        }
        for pkg in pkgs {
            crate::security::reject_shell_metacharacters(pkg)?;
        }

        let mut args: Vec<&str> = vec!["-R"];
        if opts.purge {
            args.push("-n");
        }
        if opts.auto_remove {
            args.push("-s");
        }
        if opts.no_confirm {
            args.push("--noconfirm");
        }
        args.extend(pkgs.iter().copied());

        let output = self.elevated(ctx, "pacman", &args);
        if output.failed() {
            if output.stderr.contains("target not found") {
                let missing = pkgs.first().copied().unwrap_or("");
                return Err(PackagingError::with_cause(
                    PackagingErrorKind::PackageNotInstalled(missing.to_string()),
                    output.stderr,
                ));
            }
            if looks_like_lock_failure(&output.stderr) {
                return Err(PackagingError::with_cause(
                    PackagingErrorKind::LockAcquireFailed,
                    output.stderr,
                ));
            }
            return Err(PackagingError::with_cause(
                PackagingErrorKind::RemoveFailed(pkgs.join(", ")),
                output.stderr,
            ));
        }
        Ok(())
    }

    fn update(&self, ctx: &AdapterContext, _opts: &UpdateOptions) -> Result<(), PackagingError> {
        let output = self.elevated(ctx, "pacman", &["-Sy"]);
        if output.failed() {
            if looks_like_network_failure(&output.stderr) {
                return Err(PackagingError::with_cause(
                    PackagingErrorKind::NetworkUnavailable,
                    output.stderr,
                ));
            }
            return Err(PackagingError::with_cause(PackagingErrorKind::UpdateFailed, output.stderr));
        }
        Ok(())
    }

    fn upgrade(&self, ctx: &AdapterContext, _opts: &UpdateOptions, pkgs: &[&str]) -> Result<(), PackagingError> {
        for pkg in pkgs {
            crate::security::reject_shell_metacharacters(pkg)?;
        }
        // Pacman has no partial-upgrade mode: a full `-Syu` is the only supported form, per
        // Arch's "never upgrade a single package against a stale database" policy.
        let mut args = vec!["-Syu", "--noconfirm"];
        args.extend(pkgs.iter().copied());

        let output = self.elevated(ctx, "pacman", &args);
        if output.failed() {
            return Err(PackagingError::with_cause(PackagingErrorKind::UpdateFailed, output.stderr));
        }
        Ok(())
    }

    fn is_installed(&self, _ctx: &AdapterContext, name: &str) -> Result<bool, PackagingError> {
        crate::security::reject_shell_metacharacters(name)?;
        let output = self.executor.execute("pacman", &["-Q", name]);
        Ok(output.success())
    }

    fn search(&self, _ctx: &AdapterContext, query: &str, opts: &SearchOptions) -> Result<Vec<Package>, PackagingError> {
        crate::security::reject_shell_metacharacters(query)?;
        let output = self.executor.execute("pacman", &["-Ss", query]);
        if output.failed() {
            return Err(PackagingError::with_cause(PackagingErrorKind::UpdateFailed, output.stderr));
        }
        let mut pkgs = parse_pacman_ss(&output.stdout);
        if opts.exact_match {
            pkgs.retain(|p| p.name == query);
        }
        if let Some(limit) = opts.limit {
            pkgs.truncate(limit);
        }
        Ok(pkgs)
    }

    fn info(&self, ctx: &AdapterContext, name: &str) -> Result<Package, PackagingError> {
        crate::security::reject_shell_metacharacters(name)?;
        let output = self.executor.execute("pacman", &["-Si", name]);
        let output = if output.failed() {
            self.executor.execute("pacman", &["-Qi", name])
        } else {
            output
        };
        if output.failed() || output.stdout.trim().is_empty() {
            return Err(PackagingError::new(PackagingErrorKind::PackageNotFound(name.to_string())));
        }
        let mut pkg = parse_pacman_info(&output.stdout).ok_or_else(|| {
            PackagingError::new(PackagingErrorKind::PackageNotFound(name.to_string()))
        })?;
        pkg.installed = self.is_installed(ctx, name)?;
        Ok(pkg)
    }

    fn list_installed(&self, _ctx: &AdapterContext) -> Result<Vec<Package>, PackagingError> {
        let output = self.executor.execute("pacman", &["-Q"]);
        if output.failed() {
            return Err(PackagingError::with_cause(PackagingErrorKind::UpdateFailed, output.stderr));
        }
        Ok(parse_pacman_q(&output.stdout))
    }

    fn list_upgradable(&self, _ctx: &AdapterContext) -> Result<Vec<Package>, PackagingError> {
        let output = self.executor.execute("pacman", &["-Qu"]);
        // `pacman -Qu` exits non-zero when there is simply nothing to upgrade.
        Ok(parse_pacman_qu(&output.stdout))
    }

    fn clean(&self, ctx: &AdapterContext) -> Result<(), PackagingError> {
        let output = self.elevated(ctx, "pacman", &["-Sc", "--noconfirm"]);
        if output.failed() {
            return Err(PackagingError::with_cause(PackagingErrorKind::UpdateFailed, output.stderr));
        }
        Ok(())
    }

    fn auto_remove(&self, ctx: &AdapterContext) -> Result<(), PackagingError> {
        let orphans = self.executor.execute("pacman", &["-Qdtq"]);
        if orphans.stdout.trim().is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = orphans.stdout.lines().collect();
        let mut args = vec!["-Rns", "--noconfirm"];
        args.extend(names.iter().copied());
        let output = self.elevated(ctx, "pacman", &args);
        if output.failed() {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::RemoveFailed(String::new()),
                output.stderr,
            ));
        }
        Ok(())
    }

    fn verify(&self, ctx: &AdapterContext, name: &str) -> Result<bool, PackagingError> {
        crate::security::reject_shell_metacharacters(name)?;
        if !self.is_installed(ctx, name)? {
            return Err(PackagingError::new(PackagingErrorKind::PackageNotInstalled(name.to_string())));
        }
        let output = self.executor.execute("pacman", &["-Qk", name]);
        Ok(output.success())
    }

    fn add_repository(&self, _ctx: &AdapterContext, repo: &Repository) -> Result<(), PackagingError> {
        Err(PackagingError::new(PackagingErrorKind::RepositoryNotFound(format!(
            "pacman does not support per-repository management of '{}'; edit /etc/pacman.conf directly",
            repo.name
        ))))
    }

    fn remove_repository(&self, _ctx: &AdapterContext, name: &str) -> Result<(), PackagingError> {
        Err(PackagingError::new(PackagingErrorKind::RepositoryNotFound(name.to_string())))
    }

    fn list_repositories(&self, _ctx: &AdapterContext) -> Result<Vec<Repository>, PackagingError> {
        Ok(Vec::new())
    }

    fn enable_repository(&self, _ctx: &AdapterContext, name: &str) -> Result<(), PackagingError> {
        Err(PackagingError::new(PackagingErrorKind::RepositoryNotFound(name.to_string())))
    }

    fn disable_repository(&self, _ctx: &AdapterContext, name: &str) -> Result<(), PackagingError> {
        Err(PackagingError::new(PackagingErrorKind::RepositoryNotFound(name.to_string())))
    }

    fn refresh_repositories(&self, ctx: &AdapterContext) -> Result<(), PackagingError> {
        self.update(ctx, &UpdateOptions::default())
    }

    fn import_gpg_key(&self, ctx: &AdapterContext, key_url_or_path: &str) -> Result<(), PackagingError> {
        crate::security::reject_shell_metacharacters(key_url_or_path)?;
        let output = self.elevated(ctx, "pacman-key", &["--recv-keys", key_url_or_path]);
        if output.failed() {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::InstallFailed("gpg key".to_string()),
                output.stderr,
            ));
        }
        let trust = self.elevated(ctx, "pacman-key", &["--lsign-key", key_url_or_path]);
        if trust.failed() {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::InstallFailed("gpg key".to_string()),
                trust.stderr,
            ));
        }
        Ok(())
    }
}

/// Parses `pacman -Q` output: `name version` per line.
pub fn parse_pacman_q(output: &str) -> Vec<Package> {
    let mut pkgs = Vec::new();
    for line in output.lines() {
        let mut parts = line.split_whitespace();
        let (Some(name), Some(version)) = (parts.next(), parts.next()) else {
            continue;
        };
        let mut pkg = Package::new(name, version);
        pkg.installed = true;
        pkgs.push(pkg);
    }
    pkgs
}

/// Parses `pacman -Qu` output: `name old-version -> new-version` per line.
pub fn parse_pacman_qu(output: &str) -> Vec<Package> {
    let mut pkgs = Vec::new();
    for line in output.lines() {
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else { continue };
        let _old = parts.next();
        let _arrow = parts.next();
        let Some(new_version) = parts.next() else { continue };
        pkgs.push(Package::new(name, new_version));
    }
    pkgs
}

/// Parses `pacman -Ss <query>` output: paired `repo/name version` header lines followed by an
/// indented description line.
pub fn parse_pacman_ss(output: &str) -> Vec<Package> {
    let mut pkgs = Vec::new();
    let mut lines = output.lines().peekable();
    while let Some(line) = lines.next() {
        if line.starts_with(' ') || line.trim().is_empty() {
            continue;
        }
        let mut header = line.split_whitespace();
        let Some(repo_name) = header.next() else { continue };
        let Some(version) = header.next() else { continue };
        let name = repo_name.split('/').last().unwrap_or(repo_name);
        let repo = repo_name.split('/').next().map(|s| s.to_string());

        let mut pkg = Package::new(name, version);
        pkg.repository = repo;
        if let Some(next) = lines.peek() {
            if next.starts_with(' ') {
                pkg.description = Some(next.trim().to_string());
            }
        }
        pkgs.push(pkg);
    }
    pkgs
}

/// Parses `pacman -Si`/`-Qi` stanza output.
pub fn parse_pacman_info(output: &str) -> Option<Package> {
    let mut name = None;
    let mut version = None;
    let mut architecture = None;
    let mut description = None;

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Name" => name = Some(value.to_string()),
            "Version" => version = Some(value.to_string()),
            "Architecture" => architecture = Some(value.to_string()),
            "Description" => description = Some(value.to_string()),
            _ => {}
        }
    }

    Some(Package {
        name: name?,
        version: version.unwrap_or_default(),
        installed: false,
        repository: None,
        description,
        size: 0,
        architecture,
        dependencies: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_package_not_found() {
        let err = PacmanPackageManager::classify_install_error(
            &["nonexistent"],
            "error: target not found: nonexistent",
        );
        assert!(matches!(err.kind(), PackagingErrorKind::PackageNotFound(n) if n == "nonexistent"));
    }

    #[test]
    fn parses_pacman_q() {
        let pkgs = parse_pacman_q("nvidia 545.29.06-1\nlinux 6.6.1.arch1-1\n");
        assert_eq!(pkgs.len(), 2);
        assert_eq!(pkgs[0].name, "nvidia");
        assert!(pkgs[0].installed);
    }

    #[test]
    fn parses_pacman_ss_with_description() {
        let output = "extra/nvidia 545.29.06-1 (linux)\n    NVIDIA drivers for linux\n";
        let pkgs = parse_pacman_ss(output);
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].name, "nvidia");
        assert_eq!(pkgs[0].repository.as_deref(), Some("extra"));
        assert_eq!(pkgs[0].description.as_deref(), Some("NVIDIA drivers for linux"));
    }
}
