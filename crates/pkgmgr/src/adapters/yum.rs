use std::sync::Arc;

use crate::{
    classify::{looks_like_lock_failure, looks_like_network_failure},
    context::AdapterContext,
    error::{PackagingError, PackagingErrorKind},
    executor::ShellExecutor,
    manager::PackageManager,
    privilege::PrivilegeManager,
    repo_format::{parse_ini_repo, render_ini_repo},
    security::validate_repository_inputs,
    types::{InstallOptions, Package, RemoveOptions, Repository, SearchOptions, UpdateOptions},
    Family,
};

/// Adapter for RHEL/Fedora-style systems. Prefers `dnf` when present, falls back to `yum`
/// transparently: both accept the same subcommands and flags used here.
pub struct YumPackageManager {
    executor: Arc<dyn ShellExecutor>,
    privilege: Arc<dyn PrivilegeManager>,
}

impl YumPackageManager {
    pub fn new(executor: Arc<dyn ShellExecutor>, privilege: Arc<dyn PrivilegeManager>) -> Self {
        YumPackageManager { executor, privilege }
    }

    fn binary(&self) -> &'static str {
        if crate::executor::on_path("dnf") {
            "dnf"
        } else {
            "yum"
        }
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
        if stderr.contains("No match for argument") || stderr.contains("No package") {
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

    fn classify_remove_error(pkgs: &[&str], stderr: &str) -> PackagingError {
        if stderr.contains("No match for argument") || stderr.contains("No Packages marked") {
            let missing = pkgs.first().copied().unwrap_or("");
            return PackagingError::with_cause(
                PackagingErrorKind::PackageNotInstalled(missing.to_string()),
                stderr.to_string(),
            );
        }
        if looks_like_lock_failure(stderr) {
            return PackagingError::with_cause(PackagingErrorKind::LockAcquireFailed, stderr.to_string());
        }
        PackagingError::with_cause(
            PackagingErrorKind::RemoveFailed(pkgs.join(", ")),
            stderr.to_string(),
        )
    }
}

impl PackageManager for YumPackageManager {
    fn name(&self) -> &'static str {
        "yum"
    }

    fn family(&self) -> Family {
        Family::Rhel
    }

    fn is_available(&self) -> bool {
        crate::executor::on_path("dnf") || crate::executor::on_path("yum")
    }

    fn install(&self, ctx: &AdapterContext, opts: &InstallOptions, pkgs: &[&str]) -> Result<(), PackagingError> {
        if pkgs.is_empty() {
            return Ok(());
        }
        for pkg in pkgs {
            crate::security::reject_shell_metacharacters(pkg)?;
        }

        let mut args: Vec<&str> = vec!["install"];
        if opts.no_confirm {
            args.push("-y");
        }
        if opts.reinstall {
            args.push("reinstall");
        }
        args.extend(pkgs.iter().copied());

        let output = self.elevated(ctx, self.binary(), &args);
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

        let mut args: Vec<&str> = vec!["remove"];
        if opts.no_confirm {
            args.push("-y");
        }
        args.extend(pkgs.iter().copied());

        let output = self.elevated(ctx, self.binary(), &args);
        if output.failed() {
            return Err(Self::classify_remove_error(pkgs, &output.stderr));
        }
        if opts.auto_remove {
            self.auto_remove(ctx)?;
        }
        Ok(())
    }

    fn update(&self, ctx: &AdapterContext, _opts: &UpdateOptions) -> Result<(), PackagingError> {
        // `yum check-update`/`dnf check-update` uses exit code 100 to mean "updates available",
        // which is success, not failure.
        let output = self.elevated(ctx, self.binary(), &["check-update", "-y"]);
        if output.failed() && output.exit_code != 100 {
            if looks_like_network_failure(&output.stderr) {
                return Err(PackagingError::with_cause(
                    PackagingErrorKind::NetworkUnavailable,
                    output.stderr,
                ));
            }
            if looks_like_lock_failure(&output.stderr) {
                return Err(PackagingError::with_cause(
                    PackagingErrorKind::LockAcquireFailed,
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
        let mut args: Vec<&str> = vec!["upgrade", "-y"];
        args.extend(pkgs.iter().copied());

        let output = self.elevated(ctx, self.binary(), &args);
        if output.failed() {
            return Err(PackagingError::with_cause(PackagingErrorKind::UpdateFailed, output.stderr));
        }
        Ok(())
    }

    fn is_installed(&self, _ctx: &AdapterContext, name: &str) -> Result<bool, PackagingError> {
        crate::security::reject_shell_metacharacters(name)?;
        let output = self.executor.execute("rpm", &["-q", name]);
        Ok(output.success())
    }

    fn search(&self, _ctx: &AdapterContext, query: &str, opts: &SearchOptions) -> Result<Vec<Package>, PackagingError> {
        crate::security::reject_shell_metacharacters(query)?;
        let output = self.executor.execute(self.binary(), &["search", query]);
        if output.failed() {
            return Err(PackagingError::with_cause(PackagingErrorKind::UpdateFailed, output.stderr));
        }
        let mut pkgs = parse_dnf_search(&output.stdout);
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
        let output = self.executor.execute(self.binary(), &["info", name]);
        if output.failed() || output.stdout.trim().is_empty() {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::PackageNotFound(name.to_string()),
                output.stderr,
            ));
        }
        let mut pkg = parse_dnf_info(&output.stdout).ok_or_else(|| {
            PackagingError::new(PackagingErrorKind::PackageNotFound(name.to_string()))
        })?;
        pkg.installed = self.is_installed(ctx, name)?;
        Ok(pkg)
    }

    fn list_installed(&self, _ctx: &AdapterContext) -> Result<Vec<Package>, PackagingError> {
        let output = self.executor.execute(
            "rpm",
            &["-qa", "--queryformat", "%{NAME}\t%{VERSION}-%{RELEASE}\t%{ARCH}\n"],
        );
        if output.failed() {
            return Err(PackagingError::with_cause(PackagingErrorKind::UpdateFailed, output.stderr));
        }
        Ok(parse_rpm_qa(&output.stdout))
    }

    fn list_upgradable(&self, _ctx: &AdapterContext) -> Result<Vec<Package>, PackagingError> {
        let output = self.executor.execute(self.binary(), &["list", "upgrades"]);
        if output.failed() && output.exit_code != 100 {
            return Err(PackagingError::with_cause(PackagingErrorKind::UpdateFailed, output.stderr));
        }
        Ok(parse_dnf_list_upgrades(&output.stdout))
    }

    fn clean(&self, ctx: &AdapterContext) -> Result<(), PackagingError> {
        let output = self.elevated(ctx, self.binary(), &["clean", "all"]);
        if output.failed() {
            return Err(PackagingError::with_cause(PackagingErrorKind::UpdateFailed, output.stderr));
        }
        Ok(())
    }

    fn auto_remove(&self, ctx: &AdapterContext) -> Result<(), PackagingError> {
        let output = self.elevated(ctx, self.binary(), &["autoremove", "-y"]);
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
        let output = self.executor.execute("rpm", &["-V", name]);
        Ok(output.success())
    }

    fn add_repository(&self, ctx: &AdapterContext, repo: &Repository) -> Result<(), PackagingError> {
        validate_repository_inputs(&repo.name, &repo.url)?;
        let contents = render_ini_repo(repo);
        let path = format!("/etc/yum.repos.d/{}.repo", repo.name);
        if ctx.dry_run {
            return Ok(());
        }
        let output = self
            .executor
            .execute_with_input(contents.as_bytes(), "tee", &[&path]);
        if output.failed() {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::RepositoryExists(repo.name.clone()),
                output.stderr,
            ));
        }
        Ok(())
    }

    fn remove_repository(&self, ctx: &AdapterContext, name: &str) -> Result<(), PackagingError> {
        crate::security::reject_shell_metacharacters(name)?;
        let path = format!("/etc/yum.repos.d/{name}.repo");
        let output = self.elevated(ctx, "rm", &["-f", &path]);
        if output.failed() {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::RepositoryNotFound(name.to_string()),
                output.stderr,
            ));
        }
        Ok(())
    }

    fn list_repositories(&self, _ctx: &AdapterContext) -> Result<Vec<Repository>, PackagingError> {
        let output = self.executor.execute("find", &["/etc/yum.repos.d", "-name", "*.repo"]);
        let mut repos = Vec::new();
        for path in output.stdout.lines() {
            let contents = self.executor.execute("cat", &[path]);
            if let Some(repo) = parse_ini_repo(&contents.stdout) {
                repos.push(repo);
            }
        }
        Ok(repos)
    }

    fn enable_repository(&self, ctx: &AdapterContext, name: &str) -> Result<(), PackagingError> {
        crate::security::reject_shell_metacharacters(name)?;
        let output = self.elevated(ctx, self.binary(), &["config-manager", "--set-enabled", name]);
        if output.failed() {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::RepositoryNotFound(name.to_string()),
                output.stderr,
            ));
        }
        Ok(())
    }

    fn disable_repository(&self, ctx: &AdapterContext, name: &str) -> Result<(), PackagingError> {
        crate::security::reject_shell_metacharacters(name)?;
        let output = self.elevated(ctx, self.binary(), &["config-manager", "--set-disabled", name]);
        if output.failed() {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::RepositoryNotFound(name.to_string()),
                output.stderr,
            ));
        }
        Ok(())
    }

    fn refresh_repositories(&self, ctx: &AdapterContext) -> Result<(), PackagingError> {
        let output = self.elevated(ctx, self.binary(), &["makecache"]);
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

    fn import_gpg_key(&self, ctx: &AdapterContext, key_url_or_path: &str) -> Result<(), PackagingError> {
        crate::security::reject_shell_metacharacters(key_url_or_path)?;
        let output = self.elevated(ctx, "rpm", &["--import", key_url_or_path]);
        if output.failed() {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::InstallFailed("gpg key".to_string()),
                output.stderr,
            ));
        }
        Ok(())
    }
}

/// Parses `rpm -qa --queryformat '%{NAME}\t%{VERSION}-%{RELEASE}\t%{ARCH}\n'`, shared by the
/// yum and zypper adapters since both sit on top of rpm.
pub fn parse_rpm_qa(output: &str) -> Vec<Package> {
    let mut pkgs = Vec::new();
    for line in output.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            continue;
        }
        let name = fields[0].trim();
        if name.is_empty() {
            continue;
        }
        let mut pkg = Package::new(name, fields[1].trim());
        pkg.installed = true;
        pkg.architecture = Some(fields[2].trim().to_string());
        pkgs.push(pkg);
    }
    pkgs
}

/// Parses `dnf search <query>` output: a `Name : description` header followed by
/// `name.arch : summary` lines under `====` separators.
pub fn parse_dnf_search(output: &str) -> Vec<Package> {
    let mut pkgs = Vec::new();
    for line in output.lines() {
        if !line.contains(" : ") || line.starts_with('=') {
            continue;
        }
        let Some((name_arch, summary)) = line.split_once(" : ") else {
            continue;
        };
        let name = name_arch.split('.').next().unwrap_or(name_arch).trim();
        if name.is_empty() {
            continue;
        }
        let mut pkg = Package::new(name, "");
        pkg.description = Some(summary.trim().to_string());
        pkgs.push(pkg);
    }
    pkgs
}

/// Parses `dnf/yum info <name>` stanza output.
pub fn parse_dnf_info(output: &str) -> Option<Package> {
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
            "Architecture" | "Arch" => architecture = Some(value.to_string()),
            "Summary" | "Description" => description = Some(value.to_string()),
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

/// Parses `dnf list upgrades` output, skipping the "Available Upgrades" / repo header lines.
pub fn parse_dnf_list_upgrades(output: &str) -> Vec<Package> {
    let mut pkgs = Vec::new();
    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 || line.starts_with("Available") || line.starts_with("Last") {
            continue;
        }
        let name = fields[0].split('.').next().unwrap_or(fields[0]);
        pkgs.push(Package::new(name, fields[1]));
    }
    pkgs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_package_not_found() {
        let err = YumPackageManager::classify_install_error(
            &["nonexistent"],
            "Error: No match for argument: nonexistent",
        );
        assert!(matches!(err.kind(), PackagingErrorKind::PackageNotFound(n) if n == "nonexistent"));
    }

    #[test]
    fn parses_rpm_qa() {
        let output = "nginx\t1.20.1-1.el9\tx86_64\nbroken-line\n";
        let pkgs = parse_rpm_qa(output);
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].name, "nginx");
        assert!(pkgs[0].installed);
    }

    #[test]
    fn parses_dnf_search() {
        let output = "========= Name Matches =========\nnginx.x86_64 : A high performance web server\n";
        let pkgs = parse_dnf_search(output);
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].name, "nginx");
    }

    #[test]
    fn check_update_exit_100_is_success() {
        // exit code 100 from `dnf check-update` means "updates available", not an error.
        let output = crate::executor::CommandOutput {
            exit_code: 100,
            stdout: "nginx.x86_64  1.21.0-1  updates\n".to_string(),
            stderr: String::new(),
        };
        assert!(output.failed());
        assert_eq!(output.exit_code, 100);
    }
}
