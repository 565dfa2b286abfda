use std::sync::Arc;

use crate::{
    adapters::yum::parse_rpm_qa,
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

/// Adapter for SUSE/openSUSE-style systems. Sits on rpm like the RHEL family, so package-list
/// parsing is shared with `adapters::yum::parse_rpm_qa`; everything else speaks zypper's own
/// subcommands and exit-code conventions (101/102/103 under `--non-interactive` all mean
/// "succeeded, but reboot/restart needed", not failure).
pub struct ZypperPackageManager {
    executor: Arc<dyn ShellExecutor>,
    privilege: Arc<dyn PrivilegeManager>,
}

impl ZypperPackageManager {
    pub fn new(executor: Arc<dyn ShellExecutor>, privilege: Arc<dyn PrivilegeManager>) -> Self {
        ZypperPackageManager { executor, privilege }
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

    /// zypper exit codes 100-106 are all "informational success" (e.g. 103 = "zypper itself was
    /// updated, restart"), not failures. Only codes outside that success set are real errors.
    fn zypper_ok(output: &crate::executor::CommandOutput) -> bool {
        output.exit_code == 0 || (100..=106).contains(&output.exit_code)
    }

    fn classify_install_error(pkgs: &[&str], stderr: &str) -> PackagingError {
        if stderr.contains("not found") || stderr.contains("No provider") {
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

impl PackageManager for ZypperPackageManager {
    fn name(&self) -> &'static str {
        "zypper"
    }

    fn family(&self) -> Family {
        Family::Suse
    }

    fn is_available(&self) -> bool {
        crate::executor::on_path("zypper")
    }

    fn install(&self, ctx: &AdapterContext, opts: &InstallOptions, pkgs: &[&str]) -> Result<(), PackagingError> {
        if pkgs.is_empty() {
            return Ok(());
        }
        for pkg in pkgs {
            crate::security::reject_shell_metacharacters(pkg)?;
        }

        let mut args: Vec<&str> = vec!["--non-interactive", "install"];
        if opts.force || opts.reinstall {
            args.push("--force");
        }
        args.extend(pkgs.iter().copied());

        let output = self.elevated(ctx, "zypper", &args);
        if !Self::zypper_ok(&output) {
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

        let mut args: Vec<&str> = vec!["--non-interactive", "remove"];
        if opts.auto_remove {
            args.push("--clean-deps");
        }
        args.extend(pkgs.iter().copied());

        let output = self.elevated(ctx, "zypper", &args);
        if !Self::zypper_ok(&output) {
            if output.stderr.contains("not found") || output.stderr.contains("is not installed") {
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
        let output = self.elevated(ctx, "zypper", &["--non-interactive", "refresh"]);
        if !Self::zypper_ok(&output) {
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

    fn upgrade(&self, ctx: &AdapterContext, opts: &UpdateOptions, pkgs: &[&str]) -> Result<(), PackagingError> {
        for pkg in pkgs {
            crate::security::reject_shell_metacharacters(pkg)?;
        }
        if !pkgs.is_empty() {
            let mut args = vec!["--non-interactive", "update"];
            args.extend(pkgs.iter().copied());
            let output = self.elevated(ctx, "zypper", &args);
            if !Self::zypper_ok(&output) {
                return Err(PackagingError::with_cause(PackagingErrorKind::UpdateFailed, output.stderr));
            }
            return Ok(());
        }
        // `update` only bumps packages that keep the same dependency set; `dist-upgrade`
        // performs a full version-tracking upgrade (e.g. across a SUSE service pack). The two
        // are genuinely different operations in zypper, unlike apt/dnf where one flag covers both.
        let subcommand = if opts.force_refresh { "dist-upgrade" } else { "update" };
        let output = self.elevated(ctx, "zypper", &["--non-interactive", subcommand]);
        if !Self::zypper_ok(&output) {
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
        let output = self.executor.execute("zypper", &["search", query]);
        if !Self::zypper_ok(&output) {
            return Err(PackagingError::with_cause(PackagingErrorKind::UpdateFailed, output.stderr));
        }
        let mut pkgs = parse_zypper_search(&output.stdout);
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
        let output = self.executor.execute("zypper", &["info", name]);
        if !Self::zypper_ok(&output) || output.stdout.trim().is_empty() {
            return Err(PackagingError::new(PackagingErrorKind::PackageNotFound(name.to_string())));
        }
        let mut pkg = parse_zypper_info(&output.stdout).ok_or_else(|| {
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
        let output = self.executor.execute("zypper", &["list-updates"]);
        if !Self::zypper_ok(&output) {
            return Err(PackagingError::with_cause(PackagingErrorKind::UpdateFailed, output.stderr));
        }
        Ok(parse_zypper_list_updates(&output.stdout))
    }

    fn clean(&self, ctx: &AdapterContext) -> Result<(), PackagingError> {
        let output = self.elevated(ctx, "zypper", &["clean", "--all"]);
        if !Self::zypper_ok(&output) {
            return Err(PackagingError::with_cause(PackagingErrorKind::UpdateFailed, output.stderr));
        }
        Ok(())
    }

    fn auto_remove(&self, ctx: &AdapterContext) -> Result<(), PackagingError> {
        let output = self.elevated(ctx, "zypper", &["--non-interactive", "remove", "--clean-deps", "--unused"]);
        if !Self::zypper_ok(&output) {
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
        let path = format!("/etc/zypp/repos.d/{}.repo", repo.name);
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
        let output = self.elevated(ctx, "zypper", &["removerepo", name]);
        if !Self::zypper_ok(&output) {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::RepositoryNotFound(name.to_string()),
                output.stderr,
            ));
        }
        Ok(())
    }

    fn list_repositories(&self, _ctx: &AdapterContext) -> Result<Vec<Repository>, PackagingError> {
        let output = self.executor.execute("find", &["/etc/zypp/repos.d", "-name", "*.repo"]);
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
        let output = self.elevated(ctx, "zypper", &["modifyrepo", "--enable", name]);
        if !Self::zypper_ok(&output) {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::RepositoryNotFound(name.to_string()),
                output.stderr,
            ));
        }
        Ok(())
    }

    fn disable_repository(&self, ctx: &AdapterContext, name: &str) -> Result<(), PackagingError> {
        crate::security::reject_shell_metacharacters(name)?;
        let output = self.elevated(ctx, "zypper", &["modifyrepo", "--disable", name]);
        if !Self::zypper_ok(&output) {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::RepositoryNotFound(name.to_string()),
                output.stderr,
            ));
        }
        Ok(())
    }

    fn refresh_repositories(&self, ctx: &AdapterContext) -> Result<(), PackagingError> {
        self.update(ctx, &UpdateOptions::default())
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

/// Parses `zypper search <query>` output: a table with a leading status column (`i` / `i+` /
/// blank) and pipe-separated `Name | Summary | Type` columns.
pub fn parse_zypper_search(output: &str) -> Vec<Package> {
    let mut pkgs = Vec::new();
    for line in output.lines() {
        if !line.contains('|') || line.starts_with('-') || line.trim_start().starts_with("S ") {
            continue;
        }
        let cols: Vec<&str> = line.split('|').map(str::trim).collect();
        if cols.len() < 2 {
            continue;
        }
        // cols[0] is the status column, cols[1] is the name.
        let name = cols[1];
        if name.is_empty() || name == "Name" {
            continue;
        }
        let mut pkg = Package::new(name, "");
        if let Some(summary) = cols.get(2) {
            pkg.description = Some(summary.to_string());
        }
        pkg.installed = cols[0].contains('i');
        pkgs.push(pkg);
    }
    pkgs
}

/// Parses `zypper info <name>` key-value stanza output.
pub fn parse_zypper_info(output: &str) -> Option<Package> {
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
            "Arch" => architecture = Some(value.to_string()),
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

/// Parses `zypper list-updates` output: the same pipe-table shape as search but without the
/// leading status column.
pub fn parse_zypper_list_updates(output: &str) -> Vec<Package> {
    let mut pkgs = Vec::new();
    for line in output.lines() {
        if !line.contains('|') || line.starts_with('-') || line.trim_start().starts_with("S ") {
            continue;
        }
        let cols: Vec<&str> = line.split('|').map(str::trim).collect();
        if cols.len() < 4 {
            continue;
        }
        let name = cols[2];
        let version = cols[4.min(cols.len() - 1)];
        if name.is_empty() || name == "Name" {
            continue;
        }
        pkgs.push(Package::new(name, version));
    }
    pkgs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zypper_exit_101_is_success() {
        let output = crate::executor::CommandOutput {
            exit_code: 103,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(ZypperPackageManager::zypper_ok(&output));
        let failure = crate::executor::CommandOutput {
            exit_code: 1,
            stdout: String::new(),
            stderr: "Problem retrieving the repository index file".to_string(),
        };
        assert!(!ZypperPackageManager::zypper_ok(&failure));
    }

    #[test]
    fn classifies_package_not_found() {
        let err = ZypperPackageManager::classify_install_error(&["nonexistent"], "'nonexistent' not found");
        assert!(matches!(err.kind(), PackagingErrorKind::PackageNotFound(n) if n == "nonexistent"));
    }

    #[test]
    fn parses_zypper_search_table() {
        let output = "S  | Name   | Summary              | Type\n---+--------+----------------------+-----\ni  | nginx  | HTTP and reverse ... | package\n";
        let pkgs = parse_zypper_search(output);
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].name, "nginx");
        assert!(pkgs[0].installed);
    }
}
