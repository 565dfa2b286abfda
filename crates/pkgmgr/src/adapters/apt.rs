use std::sync::Arc;

use crate::{
    classify::{looks_like_lock_failure, looks_like_network_failure},
    context::AdapterContext,
    error::{PackagingError, PackagingErrorKind},
    executor::ShellExecutor,
    manager::PackageManager,
    privilege::PrivilegeManager,
    repo_format::{parse_deb_entry, render_deb_entry},
    security::validate_repository_inputs,
    types::{InstallOptions, Package, RemoveOptions, Repository, SearchOptions, UpdateOptions},
    Family,
};

/// Adapter for Debian/Ubuntu-style systems (`apt`, `dpkg`).
pub struct AptPackageManager {
    executor: Arc<dyn ShellExecutor>,
    privilege: Arc<dyn PrivilegeManager>,
}

impl AptPackageManager {
    pub fn new(executor: Arc<dyn ShellExecutor>, privilege: Arc<dyn PrivilegeManager>) -> Self {
        AptPackageManager { executor, privilege }
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
        if stderr.contains("Unable to locate package") {
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
        if stderr.contains("is not installed") {
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

    fn classify_update_error(stderr: &str) -> PackagingError {
        if looks_like_network_failure(stderr) {
            return PackagingError::with_cause(PackagingErrorKind::NetworkUnavailable, stderr.to_string());
        }
        if looks_like_lock_failure(stderr) {
            return PackagingError::with_cause(PackagingErrorKind::LockAcquireFailed, stderr.to_string());
        }
        PackagingError::with_cause(PackagingErrorKind::UpdateFailed, stderr.to_string())
    }
}

impl PackageManager for AptPackageManager {
    fn name(&self) -> &'static str {
        "apt"
    }

    fn family(&self) -> Family {
        Family::Debian
    }

    fn is_available(&self) -> bool {
        crate::executor::on_path("apt-get")
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
            args.push("--reinstall");
        }
        if opts.download_only {
            args.push("--download-only");
        }
        if opts.allow_downgrade {
            args.push("--allow-downgrades");
        }
        args.extend(pkgs.iter().copied());

        let output = self.elevated(ctx, "apt-get", &args);
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

        let subcommand = if opts.purge { "purge" } else { "remove" };
        let mut args: Vec<&str> = vec![subcommand];
        if opts.no_confirm {
            args.push("-y");
        }
        args.extend(pkgs.iter().copied());

        let output = self.elevated(ctx, "apt-get", &args);
        if output.failed() {
            return Err(Self::classify_remove_error(pkgs, &output.stderr));
        }
        if opts.auto_remove {
            self.auto_remove(ctx)?;
        }
        Ok(())
    }

    fn update(&self, ctx: &AdapterContext, _opts: &UpdateOptions) -> Result<(), PackagingError> {
        let output = self.elevated(ctx, "apt-get", &["update"]);
        if output.failed() {
            return Err(Self::classify_update_error(&output.stderr));
        }
        Ok(())
    }

    fn upgrade(&self, ctx: &AdapterContext, _opts: &UpdateOptions, pkgs: &[&str]) -> Result<(), PackagingError> {
        for pkg in pkgs {
            crate::security::reject_shell_metacharacters(pkg)?;
        }
        let mut args: Vec<&str> = if pkgs.is_empty() {
            vec!["upgrade", "-y"]
        } else {
            let mut a = vec!["install", "-y", "--only-upgrade"];
            a.extend(pkgs.iter().copied());
            a
        };
        if args.is_empty() {
            args.push("-y");
        }
        let output = self.elevated(ctx, "apt-get", &args);
        if output.failed() {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::UpdateFailed,
                output.stderr,
            ));
        }
        Ok(())
    }

    fn is_installed(&self, _ctx: &AdapterContext, name: &str) -> Result<bool, PackagingError> {
        crate::security::reject_shell_metacharacters(name)?;
        let output = self.executor.execute("dpkg-query", &["-W", "-f=${Status}", name]);
        Ok(output.success() && output.stdout.contains("install ok installed"))
    }

    fn search(&self, _ctx: &AdapterContext, query: &str, opts: &SearchOptions) -> Result<Vec<Package>, PackagingError> {
        crate::security::reject_shell_metacharacters(query)?;
        let output = self.executor.execute("apt-cache", &["search", query]);
        if output.failed() {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::UpdateFailed,
                output.stderr,
            ));
        }
        let mut pkgs = parse_apt_cache_search(&output.stdout);
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
        let output = self.executor.execute("apt-cache", &["show", name]);
        if output.failed() || output.stdout.trim().is_empty() {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::PackageNotFound(name.to_string()),
                output.stderr,
            ));
        }
        let mut pkg = parse_apt_cache_show(&output.stdout).ok_or_else(|| {
            PackagingError::new(PackagingErrorKind::PackageNotFound(name.to_string()))
        })?;
        pkg.installed = self.is_installed(ctx, name)?;
        Ok(pkg)
    }

    fn list_installed(&self, _ctx: &AdapterContext) -> Result<Vec<Package>, PackagingError> {
        let output = self.executor.execute(
            "dpkg-query",
            &["-W", "-f=${Package}\t${Version}\t${Architecture}\t${Status}\n"],
        );
        if output.failed() {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::UpdateFailed,
                output.stderr,
            ));
        }
        Ok(parse_dpkg_query_list(&output.stdout))
    }

    fn list_upgradable(&self, _ctx: &AdapterContext) -> Result<Vec<Package>, PackagingError> {
        let output = self.executor.execute("apt", &["list", "--upgradable"]);
        if output.failed() {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::UpdateFailed,
                output.stderr,
            ));
        }
        Ok(parse_apt_list_upgradable(&output.stdout))
    }

    fn clean(&self, ctx: &AdapterContext) -> Result<(), PackagingError> {
        let output = self.elevated(ctx, "apt-get", &["clean"]);
        if output.failed() {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::UpdateFailed,
                output.stderr,
            ));
        }
        Ok(())
    }

    fn auto_remove(&self, ctx: &AdapterContext) -> Result<(), PackagingError> {
        let output = self.elevated(ctx, "apt-get", &["autoremove", "-y"]);
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
        let output = self.executor.execute("dpkg", &["--verify", name]);
        Ok(output.success())
    }

    fn add_repository(&self, ctx: &AdapterContext, repo: &Repository) -> Result<(), PackagingError> {
        validate_repository_inputs(&repo.name, &repo.url)?;
        let contents = render_deb_entry(repo);
        let path = format!("/etc/apt/sources.list.d/{}.list", repo.name);
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
        let path = format!("/etc/apt/sources.list.d/{name}.list");
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
        let output = self.executor.execute("find", &["/etc/apt/sources.list.d", "-name", "*.list"]);
        let mut repos = Vec::new();
        for path in output.stdout.lines() {
            let contents = self.executor.execute("cat", &[path]);
            if let Some(name) = path.rsplit('/').next().and_then(|f| f.strip_suffix(".list")) {
                if let Some(repo) = parse_deb_entry(contents.stdout.lines().next().unwrap_or(""), name) {
                    repos.push(repo);
                }
            }
        }
        Ok(repos)
    }

    fn enable_repository(&self, _ctx: &AdapterContext, name: &str) -> Result<(), PackagingError> {
        crate::security::reject_shell_metacharacters(name)?;
        Ok(())
    }

    fn disable_repository(&self, _ctx: &AdapterContext, name: &str) -> Result<(), PackagingError> {
        crate::security::reject_shell_metacharacters(name)?;
        Ok(())
    }

    fn refresh_repositories(&self, ctx: &AdapterContext) -> Result<(), PackagingError> {
        self.update(ctx, &UpdateOptions::default())
    }

    fn import_gpg_key(&self, ctx: &AdapterContext, key_url_or_path: &str) -> Result<(), PackagingError> {
        crate::security::reject_shell_metacharacters(key_url_or_path)?;
        let output = self.elevated(
            ctx,
            "gpg",
            &["--dearmor", "-o", "/etc/apt/keyrings/imported.gpg", key_url_or_path],
        );
        if output.failed() {
            return Err(PackagingError::with_cause(
                PackagingErrorKind::InstallFailed("gpg key".to_string()),
                output.stderr,
            ));
        }
        Ok(())
    }
}

/// Parses `dpkg-query -W -f='${Package}\t${Version}\t${Architecture}\t${Status}\n'` output.
/// Total, Unicode-tolerant, deduplicates by first occurrence, skips short/malformed lines.
pub fn parse_dpkg_query_list(output: &str) -> Vec<Package> {
    let mut seen = std::collections::HashSet::new();
    let mut pkgs = Vec::new();
    for line in output.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 4 {
            continue;
        }
        let name = fields[0].trim();
        if name.is_empty() || !seen.insert(name.to_string()) {
            continue;
        }
        pkgs.push(Package {
            name: name.to_string(),
            version: fields[1].trim().to_string(),
            installed: fields[3].contains("installed"),
            repository: None,
            description: None,
            size: 0,
            architecture: Some(fields[2].trim().to_string()),
            dependencies: Vec::new(),
        });
    }
    pkgs
}

/// Parses `apt-cache search <query>` output: `name - description` per line.
pub fn parse_apt_cache_search(output: &str) -> Vec<Package> {
    let mut pkgs = Vec::new();
    for line in output.lines() {
        let Some((name, desc)) = line.split_once(" - ") else {
            continue;
        };
        if name.trim().is_empty() {
            continue;
        }
        let mut pkg = Package::new(name.trim(), "");
        pkg.description = Some(desc.trim().to_string());
        pkgs.push(pkg);
    }
    pkgs
}

/// Parses `apt-cache show <name>` stanza output, taking the first stanza (the installed
/// candidate is always first in apt's output).
pub fn parse_apt_cache_show(output: &str) -> Option<Package> {
    let mut name = None;
    let mut version = None;
    let mut architecture = None;
    let mut size = 0i64;
    let mut description = None;

    for line in output.lines() {
        if line.is_empty() && name.is_some() {
            break;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Package" => name = Some(value.to_string()),
            "Version" => version = Some(value.to_string()),
            "Architecture" => architecture = Some(value.to_string()),
            "Size" => size = value.parse().unwrap_or(0),
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
        size,
        architecture,
        dependencies: Vec::new(),
    })
}

/// Parses `apt list --upgradable` output, skipping the "Listing..." header line.
pub fn parse_apt_list_upgradable(output: &str) -> Vec<Package> {
    let mut pkgs = Vec::new();
    for line in output.lines() {
        if line.starts_with("Listing") || line.trim().is_empty() {
            continue;
        }
        let Some((name_arch, rest)) = line.split_once('/') else {
            continue;
        };
        let Some(version) = rest.split_whitespace().nth(1) else {
            continue;
        };
        pkgs.push(Package::new(name_arch.trim(), version));
    }
    pkgs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_package_not_found() {
        let err = AptPackageManager::classify_install_error(
            &["nonexistent"],
            "E: Unable to locate package nonexistent",
        );
        assert!(matches!(err.kind(), PackagingErrorKind::PackageNotFound(n) if n == "nonexistent"));
    }

    #[test]
    fn classifies_lock_failure() {
        let err = AptPackageManager::classify_install_error(
            &["nginx"],
            "E: Could not get lock /var/lib/dpkg/lock-frontend. It is held by process 1234",
        );
        assert!(matches!(err.kind(), PackagingErrorKind::LockAcquireFailed));
    }

    #[test]
    fn classifies_network_failure_on_update() {
        let err = AptPackageManager::classify_update_error(
            "E: Failed to fetch http://archive.ubuntu.com/ubuntu/dists/jammy/InRelease",
        );
        assert!(matches!(err.kind(), PackagingErrorKind::NetworkUnavailable));
    }

    #[test]
    fn parses_dpkg_query_list_dedup_and_skip_short() {
        let output = "nginx\t1.18.0\tamd64\tinstall ok installed\nnginx\t1.18.0\tamd64\tinstall ok installed\nbroken-line\n";
        let pkgs = parse_dpkg_query_list(output);
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].name, "nginx");
    }

    #[test]
    fn parses_apt_cache_search() {
        let output = "nginx - small, powerful, scalable web/proxy server\nvim - Vi IMproved\n";
        let pkgs = parse_apt_cache_search(output);
        assert_eq!(pkgs.len(), 2);
        assert_eq!(pkgs[0].name, "nginx");
    }
}
