//! One module per packaging ecosystem. Each adapter implements `manager::PackageManager`
//! against a native CLI tool, entirely through the injected `ShellExecutor`/`PrivilegeManager`.

pub mod apt;
pub mod pacman;
pub mod yum;
pub mod zypper;
