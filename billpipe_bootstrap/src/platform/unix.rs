// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Unix Platform Implementation
//!
//! POSIX implementation covering Linux and macOS via `libc`.
//!
//! ## POSIX APIs Used
//!
//! - `sysconf(_SC_PAGESIZE)` / `sysconf(_SC_NPROCESSORS_ONLN)` - page size and CPU count
//! - `/proc/meminfo` - total/available memory (falls back to `NotSupported` where absent, e.g. macOS)
//! - `geteuid` - privilege checking
//! - `std::os::unix::fs::PermissionsExt` - permission bits
//! - File APIs via tokio (cross-platform)

use super::{Platform, PlatformError};
use async_trait::async_trait;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Unix platform implementation
pub struct UnixPlatform;

impl UnixPlatform {
    pub fn new() -> Self {
        Self
    }

    fn get_page_size_impl() -> usize {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as usize
        } else {
            4096
        }
    }

    fn get_cpu_count_impl() -> usize {
        let count = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
        if count > 0 {
            count as usize
        } else {
            1
        }
    }

    /// Reads `MemTotal`/`MemAvailable` (in kB) out of `/proc/meminfo`. Not
    /// present on macOS, where callers get `NotSupported` instead.
    fn get_memory_info_impl() -> Result<(u64, u64), PlatformError> {
        let contents = std::fs::read_to_string("/proc/meminfo")
            .map_err(|_| PlatformError::NotSupported("/proc/meminfo not available on this platform".to_string()))?;

        let mut total_kb = None;
        let mut available_kb = None;
        for line in contents.lines() {
            if let Some(rest) = line.strip_prefix("MemTotal:") {
                total_kb = rest.trim().strip_suffix(" kB").and_then(|v| v.trim().parse::<u64>().ok());
            } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
                available_kb = rest.trim().strip_suffix(" kB").and_then(|v| v.trim().parse::<u64>().ok());
            }
        }

        match (total_kb, available_kb) {
            (Some(total), Some(available)) => Ok((total * 1024, available * 1024)),
            _ => Err(PlatformError::Other("could not parse /proc/meminfo".to_string())),
        }
    }

    fn is_elevated_impl() -> bool {
        unsafe { libc::geteuid() == 0 }
    }
}

impl Default for UnixPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Platform for UnixPlatform {
    fn page_size(&self) -> usize {
        Self::get_page_size_impl()
    }

    fn cpu_count(&self) -> usize {
        Self::get_cpu_count_impl()
    }

    fn total_memory(&self) -> Result<u64, PlatformError> {
        Self::get_memory_info_impl().map(|(total, _)| total)
    }

    fn available_memory(&self) -> Result<u64, PlatformError> {
        Self::get_memory_info_impl().map(|(_, available)| available)
    }

    fn line_separator(&self) -> &'static str {
        "\n"
    }

    fn path_separator(&self) -> char {
        ':'
    }

    fn platform_name(&self) -> &'static str {
        "unix"
    }

    fn temp_dir(&self) -> PathBuf {
        std::env::temp_dir()
    }

    fn is_elevated(&self) -> bool {
        Self::is_elevated_impl()
    }

    fn set_permissions(&self, path: &Path, mode: u32) -> Result<(), PlatformError> {
        let permissions = std::fs::Permissions::from_mode(mode);
        std::fs::set_permissions(path, permissions)?;
        Ok(())
    }

    fn is_executable(&self, path: &Path) -> bool {
        std::fs::metadata(path)
            .map(|meta| meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    async fn sync_file(&self, file: &tokio::fs::File) -> Result<(), PlatformError> {
        file.sync_all().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_platform_basics() {
        let platform = UnixPlatform::new();

        assert!(platform.cpu_count() >= 1);

        let page_size = platform.page_size();
        assert!(page_size >= 512);
        assert!(page_size <= 65536);
    }

    #[test]
    fn test_unix_platform_constants() {
        let platform = UnixPlatform::new();

        assert_eq!(platform.line_separator(), "\n");
        assert_eq!(platform.path_separator(), ':');
        assert_eq!(platform.platform_name(), "unix");
    }

    #[test]
    fn test_is_elevated_matches_euid() {
        let platform = UnixPlatform::new();
        assert_eq!(platform.is_elevated(), unsafe { libc::geteuid() == 0 });
    }

    #[test]
    fn test_temp_dir() {
        let platform = UnixPlatform::new();
        let temp = platform.temp_dir();
        assert!(!temp.as_os_str().is_empty());
    }
}
