use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::procfs::used_percent;

/// Used percentage of the filesystem holding `path`, as reported by `statvfs(3)`.
///
/// Blocks reserved for root count as used. Returns 0 if the call fails.
pub fn disk_usage_percent(path: &Path) -> f64 {
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        log::debug!("disk path contains a NUL byte: {}", path.display());
        return 0.0;
    };

    // SAFETY: all-zero is a valid statvfs
    let mut stats: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: `c_path` is NUL-terminated and `stats` is a valid out pointer
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stats) };
    if rc != 0 {
        log::debug!(
            "statvfs({}) failed: {}",
            path.display(),
            std::io::Error::last_os_error()
        );
        return 0.0;
    }

    let frsize = stats.f_frsize as f64;
    let total = stats.f_blocks as f64 * frsize;
    let available = stats.f_bavail as f64 * frsize;
    used_percent(total, available)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_filesystem_is_in_range() {
        let usage = disk_usage_percent(Path::new("/"));
        assert!((0.0..=100.0).contains(&usage));
    }

    #[test]
    fn test_missing_path_is_zero() {
        assert_eq!(disk_usage_percent(Path::new("/definitely/does/not/exist")), 0.0);
    }
}
