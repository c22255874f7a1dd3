//! Host-specific helpers: privilege detection, file modes, host identity.

use crate::Result;
use std::path::Path;

/// Whether nmap may use raw sockets (SYN scan) from this process
pub fn has_admin_privileges() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }

    #[cfg(not(unix))]
    {
        false
    }
}

/// Mode 0644, so a report written as root stays readable by the invoking user
pub fn set_world_readable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))?;
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }

    Ok(())
}

/// Name of the machine running the scan, recorded in the run summary
pub fn scanning_host() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Add the usual remedy to OS errors users hit most often
pub fn platform_error_message(error: &str) -> String {
    #[cfg(unix)]
    {
        if error.contains("Permission denied") {
            return format!("{} (try running with sudo or check file permissions)", error);
        }
        if error.contains("Name or service not known") {
            return format!("{} (cannot resolve host name, check DNS or /etc/hosts)", error);
        }
    }

    error.to_string()
}
