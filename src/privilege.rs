//! Privilege check for the continuously-running mode

use crate::error::RenewError;

/// Whether the process runs with an effective uid of 0
#[cfg(unix)]
pub fn is_elevated() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_elevated() -> bool {
    false
}

/// Fail with `Permission` unless the process runs as root
pub fn ensure_elevated() -> Result<(), RenewError> {
    if is_elevated() {
        return Ok(());
    }
    Err(RenewError::Permission(format!(
        "continuous renewal requires root privileges (running as {})",
        current_user()
    )))
}

/// Best-effort name of the user running this process, for logs
pub fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| {
            #[cfg(unix)]
            {
                format!("uid {}", unsafe { libc::geteuid() })
            }
            #[cfg(not(unix))]
            {
                "unknown".to_string()
            }
        })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_elevated_matches_euid() {
        let result = ensure_elevated();
        if unsafe { libc::geteuid() } == 0 {
            assert!(result.is_ok());
        } else {
            assert!(matches!(result, Err(RenewError::Permission(_))));
        }
    }

    #[test]
    fn test_current_user_not_empty() {
        assert!(!current_user().is_empty());
    }
}
