use std::sync::OnceLock;

/// Below this the kernel will start dropping connection attempts
/// under even moderate accept pressure.
const MIN_SAFE_ACCEPT_QUEUE_SIZE: i32 = 100;

/// Returns the kernel's maximum listen backlog.
///
/// Read once from /proc and cached for the process lifetime; the
/// read is idempotent, so racing first callers simply compute the
/// same value. Always positive.
pub fn max_accept_queue_size() -> i32 {
    static SIZE: OnceLock<i32> = OnceLock::new();
    *SIZE.get_or_init(init_max_accept_queue_size)
}

fn init_max_accept_queue_size() -> i32 {
    let mut size = libc::SOMAXCONN;
    // Kernels without the proc entry keep the platform default.
    if let Ok(contents) = std::fs::read_to_string("/proc/sys/net/core/somaxconn") {
        if let Ok(parsed) = contents.trim().parse::<i64>() {
            if parsed > 0 && parsed <= i32::MAX as i64 {
                size = parsed as i32;
            }
        }
    }
    if size < MIN_SAFE_ACCEPT_QUEUE_SIZE {
        tracing::warn!(
            "suspiciously small accept queue ({}) will probably lead to connection drops",
            size
        );
    }
    size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backlog_is_positive() {
        assert!(max_accept_queue_size() > 0);
    }

    #[test]
    fn backlog_is_stable_across_calls() {
        assert_eq!(max_accept_queue_size(), max_accept_queue_size());
    }
}
