use std::time::Duration;

/// Close code the server sends when the bearer token is rejected.
pub const CLOSE_CODE_AUTH_REJECTED: u16 = 4401;

/// "No status present" close code. Browsers produce it for benign
/// unmount-time closes, so it must not trigger a reconnect storm.
pub const CLOSE_CODE_NO_STATUS: u16 = 1005;

/// Exponential backoff delay for the given reconnect attempt:
/// `min(base * 2^attempt, cap)`.
pub fn reconnect_delay(attempt: u32, base_ms: u64, cap_ms: u64) -> Duration {
    let delay = std::cmp::min(base_ms.saturating_mul(2u64.saturating_pow(attempt)), cap_ms);
    Duration::from_millis(delay)
}

/// Decide whether a closed transport should be redialed.
///
/// `close_code` is the code carried by the peer's close frame; `None` means
/// the close frame had no status, which is treated the same as
/// [`CLOSE_CODE_NO_STATUS`].
pub fn should_reconnect(close_code: Option<u16>, teardown: bool) -> bool {
    if teardown {
        return false;
    }
    match close_code {
        None => false,
        Some(CLOSE_CODE_AUTH_REJECTED) | Some(CLOSE_CODE_NO_STATUS) => false,
        Some(_) => true,
    }
}
