//! Small formatting helpers shared by the log line builders.

use bytesize::ByteSize;

/// Strips a trailing `:port` from a remote address, keeping only the host
/// portion. The split happens at the last colon, so bracketed IPv6 forms like
/// `[::1]:8080` lose only the port. An address with no colon is returned
/// unchanged.
pub(crate) fn strip_port(addr: &str) -> &str {
    match addr.rfind(':') {
        Some(colon) => &addr[..colon],
        None => addr,
    }
}

/// Formats a byte count in a compact human-readable unit.
///
/// `bytesize` puts a space between the number and the unit ("6 B"), which
/// makes the log lines a little harder on the eyes when scanning, so the
/// space is removed ("6B").
pub(crate) fn human_bytes(bytes: u64) -> String {
    ByteSize(bytes).to_string().replacen(' ', "", 1)
}
