//! The fixed color palette and the two log line formats.
//!
//! Every semantic role in a log line (direction arrow, method, URI, address,
//! byte count, duration, and one color per status band) gets exactly one
//! color, as an xterm-256 foreground escape fragment. A [`Palette`] is built
//! once, when the layer is constructed, and never changes afterwards; the
//! plain variant carries empty strings for every role, so the textual content
//! of a line is byte-identical with and without color.

use std::io::IsTerminal;
use std::time::Duration;

use axum::http::{Method, StatusCode, Uri};

use crate::capture::Capture;
use crate::format::human_bytes;

const RESET: &str = "\x1b[0m";

// Foreground escapes, "\x1b[38;5;<n>m".
const VIOLET: &str = "\x1b[38;5;62m";
const RED: &str = "\x1b[38;5;204m";
const YELLOW: &str = "\x1b[38;5;192m";
const GREEN: &str = "\x1b[38;5;48m";
const CYAN: &str = "\x1b[38;5;86m";
const DARK_GREY: &str = "\x1b[38;5;240m";
const GREY: &str = "\x1b[38;5;250m";

/// One color per semantic role in the request and response lines.
///
/// Immutable once built. Construct with [`Palette::detect`] to pick colors
/// based on whether stdout is an interactive terminal, or force a variant
/// with [`Palette::colored`] / [`Palette::plain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    arrow: &'static str,
    method: &'static str,
    uri: &'static str,
    address: &'static str,
    bytes: &'static str,
    duration: &'static str,
    success: &'static str,
    redirect: &'static str,
    client_error: &'static str,
    server_error: &'static str,
    reset: &'static str,
}

impl Palette {
    /// The full color palette.
    pub fn colored() -> Self {
        Self {
            arrow: DARK_GREY,
            method: VIOLET,
            uri: GREY,
            address: DARK_GREY,
            bytes: GREY,
            duration: DARK_GREY,
            success: GREEN,
            redirect: YELLOW,
            client_error: CYAN,
            server_error: RED,
            reset: RESET,
        }
    }

    /// A palette where every escape sequence is the empty string, for
    /// non-terminal output.
    pub fn plain() -> Self {
        Self {
            arrow: "",
            method: "",
            uri: "",
            address: "",
            bytes: "",
            duration: "",
            success: "",
            redirect: "",
            client_error: "",
            server_error: "",
            reset: "",
        }
    }

    /// Colored when stdout is an interactive terminal, plain otherwise.
    pub fn detect() -> Self {
        if std::io::stdout().is_terminal() {
            Self::colored()
        } else {
            Self::plain()
        }
    }

    /// Status bands: 1xx/2xx success, 3xx redirect, 4xx client error,
    /// everything else server error.
    fn status_color(&self, status: StatusCode) -> &'static str {
        match status.as_u16() {
            s if s < 300 => self.success,
            s if s < 400 => self.redirect,
            s if s < 500 => self.client_error,
            _ => self.server_error,
        }
    }

    /// The line logged when a request arrives, before the inner service runs.
    pub(crate) fn request_line(&self, method: &Method, uri: &Uri, addr: &str) -> String {
        format!(
            "{}<- {}{} {}{} {}{}{}",
            self.arrow, self.method, method, self.uri, uri, self.address, addr, self.reset
        )
    }

    /// The line logged once the response has been sent.
    pub(crate) fn response_line(&self, capture: &Capture, elapsed: Duration) -> String {
        let status = capture.status();
        let status_text = match status.canonical_reason() {
            Some(reason) => format!("{} {}", status.as_u16(), reason),
            None => status.as_u16().to_string(),
        };
        format!(
            "{}-> {}{} {}{} {}{:?}{}",
            self.arrow,
            self.status_color(status),
            status_text,
            self.bytes,
            human_bytes(capture.bytes()),
            self.duration,
            elapsed,
            self.reset
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_ansi(s: &str) -> String {
        let mut out = String::new();
        let mut rest = s;
        while let Some(start) = rest.find('\x1b') {
            out.push_str(&rest[..start]);
            match rest[start..].find('m') {
                Some(end) => rest = &rest[start + end + 1..],
                None => return out,
            }
        }
        out.push_str(rest);
        out
    }

    fn status(code: u16) -> StatusCode {
        StatusCode::from_u16(code).unwrap()
    }

    #[test]
    fn status_bands_map_to_one_color_each() {
        let palette = Palette::colored();
        assert_eq!(palette.status_color(status(204)), GREEN);
        assert_eq!(palette.status_color(status(301)), YELLOW);
        assert_eq!(palette.status_color(status(404)), CYAN);
        assert_eq!(palette.status_color(status(503)), RED);
    }

    #[test]
    fn status_band_boundaries() {
        let palette = Palette::colored();
        assert_eq!(palette.status_color(status(299)), GREEN);
        assert_eq!(palette.status_color(status(300)), YELLOW);
        assert_eq!(palette.status_color(status(399)), YELLOW);
        assert_eq!(palette.status_color(status(400)), CYAN);
        assert_eq!(palette.status_color(status(499)), CYAN);
        assert_eq!(palette.status_color(status(500)), RED);
    }

    #[test]
    fn plain_request_line_has_no_escape_sequences() {
        let line = Palette::plain().request_line(&Method::GET, &Uri::from_static("/"), "127.0.0.1");
        assert_eq!(line, "<- GET / 127.0.0.1");
        assert!(!line.contains('\x1b'));
    }

    #[test]
    fn colored_lines_match_plain_lines_once_stripped() {
        let method = Method::POST;
        let uri = Uri::from_static("/meow?left=right");
        let colored = Palette::colored().request_line(&method, &uri, "10.0.0.5");
        let plain = Palette::plain().request_line(&method, &uri, "10.0.0.5");
        assert!(colored.contains('\x1b'));
        assert_eq!(strip_ansi(&colored), plain);

        let mut capture = Capture::new();
        capture.set_status(StatusCode::NOT_FOUND);
        capture.record_write(13);
        let elapsed = Duration::from_micros(250);
        let colored = Palette::colored().response_line(&capture, elapsed);
        let plain = Palette::plain().response_line(&capture, elapsed);
        assert_eq!(strip_ansi(&colored), plain);
    }

    #[test]
    fn response_line_defaults_to_200_ok() {
        let mut capture = Capture::new();
        capture.record_write(6);
        let line = Palette::plain().response_line(&capture, Duration::from_millis(5));
        assert_eq!(line, "-> 200 OK 6B 5ms");
    }

    #[test]
    fn response_line_for_redirect_with_empty_body() {
        let mut capture = Capture::new();
        capture.set_status(StatusCode::TEMPORARY_REDIRECT);
        let line = Palette::plain().response_line(&capture, Duration::from_millis(1));
        assert_eq!(line, "-> 307 Temporary Redirect 0B 1ms");
    }

    #[test]
    fn response_line_omits_reason_for_unknown_status() {
        let mut capture = Capture::new();
        capture.set_status(status(599));
        let line = Palette::plain().response_line(&capture, Duration::from_millis(1));
        assert_eq!(line, "-> 599 0B 1ms");
    }
}
