//! Server line parsing.
//!
//! Raw listings mix three line shapes. Each line is tried against an ordered
//! list of matchers; the first one that matches structurally *and* passes
//! validation wins. The prefixed form comes first so that `C: host port ...`
//! is never read as a bare whitespace-separated line.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

pub const MIN_PORT: u32 = 1000;
pub const MAX_PORT: u32 = 65535;

/// Hosts containing any of these (case-insensitive) are placeholders.
const PLACEHOLDER_HOSTS: &[&str] = &["example", "test", "dummy"];

/// A validated server entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerRecord {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl fmt::Display for ServerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "C: {} {} {} {}",
            self.host, self.port, self.user, self.password
        )
    }
}

struct Matcher {
    name: &'static str,
    pattern: Regex,
}

#[allow(clippy::expect_used)]
fn matchers() -> &'static [Matcher] {
    static MATCHERS: OnceLock<Vec<Matcher>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        [
            (
                "prefixed",
                r"^(?:C:|c:)?\s*(\S+)[:\s]+([0-9]{2,5})\s+(\S+)\s+(\S+)",
            ),
            ("colon", r"^([^\s:]+):([0-9]{2,5})\s+(\S+)\s+(\S+)"),
            ("plain", r"^(\S+)\s+([0-9]{2,5})\s+(\S+)\s+(\S+)"),
        ]
        .into_iter()
        .map(|(name, pattern)| Matcher {
            name,
            pattern: Regex::new(pattern).expect("server line pattern is valid"),
        })
        .collect()
    })
}

/// Parse one comment-stripped, trimmed line.
pub fn parse_line(line: &str) -> Option<ServerRecord> {
    for matcher in matchers() {
        let Some(caps) = matcher.pattern.captures(line) else {
            continue;
        };
        let (host, port, user, password) = (&caps[1], &caps[2], &caps[3], &caps[4]);
        if let Some(port) = validate(host, port) {
            log::trace!("line matched {} form", matcher.name);
            return Some(ServerRecord {
                host: host.to_string(),
                port,
                user: user.to_string(),
                password: password.to_string(),
            });
        }
    }
    None
}

fn validate(host: &str, port: &str) -> Option<u16> {
    if host.is_empty() || port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let port: u32 = port.parse().ok()?;
    if !(MIN_PORT..=MAX_PORT).contains(&port) {
        return None;
    }
    let host = host.to_lowercase();
    if PLACEHOLDER_HOSTS.iter().any(|p| host.contains(p)) {
        return None;
    }
    u16::try_from(port).ok()
}

/// Strip a trailing `# comment` and surrounding whitespace.
pub fn strip_comment(line: &str) -> &str {
    line.split('#').next().unwrap_or("").trim()
}

/// Parse a whole listing body, keeping accepted records in line order.
pub fn parse_body(text: &str) -> Vec<ServerRecord> {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    text.split('\n')
        .map(strip_comment)
        .filter(|line| !line.is_empty())
        .filter_map(parse_line)
        .collect()
}
