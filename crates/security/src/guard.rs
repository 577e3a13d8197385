//! Tool guard — deterministic checks applied to every tool call before
//! the dual-agent review.
//!
//! Three surfaces: URLs (private ranges and `file:`), file paths
//! (protected prefixes, sensitive basenames, traversal depth), and
//! terminal commands (precompiled denied-pattern set).

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use regex::RegexSet;

use orion_domain::config::GuardConfig;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Verdict
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardVerdict {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl GuardVerdict {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolGuard
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ToolGuard {
    protected_prefixes: Vec<String>,
    sensitive_basenames: Vec<String>,
    max_traversal_depth: usize,
    denied_commands: RegexSet,
}

impl ToolGuard {
    pub fn new(cfg: &GuardConfig) -> Self {
        let denied_commands = RegexSet::new(&cfg.denied_commands).unwrap_or_else(|e| {
            tracing::error!(error = %e, "invalid denied-command pattern, using builtin defaults");
            RegexSet::new(GuardConfig::default().denied_commands)
                .unwrap_or_else(|e| panic!("builtin denied-command patterns invalid: {e}"))
        });
        Self {
            protected_prefixes: cfg.protected_prefixes.clone(),
            sensitive_basenames: cfg.sensitive_basenames.clone(),
            max_traversal_depth: cfg.max_traversal_depth,
            denied_commands,
        }
    }

    // ── URL guard ──────────────────────────────────────────────────

    /// Deny `file:` URLs and anything that resolves into a private or
    /// loopback range by hostname/IP literal. The check runs before any
    /// network activity.
    pub fn check_url(&self, url: &str) -> GuardVerdict {
        let trimmed = url.trim();
        let lower = trimmed.to_ascii_lowercase();

        if lower.starts_with("file:") {
            return GuardVerdict::deny("file: URLs are not allowed");
        }
        let without_scheme = match lower.split_once("://") {
            Some((scheme, rest)) => {
                if scheme != "http" && scheme != "https" {
                    return GuardVerdict::deny(format!("scheme '{scheme}' is not allowed"));
                }
                rest
            }
            None => lower.as_str(),
        };

        let host_port = without_scheme
            .split(['/', '?', '#'])
            .next()
            .unwrap_or(without_scheme);
        let host = strip_port(host_port);

        if host.is_empty() {
            return GuardVerdict::deny("URL has no host");
        }
        if host == "localhost" || host.ends_with(".localhost") || host.ends_with(".local")
            || host.ends_with(".internal")
        {
            return GuardVerdict::deny(format!("host '{host}' is private"));
        }
        if let Ok(ip) = host.trim_matches(['[', ']']).parse::<IpAddr>() {
            if is_private_ip(&ip) {
                return GuardVerdict::deny(format!("IP '{ip}' is in a private range"));
            }
        }

        GuardVerdict::allow()
    }

    // ── Path guard ─────────────────────────────────────────────────

    pub fn check_path(&self, path: &str) -> GuardVerdict {
        let traversals = path.split(['/', '\\']).filter(|seg| *seg == "..").count();
        if traversals > self.max_traversal_depth {
            return GuardVerdict::deny(format!(
                "path exceeds traversal depth {} ({} '..' segments)",
                self.max_traversal_depth, traversals
            ));
        }

        for prefix in &self.protected_prefixes {
            if path.starts_with(prefix.as_str()) {
                return GuardVerdict::deny(format!("path is under protected prefix '{prefix}'"));
            }
        }

        if let Some(basename) = Path::new(path).file_name().and_then(|n| n.to_str()) {
            for sensitive in &self.sensitive_basenames {
                if basename.eq_ignore_ascii_case(sensitive) {
                    return GuardVerdict::deny(format!("'{basename}' is a sensitive file"));
                }
            }
        }

        GuardVerdict::allow()
    }

    // ── Command guard ──────────────────────────────────────────────

    pub fn check_command(&self, command: &str) -> GuardVerdict {
        if self.denied_commands.is_match(command) {
            return GuardVerdict::deny("command matches a denied pattern");
        }
        GuardVerdict::allow()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn strip_port(host_port: &str) -> &str {
    // IPv6 literal in brackets keeps its colons.
    if let Some(end) = host_port.strip_prefix('[').and_then(|rest| rest.find(']')) {
        return &host_port[1..=end];
    }
    host_port.split(':').next().unwrap_or(host_port)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || is_cgnat(v4)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback() || v6.is_unspecified() || is_unique_local(v6) || is_link_local_v6(v6)
        }
    }
}

/// 100.64.0.0/10 (carrier-grade NAT).
fn is_cgnat(ip: &Ipv4Addr) -> bool {
    let octets = ip.octets();
    octets[0] == 100 && (64..=127).contains(&octets[1])
}

/// fc00::/7.
fn is_unique_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

/// fe80::/10.
fn is_link_local_v6(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}
