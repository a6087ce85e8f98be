//! Pure input validators and sanitizers. No I/O, no state.
//!
//! Every public endpoint rejects malformed input through these before the
//! rate limiter or the store are touched, so malformed-input storms cannot
//! exhaust legitimate rate-limit budget.

use std::cmp::Ordering;

/// License key format: exactly XXXX-XXXX-XXXX-XXXX, uppercase alphanumeric.
pub fn is_valid_license_key(key: &str) -> bool {
    let blocks: Vec<&str> = key.split('-').collect();
    blocks.len() == 4
        && blocks.iter().all(|b| {
            b.len() == 4
                && b.bytes()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        })
}

/// Strip scheme, path, query, and port from a domain-ish input and lowercase
/// the host. Returns None when no syntactically valid hostname remains.
pub fn sanitize_domain(input: &str) -> Option<String> {
    let mut s = input.trim();

    for scheme in ["https://", "http://"] {
        if let Some(rest) = s.strip_prefix(scheme) {
            s = rest;
            break;
        }
    }

    // Host ends at the first path/query/fragment separator
    let end = s.find(['/', '?', '#']).unwrap_or(s.len());
    let mut host = &s[..end];

    if let Some(colon) = host.rfind(':')
        && host[colon + 1..].bytes().all(|c| c.is_ascii_digit())
    {
        host = &host[..colon];
    }

    let host = host.to_ascii_lowercase();
    if is_valid_hostname(&host) {
        Some(host)
    } else {
        None
    }
}

pub fn is_valid_domain(input: &str) -> bool {
    sanitize_domain(input).is_some()
}

/// Syntactic hostname check: dot-separated labels of alphanumerics and
/// hyphens, no label starting or ending with a hyphen, 253 chars max.
fn is_valid_hostname(host: &str) -> bool {
    if host.is_empty() || host.len() > 253 {
        return false;
    }

    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label
                .bytes()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == b'-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}

/// Plugin slug: lowercase alphanumerics and hyphens, 255 chars max.
pub fn is_valid_plugin_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 255
        && slug
            .bytes()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == b'-')
}

/// Version string: MAJOR.MINOR[.PATCH][-suffix], suffix case-insensitive
/// alphanumeric.
pub fn is_valid_version(version: &str) -> bool {
    Version::parse(version).is_some()
}

/// A parsed plugin version with semantic ordering. At equal numeric parts a
/// release sorts above any pre-release suffix; two suffixes compare
/// lexicographically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub suffix: Option<String>,
}

impl Version {
    pub fn parse(input: &str) -> Option<Self> {
        let (numbers, suffix) = match input.split_once('-') {
            Some((n, s)) => {
                if s.is_empty() || !s.bytes().all(|c| c.is_ascii_alphanumeric()) {
                    return None;
                }
                (n, Some(s.to_ascii_lowercase()))
            }
            None => (input, None),
        };

        let parts: Vec<&str> = numbers.split('.').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return None;
        }

        let mut nums = [0u64; 3];
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() || !part.bytes().all(|c| c.is_ascii_digit()) {
                return None;
            }
            nums[i] = part.parse().ok()?;
        }

        Some(Self {
            major: nums[0],
            minor: nums[1],
            patch: nums[2],
            suffix,
        })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.suffix, &other.suffix) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// True when `candidate` is strictly newer than `current`. Unparseable
/// versions never report an update.
pub fn is_newer_version(candidate: &str, current: &str) -> bool {
    match (Version::parse(candidate), Version::parse(current)) {
        (Some(c), Some(cur)) => c > cur,
        _ => false,
    }
}
