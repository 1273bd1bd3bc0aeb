//! Source capability descriptors and the version-banner pagination gate
//!
//! The export engine never hard-codes dialect knowledge: each row source
//! reports a [`SourceCapabilities`] descriptor and the coordinator degrades
//! the concurrency plan from it. The version-banner helper below exists for
//! server families (SQL Server being the known case) whose old releases
//! cannot execute OFFSET pagination reliably.

use crate::error::SourceError;
use regex::Regex;
use std::sync::LazyLock;

/// Highest major version known to mis-execute offset/limit pagination.
/// SQL Server 2008 reports major version 10; 2012 (11.x) introduced
/// OFFSET ... FETCH and is the first release safe to shard against.
pub const BROKEN_PAGINATION_MAJOR: u32 = 10;

/// Matches a four-part `<major>.<minor>.<build>.<revision>` version embedded
/// anywhere in a server banner string.
static VERSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.\d+\.\d+\.\d+").expect("Invalid version regex"));

/// What a row source can do, as reported by the source itself.
///
/// Purely descriptive: the coordinator reads this once at startup and shapes
/// the partition plan around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceCapabilities {
    /// Whether the source can restrict a cursor to an offset range.
    /// When false the coordinator forces a single shard over the whole
    /// table and opens the cursor with no range at all.
    pub supports_range_pagination: bool,
}

impl SourceCapabilities {
    /// Capabilities for a source with working offset/limit pagination
    pub fn full() -> Self {
        Self {
            supports_range_pagination: true,
        }
    }

    /// Capabilities for a source that must be read in one pass
    pub fn sequential_only() -> Self {
        Self {
            supports_range_pagination: false,
        }
    }
}

/// Parse the major version out of a four-part server version banner.
///
/// An unparseable banner is a fatal configuration error: there is no safe
/// default for pagination support, so the caller must not guess.
pub fn parse_major_version(banner: &str) -> Result<u32, SourceError> {
    let caps = VERSION_REGEX
        .captures(banner)
        .ok_or_else(|| SourceError::UnparseableVersion {
            banner: banner.to_string(),
        })?;

    caps[1]
        .parse::<u32>()
        .map_err(|_| SourceError::UnparseableVersion {
            banner: banner.to_string(),
        })
}

/// Decide offset-pagination support from a server version banner.
///
/// Returns false for servers at or below [`BROKEN_PAGINATION_MAJOR`]; the
/// coordinator then degrades to single-shard mode rather than risk
/// duplicated or skipped rows from broken pagination.
pub fn offset_pagination_from_banner(banner: &str) -> Result<bool, SourceError> {
    let major = parse_major_version(banner)?;
    Ok(major > BROKEN_PAGINATION_MAJOR)
}
