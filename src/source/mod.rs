//! Change source abstraction.
//!
//! A change source is an append-only log of `{created, url}` records that
//! can be queried for everything created strictly after a timestamp. The
//! poller only depends on the [`ChangeSource`] trait; concrete adapters live
//! in submodules.
//!
//! - [`SharePointListSource`] - list REST endpoint of a `SharePoint` site
//! - [`MemoryChangeSource`] - in-process log for embedding and tests

mod error;
mod memory;
mod sharepoint;

pub use error::{MalformedEntry, QueryError};
pub use memory::MemoryChangeSource;
pub use sharepoint::{DEFAULT_LIST_TITLE, SharePointListSource};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

/// A change log record exactly as the source returned it.
///
/// Either field may be missing or unusable; the poller decides what to do
/// with such entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChangeEntry {
    /// Creation time of the record.
    pub created_at: Option<DateTime<Utc>>,
    /// URL of the changed file, unparsed.
    pub url: Option<String>,
}

impl RawChangeEntry {
    /// Creates a well-formed raw entry.
    pub fn new(created_at: DateTime<Utc>, url: impl Into<String>) -> Self {
        Self {
            created_at: Some(created_at),
            url: Some(url.into()),
        }
    }

    /// Parses the URL field into an absolute URL.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedEntry::MissingUrl`] for a missing or blank field and
    /// [`MalformedEntry::InvalidUrl`] when the text is not an absolute URI.
    pub fn parse_url(&self) -> Result<Url, MalformedEntry> {
        let raw = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(MalformedEntry::MissingUrl)?;
        let url = Url::parse(raw).map_err(|_| MalformedEntry::InvalidUrl {
            url: raw.to_owned(),
        })?;
        if url.cannot_be_a_base() {
            return Err(MalformedEntry::InvalidUrl {
                url: raw.to_owned(),
            });
        }
        Ok(url)
    }

    /// Validates both fields.
    ///
    /// # Errors
    ///
    /// Returns the first [`MalformedEntry`] reason found.
    pub fn parse(&self) -> Result<ChangeEntry, MalformedEntry> {
        let created_at = self.created_at.ok_or(MalformedEntry::MissingCreated)?;
        let url = self.parse_url()?;
        Ok(ChangeEntry { created_at, url })
    }
}

/// A validated change log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEntry {
    /// Creation time of the record.
    pub created_at: DateTime<Utc>,
    /// Absolute URL of the changed file.
    pub url: Url,
}

/// Query interface of a change log.
///
/// Implementations must return entries ordered ascending by creation time.
/// `since` is an exclusive lower bound; `None` means the whole log.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Returns every entry created strictly after `since`.
    async fn query(&self, since: Option<DateTime<Utc>>)
    -> Result<Vec<RawChangeEntry>, QueryError>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_valid_entry() {
        let raw = RawChangeEntry::new(t0(), "https://example.com/Shared%20Documents/a.docx");
        let entry = raw.parse().unwrap();
        assert_eq!(entry.created_at, t0());
        assert_eq!(entry.url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_parse_url_trims_whitespace() {
        let raw = RawChangeEntry::new(t0(), "  https://example.com/a  ");
        assert_eq!(raw.parse_url().unwrap().as_str(), "https://example.com/a");
    }

    #[test]
    fn test_parse_missing_url() {
        let raw = RawChangeEntry {
            created_at: Some(t0()),
            url: None,
        };
        assert_eq!(raw.parse(), Err(MalformedEntry::MissingUrl));

        let blank = RawChangeEntry::new(t0(), "   ");
        assert_eq!(blank.parse_url(), Err(MalformedEntry::MissingUrl));
    }

    #[test]
    fn test_parse_relative_url_is_invalid() {
        let raw = RawChangeEntry::new(t0(), "/sites/docs/a.docx");
        assert!(matches!(
            raw.parse_url(),
            Err(MalformedEntry::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_parse_non_hierarchical_url_is_invalid() {
        let raw = RawChangeEntry::new(t0(), "mailto:someone@example.com");
        assert!(matches!(
            raw.parse_url(),
            Err(MalformedEntry::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_parse_missing_created() {
        let raw = RawChangeEntry {
            created_at: None,
            url: Some("https://example.com/a".to_string()),
        };
        assert_eq!(raw.parse(), Err(MalformedEntry::MissingCreated));
    }
}
