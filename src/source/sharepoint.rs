//! `SharePoint` list adapter for the change log.
//!
//! The change log is a list whose items carry the built-in `Created` field
//! and a hyperlink field named `URL`. Items are read through the list REST
//! endpoint with OData paging; the list's `ItemCount` is checked first so an
//! empty log costs a single small request.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::{ChangeSource, QueryError, RawChangeEntry};
use crate::credentials::Credentials;
use crate::http::{HttpTimeouts, build_client};

/// Title of the change log list populated by the file-changed event hooks.
pub const DEFAULT_LIST_TITLE: &str = "FileChangedLog";

/// Largest page the list endpoint hands out in one response.
const PAGE_SIZE: u32 = 5000;

/// OData flavour without metadata envelopes.
const ODATA_NOMETADATA: &str = "application/json;odata=nometadata";

/// Change source backed by a `SharePoint` list.
#[derive(Debug, Clone)]
pub struct SharePointListSource {
    client: Client,
    list_endpoint: Url,
    credentials: Option<Credentials>,
}

#[derive(Debug, Deserialize)]
struct ListInfo {
    #[serde(rename = "ItemCount")]
    item_count: u64,
}

#[derive(Debug, Deserialize)]
struct ItemsPage {
    #[serde(default)]
    value: Vec<ListItem>,
    #[serde(rename = "odata.nextLink", alias = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    #[serde(rename = "Created")]
    created: Option<String>,
    #[serde(rename = "URL")]
    url: Option<HyperlinkField>,
}

#[derive(Debug, Deserialize)]
struct HyperlinkField {
    #[serde(rename = "Url")]
    url: Option<String>,
}

impl SharePointListSource {
    /// Creates a source for the list titled `list` on `site`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidRequest`] if the list endpoint cannot be
    /// derived from `site` or the HTTP client cannot be built.
    pub fn new(
        site: &Url,
        list: &str,
        credentials: Option<Credentials>,
        timeouts: HttpTimeouts,
    ) -> Result<Self, QueryError> {
        let client = build_client(timeouts)
            .map_err(|e| QueryError::invalid_request(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            list_endpoint: list_endpoint(site, list)?,
            credentials,
        })
    }

    /// Returns the REST endpoint of the list.
    #[must_use]
    pub fn list_endpoint(&self) -> &Url {
        &self.list_endpoint
    }

    /// Builds the first items page URL for a query.
    fn items_url(&self, since: Option<DateTime<Utc>>) -> Result<Url, QueryError> {
        let mut url = join_segment(&self.list_endpoint, "items")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("$select", "Created,URL");
            pairs.append_pair("$orderby", "Created asc");
            pairs.append_pair("$top", &PAGE_SIZE.to_string());
            if let Some(since) = since {
                pairs.append_pair("$filter", &created_after_filter(since));
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, QueryError> {
        let mut request = self.client.get(url.clone()).header(ACCEPT, ODATA_NOMETADATA);
        if let Some(credentials) = &self.credentials {
            request = credentials.apply(request);
        }

        let response = request
            .send()
            .await
            .map_err(|e| QueryError::transport(url.as_str(), e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::http_status(url.as_str(), status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| QueryError::transport(url.as_str(), e))?;
        serde_json::from_slice(&body).map_err(|e| QueryError::decode(url.as_str(), e.to_string()))
    }
}

#[async_trait]
impl ChangeSource for SharePointListSource {
    #[instrument(skip(self), fields(list = %self.list_endpoint))]
    async fn query(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawChangeEntry>, QueryError> {
        let info: ListInfo = self.get_json(&self.list_endpoint).await?;
        if info.item_count == 0 {
            debug!("change log list is empty");
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        let mut next = Some(self.items_url(since)?);
        while let Some(page_url) = next.take() {
            let page: ItemsPage = self.get_json(&page_url).await?;
            debug!(items = page.value.len(), url = %page_url, "fetched change log page");
            entries.extend(page.value.into_iter().map(ListItem::into_raw));

            next = page
                .next_link
                .map(|link| {
                    page_url
                        .join(&link)
                        .map_err(|e| QueryError::decode(page_url.as_str(), e.to_string()))
                })
                .transpose()?;
        }
        Ok(entries)
    }

    fn describe(&self) -> String {
        self.list_endpoint.to_string()
    }
}

impl ListItem {
    fn into_raw(self) -> RawChangeEntry {
        RawChangeEntry {
            created_at: self.created.as_deref().and_then(parse_created),
            url: self.url.and_then(|field| field.url),
        }
    }
}

fn parse_created(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|created| created.with_timezone(&Utc))
}

/// OData filter selecting items created strictly after `since`.
///
/// Fractional seconds are kept so the bound stays exclusive for the entry
/// that set the cursor.
fn created_after_filter(since: DateTime<Utc>) -> String {
    format!(
        "Created gt datetime'{}'",
        since.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    )
}

fn list_endpoint(site: &Url, list: &str) -> Result<Url, QueryError> {
    if list.trim().is_empty() {
        return Err(QueryError::invalid_request("list title is empty"));
    }
    // OData string literals escape a single quote by doubling it.
    let literal = list.replace('\'', "''");
    let segment = format!(
        "_api/web/lists/getbytitle('{}')",
        urlencoding::encode(&literal)
    );
    join_segment(site, &segment)
}

fn join_segment(base: &Url, segment: &str) -> Result<Url, QueryError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.set_query(None);
    base.join(segment)
        .map_err(|e| QueryError::invalid_request(format!("{segment}: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_list_endpoint_keeps_site_path() {
        let site = Url::parse("https://sp.example.com/sites/docs").unwrap();
        let endpoint = list_endpoint(&site, "FileChangedLog").unwrap();
        assert_eq!(
            endpoint.as_str(),
            "https://sp.example.com/sites/docs/_api/web/lists/getbytitle('FileChangedLog')"
        );
    }

    #[test]
    fn test_list_endpoint_encodes_title() {
        let site = Url::parse("https://sp.example.com/").unwrap();
        let endpoint = list_endpoint(&site, "Bob's Log").unwrap();
        assert!(
            endpoint.as_str().ends_with("getbytitle('Bob%27%27s%20Log')"),
            "unexpected endpoint: {endpoint}"
        );
    }

    #[test]
    fn test_list_endpoint_rejects_blank_title() {
        let site = Url::parse("https://sp.example.com/").unwrap();
        assert!(matches!(
            list_endpoint(&site, "  "),
            Err(QueryError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_created_after_filter_uses_utc_seconds() {
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 5).unwrap();
        assert_eq!(
            created_after_filter(since),
            "Created gt datetime'2024-03-01T09:30:05Z'"
        );
    }

    #[test]
    fn test_created_after_filter_keeps_fractional_seconds() {
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
            + chrono::Duration::milliseconds(500);
        assert_eq!(
            created_after_filter(since),
            "Created gt datetime'2024-03-01T09:00:00.500Z'"
        );
    }

    #[test]
    fn test_parsed_created_round_trips_through_filter() {
        let created = parse_created("2024-03-01T09:00:00.123456Z").unwrap();
        assert_eq!(
            created_after_filter(created),
            "Created gt datetime'2024-03-01T09:00:00.123456Z'"
        );
    }

    #[test]
    fn test_list_item_into_raw() {
        let item: ListItem = serde_json::from_str(
            r#"{"Created":"2024-03-01T09:00:00Z","URL":{"Description":"a","Url":"https://example.com/a"}}"#,
        )
        .unwrap();
        let raw = item.into_raw();
        assert_eq!(
            raw.created_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap())
        );
        assert_eq!(raw.url.as_deref(), Some("https://example.com/a"));
    }

    #[test]
    fn test_list_item_without_hyperlink() {
        let item: ListItem =
            serde_json::from_str(r#"{"Created":"not a date","URL":null}"#).unwrap();
        let raw = item.into_raw();
        assert!(raw.created_at.is_none());
        assert!(raw.url.is_none());
    }
}
