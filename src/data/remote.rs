use std::fmt;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, ACCEPT};
use reqwest::{Client, Url};
use serde_json::Value as JsonValue;

use super::loader::{json_records, RawRow};

const API_VERSION: &str = "2019-02-02";
const NEXT_PARTITION_KEY: &str = "x-ms-continuation-nextpartitionkey";
const NEXT_ROW_KEY: &str = "x-ms-continuation-nextrowkey";

// ---------------------------------------------------------------------------
// Connection string
// ---------------------------------------------------------------------------

/// The parts of a storage connection string needed to read a table.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub table_endpoint: String,
    /// SAS token without the leading `?`.
    pub sas: String,
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("table_endpoint", &self.table_endpoint)
            .field("sas", &"<redacted>")
            .finish()
    }
}

impl ConnectionString {
    /// Parse `Key=Value;Key=Value` pairs. Keys are case-insensitive.
    ///
    /// The endpoint is `TableEndpoint` when given, otherwise it is assembled
    /// from `DefaultEndpointsProtocol`, `AccountName` and `EndpointSuffix`.
    /// Only shared access signatures are supported for authentication.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut table_endpoint = None;
        let mut account_name = None;
        let mut protocol = "https".to_string();
        let mut suffix = "core.windows.net".to_string();
        let mut sas = None;
        let mut has_account_key = false;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .context("malformed connection string segment, expected Key=Value")?;
            match key.to_ascii_lowercase().as_str() {
                "tableendpoint" => table_endpoint = Some(value.trim_end_matches('/').to_string()),
                "accountname" => account_name = Some(value.to_string()),
                "defaultendpointsprotocol" => protocol = value.to_string(),
                "endpointsuffix" => suffix = value.to_string(),
                "sharedaccesssignature" => sas = Some(value.trim_start_matches('?').to_string()),
                "accountkey" => has_account_key = true,
                other => log::debug!("ignoring connection string key '{other}'"),
            }
        }

        let Some(sas) = sas else {
            if has_account_key {
                bail!("account key authentication is not supported; provide a SharedAccessSignature");
            }
            bail!("connection string has no SharedAccessSignature");
        };

        let table_endpoint = match (table_endpoint, account_name) {
            (Some(endpoint), _) => endpoint,
            (None, Some(account)) => format!("{protocol}://{account}.table.{suffix}"),
            (None, None) => bail!("connection string needs a TableEndpoint or an AccountName"),
        };

        Ok(ConnectionString {
            table_endpoint,
            sas,
        })
    }
}

// ---------------------------------------------------------------------------
// Remote table
// ---------------------------------------------------------------------------

/// One table in the remote store, read in full page by page.
#[derive(Debug, Clone)]
pub struct RemoteTable {
    connection: ConnectionString,
    table: String,
    client: Client,
}

impl RemoteTable {
    pub fn new(connection: ConnectionString, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric()) {
            bail!("invalid table name '{table}': expected ASCII letters and digits");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("building HTTP client")?;
        Ok(RemoteTable {
            connection,
            table,
            client,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    fn entities_url(&self) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{}()", self.connection.table_endpoint, self.table))
            .context("building table URL")?;
        url.set_query(Some(&self.connection.sas));
        Ok(url)
    }

    /// Fetch every entity of the table, following continuation headers.
    pub async fn fetch_all(&self) -> Result<Vec<RawRow>> {
        let base = self.entities_url()?;
        let mut continuation: Option<(String, Option<String>)> = None;
        let mut rows = Vec::new();
        let mut pages = 0usize;

        loop {
            let mut url = base.clone();
            if let Some((partition_key, row_key)) = &continuation {
                let mut query = url.query_pairs_mut();
                query.append_pair("NextPartitionKey", partition_key);
                if let Some(row_key) = row_key {
                    query.append_pair("NextRowKey", row_key);
                }
            }

            let response = self
                .client
                .get(url)
                .header(ACCEPT, "application/json;odata=nometadata")
                .header("x-ms-version", API_VERSION)
                .send()
                .await
                .with_context(|| format!("requesting table '{}'", self.table))?
                .error_for_status()
                .with_context(|| format!("reading table '{}'", self.table))?;

            let next = continuation_token(response.headers());
            let body: JsonValue = response.json().await.context("decoding table page")?;
            let page = json_records(&body)?;
            pages += 1;
            log::debug!("table '{}': page {pages} with {} entities", self.table, page.len());
            rows.extend(page);

            match next {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        log::info!(
            "fetched {} entities from table '{}' in {pages} page(s)",
            rows.len(),
            self.table
        );
        Ok(rows)
    }
}

fn continuation_token(headers: &HeaderMap) -> Option<(String, Option<String>)> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    header(NEXT_PARTITION_KEY).map(|pk| (pk, header(NEXT_ROW_KEY)))
}
