use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use crate::data::loader::Source;
use crate::data::remote::{ConnectionString, RemoteTable};

/// Serve AI feedback records through a filterable web view.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Config {
    /// Load the table from a local .json, .csv or .parquet file instead of the remote store.
    #[arg(long, env = "FEEDBACK_SOURCE")]
    pub source: Option<PathBuf>,

    /// Storage connection string with a SharedAccessSignature.
    #[arg(long, env = "STORAGE_CONNECTION_STRING", hide_env_values = true)]
    pub connection_string: Option<String>,

    /// Name of the remote table holding the feedback records.
    #[arg(long = "table", env = "TABLE_NAME")]
    pub table_name: Option<String>,

    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Directory of static front-end files served at `/`.
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Reload the dataset every N seconds.
    #[arg(long, env = "REFRESH_SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_secs: Option<u64>,
}

impl Config {
    /// A local file wins over the remote store when both are configured.
    pub fn source(&self) -> Result<Source> {
        if let Some(path) = &self.source {
            return Ok(Source::File(path.clone()));
        }
        match (&self.connection_string, &self.table_name) {
            (Some(conn), Some(table)) => {
                let conn = ConnectionString::parse(conn).context("parsing STORAGE_CONNECTION_STRING")?;
                Ok(Source::Remote(RemoteTable::new(conn, table.as_str())?))
            }
            (Some(_), None) => bail!("TABLE_NAME is required with a connection string"),
            (None, Some(_)) => bail!("STORAGE_CONNECTION_STRING is required with a table name"),
            (None, None) => bail!("no data source configured: pass --source or set STORAGE_CONNECTION_STRING and TABLE_NAME"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("feedback-explorer").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn file_source_takes_precedence() {
        let config = parse(&[
            "--source",
            "feedback.json",
            "--connection-string",
            "TableEndpoint=http://localhost;SharedAccessSignature=sig=x",
            "--table",
            "Feedback",
        ]);
        assert!(matches!(config.source().unwrap(), Source::File(p) if p == PathBuf::from("feedback.json")));
    }

    #[test]
    fn remote_source_needs_table_name() {
        let config = parse(&["--connection-string", "TableEndpoint=http://localhost;SharedAccessSignature=sig=x"]);
        let err = config.source().unwrap_err();
        assert!(err.to_string().contains("TABLE_NAME"));

        let config = parse(&[
            "--connection-string",
            "TableEndpoint=http://localhost;SharedAccessSignature=sig=x",
            "--table",
            "Feedback",
        ]);
        assert!(matches!(config.source().unwrap(), Source::Remote(r) if r.table_name() == "Feedback"));
    }

    #[test]
    fn defaults_and_validation() {
        let config = parse(&["--source", "f.csv"]);
        assert_eq!(config.bind, "127.0.0.1:5000".parse().unwrap());
        assert_eq!(config.refresh_secs, None);

        let zero = Config::try_parse_from(["feedback-explorer", "--refresh-secs", "0"]);
        assert!(zero.is_err());
    }
}
