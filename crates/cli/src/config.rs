//! Configuration file loading.
//!
//! A config file holds the client settings and the endpoint tree:
//!
//! ```toml
//! [client]
//! host = "https://api.example.com/"
//! reqType = "http"
//!
//! [api]
//! prefix = "users"
//! pathList = [{ path = "list", params = { page = 1 } }]
//! ```
//!
//! Files ending in `.toml` are parsed as TOML; anything else as JSON.

use std::path::Path;

use anyhow::Context as _;
use pipeline::{ApiGroup, ClientConfig};
use serde::Deserialize;

/// The parsed contents of a config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub client: ClientConfig,
    pub api: ApiGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Format::Toml,
            _ => Format::Json,
        }
    }
}

/// Reads and parses the config file at `path`.
pub fn load(path: &Path) -> anyhow::Result<ConfigFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    parse(&text, Format::for_path(path))
        .with_context(|| format!("parsing config file {}", path.display()))
}

pub fn parse(text: &str, format: Format) -> anyhow::Result<ConfigFile> {
    let config = match format {
        Format::Toml => toml::from_str(text)?,
        Format::Json => serde_json::from_str(text)?,
    };
    Ok(config)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn toml_config_parses() {
        let config = parse(
            r#"
            [client]
            host = "https://api.example.com/"
            reqType = "axios"

            [client.httpOptions]
            timeout = 1000

            [api]
            prefix = "users"

            [[api.pathList]]
            path = "list"
            params = { page = 1 }

            [[api.pathList]]
            path = "create"
            type = "post"
            "#,
            Format::Toml,
        )
        .unwrap();

        assert_eq!(config.client.host, "https://api.example.com/");
        assert_eq!(config.client.req_type.as_deref(), Some("axios"));
        assert_eq!(config.client.http_options.get("timeout"), Some(&json!(1000)));
        assert_eq!(config.api.path_list.len(), 2);
        assert_eq!(config.api.path_list[1].options.method.as_deref(), Some("post"));
    }

    #[test]
    fn json_config_defaults_client() {
        let config = parse(
            r#"{ "api": { "prefix": "p", "pathList": [{ "path": "x" }] } }"#,
            Format::Json,
        )
        .unwrap();

        assert_eq!(config.client, ClientConfig::default());
        assert_eq!(config.api.path_list[0].path, "x");
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(Format::for_path(Path::new("api.toml")), Format::Toml);
        assert_eq!(Format::for_path(Path::new("api.TOML")), Format::Toml);
        assert_eq!(Format::for_path(Path::new("api.json")), Format::Json);
        assert_eq!(Format::for_path(Path::new("api")), Format::Json);
    }

    #[test]
    fn missing_api_section_is_an_error() {
        assert!(parse("[client]\nhost = \"h\"\n", Format::Toml).is_err());
    }
}
