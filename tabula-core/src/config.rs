//! Gateway configuration.
//!
//! A [`TabulaConfig`] carries the reserved query-parameter names, paging
//! limits and body caps shared by the parser, the stores and the REST
//! surface. It is loaded from a YAML file, a `.env` file, and `TABULA_*`
//! environment variables.
//!
//! Resolution order (lowest to highest priority):
//! 1. built-in defaults
//! 2. YAML file (`tabula.yaml` or the path in `TABULA_CONFIG`)
//! 3. `.env` file (loaded into the process environment, never overwriting)
//! 4. `TABULA_*` environment variables

use std::path::Path;

use serde::Deserialize;

use crate::error::Error;

/// Reserved-parameter names, paging limits and body caps.
///
/// Every field has a default, so `TabulaConfig::default()` is a fully
/// working configuration:
///
/// | Field | Default |
/// |---|---|
/// | `format_param` | `xformat` |
/// | `fields_param` | `xfields` |
/// | `page_param` | `xpage` |
/// | `per_page_param` | `xper_page` |
/// | `sort_param` | `xsort` |
/// | `separator` | `\|` |
/// | `default_per_page` | 20 |
/// | `max_per_page` | 1000 |
/// | `count_threshold` | 10000 |
/// | `max_body_size` | 1 MiB |
/// | `max_import_records` | 100000 |
/// | `max_file_records` | 100000 |
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TabulaConfig {
    /// Query-parameter selecting the output format (`json`, `csv`, `excel`).
    pub format_param: String,
    /// Query-parameter restricting the projected fields.
    pub fields_param: String,
    /// Query-parameter selecting the 1-based page.
    pub page_param: String,
    /// Query-parameter selecting the page size.
    pub per_page_param: String,
    /// Query-parameter carrying the sort list.
    pub sort_param: String,
    /// Separator for multi-value filter and sort expressions.
    pub separator: char,
    /// Page size applied when the request names none.
    pub default_per_page: i64,
    /// Hard cap on the page size; larger requests are clamped, not refused.
    pub max_per_page: i64,
    /// Row-count boundary between exact counting and estimation.
    pub count_threshold: i64,
    /// Largest accepted request body, in bytes.
    pub max_body_size: usize,
    /// Largest accepted batch for the import endpoint.
    pub max_import_records: usize,
    /// Row ceiling applied to csv and excel exports in place of paging.
    pub max_file_records: i64,
}

impl Default for TabulaConfig {
    fn default() -> Self {
        TabulaConfig {
            format_param: "xformat".to_string(),
            fields_param: "xfields".to_string(),
            page_param: "xpage".to_string(),
            per_page_param: "xper_page".to_string(),
            sort_param: "xsort".to_string(),
            separator: '|',
            default_per_page: 20,
            max_per_page: 1000,
            count_threshold: 10_000,
            max_body_size: 1024 * 1024,
            max_import_records: 100_000,
            max_file_records: 100_000,
        }
    }
}

impl TabulaConfig {
    /// Parse a YAML document, starting from the defaults.
    pub fn from_yaml(content: &str) -> Result<Self, Error> {
        let config: TabulaConfig = serde_yaml::from_str(content)
            .map_err(|e| Error::config(format!("config parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file. A missing file yields the defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(TabulaConfig::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("config read error: {e}")))?;
        Self::from_yaml(&content)
    }

    /// Full resolution: YAML file, `.env`, then `TABULA_*` variables.
    pub fn load() -> Result<Self, Error> {
        dotenvy::dotenv().ok();
        let path = std::env::var("TABULA_CONFIG").unwrap_or_else(|_| "tabula.yaml".to_string());
        let mut config = Self::from_yaml_file(&path)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `TABULA_*` environment variables onto this configuration.
    pub fn apply_env(&mut self) -> Result<(), Error> {
        overlay_string("TABULA_FORMAT_PARAM", &mut self.format_param);
        overlay_string("TABULA_FIELDS_PARAM", &mut self.fields_param);
        overlay_string("TABULA_PAGE_PARAM", &mut self.page_param);
        overlay_string("TABULA_PER_PAGE_PARAM", &mut self.per_page_param);
        overlay_string("TABULA_SORT_PARAM", &mut self.sort_param);
        overlay_parsed("TABULA_SEPARATOR", &mut self.separator)?;
        overlay_parsed("TABULA_DEFAULT_PER_PAGE", &mut self.default_per_page)?;
        overlay_parsed("TABULA_MAX_PER_PAGE", &mut self.max_per_page)?;
        overlay_parsed("TABULA_COUNT_THRESHOLD", &mut self.count_threshold)?;
        overlay_parsed("TABULA_MAX_BODY_SIZE", &mut self.max_body_size)?;
        overlay_parsed("TABULA_MAX_IMPORT_RECORDS", &mut self.max_import_records)?;
        overlay_parsed("TABULA_MAX_FILE_RECORDS", &mut self.max_file_records)?;
        Ok(())
    }

    /// Reject configurations the parser cannot work with.
    pub fn validate(&self) -> Result<(), Error> {
        let names = [
            &self.format_param,
            &self.fields_param,
            &self.page_param,
            &self.per_page_param,
            &self.sort_param,
        ];
        for name in names {
            if name.is_empty() {
                return Err(Error::config("reserved parameter names must not be empty"));
            }
        }
        for (i, a) in names.iter().enumerate() {
            for b in names.iter().skip(i + 1) {
                if a == b {
                    return Err(Error::config(format!(
                        "reserved parameter name {a} is used twice"
                    )));
                }
            }
        }
        if self.default_per_page < 1 {
            return Err(Error::config("default_per_page must be at least 1"));
        }
        if self.max_per_page < 1 {
            return Err(Error::config("max_per_page must be at least 1"));
        }
        Ok(())
    }

    /// Names that are never interpreted as filter fields.
    pub fn reserved_params(&self) -> [&str; 5] {
        [
            self.format_param.as_str(),
            self.fields_param.as_str(),
            self.page_param.as_str(),
            self.per_page_param.as_str(),
            self.sort_param.as_str(),
        ]
    }
}

fn overlay_string(key: &str, target: &mut String) {
    if let Ok(value) = std::env::var(key) {
        *target = value;
    }
}

fn overlay_parsed<T>(key: &str, target: &mut T) -> Result<(), Error>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(value) = std::env::var(key) {
        *target = value
            .parse()
            .map_err(|e| Error::config(format!("invalid value for {key}: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TabulaConfig::default();
        config.validate().unwrap();
        assert_eq!(config.format_param, "xformat");
        assert_eq!(config.default_per_page, 20);
        assert_eq!(config.max_body_size, 1_048_576);
    }

    #[test]
    fn yaml_overrides_defaults_only_where_named() {
        let config = TabulaConfig::from_yaml("max_per_page: 50\nseparator: ';'\n").unwrap();
        assert_eq!(config.max_per_page, 50);
        assert_eq!(config.separator, ';');
        assert_eq!(config.page_param, "xpage");
    }

    #[test]
    fn unknown_yaml_keys_are_refused() {
        let err = TabulaConfig::from_yaml("per_page: 50\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {err:?}");
    }

    #[test]
    fn duplicate_parameter_names_are_refused() {
        let err = TabulaConfig::from_yaml("sort_param: xpage\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {err:?}");
    }

    #[test]
    fn env_overlay_parses_numbers() {
        std::env::set_var("TABULA_MAX_PER_PAGE", "250");
        let mut config = TabulaConfig::default();
        config.apply_env().unwrap();
        std::env::remove_var("TABULA_MAX_PER_PAGE");
        assert_eq!(config.max_per_page, 250);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = TabulaConfig::from_yaml_file("does-not-exist.yaml").unwrap();
        assert_eq!(config, TabulaConfig::default());
    }

    #[test]
    fn yaml_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tabula.yaml");
        std::fs::write(&path, "count_threshold: 500\n").unwrap();
        let config = TabulaConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.count_threshold, 500);
    }
}
