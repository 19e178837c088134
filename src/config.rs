//! User defaults.
//!
//! With the `config` feature (on by default) settings are read from
//! `$XDG_CONFIG_HOME/colv/config.toml` (or the platform equivalent). Command line
//! options override whatever the file provides.
//!
//! ```toml
//! split_pattern = ","
//! highlight_pattern = "ERROR"
//! ignore = ["1", "/^#/"]
//! formats = ["3:%.2f", "4,5:%I"]
//! ignore_case = true
//! theme = "monochrome"
//! parse_header = false
//! ```
//!
//! A file can also carry options in its leading `#` comment lines, see
//! [`embedded_options`].

use crate::error::{ColvError, Result};
use crate::source::{StreamOptions, DEFAULT_CHUNK_SIZE};
use bstr::ByteSlice;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default, deny_unknown_fields))]
pub struct Config {
    /// Regex used to split lines into fields; whitespace when unset
    pub split_pattern: Option<String>,
    pub highlight_pattern: Option<String>,
    /// Ignore rules in prompt syntax (`N`, `A-B`, `A..B` or a regex)
    pub ignore: Vec<String>,
    /// Format rules in prompt syntax (`COLS:FORMAT`)
    pub formats: Vec<String>,
    pub ignore_case: bool,
    /// `default`, `monochrome` or `high-contrast`
    pub theme: String,
    pub chunk_size: usize,
    pub spill_threshold: usize,
    pub spill_dir: Option<PathBuf>,
    /// Read options from the leading comment lines of a file
    pub parse_header: bool,
}

impl Default for Config {
    fn default() -> Self {
        let stream = StreamOptions::default();
        Self {
            split_pattern: None,
            highlight_pattern: None,
            ignore: Vec::new(),
            formats: Vec::new(),
            ignore_case: false,
            theme: "default".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            spill_threshold: stream.spill_threshold,
            spill_dir: None,
            parse_header: true,
        }
    }
}

impl Config {
    /// Location of the user config file, if the platform has a config dir.
    #[cfg(feature = "config")]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("colv").join("config.toml"))
    }

    #[cfg(not(feature = "config"))]
    pub fn default_path() -> Option<PathBuf> {
        None
    }

    /// Load the user config file; defaults when there is none.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    #[cfg(feature = "config")]
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ColvError::file_error(format!("Failed to read config {}", path.display()), e)
        })?;
        let config = Self::from_toml_str(&text)?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    #[cfg(not(feature = "config"))]
    pub fn load_from(_path: &std::path::Path) -> Result<Self> {
        Ok(Self::default())
    }

    #[cfg(feature = "config")]
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ColvError::config(e.to_string()))
    }

    /// Stream tuning derived from this config.
    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            chunk_size: self.chunk_size.max(1),
            spill_threshold: self.spill_threshold,
            spill_dir: self.spill_dir.clone(),
        }
    }
}

/// Long options a `# name: value` comment may set.
pub const EMBEDDED_KEYS: &[&str] = &[
    "split",
    "highlight",
    "ignore",
    "format",
    "pattern",
    "line",
    "header-line",
    "hide",
    "align",
];

/// Options carried by the leading `#` comment lines of `data`.
///
/// `# colv: ARGS` contributes ARGS split the way a shell would; `# name: value`
/// contributes `--name value` when `name` is in `allowed`. Other comments are
/// skipped. Returns the number of leading comment lines and the options in order.
pub fn embedded_options(data: &[u8], allowed: &[&str]) -> Result<(usize, Vec<String>)> {
    let mut count = 0;
    let mut args = Vec::new();
    for line in data.lines() {
        let Some(comment) = line.trim_start().strip_prefix(b"#") else {
            break;
        };
        count += 1;
        let comment = comment.to_str_lossy();
        let comment = comment.trim();
        if let Some(rest) = comment.strip_prefix("colv:") {
            let words = shlex::split(rest).ok_or_else(|| {
                ColvError::config(format!("Bad quoting in header line {count}"))
            })?;
            args.extend(words);
        } else if let Some((key, value)) = comment.split_once(':') {
            let key = key.trim();
            if allowed.contains(&key) {
                args.push(format!("--{key}"));
                args.push(value.trim().to_string());
            }
        }
    }
    if !args.is_empty() {
        log::info!("{} options from {} header lines", args.len(), count);
    }
    Ok((count, args))
}

#[cfg(test)]
mod embedded_tests {
    use super::*;

    #[test]
    fn header_comments_become_options() {
        let data = b"# colv: -s ',' --hide '2 3'\n#  split: ;\n# author: me\n  # format: 1:%d\nid,name\n# not a header\n";
        let (lines, args) = embedded_options(data, EMBEDDED_KEYS).unwrap();
        assert_eq!(lines, 4);
        assert_eq!(
            args,
            vec!["-s", ",", "--hide", "2 3", "--split", ";", "--format", "1:%d"]
        );
    }

    #[test]
    fn no_header_no_options() {
        assert_eq!(embedded_options(b"a b\n# c: d\n", EMBEDDED_KEYS).unwrap(), (0, vec![]));
        assert_eq!(embedded_options(b"", EMBEDDED_KEYS).unwrap(), (0, vec![]));
    }

    #[test]
    fn unbalanced_quotes_are_reported() {
        let err = embedded_options(b"# colv: -s 'oops\n", EMBEDDED_KEYS).unwrap_err();
        assert!(matches!(err, ColvError::ConfigError { .. }));
    }
}
