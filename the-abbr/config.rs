//! Plugin settings.
//!
//! ```toml
//! auto-mark = true
//! tab-expand = true
//! context-size-limit = 200000
//! jsx-prefix = "<"
//! ```

use std::{
  fs,
  io,
  path::{
    Path,
    PathBuf,
  },
};

use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("invalid settings: {0}")]
  Parse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settings {
  /// Track abbreviations while typing.
  pub auto_mark:          bool,
  /// Let the host bind Tab to expansion.
  pub tab_expand:         bool,
  /// Documents at least this long skip context capture while typing. `0`
  /// never captures context while typing.
  pub context_size_limit: usize,
  /// Marker that opens an abbreviation in JSX.
  pub jsx_prefix:         String,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      auto_mark:          true,
      tab_expand:         false,
      context_size_limit: 0,
      jsx_prefix:         "<".to_string(),
    }
  }
}

impl Settings {
  pub fn from_toml(source: &str) -> Result<Self> {
    Ok(toml::from_str(source)?)
  }

  pub fn load(path: &Path) -> Result<Self> {
    let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let settings = Self::from_toml(&source)?;
    tracing::debug!(path = %path.display(), ?settings, "loaded settings");
    Ok(settings)
  }

  /// Whether context may be captured inline for a document of `len` chars.
  pub fn capture_context(&self, len: usize) -> bool {
    self.context_size_limit > 0 && len < self.context_size_limit
  }
}
