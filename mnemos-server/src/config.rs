// Copyright 2025 Mnemos (https://github.com/mnemos-ai)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Server configuration
//!
//! TOML file with serde defaults throughout, so a missing file or a partial
//! one still boots a working server.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use mnemos_core::MnemosConfig;

/// Mnemos server configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub http: HttpConfig,
    /// Memory-core configuration, passed through to the engine.
    #[serde(default)]
    pub memory: MnemosConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Enable permissive CORS (development)
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8475".to_string()
}

fn default_enable_cors() -> bool {
    true
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: default_enable_cors(),
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file, or fall back to defaults when no path is
    /// given.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_boot_without_a_file() {
        let cfg = ServerConfig::load(None).unwrap();
        assert_eq!(cfg.http.listen_addr, "127.0.0.1:8475");
        assert_eq!(cfg.memory.embedding.dimensions, 1536);
    }

    #[test]
    fn partial_toml_is_accepted() {
        let cfg: ServerConfig = toml::from_str(
            r#"
            [http]
            listen_addr = "0.0.0.0:9000"

            [memory.segmentation]
            gamma = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.http.listen_addr, "0.0.0.0:9000");
        assert_eq!(cfg.memory.segmentation.gamma, 2.0);
        assert_eq!(cfg.memory.segmentation.window_size, 50);
        assert!(cfg.http.enable_cors);
    }
}
