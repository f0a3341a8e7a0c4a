// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Global logger installation on top of `env_logger`.

use std::sync::Once;

use anyhow::Context;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. `"info"` or
/// `"kiln_infra=debug,kiln_core=warn"`). When unset, `RUST_LOG` is read,
/// then `info` is used.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

fn builder(config: LoggingConfig) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    match config.env_filter.or_else(|| std::env::var("RUST_LOG").ok()) {
        Some(filter) => {
            builder.parse_filters(&filter);
        }
        None => {
            builder.filter_level(log::LevelFilter::Info);
        }
    }
    builder.write_style(config.write_style);
    builder
}

/// Installs the global logger. Calls after the first one are ignored.
pub fn init_logging(config: LoggingConfig) -> anyhow::Result<()> {
    let mut result = Ok(());
    INIT.call_once(|| {
        result = builder(config)
            .try_init()
            .context("Failed to install the global logger");
        if result.is_ok() {
            log::debug!("Logging initialized");
        }
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialization_is_idempotent() -> anyhow::Result<()> {
        init_logging(LoggingConfig {
            env_filter: Some("kiln_infra=debug".into()),
            write_style: env_logger::WriteStyle::Never,
        })?;
        init_logging(LoggingConfig::default())?;
        log::info!("logger accepts records after repeated initialization");
        Ok(())
    }
}
