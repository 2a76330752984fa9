// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use crate::error::ValidationError;

/// User-Agent sent with every request. Some feed hosts answer 406 without one.
pub const DEFAULT_USER_AGENT: &str = concat!("podcatch/", env!("CARGO_PKG_VERSION"));

/// Upper bound for concurrent downloads
pub const MAX_CONCURRENT_LIMIT: usize = 8;

/// Runtime configuration, passed explicitly to the HTTP client and the pipeline
#[derive(Debug, Clone)]
pub struct Config {
    /// Value of the User-Agent header
    pub user_agent: String,
    /// Timeout for establishing a TCP/TLS connection
    pub connect_timeout: Duration,
    /// Timeout for fetching the whole feed document
    pub feed_timeout: Duration,
    /// Timeout for the audio response headers and for each body chunk
    pub download_timeout: Duration,
    /// Timeout for fetching an artwork image
    pub artwork_timeout: Duration,
    /// Maximum number of concurrent downloads
    pub max_concurrent: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(10),
            feed_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(60),
            artwork_timeout: Duration::from_secs(20),
            max_concurrent: 3,
        }
    }
}

impl Config {
    /// Check that the configuration describes a bounded, usable run
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_concurrent == 0 || self.max_concurrent > MAX_CONCURRENT_LIMIT {
            return Err(ValidationError::ConcurrencyOutOfRange {
                value: self.max_concurrent,
                max: MAX_CONCURRENT_LIMIT,
            });
        }
        Ok(())
    }
}
