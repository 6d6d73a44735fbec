use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use crate::api::{FeedClient, FeedUrls, DEFAULT_ROUTES_URL, DEFAULT_VEHICLES_URL};
use crate::fetch::{HttpTransport, RetryPolicy};
use crate::filter::{DelayFilter, FilterCriteria, TypeFilter};
use crate::refresh::RefreshSettings;

/// Live bus and tram positions
#[derive(Clone, Debug, Parser)]
#[command(version)]
pub struct Config {
    /// Vehicle position feed
    #[arg(long, default_value = DEFAULT_VEHICLES_URL)]
    pub vehicles_url: String,

    /// Route reference dataset
    #[arg(long, default_value = DEFAULT_ROUTES_URL)]
    pub routes_url: String,

    /// Relay that receives the upstream URL as a query parameter
    #[arg(long)]
    pub relay: Option<String>,

    #[arg(long, default_value = "url")]
    pub relay_param: String,

    #[arg(long, default_value_t = 5000)]
    pub period_ms: u64,

    #[arg(long, default_value_t = 2)]
    pub max_retries: u32,

    #[arg(long, default_value_t = 500)]
    pub base_delay_ms: u64,

    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    /// Comma-separated lines to show, e.g. "2, 115, N1"
    #[arg(long, default_value = "")]
    pub lines: String,

    #[arg(long, value_enum, default_value_t = TypeFilter::All)]
    pub kind: TypeFilter,

    #[arg(long, value_enum, default_value_t = DelayFilter::All)]
    pub delay: DelayFilter,
}

impl Config {
    pub fn feed_urls(&self) -> FeedUrls {
        let urls = FeedUrls::new(&self.vehicles_url, &self.routes_url);
        match &self.relay {
            Some(relay) => urls.with_relay(relay, &self.relay_param),
            None => urls,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.base_delay_ms))
    }

    pub fn refresh_settings(&self) -> RefreshSettings {
        RefreshSettings {
            period: Duration::from_millis(self.period_ms),
        }
    }

    pub fn initial_criteria(&self) -> FilterCriteria {
        FilterCriteria::new(&self.lines, self.kind, self.delay)
    }

    pub fn build_client(&self) -> Result<FeedClient> {
        let transport = HttpTransport::new(Duration::from_secs(self.timeout_secs));
        FeedClient::new(transport, &self.feed_urls(), self.retry_policy())
    }
}
