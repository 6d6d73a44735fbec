pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod models;
pub mod refresh;
pub mod state;

pub use api::{FeedClient, FeedUrls};
pub use classifier::{build_route_reference, classify_short_name, RouteReference};
pub use config::Config;
pub use error::{ClassifierError, FetchError, RefreshError};
pub use fetch::{fetch_with_retry, FeedResponse, HttpTransport, RetryPolicy, Transport};
pub use filter::{apply, DelayFilter, FilterCriteria, FilterResult, FilterUpdate, TypeFilter};
pub use models::{RawVehicleRecord, Vehicle, VehicleFeed, VehicleKind};
pub use refresh::{start_pipeline, RefreshHandle, RefreshSettings, RefreshState};
pub use state::AppState;
