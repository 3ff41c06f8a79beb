pub mod models;
pub mod preferences;
pub mod proxy_client;
pub mod service;

pub use preferences::PreferenceStore;
pub use proxy_client::{ProxyClient, ProxyError};
pub use service::{RecognitionError, RecognitionService};
