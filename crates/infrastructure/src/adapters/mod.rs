//! Infrastructure adapters

mod clock;
mod reqwest_client;

pub use clock::{ManualClock, SystemClock};
pub use reqwest_client::{
    DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, ReqwestApiClient, ReqwestApiClientBuilder,
};

pub(crate) use reqwest_client::parse_base_url;
