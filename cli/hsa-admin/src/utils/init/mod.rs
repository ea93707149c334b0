mod api_client;
mod logger;

pub use api_client::*;
pub use logger::*;
