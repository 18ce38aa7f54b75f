pub mod generation_client;
pub mod transport;

pub use generation_client::*;
pub use transport::*;
