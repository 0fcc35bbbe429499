// crates/network/src/lib.rs
//! Outbound HTTP with circuit breaking and retries

mod client;
mod error;

pub use client::{Client, ClientConfig};
pub use error::{NetworkError, NetworkResult};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_exports_accessible() {
        let client = Client::new().expect("Failed to create client");
        let _: Client = client.clone();
        let _: NetworkResult<()> = Err(NetworkError::Timeout);
    }
}
