use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

/// Point-in-time network check.
#[async_trait]
pub trait ReachabilityChecker: Send + Sync {
    async fn is_connected(&self) -> bool;
}

/// Considers the network up when a TCP connection to `address` succeeds
/// within the timeout.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ReachabilityChecker for TcpProbe {
    async fn is_connected(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(self.address.as_str())).await
        {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!("Reachability probe to {} failed: {}", self.address, e);
                false
            }
            Err(_) => {
                tracing::debug!(
                    "Reachability probe to {} timed out after {:?}",
                    self.address,
                    self.timeout
                );
                false
            }
        }
    }
}
