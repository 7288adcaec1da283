use async_trait::async_trait;
use futures::future::join_all;
use sideload_platform::EndpointDiscovery;
use sideload_types::Endpoint;
use std::time::Duration;
use tokio::net::TcpStream;

/// Discovers helpers from a fixed list by probing each with a TCP connect
pub struct StaticDiscovery {
    endpoints: Vec<Endpoint>,
    probe_timeout: Duration,
}

impl StaticDiscovery {
    #[must_use]
    pub fn new(endpoints: Vec<Endpoint>, probe_timeout: Duration) -> Self {
        Self {
            endpoints,
            probe_timeout,
        }
    }

    async fn reachable(&self, endpoint: &Endpoint) -> bool {
        matches!(
            tokio::time::timeout(self.probe_timeout, TcpStream::connect(endpoint.address())).await,
            Ok(Ok(_))
        )
    }
}

#[async_trait]
impl EndpointDiscovery for StaticDiscovery {
    async fn discovered_endpoints(&self) -> Vec<Endpoint> {
        let probes = join_all(self.endpoints.iter().map(|ep| self.reachable(ep))).await;
        self.endpoints
            .iter()
            .zip(probes)
            .filter_map(|(endpoint, up)| up.then(|| endpoint.clone()))
            .collect()
    }
}
