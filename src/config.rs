use serde::Deserialize;

/// Connection settings for [`SuiRpcClient`](crate::rpc::SuiRpcClient).
///
/// ```yaml
/// endpoint: https://fullnode.testnet.sui.io:443
/// retries: 3
/// page_limit: 50
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcConfig {
    pub endpoint: String,
    /// Attempts per request, at least one.
    #[serde(default = "default_retries")]
    pub retries: u64,
    /// Page size hint; the node picks its own default when absent.
    #[serde(default)]
    pub page_limit: Option<usize>,
}

fn default_retries() -> u64 {
    3
}

impl RpcConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            retries: default_retries(),
            page_limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::RpcConfig;

    #[test]
    fn defaults() {
        let config: RpcConfig = serde_yaml::from_str("endpoint: http://localhost:9000\n").unwrap();
        assert_eq!(config.endpoint, "http://localhost:9000");
        assert_eq!(config.retries, 3);
        assert_eq!(config.page_limit, None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let config = serde_yaml::from_str::<RpcConfig>(
            "endpoint: http://localhost:9000\nretries: 1\npage_size: 10\n",
        );
        assert!(config.is_err());
    }
}
