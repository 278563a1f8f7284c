use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NetworkConfig {
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    #[serde(default = "default_tcp_nodelay")]
    pub tcp_nodelay: bool,

    #[serde(default = "default_tcp_keepalive_in_secs")]
    pub tcp_keepalive_in_secs: u64,

    #[serde(default = "default_http2_keep_alive_interval_in_secs")]
    pub http2_keep_alive_interval_in_secs: u64,

    #[serde(default = "default_http2_keep_alive_timeout_in_secs")]
    pub http2_keep_alive_timeout_in_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            tcp_nodelay: default_tcp_nodelay(),
            tcp_keepalive_in_secs: default_tcp_keepalive_in_secs(),
            http2_keep_alive_interval_in_secs: default_http2_keep_alive_interval_in_secs(),
            http2_keep_alive_timeout_in_secs: default_http2_keep_alive_timeout_in_secs(),
        }
    }
}

fn default_concurrency_limit() -> usize {
    1024
}

fn default_tcp_nodelay() -> bool {
    true
}

fn default_tcp_keepalive_in_secs() -> u64 {
    300
}

fn default_http2_keep_alive_interval_in_secs() -> u64 {
    300
}

fn default_http2_keep_alive_timeout_in_secs() -> u64 {
    20
}
