use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BridgeConfig {
    /// Namespace the bridge registers into and watches. Empty spans all
    /// namespaces.
    #[serde(default)]
    pub namespace: String,

    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            listen_address: default_listen_address(),
        }
    }
}

fn default_listen_address() -> String {
    "0.0.0.0:50051".to_string()
}
