/// Configuration of the bridge's event loop thread.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BridgeConfig {
    /// Name of the event loop thread. Default: `ble-bridge`.
    pub thread_name: String,
    /// Stack size of the event loop thread; `None` uses the platform default.
    pub stack_size: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            thread_name: "ble-bridge".into(),
            stack_size: None,
        }
    }
}

impl BridgeConfig {
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }
}
