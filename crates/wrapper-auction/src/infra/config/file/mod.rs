pub use load::{load, parse};
use {
    crate::{
        adapter::AdUnit,
        domain::{SlotId, Size},
    },
    serde::Deserialize,
    std::{collections::HashMap, time::Duration},
    url::Url,
};

mod load;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct Config {
    /// Default timeout of an auction. Can be overridden per run.
    #[serde(with = "humantime_serde", default = "default_timeout")]
    timeout: Duration,

    /// Maximum time a single adapter may spend in its initialization.
    #[serde(with = "humantime_serde", default = "default_init_timeout")]
    init_timeout: Duration,

    #[serde(rename = "adapter", default)]
    adapters: Vec<AdapterConfig>,

    #[serde(default)]
    slots: HashMap<SlotId, SlotConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct AdapterConfig {
    /// Unique name of the adapter. Doubles as the bidder code of its bids.
    name: String,

    /// Disabled adapters are not registered at all.
    #[serde(default = "default_enabled")]
    enabled: bool,

    /// URL the bid requests are posted to.
    endpoint: Url,

    /// Display name of the vendor library. Defaults to the adapter name.
    library: Option<String>,

    /// Ad units by slot. Slots without an entry are not served by the
    /// adapter.
    #[serde(default)]
    slots: HashMap<SlotId, AdUnitConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct AdUnitConfig {
    code: String,
    #[serde(default)]
    sizes: Vec<Size>,
    /// Free-form parameters forwarded to the bidder.
    #[serde(default)]
    params: serde_json::Value,
}

impl From<AdUnitConfig> for AdUnit {
    fn from(config: AdUnitConfig) -> Self {
        Self {
            code: config.code,
            sizes: config.sizes,
            params: config.params,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct SlotConfig {
    #[serde(default)]
    sizes: Vec<Size>,
    ad_server_slot: Option<String>,
}

fn default_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_init_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_enabled() -> bool {
    true
}
