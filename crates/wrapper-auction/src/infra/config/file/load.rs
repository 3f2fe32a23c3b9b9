use {
    super::Config,
    crate::{
        adapter::http,
        infra::config::{self, Error},
    },
    std::path::Path,
    tokio::fs,
};

/// Load the configuration from a TOML file.
pub async fn load(path: &Path) -> Result<config::Config, Error> {
    let data = fs::read_to_string(path).await.map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })?;
    parse(&data)
}

/// Parse and validate the TOML configuration.
pub fn parse(data: &str) -> Result<config::Config, Error> {
    let config: Config = toml::de::from_str(data)?;

    if config.timeout.is_zero() {
        return Err(Error::ZeroTimeout("timeout"));
    }
    if config.init_timeout.is_zero() {
        return Err(Error::ZeroTimeout("init-timeout"));
    }

    Ok(config::Config {
        timeout: config.timeout,
        init_timeout: config.init_timeout,
        adapters: config
            .adapters
            .into_iter()
            .filter(|adapter| adapter.enabled)
            .map(|adapter| http::Config {
                library: adapter.library.unwrap_or_else(|| adapter.name.clone()),
                name: adapter.name,
                endpoint: adapter.endpoint,
                ad_units: adapter
                    .slots
                    .into_iter()
                    .map(|(slot, ad_unit)| (slot, ad_unit.into()))
                    .collect(),
            })
            .collect(),
        slots: config
            .slots
            .into_iter()
            .map(|(slot, slot_config)| {
                (
                    slot,
                    config::SlotConfig {
                        sizes: slot_config.sizes,
                        ad_server_slot: slot_config.ad_server_slot,
                    },
                )
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::domain::{SlotId, Size},
        std::time::Duration,
    };

    const EXAMPLE: &str = r#"
        timeout = "800ms"

        [[adapter]]
        name = "alpha"
        endpoint = "http://localhost:8001/bids"
        library = "Alpha Header Bidding"

        [adapter.slots.top]
        code = "alpha-top"
        sizes = ["728x90", "970x250"]
        params = { placement = 42, floor = 0.5 }

        [[adapter]]
        name = "beta"
        enabled = false
        endpoint = "http://localhost:8002/bids"

        [[adapter]]
        name = "gamma"
        endpoint = "http://localhost:8003/bids"

        [adapter.slots.sidebar]
        code = "gamma-sidebar"

        [slots.top]
        sizes = ["728x90"]
        ad-server-slot = "/1234/top"
    "#;

    #[test]
    fn parses_example() {
        let config = parse(EXAMPLE).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(800));
        assert_eq!(config.init_timeout, Duration::from_secs(2));

        let names = config
            .adapters
            .iter()
            .map(|adapter| adapter.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["alpha", "gamma"]);

        let alpha = &config.adapters[0];
        assert_eq!(alpha.library, "Alpha Header Bidding");
        assert_eq!(alpha.endpoint.as_str(), "http://localhost:8001/bids");
        let top = &alpha.ad_units[&SlotId::from("top")];
        assert_eq!(top.code, "alpha-top");
        assert_eq!(top.sizes, [Size::new(728, 90), Size::new(970, 250)]);
        assert_eq!(top.params["placement"], 42);
        assert_eq!(config.adapters[1].library, "gamma");

        let slot = &config.slots[&SlotId::from("top")];
        assert_eq!(slot.sizes, [Size::new(728, 90)]);
        assert_eq!(slot.ad_server_slot.as_deref(), Some("/1234/top"));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.init_timeout, Duration::from_secs(2));
        assert!(config.adapters.is_empty());
        assert!(config.slots.is_empty());
    }

    #[test]
    fn rejects_invalid_configs() {
        assert!(matches!(
            parse("timeuot = \"1s\""),
            Err(Error::Syntax(_))
        ));
        assert!(matches!(
            parse(
                r#"
                [[adapter]]
                name = "alpha"
                endpoint = "http://localhost"
                [adapter.slots.top]
                code = "top"
                sizes = ["large"]
                "#
            ),
            Err(Error::Syntax(_))
        ));
        assert!(matches!(
            parse("timeout = \"0s\""),
            Err(Error::ZeroTimeout("timeout"))
        ));
        assert!(matches!(
            parse("init-timeout = \"0s\""),
            Err(Error::ZeroTimeout("init-timeout"))
        ));
    }

    #[tokio::test]
    async fn loads_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), EXAMPLE).await.unwrap();
        let config = load(file.path()).await.unwrap();
        assert_eq!(config.adapters.len(), 2);

        let missing = file.path().with_extension("missing");
        assert!(matches!(load(&missing).await, Err(Error::Io { .. })));
    }
}
