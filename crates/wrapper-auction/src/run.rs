use {
    crate::{
        adapter::{DuplicateAdapter, Registry, http::HttpAdapter},
        domain::{AggregatedSlotResult, PageContext, SlotId},
        infra::{self, cli, config, observe},
        orchestrator::{AdapterState, Options, Orchestrator},
    },
    anyhow::Context,
    clap::Parser,
    serde::Serialize,
    std::{collections::HashMap, sync::Arc},
};

pub async fn start(args: impl Iterator<Item = String>) {
    let args = cli::Args::parse_from(args);
    observe::init(
        &::observe::Config::new(&args.log_filter)
            .with_stderr_threshold(args.log_stderr_threshold)
            .with_format(if args.use_json_logs {
                ::observe::Format::Json
            } else {
                ::observe::Format::Text
            }),
    );
    tracing::info!("running wrapper auction with validated arguments:\n{}", args);

    let report = run(&args)
        .await
        .and_then(|report| Ok(serde_json::to_string_pretty(&report)?));
    observe::metrics_snapshot();
    match report {
        Ok(json) => println!("{json}"),
        Err(err) => {
            tracing::error!(?err, "auction failed");
            std::process::exit(1);
        }
    }
}

/// Outcome of a single auction run of the binary.
#[derive(Debug, Serialize)]
pub struct Report {
    pub results: HashMap<SlotId, AggregatedSlotResult>,
    pub adapters: Vec<AdapterState>,
}

/// Loads the configuration, registers the configured adapters and auctions
/// the requested slots once.
pub async fn run(args: &cli::Args) -> anyhow::Result<Report> {
    let config = config::load(&args.config)
        .await
        .with_context(|| format!("failed to load {:?}", args.config))?;
    let orchestrator = orchestrator(&config)?;

    orchestrator
        .run_auction(
            args.slots.iter().map(|slot| SlotId::from(slot.as_str())),
            &page_context(args, &config),
            &options(args, &config),
        )
        .await;

    Ok(Report {
        results: orchestrator.store().get_all(),
        adapters: orchestrator.adapters_state(),
    })
}

/// Registers every enabled adapter of the configuration.
pub fn orchestrator(config: &infra::Config) -> Result<Orchestrator, DuplicateAdapter> {
    let mut registry = Registry::new();
    for adapter in &config.adapters {
        registry.register(Arc::new(HttpAdapter::new(adapter.clone())))?;
    }
    Ok(Orchestrator::new(registry))
}

fn options(args: &cli::Args, config: &infra::Config) -> Options {
    let options = Options::new(args.timeout.unwrap_or(config.timeout))
        .with_init_timeout(config.init_timeout);
    if args.include_adapters.is_empty() {
        options
    } else {
        options.with_included_adapters(&args.include_adapters)
    }
}

fn page_context(args: &cli::Args, config: &infra::Config) -> PageContext {
    PageContext {
        dimensions: args
            .dimensions
            .iter()
            .map(|dimension| (dimension.key.clone(), dimension.value.clone()))
            .collect(),
        viewport: args.viewport.clone(),
        page_id: args.page_id.clone(),
        site_id: args.site_id.clone(),
        zone_id: args.zone_id.clone(),
        refresh: args.refresh,
        slot_sizes: config
            .slots
            .iter()
            .map(|(slot, slot_config)| (slot.clone(), slot_config.sizes.clone()))
            .collect(),
        ad_server_slots: config
            .slots
            .iter()
            .filter_map(|(slot, slot_config)| {
                Some((slot.clone(), slot_config.ad_server_slot.clone()?))
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_adapters() {
        let config = config::parse(
            r#"
            [[adapter]]
            name = "alpha"
            endpoint = "http://localhost:8001"

            [[adapter]]
            name = "alpha"
            endpoint = "http://localhost:8002"
            "#,
        )
        .unwrap();
        let err = orchestrator(&config).err().unwrap();
        assert_eq!(err.name, "alpha");
    }

    #[test]
    fn builds_page_context_from_arguments_and_config() {
        let config = config::parse(
            r#"
            [slots.top]
            sizes = ["728x90"]
            ad-server-slot = "/1234/top"
            "#,
        )
        .unwrap();
        let args = cli::Args::parse_from([
            "wrapper-auction",
            "--config",
            "auction.toml",
            "--slot",
            "top",
            "--dimension",
            "geo=de,pagetype=",
            "--include-adapter",
            "alpha",
        ]);

        let context = page_context(&args, &config);
        assert_eq!(context.dimensions["geo"].as_deref(), Some("de"));
        assert_eq!(context.dimensions["pagetype"], None);
        assert_eq!(context.ad_server_slots[&SlotId::from("top")], "/1234/top");

        let options = options(&args, &config);
        assert_eq!(options.timeout, config.timeout);
        assert!(options.include_adapters.unwrap().contains("alpha"));
    }
}
