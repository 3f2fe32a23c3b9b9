//! The process wide prometheus registry all metric storages register with.

use {prometheus_metric_storage::StorageRegistry, std::sync::OnceLock};

static REGISTRY: OnceLock<StorageRegistry> = OnceLock::new();

/// Installs the process wide registry. Every metric name gets `prefix`
/// prepended.
///
/// # Panics
///
/// Panics if a registry is installed already. This includes the unprefixed
/// fallback [`get_storage_registry`] installs, so call this first thing in
/// `main`.
pub fn setup_registry(prefix: &str) {
    if REGISTRY.set(storage(prefix)).is_err() {
        panic!("metrics registry was already configured");
    }
}

/// Like [`setup_registry`] but keeps the existing registry if there is one.
/// Meant for tests sharing one process.
pub fn setup_registry_reentrant(prefix: &str) {
    let _ = REGISTRY.set(storage(prefix));
}

fn storage(prefix: &str) -> StorageRegistry {
    let registry = prometheus::Registry::new_custom(Some(prefix.to_owned()), None)
        .unwrap_or_else(|err| panic!("invalid metrics prefix {prefix:?}: {err}"));
    StorageRegistry::new(registry)
}

pub fn get_registry() -> &'static prometheus::Registry {
    get_storage_registry().registry()
}

/// The installed registry. Falls back to an unprefixed one so that unit tests
/// can record metrics without any setup.
pub fn get_storage_registry() -> &'static StorageRegistry {
    REGISTRY.get_or_init(StorageRegistry::default)
}

/// Renders every metric of the registry in the prometheus text format.
pub fn encode(registry: &prometheus::Registry) -> String {
    prometheus::TextEncoder::new()
        .encode_to_string(&registry.gather())
        .unwrap_or_else(|err| format!("# failed to encode metrics: {err}\n"))
}
