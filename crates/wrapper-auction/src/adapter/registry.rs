use {super::Adapter, std::sync::Arc, tokio::sync::OnceCell};

/// Raised when two adapters with the same name get registered. This is a
/// setup error and should stop the process from starting.
#[derive(Debug, thiserror::Error)]
#[error("an adapter named {name:?} is already registered")]
pub struct DuplicateAdapter {
    pub name: String,
}

/// A registered adapter together with its initialization state.
pub(crate) struct Registered {
    pub name: String,
    pub adapter: Arc<dyn Adapter>,
    /// Set once `init` succeeded. Concurrent auctions needing the adapter
    /// wait on the same initialization.
    pub initialized: OnceCell<()>,
}

/// All adapters of the process, in registration order.
///
/// Adapters are registered during startup. Afterwards the registry is handed
/// to the orchestrator, which only reads from it.
#[derive(Default)]
pub struct Registry {
    adapters: Vec<Registered>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn Adapter>) -> Result<(), DuplicateAdapter> {
        let name = adapter.name().to_owned();
        if self.get(&name).is_some() {
            return Err(DuplicateAdapter { name });
        }
        tracing::debug!(adapter = %name, "registered adapter");
        self.adapters.push(Registered {
            name,
            adapter,
            initialized: OnceCell::new(),
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Adapter>> {
        self.adapters
            .iter()
            .find(|registered| registered.name == name)
            .map(|registered| &registered.adapter)
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Adapter>> {
        self.adapters.iter().map(|registered| &registered.adapter)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.adapters.iter().map(|registered| registered.name.as_str())
    }

    /// Whether the adapter was successfully initialized by the orchestrator.
    pub fn is_initialized(&self, name: &str) -> bool {
        self.adapters
            .iter()
            .any(|registered| registered.name == name && registered.initialized.initialized())
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub(crate) fn entries(&self) -> &[Registered] {
        &self.adapters
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
