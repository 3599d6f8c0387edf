use std::collections::HashMap;
use std::sync::Arc;

use crate::{FundingProvider, Platform};

/// Platform to adapter lookup used by the orchestrator.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Platform, Arc<dyn FundingProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` under its own platform, replacing any earlier
    /// adapter for that platform.
    pub fn register(&mut self, provider: Arc<dyn FundingProvider>) -> &mut Self {
        self.providers.insert(provider.platform(), provider);
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn FundingProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<&Arc<dyn FundingProvider>> {
        self.providers.get(&platform)
    }

    /// Registered platforms in declaration order.
    pub fn platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .iter()
            .copied()
            .filter(|platform| self.providers.contains_key(platform))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("platforms", &self.platforms())
            .finish()
    }
}
