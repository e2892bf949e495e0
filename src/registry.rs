use std::collections::HashMap;

use url::Url;

use crate::strategy::{self, Strategy};
use crate::urls::normalized_host;

pub type StrategyConstructor = fn() -> Strategy;

#[derive(Debug, Clone, Default)]
pub struct Registry {
    strategies: HashMap<String, StrategyConstructor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("royalroad.com", strategy::royalroad::strategy);
        registry.register("royalroadl.com", strategy::royalroad::strategy);
        registry.register("archiveofourown.org", strategy::ao3::strategy);
        registry
    }

    pub fn register(&mut self, host: &str, constructor: StrategyConstructor) {
        let host = host.trim().to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host).to_owned();
        self.strategies.insert(host, constructor);
    }

    pub fn resolve(&self, url: &Url) -> Strategy {
        let constructor = normalized_host(url).and_then(|host| self.strategies.get(&host).copied());
        match constructor {
            Some(constructor) => constructor(),
            None => {
                tracing::debug!(%url, "no site strategy registered; using default");
                strategy::default::strategy()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
