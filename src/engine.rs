//! Template engine: loading, compiling and cataloguing templates
//!
//! The engine owns a registry and the cache compiled from it. Every method
//! takes `&self`, so one engine can be shared between threads behind an
//! `Arc`.

use std::sync::Arc;

use tracing::{info, warn};

use crate::catalog::{CatalogCollector, CatalogEntry};
use crate::config::{ConfigError, EngineConfig};
use crate::parser::parse_named_source;
use crate::template::{
    CacheStats, Outcome, RegistryError, Template, TemplateCache, TemplateHandle, TemplateRegistry,
};
use crate::LoadError;

/// Source name used when none is given
const MEMORY_SOURCE: &str = "<memory>";

#[derive(Debug)]
pub struct TemplateEngine {
    config: EngineConfig,
    registry: Arc<TemplateRegistry>,
    cache: TemplateCache,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Create an empty engine with the default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_registry(config, Arc::new(TemplateRegistry::new()))
    }

    /// Create an engine over an existing registry
    pub fn with_registry(config: EngineConfig, registry: Arc<TemplateRegistry>) -> Self {
        Self {
            config,
            cache: TemplateCache::new(registry.clone()),
            registry,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        &self.registry
    }

    /// Parse and register every template in `source`
    ///
    /// On any error nothing from `source` is registered.
    pub fn register_template_source(&self, source: &str) -> Result<Vec<TemplateHandle>, LoadError> {
        self.register_named_source(MEMORY_SOURCE, source)
    }

    /// Like [`register_template_source`](Self::register_template_source),
    /// recording `name` as the origin of the templates
    pub fn register_named_source(
        &self,
        name: &str,
        source: &str,
    ) -> Result<Vec<TemplateHandle>, LoadError> {
        let templates = parse_named_source(name, source, &self.config)?;
        let handles = self.registry.register_all(templates)?;
        info!("Loaded {} template(s) from {}", handles.len(), name);
        Ok(handles)
    }

    /// Register a template built in code
    pub fn register(&self, template: Template) -> Result<TemplateHandle, RegistryError> {
        self.registry.register(template)
    }

    /// Compiled template for `id`
    pub fn compile(&self, id: &str) -> Outcome {
        self.cache.compile(id)
    }

    /// Compile every registered id, dependencies first
    pub fn compile_all(&self) -> Vec<(String, Outcome)> {
        let order = match self.cache.compile_order() {
            Ok(order) => order,
            Err(err) => {
                warn!("{}; compiling in registration order", err);
                self.registry.list_ids()
            }
        };
        order
            .into_iter()
            .map(|id| {
                let outcome = self.compile(&id);
                (id, outcome)
            })
            .collect()
    }

    /// Translatable literals of every raw template, in registration order
    pub fn export_catalog(&self) -> Result<Vec<CatalogEntry>, ConfigError> {
        let collector = CatalogCollector::new(&self.config)?;
        Ok(self
            .registry
            .snapshot()
            .templates()
            .iter()
            .flat_map(|template| collector.collect_template(template))
            .collect())
    }

    /// Drop all compiled templates; registered templates are kept
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Registered ids in registration order
    pub fn list_ids(&self) -> Vec<String> {
        self.registry.list_ids()
    }

    /// New engine starting with this engine's templates and an empty cache
    ///
    /// Templates registered on either engine afterwards are not seen by the other.
    pub fn fork(&self) -> Self {
        Self::with_registry(self.config.clone(), Arc::new(self.registry.fork()))
    }
}
