//! Template registry for storing and retrieving raw templates
//!
//! The registry is append-only. Its contents live in an immutable
//! [`RegistrySnapshot`] behind a lock; registration copies the snapshot on
//! write, so readers that took a snapshot keep a consistent view.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::definition::{ExtendMode, Template};
use super::error::RegistryError;

/// Receipt for a registered template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateHandle {
    id: String,
    sequence: usize,
    mode: Option<ExtendMode>,
}

impl TemplateHandle {
    /// Id the template was registered under
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Position in registration order
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    /// Extension mode, or `None` for a root template
    pub fn mode(&self) -> Option<ExtendMode> {
        self.mode
    }
}

/// Immutable view of the registry at one generation
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    entries: Vec<Arc<Template>>,
    /// id -> entry index of its root or copy definition
    definitions: HashMap<String, usize>,
    /// target id -> entry indices of its in-place layers
    layers: HashMap<String, Vec<usize>>,
    /// Distinct ids in the order they were first registered
    ids: Vec<String>,
    generation: u64,
}

impl RegistrySnapshot {
    /// Get the root or copy definition of an id
    pub fn get(&self, id: &str) -> Result<Arc<Template>, RegistryError> {
        self.definitions
            .get(id)
            .map(|&index| self.entries[index].clone())
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })
    }

    /// Check if an id has a root or copy definition
    pub fn contains(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    /// In-place layers of an id, in application order
    ///
    /// Ascending priority; equal priorities keep registration order.
    pub fn layers(&self, id: &str) -> Vec<Arc<Template>> {
        let Some(indices) = self.layers.get(id) else {
            return Vec::new();
        };
        let mut ordered: Vec<(i32, usize)> = indices
            .iter()
            .map(|&index| {
                let priority = self.entries[index]
                    .extend()
                    .map(|e| e.priority)
                    .unwrap_or_default();
                (priority, index)
            })
            .collect();
        ordered.sort();
        ordered
            .into_iter()
            .map(|(_, index)| self.entries[index].clone())
            .collect()
    }

    pub fn has_layers(&self, id: &str) -> bool {
        self.layers.contains_key(id)
    }

    /// Ids in registration order, including ids only targeted by layers
    pub fn list_ids(&self) -> &[String] {
        &self.ids
    }

    /// Every raw template in registration order
    pub fn templates(&self) -> &[Arc<Template>] {
        &self.entries
    }

    /// Incremented by every successful registration call
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate a batch against current contents and against itself
    fn check(&self, templates: &[Template]) -> Result<(), RegistryError> {
        let mut batch: Vec<&str> = Vec::new();
        for template in templates {
            if template.id.trim().is_empty() {
                return Err(RegistryError::EmptyId);
            }
            if let Some(extend) = template.extend() {
                if extend.mode == ExtendMode::InPlace && extend.target != template.id {
                    return Err(RegistryError::InPlaceTargetMismatch {
                        id: template.id.clone(),
                        target: extend.target.clone(),
                    });
                }
            }
            if template.is_layer() {
                continue;
            }
            if self.contains(&template.id) || batch.contains(&template.id.as_str()) {
                return Err(RegistryError::DuplicateId {
                    id: template.id.clone(),
                });
            }
            batch.push(&template.id);
        }
        Ok(())
    }

    /// Whether a layer of the same target already has this layer's priority
    fn shares_priority(&self, template: &Template) -> bool {
        let Some(extend) = template.extend().filter(|_| template.is_layer()) else {
            return false;
        };
        self.layers.get(&template.id).is_some_and(|indices| {
            indices.iter().any(|&index| {
                self.entries[index].extend().map(|e| e.priority) == Some(extend.priority)
            })
        })
    }

    fn insert(&mut self, template: Template) -> TemplateHandle {
        let sequence = self.entries.len();
        let id = template.id.clone();
        let mode = template.extend().map(|e| e.mode);

        if !self.definitions.contains_key(&id) && !self.layers.contains_key(&id) {
            self.ids.push(id.clone());
        }
        if template.is_layer() {
            self.layers.entry(id.clone()).or_default().push(sequence);
        } else {
            self.definitions.insert(id.clone(), sequence);
        }
        self.entries.push(Arc::new(template));

        TemplateHandle { id, sequence, mode }
    }
}

/// Registry for storing raw templates, safe to share between threads
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    state: RwLock<Arc<RegistrySnapshot>>,
}

impl TemplateRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single template
    pub fn register(&self, template: Template) -> Result<TemplateHandle, RegistryError> {
        let mut handles = self.register_all(vec![template])?;
        Ok(handles.remove(0))
    }

    /// Register a batch of templates atomically
    ///
    /// Either every template is registered or, on error, none is.
    pub fn register_all(
        &self,
        templates: Vec<Template>,
    ) -> Result<Vec<TemplateHandle>, RegistryError> {
        let mut state = self.state.write();
        state.check(&templates)?;
        if templates.is_empty() {
            return Ok(Vec::new());
        }

        let next = Arc::make_mut(&mut *state);
        let handles: Vec<_> = templates
            .into_iter()
            .map(|template| {
                if next.shares_priority(&template) {
                    warn!(
                        "Layers on '{}' share priority {}; they apply in registration order",
                        template.id,
                        template.extend().map(|e| e.priority).unwrap_or_default()
                    );
                }
                let handle = next.insert(template);
                debug!(
                    "Registered template '{}' ({})",
                    handle.id(),
                    handle.mode().map(|m| m.as_str()).unwrap_or("root")
                );
                handle
            })
            .collect();
        next.generation += 1;

        Ok(handles)
    }

    /// Current contents
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.state.read().clone()
    }

    /// Get a template definition by id
    pub fn get(&self, id: &str) -> Result<Arc<Template>, RegistryError> {
        self.state.read().get(id)
    }

    /// Check if a template definition exists
    pub fn contains(&self, id: &str) -> bool {
        self.state.read().contains(id)
    }

    /// In-place layers of an id, in application order
    pub fn layers(&self, id: &str) -> Vec<Arc<Template>> {
        self.state.read().layers(id)
    }

    /// Ids in registration order
    pub fn list_ids(&self) -> Vec<String> {
        self.state.read().list_ids().to_vec()
    }

    pub fn generation(&self) -> u64 {
        self.state.read().generation()
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }

    /// Independent registry starting with the same templates
    pub fn fork(&self) -> Self {
        Self {
            state: RwLock::new(self.snapshot()),
        }
    }
}
