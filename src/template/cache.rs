//! Compiled template cache
//!
//! Compiling an id resolves its extend chain, includes and in-place layers
//! into one tree. The outcome, success or error, is stored per id and
//! handed to every later caller. Each id has a [`OnceCell`] slot, so
//! concurrent first lookups of the same id run a single resolution while
//! the others wait for its result.
//!
//! Slots belong to a generation built from one registry snapshot. When
//! the registry gains templates the next lookup starts a fresh generation,
//! which drops every stored outcome at once. Resolutions already running
//! finish against the snapshot they started with.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::tree::{to_markup, Node};

use super::definition::{ExtendMode, Origin, PatchDirective, Template, TemplateBody};
use super::error::ResolutionError;
use super::patch::{apply_patch, contains_include, expand_includes};
use super::registry::{RegistrySnapshot, TemplateRegistry};
use super::resolver::ExtendGraph;

/// A raw template that contributed to a compiled tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributor {
    pub id: String,
    /// `None` for the root template
    pub mode: Option<ExtendMode>,
    pub origin: Origin,
}

impl From<&Template> for Contributor {
    fn from(template: &Template) -> Self {
        Self {
            id: template.id.clone(),
            mode: template.extend().map(|e| e.mode),
            origin: template.origin.clone(),
        }
    }
}

/// A fully resolved template, free of patch directives and includes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    pub id: String,
    pub tree: Vec<Node>,
    /// Raw templates in the order they were applied
    pub contributors: Vec<Contributor>,
}

impl CompiledTemplate {
    pub fn to_markup(&self) -> String {
        to_markup(&self.tree)
    }
}

/// Stored result of compiling one id
pub type Outcome = Result<Arc<CompiledTemplate>, ResolutionError>;

/// Counters describing cache activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Resolutions actually run
    pub resolutions: u64,
    /// Lookups answered from a stored outcome
    pub hits: u64,
    /// Registry generation the cache currently serves
    pub generation: u64,
    /// Outcomes stored in the current generation
    pub cached: usize,
}

/// Cache state tied to one registry snapshot
#[derive(Debug)]
struct Generation {
    snapshot: Arc<RegistrySnapshot>,
    graph: OnceCell<ExtendGraph>,
    slots: RwLock<HashMap<String, Arc<OnceCell<Outcome>>>>,
}

impl Generation {
    fn new(snapshot: Arc<RegistrySnapshot>) -> Self {
        Self {
            snapshot,
            graph: OnceCell::new(),
            slots: RwLock::new(HashMap::new()),
        }
    }

    fn graph(&self) -> &ExtendGraph {
        self.graph.get_or_init(|| ExtendGraph::build(&self.snapshot))
    }

    fn slot(&self, id: &str) -> Arc<OnceCell<Outcome>> {
        if let Some(slot) = self.slots.read().get(id) {
            return slot.clone();
        }
        self.slots
            .write()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    fn cached(&self) -> usize {
        self.slots.read().values().filter(|s| s.get().is_some()).count()
    }
}

/// Lazily compiled templates over a shared registry
#[derive(Debug)]
pub struct TemplateCache {
    registry: Arc<TemplateRegistry>,
    current: RwLock<Arc<Generation>>,
    resolutions: AtomicU64,
    hits: AtomicU64,
}

impl TemplateCache {
    pub fn new(registry: Arc<TemplateRegistry>) -> Self {
        let generation = Generation::new(registry.snapshot());
        Self {
            registry,
            current: RwLock::new(Arc::new(generation)),
            resolutions: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        &self.registry
    }

    /// Compile `id`, or return its stored outcome
    pub fn compile(&self, id: &str) -> Outcome {
        let generation = self.generation();
        self.compile_in(&generation, id)
    }

    /// Order in which ids can be compiled, dependencies first
    pub fn compile_order(&self) -> Result<Vec<String>, ResolutionError> {
        self.generation().graph().compile_order()
    }

    /// Drop every stored outcome; the registry is left as is
    pub fn invalidate_all(&self) {
        let snapshot = self.registry.snapshot();
        info!(
            "Invalidating compiled templates (generation {})",
            snapshot.generation()
        );
        *self.current.write() = Arc::new(Generation::new(snapshot));
    }

    pub fn stats(&self) -> CacheStats {
        let current = self.current.read().clone();
        CacheStats {
            resolutions: self.resolutions.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            generation: current.snapshot.generation(),
            cached: current.cached(),
        }
    }

    /// Current generation, replaced first if the registry moved on
    fn generation(&self) -> Arc<Generation> {
        let latest = self.registry.generation();
        {
            let current = self.current.read();
            if current.snapshot.generation() == latest {
                return current.clone();
            }
        }
        self.refresh()
    }

    /// Swap in a generation for the registry's current snapshot if ours is older
    fn refresh(&self) -> Arc<Generation> {
        let mut current = self.current.write();
        // Read under the lock: another caller may already have swapped
        let snapshot = self.registry.snapshot();
        if current.snapshot.generation() < snapshot.generation() {
            debug!(
                "Registry changed (generation {} -> {}), dropping compiled templates",
                current.snapshot.generation(),
                snapshot.generation()
            );
            *current = Arc::new(Generation::new(snapshot));
        }
        current.clone()
    }

    fn compile_in(&self, generation: &Generation, id: &str) -> Outcome {
        // Unknown ids get no slot, so arbitrary lookups cannot grow the cache
        let snapshot = &generation.snapshot;
        if !snapshot.contains(id) && !snapshot.has_layers(id) {
            return Err(ResolutionError::not_found(id));
        }
        let slot = generation.slot(id);
        if let Some(outcome) = slot.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return outcome.clone();
        }
        slot.get_or_init(|| self.resolve(generation, id)).clone()
    }

    fn resolve(&self, generation: &Generation, id: &str) -> Outcome {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        debug!("Resolving template '{}'", id);

        let outcome = self.build(generation, id).map(Arc::new);
        match &outcome {
            Ok(compiled) => debug!(
                "Compiled template '{}' from {} source(s)",
                id,
                compiled.contributors.len()
            ),
            Err(err) => warn!("Template '{}' failed to compile: {}", id, err),
        }
        outcome
    }

    fn build(&self, generation: &Generation, id: &str) -> Result<CompiledTemplate, ResolutionError> {
        generation.graph().check_from(id)?;
        let snapshot = &generation.snapshot;
        let template = snapshot
            .get(id)
            .map_err(|_| ResolutionError::not_found(id))?;

        let mut include = |target: &str| {
            self.compile_in(generation, target)
                .map(|compiled| compiled.tree.clone())
        };

        let mut contributors = Vec::new();
        let mut tree = match &template.body {
            TemplateBody::Markup(content) => {
                let mut tree = content.clone();
                expand_includes(&mut tree, &mut include)?;
                tree
            }
            TemplateBody::Patch { extend, directives } => {
                let base = self.compile_in(generation, &extend.target)?;
                contributors.extend(base.contributors.iter().cloned());
                let directives = expand_payloads(directives, &mut include)?;
                apply_patch(&base.tree, &directives, id)?
            }
        };
        contributors.push(Contributor::from(template.as_ref()));

        for layer in snapshot.layers(id) {
            if let TemplateBody::Patch { directives, .. } = &layer.body {
                let directives = expand_payloads(directives, &mut include)?;
                tree = apply_patch(&tree, &directives, id)?;
            }
            contributors.push(Contributor::from(layer.as_ref()));
        }

        Ok(CompiledTemplate {
            id: id.to_string(),
            tree,
            contributors,
        })
    }
}

/// Directives with includes in their payloads expanded
fn expand_payloads<'a, F>(
    directives: &'a [PatchDirective],
    resolve: &mut F,
) -> Result<Cow<'a, [PatchDirective]>, ResolutionError>
where
    F: FnMut(&str) -> Result<Vec<Node>, ResolutionError>,
{
    if !directives.iter().any(|d| contains_include(&d.payload)) {
        return Ok(Cow::Borrowed(directives));
    }
    let mut expanded = directives.to_vec();
    for directive in &mut expanded {
        expand_includes(&mut directive.payload, resolve)?;
    }
    Ok(Cow::Owned(expanded))
}
