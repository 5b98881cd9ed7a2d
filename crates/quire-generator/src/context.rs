//! Layered render contexts.
//!
//! A [`ContextStack`] is a list of [`Layer`]s searched innermost-first. The
//! base layer is assembled once per build by [`ContextProviders`]; renders
//! add their own bindings on top and remove them afterwards, so the base is
//! shadowed but never modified.

use std::{
    borrow::Cow,
    collections::BTreeMap,
    fmt,
    ops::{Deref, DerefMut},
    sync::Arc,
};

use quire_core::{Config, Value};
use thiserror::Error;
use tracing::debug;

use crate::helpers;

/// Context errors.
#[derive(Debug, Error)]
pub enum ContextError {
    /// A context provider failed.
    #[error("context provider {name} failed: {message}")]
    Provider { name: String, message: String },
}

/// Result type for context operations.
pub type Result<T> = std::result::Result<T, ContextError>;

/// One set of variable bindings.
#[derive(Debug, Clone, Default)]
pub struct Layer {
    bindings: BTreeMap<String, Value>,
}

impl Layer {
    /// Create an empty layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable, replacing any previous binding in this layer.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.bindings.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Layer {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut layer = Self::new();
        for (name, value) in iter {
            layer.insert(name, value);
        }
        layer
    }
}

/// Marks a pushed layer; pass it back to [`ContextStack::release`].
#[derive(Debug)]
#[must_use = "a pushed layer stays visible until its handle is released"]
pub struct LayerHandle {
    depth: usize,
}

/// Ordered layers consulted innermost-first.
///
/// Cloning is cheap: layers are shared, not copied.
#[derive(Debug, Clone, Default)]
pub struct ContextStack {
    layers: Vec<Arc<Layer>>,
}

impl ContextStack {
    /// Create a stack with `base` as its only layer.
    #[must_use]
    pub fn new(base: Layer) -> Self {
        Self {
            layers: vec![Arc::new(base)],
        }
    }

    /// Number of layers.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Resolve a variable, innermost layer first.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&Value> {
        self.layers.iter().rev().find_map(|layer| layer.get(name))
    }

    /// Resolve a dotted path such as `page.title`.
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> Option<Cow<'_, Value>> {
        let mut segments = path.split('.');
        let mut current = Cow::Borrowed(self.resolve(segments.next()?)?);
        for segment in segments {
            current = match current {
                Cow::Borrowed(value) => value.field(segment)?,
                Cow::Owned(value) => Cow::Owned(value.field(segment)?.into_owned()),
            };
        }
        Some(current)
    }

    /// Push a layer, returning a handle for [`release`](Self::release).
    pub fn push_layer(&mut self, layer: Layer) -> LayerHandle {
        let depth = self.layers.len();
        self.layers.push(Arc::new(layer));
        LayerHandle { depth }
    }

    /// Remove the handle's layer and everything pushed after it.
    pub fn release(&mut self, handle: LayerHandle) {
        self.layers.truncate(handle.depth);
    }

    /// Push a layer that is released when the guard drops.
    pub fn push(&mut self, layer: Layer) -> ContextGuard<'_> {
        let handle = self.push_layer(layer);
        ContextGuard {
            stack: self,
            handle: Some(handle),
        }
    }

    /// A new stack sharing these layers with `layer` on top.
    ///
    /// The receiver is left untouched, so independent renders can each
    /// derive their own view from one shared base.
    #[must_use]
    pub fn with_layer(&self, layer: Layer) -> Self {
        let mut layers = Vec::with_capacity(self.layers.len() + 1);
        layers.extend(self.layers.iter().cloned());
        layers.push(Arc::new(layer));
        Self { layers }
    }
}

/// Scope guard returned by [`ContextStack::push`].
pub struct ContextGuard<'a> {
    stack: &'a mut ContextStack,
    handle: Option<LayerHandle>,
}

impl Deref for ContextGuard<'_> {
    type Target = ContextStack;

    fn deref(&self) -> &ContextStack {
        self.stack
    }
}

impl DerefMut for ContextGuard<'_> {
    fn deref_mut(&mut self) -> &mut ContextStack {
        self.stack
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stack.release(handle);
        }
    }
}

impl fmt::Debug for ContextGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextGuard")
            .field("depth", &self.stack.depth())
            .finish()
    }
}

/// Contributes bindings to the base context.
pub trait ContextProvider: Send + Sync {
    /// Provider name, for diagnostics.
    fn name(&self) -> &str;

    /// Receive the context built so far and return it, possibly extended.
    fn provide(&self, context: Layer) -> std::result::Result<Layer, String>;
}

type ProviderFn = dyn Fn(Layer) -> std::result::Result<Layer, String> + Send + Sync;

struct FnProvider {
    name: String,
    func: Box<ProviderFn>,
}

impl ContextProvider for FnProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn provide(&self, context: Layer) -> std::result::Result<Layer, String> {
        (self.func)(context)
    }
}

/// Ordered registry of context providers, owned by the build driver.
#[derive(Default)]
pub struct ContextProviders {
    providers: Vec<Box<dyn ContextProvider>>,
}

impl ContextProviders {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the site and helper providers.
    #[must_use]
    pub fn with_defaults(config: &Config) -> Self {
        let mut providers = Self::new();
        providers.register(SiteProvider::new(config));
        providers.register(HelpersProvider);
        providers
    }

    /// Append a provider. Later providers can shadow earlier ones.
    pub fn register(&mut self, provider: impl ContextProvider + 'static) {
        self.providers.push(Box::new(provider));
    }

    /// Append a closure provider.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(Layer) -> std::result::Result<Layer, String> + Send + Sync + 'static,
    {
        self.register(FnProvider {
            name: name.into(),
            func: Box::new(func),
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Run every provider in registration order and wrap the result as the
    /// base layer of a new stack.
    pub fn build_base(&self) -> Result<ContextStack> {
        let mut layer = Layer::new();
        for provider in &self.providers {
            layer = provider
                .provide(layer)
                .map_err(|message| ContextError::Provider {
                    name: provider.name().to_string(),
                    message,
                })?;
            debug!(provider = provider.name(), bindings = layer.len(), "applied context provider");
        }
        Ok(ContextStack::new(layer))
    }
}

impl fmt::Debug for ContextProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| p.name()))
            .finish()
    }
}

/// Binds `site` (title, base_url, description) and the `[context]` table.
#[derive(Debug, Clone)]
pub struct SiteProvider {
    site: Value,
    extra: Vec<(String, Value)>,
}

impl SiteProvider {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let mut site = BTreeMap::new();
        site.insert("title".to_string(), Value::from(config.site.title.clone()));
        site.insert(
            "base_url".to_string(),
            Value::from(config.site.base_url.clone()),
        );
        site.insert(
            "description".to_string(),
            config
                .site
                .description
                .clone()
                .map_or(Value::Null, Value::from),
        );

        let extra = config
            .context
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.clone())))
            .collect();

        Self {
            site: Value::Map(site),
            extra,
        }
    }
}

impl ContextProvider for SiteProvider {
    fn name(&self) -> &str {
        "site"
    }

    fn provide(&self, mut context: Layer) -> std::result::Result<Layer, String> {
        context.insert("site", self.site.clone());
        for (name, value) in &self.extra {
            context.insert(name.clone(), value.clone());
        }
        Ok(context)
    }
}

/// Binds the `shorten` and `safe` template helpers.
#[derive(Debug, Clone, Copy, Default)]
pub struct HelpersProvider;

impl ContextProvider for HelpersProvider {
    fn name(&self) -> &str {
        "helpers"
    }

    fn provide(&self, mut context: Layer) -> std::result::Result<Layer, String> {
        context.insert("shorten", helpers::shorten_helper());
        context.insert("safe", helpers::safe_helper());
        Ok(context)
    }
}
