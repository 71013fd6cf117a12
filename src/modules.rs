//! Script module loading
//!
//! Widget scripts are not handed to tests as raw text; they go through a
//! [`ModuleLoader`] that turns a module id and URL into a [`ScriptModule`].
//! Mounting a bundle invokes each module against the page.

use crate::fetch::Fetcher;
use crate::page::Page;
use crate::{Error, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A loaded script module
pub trait ScriptModule: Send + Sync + fmt::Debug {
    /// Module id it was loaded under (e.g. `footer/js/footer`)
    fn id(&self) -> &str;

    /// Source text, when the loader kept it
    fn source(&self) -> Option<&str> {
        None
    }

    /// Run the module against a page
    fn invoke(&self, page: &mut Page);
}

/// Loads a module by id from a resolved URL
pub trait ModuleLoader: Send + Sync {
    fn load_module<'a>(&'a self, id: &'a str, url: &'a str) -> BoxFuture<'a, Result<Arc<dyn ScriptModule>>>;
}

/// Module carrying fetched source; invoking it records the run on the page
#[derive(Debug, Clone)]
pub struct SourceModule {
    id: String,
    source: String,
}

impl SourceModule {
    pub fn new(id: &str, source: impl Into<String>) -> Self {
        Self { id: id.to_string(), source: source.into() }
    }
}

impl ScriptModule for SourceModule {
    fn id(&self) -> &str {
        &self.id
    }

    fn source(&self) -> Option<&str> {
        Some(&self.source)
    }

    fn invoke(&self, page: &mut Page) {
        page.record_script(&self.id);
    }
}

/// Fetches module source text over a [`Fetcher`]
pub struct SourceModuleLoader {
    fetcher: Arc<dyn Fetcher>,
}

impl SourceModuleLoader {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }
}

impl ModuleLoader for SourceModuleLoader {
    fn load_module<'a>(&'a self, id: &'a str, url: &'a str) -> BoxFuture<'a, Result<Arc<dyn ScriptModule>>> {
        async move {
            let resp = self.fetcher.fetch(crate::RequestInfo::new("GET", url).with_resource_type("script")).await?;
            if !resp.is_success() {
                return Err(Error::ModuleError(format!("{} ({}) answered {}", id, url, resp.status)));
            }
            Ok(Arc::new(SourceModule::new(id, resp.body)) as Arc<dyn ScriptModule>)
        }
        .boxed()
    }
}

type InitFn = Arc<dyn Fn(&mut Page) + Send + Sync>;

/// Module backed by a Rust closure
#[derive(Clone)]
pub struct NativeModule {
    id: String,
    init: InitFn,
}

impl NativeModule {
    pub fn new<F>(id: &str, init: F) -> Self
    where
        F: Fn(&mut Page) + Send + Sync + 'static,
    {
        Self { id: id.to_string(), init: Arc::new(init) }
    }
}

impl fmt::Debug for NativeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeModule").field("id", &self.id).finish()
    }
}

impl ScriptModule for NativeModule {
    fn id(&self) -> &str {
        &self.id
    }

    fn invoke(&self, page: &mut Page) {
        page.record_script(&self.id);
        (self.init)(page)
    }
}

/// Loader resolving ids against a fixed table of modules
///
/// Ids missing from the table fail, which makes the whole script group of a
/// load degrade to empty.
#[derive(Default)]
pub struct ModuleTable {
    modules: HashMap<String, Arc<dyn ScriptModule>>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, module: impl ScriptModule + 'static) -> Self {
        self.modules.insert(module.id().to_string(), Arc::new(module));
        self
    }
}

impl ModuleLoader for ModuleTable {
    fn load_module<'a>(&'a self, id: &'a str, _url: &'a str) -> BoxFuture<'a, Result<Arc<dyn ScriptModule>>> {
        let found = self.modules.get(id).cloned().ok_or_else(|| Error::ModuleError(format!("no module registered as '{}'", id)));
        futures::future::ready(found).boxed()
    }
}
