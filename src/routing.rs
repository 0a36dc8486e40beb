//! Routing table of remote modules requests can be forwarded to.

use crate::error::{ServerError, ServerResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A remote HTTP endpoint addressed by the first path segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Module {
    pub identification: String,
    pub hostname: String,
    pub port: u16,
}

impl Module {
    pub fn new(identification: &str, hostname: &str, port: u16) -> ServerResult<Self> {
        let module = Self {
            identification: identification.to_string(),
            hostname: hostname.to_string(),
            port,
        };
        module.validate()?;
        Ok(module)
    }

    /// Build a module from a textual port, as found in configuration files
    pub fn parse(identification: &str, hostname: &str, port: &str) -> ServerResult<Self> {
        let port: u16 = port
            .trim()
            .parse()
            .map_err(|_| ServerError::Config(format!("port has the wrong format: {}", port)))?;
        Self::new(identification, hostname, port)
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.identification.is_empty() {
            return Err(ServerError::Config("module without identification".to_string()));
        }
        if self.identification.contains('/') {
            return Err(ServerError::Config(format!(
                "module identification must be a single path segment: {}",
                self.identification
            )));
        }
        if self.hostname.is_empty() {
            return Err(ServerError::Config(format!(
                "module {} has no hostname",
                self.identification
            )));
        }
        if self.port == 0 {
            return Err(ServerError::Config(format!(
                "module {} has port 0",
                self.identification
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}:{}", self.identification, self.hostname, self.port)
    }
}

/// Split `/first/rest` into `("first", "/rest")`; a lone segment maps to `/`
pub fn split_first_segment(path: &str) -> (&str, &str) {
    let reduced = path.strip_prefix('/').unwrap_or(path);
    match reduced.find('/') {
        Some(slash) => (&reduced[..slash], &reduced[slash..]),
        None => (reduced, "/"),
    }
}

/// Identification → module map shared by all connection threads.
///
/// Built once at startup; the single lock only matters if modules are
/// changed while the server runs.
#[derive(Debug, Default)]
pub struct RoutingTable {
    modules: RwLock<HashMap<String, Module>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table, rejecting invalid or duplicate modules
    pub fn from_modules<I: IntoIterator<Item = Module>>(modules: I) -> ServerResult<Self> {
        let table = Self::new();
        for module in modules {
            module.validate()?;
            if table.insert(module.clone()).is_some() {
                return Err(ServerError::Config(format!(
                    "duplicate module identification: {}",
                    module.identification
                )));
            }
        }
        Ok(table)
    }

    /// Add or replace a module, returning the one it replaced
    pub fn insert(&self, module: Module) -> Option<Module> {
        self.modules
            .write()
            .insert(module.identification.clone(), module)
    }

    pub fn remove(&self, identification: &str) -> Option<Module> {
        self.modules.write().remove(identification)
    }

    pub fn get(&self, identification: &str) -> Option<Module> {
        self.modules.read().get(identification).cloned()
    }

    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }

    /// Find the module named by the first path segment and the path left for it
    pub fn resolve(&self, path: &str) -> Option<(Module, String)> {
        let (segment, rest) = split_first_segment(path);
        if segment.is_empty() {
            return None;
        }
        self.get(segment).map(|module| (module, rest.to_string()))
    }
}
