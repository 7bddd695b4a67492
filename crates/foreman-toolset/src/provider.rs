//! Scoped toolset instantiation.
//!
//! The [`InstanceProvider`] owns the mapping from named references to
//! registrations and hands out live instances under the registration's
//! declared scope:
//!
//! - [`ToolsetScope::Call`]: a fresh instance per resolution. The resolving
//!   execution context owns it and must clean it up when the call ends; no
//!   two contexts ever share one.
//! - [`ToolsetScope::Run`]: one instance per run, cached here, cleaned up by
//!   [`InstanceProvider::release_run`].
//! - [`ToolsetScope::Process`]: one instance for the provider's lifetime,
//!   cleaned up by [`InstanceProvider::shutdown`].

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use foreman_core::{RunId, ToolsetRef, ToolsetScope, WorkerSpec};

use crate::error::{ToolsetError, ToolsetResult};
use crate::toolset::Toolset;

/// Factory producing a fresh toolset instance.
pub type ToolsetFactory = Arc<dyn Fn() -> Arc<dyn Toolset> + Send + Sync>;

/// A registration under a name.
///
/// Closed on purpose: a reference resolves either to a capability toolset or
/// to another worker exposed as a single tool, nothing else.
#[derive(Clone)]
pub enum Registered {
    /// A capability toolset with a declared instance scope.
    Capability {
        /// Instance lifetime scope.
        scope: ToolsetScope,
        /// Factory for fresh instances.
        factory: ToolsetFactory,
    },
    /// A worker, exposed to callers as a tool named after it.
    Worker(Arc<WorkerSpec>),
}

/// The result of resolving a reference for one execution context.
#[derive(Clone)]
pub enum ResolvedToolset {
    /// A live capability instance.
    Capability {
        /// The instance. Owned by the resolving context when `scope` is
        /// [`ToolsetScope::Call`]; shared by reference otherwise.
        instance: Arc<dyn Toolset>,
        /// The registration's scope.
        scope: ToolsetScope,
    },
    /// A worker delegation target.
    Worker(Arc<WorkerSpec>),
}

/// Resolves named toolset references into live instances.
///
/// One provider serves the whole process; run-scoped state is keyed by
/// [`RunId`] and released per run.
pub struct InstanceProvider {
    /// Registrations by name.
    registered: DashMap<String, Registered>,
    /// Run-scoped instances, keyed by (run, name).
    run_cache: DashMap<(RunId, String), Arc<dyn Toolset>>,
    /// Process-scoped instances, keyed by name.
    process_cache: DashMap<String, Arc<dyn Toolset>>,
}

impl InstanceProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registered: DashMap::new(),
            run_cache: DashMap::new(),
            process_cache: DashMap::new(),
        }
    }

    /// Register a capability toolset under a name.
    pub fn register_capability<F>(&self, name: impl Into<String>, scope: ToolsetScope, factory: F)
    where
        F: Fn() -> Arc<dyn Toolset> + Send + Sync + 'static,
    {
        self.registered.insert(
            name.into(),
            Registered::Capability {
                scope,
                factory: Arc::new(factory),
            },
        );
    }

    /// Register a worker as a delegation target.
    ///
    /// The worker is exposed under its own name.
    pub fn register_worker(&self, spec: WorkerSpec) {
        self.registered
            .insert(spec.name.clone(), Registered::Worker(Arc::new(spec)));
    }

    /// Look up a registered worker by name.
    #[must_use]
    pub fn worker(&self, name: &str) -> Option<Arc<WorkerSpec>> {
        match self.registered.get(name).map(|entry| entry.clone()) {
            Some(Registered::Worker(spec)) => Some(spec),
            _ => None,
        }
    }

    /// Resolve a reference into a live instance (or delegation target) for
    /// one execution context in `run_id`.
    ///
    /// A `Call`-scoped resolution always creates a fresh instance; the
    /// caller owns it and is responsible for its cleanup. `Run`- and
    /// `Process`-scoped resolutions share one cached instance.
    ///
    /// # Errors
    ///
    /// Returns [`ToolsetError::UnknownReference`] when nothing is registered
    /// under the name. The runtime treats that as fatal.
    pub fn resolve(
        &self,
        reference: &ToolsetRef,
        run_id: &RunId,
    ) -> ToolsetResult<ResolvedToolset> {
        let registration = self
            .registered
            .get(reference.name())
            .map(|entry| entry.clone())
            .ok_or_else(|| ToolsetError::UnknownReference(reference.name().to_string()))?;

        match registration {
            Registered::Worker(spec) => Ok(ResolvedToolset::Worker(spec)),
            Registered::Capability { scope, factory } => {
                let instance = match scope {
                    ToolsetScope::Call => {
                        debug!(toolset = %reference, "Creating call-scoped instance");
                        factory()
                    },
                    ToolsetScope::Run => {
                        let key = (run_id.clone(), reference.name().to_string());
                        Arc::clone(
                            self.run_cache
                                .entry(key)
                                .or_insert_with(|| {
                                    debug!(toolset = %reference, run = %run_id, "Creating run-scoped instance");
                                    factory()
                                })
                                .value(),
                        )
                    },
                    ToolsetScope::Process => Arc::clone(
                        self.process_cache
                            .entry(reference.name().to_string())
                            .or_insert_with(|| {
                                debug!(toolset = %reference, "Creating process-scoped instance");
                                factory()
                            })
                            .value(),
                    ),
                };
                Ok(ResolvedToolset::Capability { instance, scope })
            },
        }
    }

    /// Release all run-scoped instances for `run_id`, running each
    /// instance's cleanup exactly once.
    pub async fn release_run(&self, run_id: &RunId) {
        let keys: Vec<(RunId, String)> = self
            .run_cache
            .iter()
            .filter(|entry| &entry.key().0 == run_id)
            .map(|entry| entry.key().clone())
            .collect();

        for key in keys {
            if let Some((_, instance)) = self.run_cache.remove(&key) {
                debug!(toolset = %key.1, run = %run_id, "Releasing run-scoped instance");
                instance.cleanup().await;
            }
        }
    }

    /// Release all process-scoped instances. Called once at process end.
    pub async fn shutdown(&self) {
        let keys: Vec<String> = self
            .process_cache
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for key in keys {
            if let Some((_, instance)) = self.process_cache.remove(&key) {
                debug!(toolset = %key, "Releasing process-scoped instance");
                instance.cleanup().await;
            }
        }
    }
}

impl Default for InstanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InstanceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceProvider")
            .field("registered", &self.registered.len())
            .field("run_cache", &self.run_cache.len())
            .field("process_cache", &self.process_cache.len())
            .finish()
    }
}
