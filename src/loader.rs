//! Module loading and binding.
//!
//! Resolves a module source - raw bytes, a precompiled [`Module`], or an
//! already-instantiated [`Instance`] - into a live guest and packages
//! everything an invocation needs into an explicit [`Converter`] handle:
//! the store, the instance, the `memory` export, and the allocator proxy.
//! Nothing lives in shared module-level state; the handle is threaded into
//! every call.

use once_cell::sync::Lazy;
use wasmtime::{Engine, Instance, Linker, Memory, Module, Store};

use crate::alloc::{AllocStats, FreePolicy, GuestAllocator};
use crate::error::HostError;
use crate::stubs;

/// Export name of the guest's linear memory.
pub const MEMORY_EXPORT: &str = "memory";

static DEFAULT_ENGINE: Lazy<Engine> = Lazy::new(Engine::default);

/// Process-wide engine for callers that do not manage their own.
pub fn default_engine() -> &'static Engine {
    &DEFAULT_ENGINE
}

/// A live guest instance plus the state every invocation needs.
///
/// `invoke` takes `&mut self`: linear memory and the allocator are one
/// shared resource, so interleaving allocate/write/free sequences from
/// concurrent invocations on the same instance is unrepresentable without
/// external synchronisation. Each invocation is synchronous; a guest call
/// that does not return blocks the host.
pub struct Converter {
    pub(crate) store: Store<()>,
    pub(crate) instance: Instance,
    pub(crate) memory: Memory,
    pub(crate) allocator: GuestAllocator,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("memory", &self.memory)
            .finish_non_exhaustive()
    }
}

/// Configuration for constructing a [`Converter`].
#[derive(Default)]
pub struct ConverterBuilder {
    engine: Option<Engine>,
    policy: FreePolicy,
}

impl ConverterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a caller-managed engine instead of the process default. Only
    /// consulted when compiling from bytes; a precompiled module is tied to
    /// the engine that built it.
    pub fn engine(mut self, engine: Engine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Choose how much of a decoded result the allocator proxy frees.
    pub fn free_policy(mut self, policy: FreePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Compile `.wasm` (or `.wat`) bytes and instantiate them.
    pub fn from_bytes(self, bytes: &[u8]) -> Result<Converter, HostError> {
        let engine = self.engine.clone().unwrap_or_else(|| default_engine().clone());
        let module = Module::new(&engine, bytes).map_err(HostError::Instantiate)?;
        self.from_module(&module)
    }

    /// Instantiate a precompiled module, supplying the no-op system-call
    /// imports.
    pub fn from_module(self, module: &Module) -> Result<Converter, HostError> {
        let engine = module.engine();
        let mut store = Store::new(engine, ());
        let mut linker: Linker<()> = Linker::new(engine);
        stubs::add_stub_imports(&mut linker).map_err(HostError::Instantiate)?;
        let instance = linker
            .instantiate(&mut store, module)
            .map_err(HostError::Instantiate)?;
        tracing::debug!("guest module instantiated");
        self.bind(store, instance)
    }

    /// Adopt an instance the caller already created. Satisfying the guest's
    /// imports is the caller's responsibility on this path.
    pub fn from_instance(self, store: Store<()>, instance: Instance) -> Result<Converter, HostError> {
        self.bind(store, instance)
    }

    fn bind(self, mut store: Store<()>, instance: Instance) -> Result<Converter, HostError> {
        let memory = instance
            .get_memory(&mut store, MEMORY_EXPORT)
            .ok_or_else(|| HostError::Protocol(format!("missing `{MEMORY_EXPORT}` export")))?;
        let allocator = GuestAllocator::bind(&mut store, &instance, self.policy)?;
        Ok(Converter {
            store,
            instance,
            memory,
            allocator,
        })
    }
}

impl Converter {
    /// Compile and instantiate raw module bytes with default configuration.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HostError> {
        ConverterBuilder::new().from_bytes(bytes)
    }

    /// Instantiate a precompiled module with default configuration.
    pub fn from_module(module: &Module) -> Result<Self, HostError> {
        ConverterBuilder::new().from_module(module)
    }

    /// Adopt an existing instance with default configuration.
    pub fn from_instance(store: Store<()>, instance: Instance) -> Result<Self, HostError> {
        ConverterBuilder::new().from_instance(store, instance)
    }

    /// Allocator traffic counters for this instance.
    pub fn alloc_stats(&self) -> AllocStats {
        self.allocator.stats()
    }
}
