//! Error taxonomy for the host adapter.
//!
//! Marshalling-layer failures are distinct from guest-reported conversion
//! failures: a guest that returns the error variant of its result has been
//! decoded successfully, and the marshaller surfaces that as data
//! (`Ok(Err(diagnostics))`), never as a `HostError`.

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The guest allocator export is absent, trapped, or signalled
    /// out-of-memory with a null pointer.
    #[error("Guest allocation failed: {0}")]
    Allocation(String),

    /// A decoded payload window was not valid UTF-8.
    #[error("Invalid UTF-8 in guest payload: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// ABI mismatch between host and guest: a result discriminant outside
    /// the two-variant set, or a required export missing or wrongly typed.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// A header or payload window fell outside current memory bounds.
    #[error("Memory access out of bounds: {0}")]
    MemoryAccess(String),

    /// The guest call itself trapped.
    #[error("Guest trap: {0}")]
    Trap(wasmtime::Error),

    /// The module could not be compiled or instantiated.
    #[error("Instantiation failed: {0}")]
    Instantiate(wasmtime::Error),
}
