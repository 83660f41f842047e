//! Host-side canonical ABI adapter for a KQL to SQL converter compiled to
//! WebAssembly.
//!
//! ktos-host embeds a guest module whose conversion export follows the
//! canonical ABI for `func(kql: string) -> expected<string, string>`:
//! strings cross the boundary as pointer/length pairs into the guest's
//! linear memory, all guest-side space is obtained through the exported
//! `canonical_abi_realloc` / `canonical_abi_free` pair, and the result comes
//! back as a discriminated header naming a UTF-8 payload in either branch.
//!
//! # Modules
//!
//! - [`loader`] -- Resolves raw bytes, a precompiled module, or a live
//!   instance into a [`Converter`] handle.
//! - [`abi`] -- The marshalling core: encode, call, decode, free.
//! - [`alloc`] -- Proxy over the guest's allocator exports, with traffic
//!   counters and the result-header free policy.
//! - [`view`] -- Bounds-checked, little-endian access to linear memory
//!   through always-fresh views.
//! - [`stubs`] -- No-op `wasi_snapshot_preview1` imports that satisfy the
//!   guest's static import surface.
//! - [`error`] -- The [`HostError`] taxonomy.
//!
//! # Example
//!
//! Load a compiled converter and run a query through it:
//!
//! ```no_run
//! use ktos_host::Converter;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("converter_wasm.wasm")?;
//! let mut converter = Converter::from_bytes(&bytes)?;
//!
//! match converter.convert("T | count")? {
//!     Ok(sql) => println!("{sql}"),
//!     Err(diagnostics) => eprintln!("{diagnostics}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! A guest-reported conversion failure is the inner `Err` - decoded data,
//! not a host error. [`HostError`] is reserved for breaches of the ABI
//! contract itself: allocation failure, malformed UTF-8, an unexpected
//! result discriminant, or a trap.

pub mod abi;
pub mod alloc;
pub mod error;
pub mod loader;
pub mod stubs;
pub mod view;

pub use alloc::{AllocStats, FreePolicy, GuestAllocator};
pub use error::HostError;
pub use loader::{default_engine, Converter, ConverterBuilder};
