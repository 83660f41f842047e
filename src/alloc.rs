//! Guest memory allocator proxy.
//!
//! The guest owns its linear memory; the host never allocates into it
//! directly. All space for encoded strings is requested through the guest's
//! exported `canonical_abi_realloc`, and transferred buffers are returned
//! through `canonical_abi_free` exactly once per live allocation. The proxy
//! resolves both exports once at bind time and counts every call, so tests
//! can assert the one-alloc/one-free discipline without guest cooperation.

use wasmtime::{Instance, Store, TypedFunc};

use crate::abi::{RESULT_HEADER_ALIGN, RESULT_HEADER_SIZE, STRING_ALIGN};
use crate::error::HostError;

/// Export name of the guest allocator.
pub const REALLOC_EXPORT: &str = "canonical_abi_realloc";

/// Export name of the guest deallocator.
pub const FREE_EXPORT: &str = "canonical_abi_free";

/// How much of a decoded result the proxy releases.
///
/// The original host freed only the nested payload buffer and left the
/// 12-byte header to the guest's return-area pool. Guests whose allocator
/// hands the header out individually need [`FreePolicy::HeaderAndPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreePolicy {
    /// Free the nested payload buffer only.
    #[default]
    PayloadOnly,
    /// Free the payload buffer and the result header record.
    HeaderAndPayload,
}

/// Allocator traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Successful `allocate` calls.
    pub allocs: u64,
    /// `free` calls issued to the guest.
    pub frees: u64,
}

/// Typed handle over the guest's allocator exports.
pub struct GuestAllocator {
    realloc: TypedFunc<(i32, i32, i32, i32), i32>,
    dealloc: TypedFunc<(i32, i32, i32), ()>,
    policy: FreePolicy,
    stats: AllocStats,
}

impl std::fmt::Debug for GuestAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestAllocator")
            .field("policy", &self.policy)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl GuestAllocator {
    /// Resolve the allocator pair from the instance's export table.
    pub fn bind(store: &mut Store<()>, instance: &Instance, policy: FreePolicy) -> Result<Self, HostError> {
        let realloc = instance
            .get_typed_func::<(i32, i32, i32, i32), i32>(&mut *store, REALLOC_EXPORT)
            .map_err(|e| HostError::Allocation(format!("unusable `{REALLOC_EXPORT}` export: {e}")))?;
        let dealloc = instance
            .get_typed_func::<(i32, i32, i32), ()>(&mut *store, FREE_EXPORT)
            .map_err(|e| HostError::Allocation(format!("unusable `{FREE_EXPORT}` export: {e}")))?;
        Ok(GuestAllocator {
            realloc,
            dealloc,
            policy,
            stats: AllocStats::default(),
        })
    }

    /// Request `len` bytes from the guest allocator.
    ///
    /// A null return for a non-zero request is the allocator's out-of-memory
    /// sentinel. The pointer stays valid until freed or reallocated.
    pub fn allocate(&mut self, store: &mut Store<()>, len: u32, align: u32) -> Result<u32, HostError> {
        let ptr = self
            .realloc
            .call(&mut *store, (0, 0, align as i32, len as i32))
            .map_err(|e| HostError::Allocation(format!("`{REALLOC_EXPORT}` trapped: {e}")))? as u32;
        if ptr == 0 && len > 0 {
            return Err(HostError::Allocation(format!(
                "guest allocator returned null for {len} bytes"
            )));
        }
        self.stats.allocs += 1;
        Ok(ptr)
    }

    /// Return a transferred buffer to the guest.
    ///
    /// Must be called exactly once per live allocation; the marshaller's
    /// single decode path keeps that pairing structural.
    pub fn free(&mut self, store: &mut Store<()>, ptr: u32, len: u32, align: u32) -> Result<(), HostError> {
        self.dealloc
            .call(&mut *store, (ptr as i32, len as i32, align as i32))
            .map_err(|e| HostError::Allocation(format!("`{FREE_EXPORT}` trapped: {e}")))?;
        self.stats.frees += 1;
        Ok(())
    }

    /// Release the buffers of a decoded result: always the nested payload,
    /// plus the header record when the policy says the guest expects it
    /// back.
    pub fn release_result(
        &mut self,
        store: &mut Store<()>,
        header: u32,
        payload_ptr: u32,
        payload_len: u32,
    ) -> Result<(), HostError> {
        self.free(store, payload_ptr, payload_len, STRING_ALIGN)?;
        if self.policy == FreePolicy::HeaderAndPayload {
            self.free(store, header, RESULT_HEADER_SIZE, RESULT_HEADER_ALIGN)?;
        }
        Ok(())
    }

    /// Counters of allocator traffic so far.
    pub fn stats(&self) -> AllocStats {
        self.stats
    }
}
