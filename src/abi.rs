//! Canonical ABI marshalling for the conversion export.
//!
//! The guest's conversion export takes `(ptr: i32, len: i32)` naming a
//! UTF-8 byte run in linear memory and returns a pointer to a raw result
//! header with this little-endian layout:
//!
//! ```text
//! offset 0   u8   discriminant (0 = ok, 1 = err)
//! offset 1-3      padding
//! offset 4   i32  payload pointer
//! offset 8   i32  payload byte length
//! ```
//!
//! One invocation is strictly encode -> allocate -> write -> call -> decode
//! -> free. The input buffer's ownership passes to the guest for the call;
//! the host frees only the decoded payload (and, depending on
//! [`FreePolicy`](crate::alloc::FreePolicy), the header record).

use crate::error::HostError;
use crate::loader::Converter;
use crate::view;

/// Byte offset of the payload pointer field within the result header.
const PAYLOAD_PTR_OFFSET: u32 = 4;

/// Byte offset of the payload length field within the result header.
const PAYLOAD_LEN_OFFSET: u32 = 8;

/// Total size of the raw result header record.
pub(crate) const RESULT_HEADER_SIZE: u32 = 12;

/// Alignment of the header record (i32 fields).
pub(crate) const RESULT_HEADER_ALIGN: u32 = 4;

/// Canonical ABI alignment for UTF-8 string buffers.
pub(crate) const STRING_ALIGN: u32 = 1;

/// Name of the conversion export the [`Converter::convert`] wrapper calls.
pub const CONVERT_EXPORT: &str = "convert";

/// Compute a field address within the header, rejecting wrap-around.
fn header_field(header: u32, offset: u32) -> Result<u32, HostError> {
    header.checked_add(offset).ok_or_else(|| {
        HostError::MemoryAccess(format!(
            "result header at {header:#x} overflows the address space"
        ))
    })
}

impl Converter {
    /// Run `input` through the guest export named `export`.
    ///
    /// The outer `Result` carries marshalling failures; the inner one is the
    /// guest's own verdict - `Ok(output)` for discriminant 0, `Err(message)`
    /// for discriminant 1. Any other discriminant is a protocol violation.
    pub fn invoke(&mut self, export: &str, input: &str) -> Result<Result<String, String>, HostError> {
        let func = self
            .instance
            .get_typed_func::<(i32, i32), i32>(&mut self.store, export)
            .map_err(|e| HostError::Protocol(format!("missing conversion export `{export}`: {e}")))?;

        let bytes = input.as_bytes();
        let len = u32::try_from(bytes.len()).map_err(|_| {
            HostError::Allocation(format!(
                "input of {} bytes exceeds the 32-bit guest address space",
                bytes.len()
            ))
        })?;
        let ptr = self.allocator.allocate(&mut self.store, len, STRING_ALIGN)?;
        view::write_bytes(&self.memory, &mut self.store, ptr, bytes)?;

        tracing::debug!(export, len, "invoking guest conversion");
        // The guest takes ownership of the input buffer for the duration of
        // the call; it is not freed here.
        let header = func
            .call(&mut self.store, (ptr as i32, len as i32))
            .map_err(HostError::Trap)? as u32;

        let discriminant = view::read_u8(&self.memory, &self.store, header)?;
        let ok = match discriminant {
            0 => true,
            1 => false,
            other => {
                return Err(HostError::Protocol(format!(
                    "invalid discriminant {other} for a two-variant result"
                )))
            }
        };

        let payload = self.lift_payload(header)?;
        tracing::trace!(export, ok, payload_len = payload.len(), "guest result decoded");
        Ok(if ok { Ok(payload) } else { Err(payload) })
    }

    /// Host-facing conversion call: `invoke` on the `convert` export.
    pub fn convert(&mut self, input: &str) -> Result<Result<String, String>, HostError> {
        self.invoke(CONVERT_EXPORT, input)
    }

    /// Decode and release the payload named by the result header.
    ///
    /// Both result variants carry the same `(ptr, len)` layout at the same
    /// offsets, so a single lift path serves them. The window is copied out
    /// of guest memory before the free, which keeps the buffer released on
    /// every exit path - including a UTF-8 validation failure.
    fn lift_payload(&mut self, header: u32) -> Result<String, HostError> {
        let payload_ptr =
            view::read_u32(&self.memory, &self.store, header_field(header, PAYLOAD_PTR_OFFSET)?)?;
        let payload_len =
            view::read_u32(&self.memory, &self.store, header_field(header, PAYLOAD_LEN_OFFSET)?)?;

        let bytes = view::read_bytes(&self.memory, &self.store, payload_ptr, payload_len)?;
        self.allocator
            .release_result(&mut self.store, header, payload_ptr, payload_len)?;
        view::decode_utf8(bytes)
    }
}
