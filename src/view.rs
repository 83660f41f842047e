//! Typed access to guest linear memory.
//!
//! This module provides bounds-checked, little-endian access to the guest's
//! linear memory. Every operation materialises its view from the live
//! [`wasmtime::Memory`] at the moment of access: the guest can grow its
//! memory mid-call, which reallocates the backing storage and invalidates
//! any previously captured slice. Reading through a stale view is a
//! correctness bug, so no byte slice is ever cached here - reads borrow the
//! store immutably, and a guest call needs it mutably, which makes holding a
//! view across a call unrepresentable.

use byteorder::{LittleEndian, ReadBytesExt};
use wasmtime::{Memory, Store};

use crate::error::HostError;

/// Check that an access of `len` bytes at `addr` lies within the current
/// memory bounds, returning the start offset.
///
/// The end address is computed with overflow checking; `addr + len` wrapping
/// around must not alias low memory.
#[inline]
fn check_bounds(data: &[u8], addr: u32, len: usize) -> Result<usize, HostError> {
    let start = addr as usize;
    let end = start.checked_add(len).ok_or_else(|| {
        HostError::MemoryAccess(format!("address {addr:#x} + length {len} overflows"))
    })?;
    if end > data.len() {
        return Err(HostError::MemoryAccess(format!(
            "range {start:#x}..{end:#x} exceeds memory size {:#x}",
            data.len()
        )));
    }
    Ok(start)
}

/// Read a u8 from guest memory.
pub fn read_u8(memory: &Memory, store: &Store<()>, addr: u32) -> Result<u8, HostError> {
    let data = memory.data(store);
    let start = check_bounds(data, addr, 1)?;
    Ok(data[start])
}

/// Read a little-endian u32 from guest memory.
///
/// The result header's pointer and length fields are declared as i32 on the
/// wire; they are read through this and reinterpreted as addresses.
pub fn read_u32(memory: &Memory, store: &Store<()>, addr: u32) -> Result<u32, HostError> {
    let data = memory.data(store);
    let start = check_bounds(data, addr, 4)?;
    let mut window = &data[start..start + 4];
    window
        .read_u32::<LittleEndian>()
        .map_err(|e| HostError::MemoryAccess(e.to_string()))
}

/// Copy `len` bytes out of guest memory.
///
/// Returns an owned copy so the caller holds no reference into the buffer
/// once the guest runs again.
pub fn read_bytes(memory: &Memory, store: &Store<()>, addr: u32, len: u32) -> Result<Vec<u8>, HostError> {
    let data = memory.data(store);
    let start = check_bounds(data, addr, len as usize)?;
    Ok(data[start..start + len as usize].to_vec())
}

/// Copy bytes into guest memory at `addr`.
pub fn write_bytes(memory: &Memory, store: &mut Store<()>, addr: u32, bytes: &[u8]) -> Result<(), HostError> {
    let data = memory.data_mut(store);
    let start = check_bounds(data, addr, bytes.len())?;
    data[start..start + bytes.len()].copy_from_slice(bytes);
    Ok(())
}

/// Decode a UTF-8 byte run copied out of guest memory.
pub fn decode_utf8(bytes: Vec<u8>) -> Result<String, HostError> {
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmtime::{Engine, MemoryType};

    const PAGE_SIZE: u32 = 65536;

    fn memory() -> (Store<()>, Memory) {
        let engine = Engine::default();
        let mut store = Store::new(&engine, ());
        let memory = Memory::new(&mut store, MemoryType::new(1, None)).unwrap();
        (store, memory)
    }

    #[test]
    fn test_read_write_roundtrip() {
        let (mut store, mem) = memory();

        write_bytes(&mem, &mut store, 100, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(read_bytes(&mem, &store, 100, 5).unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(read_u8(&mem, &store, 102).unwrap(), 3);
    }

    #[test]
    fn test_read_u32_little_endian() {
        let (mut store, mem) = memory();

        write_bytes(&mem, &mut store, 8, &[0x78, 0x56, 0x34, 0x12]).unwrap();
        assert_eq!(read_u32(&mem, &store, 8).unwrap(), 0x12345678);

        // Unaligned reads are legal in linear memory
        write_bytes(&mem, &mut store, 13, &[0xEF, 0xBE, 0xAD, 0xDE]).unwrap();
        assert_eq!(read_u32(&mem, &store, 13).unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_bounds_checking() {
        let (mut store, mem) = memory();

        assert!(read_u8(&mem, &store, PAGE_SIZE - 1).is_ok());
        assert!(read_u8(&mem, &store, PAGE_SIZE).is_err());
        assert!(read_u32(&mem, &store, PAGE_SIZE - 4).is_ok());
        assert!(read_u32(&mem, &store, PAGE_SIZE - 3).is_err());
        assert!(read_bytes(&mem, &store, PAGE_SIZE - 5, 10).is_err());
        assert!(write_bytes(&mem, &mut store, PAGE_SIZE - 2, &[0; 4]).is_err());

        // Overflowing end addresses must not wrap around
        assert!(read_u32(&mem, &store, u32::MAX).is_err());
        assert!(read_bytes(&mem, &store, u32::MAX - 1, 16).is_err());
    }

    #[test]
    fn test_zero_length_window() {
        let (store, mem) = memory();
        assert!(read_bytes(&mem, &store, 0, 0).unwrap().is_empty());
        assert!(read_bytes(&mem, &store, PAGE_SIZE, 0).unwrap().is_empty());
    }

    #[test]
    fn test_fresh_view_after_grow() {
        let (mut store, mem) = memory();

        write_bytes(&mem, &mut store, 0, b"before").unwrap();
        mem.grow(&mut store, 1).unwrap();

        // Data written before the grow survives, and the grown region is
        // addressable through a fresh view
        assert_eq!(read_bytes(&mem, &store, 0, 6).unwrap(), b"before");
        write_bytes(&mem, &mut store, PAGE_SIZE + 16, b"after").unwrap();
        assert_eq!(read_bytes(&mem, &store, PAGE_SIZE + 16, 5).unwrap(), b"after");
    }

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode_utf8(b"plain".to_vec()).unwrap(), "plain");
        assert_eq!(decode_utf8("Ω 宇宙 🚀".as_bytes().to_vec()).unwrap(), "Ω 宇宙 🚀");

        let err = decode_utf8(vec![0xFF, 0xFE, 0xFD]).unwrap_err();
        assert!(matches!(err, HostError::Utf8(_)));
    }
}
