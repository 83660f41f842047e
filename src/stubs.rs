//! No-op system-call imports.
//!
//! The guest is compiled against command-line expectations and declares a
//! minimal `wasi_snapshot_preview1` import surface. None of these functions
//! are expected to run during a normal conversion call; they exist to
//! satisfy static import resolution at instantiation time.

use wasmtime::{Caller, Extern, Linker};

const WASI_MODULE: &str = "wasi_snapshot_preview1";

const ERRNO_SUCCESS: i32 = 0;

/// Register the stub import surface on `linker`.
pub fn add_stub_imports(linker: &mut Linker<()>) -> Result<(), wasmtime::Error> {
    linker.func_wrap(
        WASI_MODULE,
        "fd_write",
        |_: Caller<'_, ()>, _fd: i32, _iovs: i32, _iovs_len: i32, _nwritten: i32| ERRNO_SUCCESS,
    )?;
    linker.func_wrap(
        WASI_MODULE,
        "environ_get",
        |_: Caller<'_, ()>, _environ: i32, _environ_buf: i32| ERRNO_SUCCESS,
    )?;
    linker.func_wrap(
        WASI_MODULE,
        "environ_sizes_get",
        |mut caller: Caller<'_, ()>, count_ptr: i32, size_ptr: i32| {
            // A guest probing its environment reads the counts back, so
            // report an empty environment instead of leaving the out-params
            // untouched.
            if let Some(Extern::Memory(memory)) = caller.get_export("memory") {
                let zero = 0u32.to_le_bytes();
                let _ = memory.write(&mut caller, count_ptr as u32 as usize, &zero);
                let _ = memory.write(&mut caller, size_ptr as u32 as usize, &zero);
            }
            ERRNO_SUCCESS
        },
    )?;
    linker.func_wrap(WASI_MODULE, "proc_exit", |_: Caller<'_, ()>, _code: i32| {})?;
    Ok(())
}
