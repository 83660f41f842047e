//! Common test utilities shared between integration tests.

use ktos_host::Converter;

/// Echo guest: `convert` succeeds with its own input, except an empty
/// input, which fails with "empty query". The bump allocator never reuses
/// space, which keeps returned pointers distinct and the alloc/free
/// accounting deterministic.
pub const ECHO_GUEST: &str = r#"
(module
  (memory (export "memory") 2)
  (global $next (mut i32) (i32.const 4096))

  ;; "empty query" (11 bytes)
  (data (i32.const 16) "empty query")

  (func (export "canonical_abi_realloc") (param $old_ptr i32) (param $old_size i32) (param $align i32) (param $new_size i32) (result i32)
    (local $p i32)
    (local.set $p (global.get $next))
    (global.set $next (i32.add (global.get $next) (local.get $new_size)))
    (local.get $p))

  (func (export "canonical_abi_free") (param i32 i32 i32))

  ;; Result header at 4: disc, pad, payload ptr, payload len
  (func (export "convert") (param $ptr i32) (param $len i32) (result i32)
    (if (i32.eqz (local.get $len))
      (then
        (i32.store8 (i32.const 4) (i32.const 1))
        (i32.store (i32.const 8) (i32.const 16))
        (i32.store (i32.const 12) (i32.const 11)))
      (else
        (i32.store8 (i32.const 4) (i32.const 0))
        (i32.store (i32.const 8) (local.get $ptr))
        (i32.store (i32.const 12) (local.get $len))))
    (i32.const 4))
)
"#;

/// Echo-shaped guest that stamps an arbitrary discriminant into the header.
#[allow(dead_code)]
pub fn disc_guest(discriminant: u8) -> String {
    format!(
        r#"
(module
  (memory (export "memory") 1)
  (global $next (mut i32) (i32.const 1024))
  (func (export "canonical_abi_realloc") (param i32 i32 i32 i32) (result i32)
    (local $p i32)
    (local.set $p (global.get $next))
    (global.set $next (i32.add (global.get $next) (local.get 3)))
    (local.get $p))
  (func (export "canonical_abi_free") (param i32 i32 i32))
  (func (export "convert") (param $ptr i32) (param $len i32) (result i32)
    (i32.store8 (i32.const 4) (i32.const {discriminant}))
    (i32.store (i32.const 8) (local.get $ptr))
    (i32.store (i32.const 12) (local.get $len))
    (i32.const 4))
)
"#
    )
}

/// Assemble a WAT fixture and load it through the default construction path.
pub fn converter(wat: &str) -> Converter {
    let wasm = wat::parse_str(wat).expect("fixture WAT must assemble");
    Converter::from_bytes(&wasm).expect("fixture guest must instantiate")
}
