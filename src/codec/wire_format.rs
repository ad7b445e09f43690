//! Wire-level type codes.
//!
//! Every encoded value starts with a one-byte constructor. Described values
//! start with `0x00`, followed by the descriptor value and then the described
//! body:
//! ```text
//! ┌──────┬──────────────────┬──────────────────────────┐
//! │ 0x00 │ descriptor       │ body (list of fields)    │
//! │      │ ulong | symbol   │ list0 | list8 | list32   │
//! └──────┴──────────────────┴──────────────────────────┘
//! ```
//!
//! All multi-byte integers are Big Endian.

/// Constructor byte for a described value.
pub const DESCRIBED: u8 = 0x00;

/// Largest length that fits the one-byte (`*8`) variable-width encodings.
pub const MAX_SHORT_LEN: usize = u8::MAX as usize;

/// Primitive type codes.
pub mod codes {
    pub const NULL: u8 = 0x40;
    pub const TRUE: u8 = 0x41;
    pub const FALSE: u8 = 0x42;
    /// Boolean with a trailing 0x00/0x01 byte. Decoded, never produced.
    pub const BOOLEAN: u8 = 0x56;

    pub const UBYTE: u8 = 0x50;
    pub const USHORT: u8 = 0x60;

    pub const UINT0: u8 = 0x43;
    pub const SMALL_UINT: u8 = 0x52;
    pub const UINT: u8 = 0x70;

    pub const ULONG0: u8 = 0x44;
    pub const SMALL_ULONG: u8 = 0x53;
    pub const ULONG: u8 = 0x80;

    pub const SMALL_INT: u8 = 0x54;
    pub const INT: u8 = 0x71;

    pub const SMALL_LONG: u8 = 0x55;
    pub const LONG: u8 = 0x81;

    pub const VBIN8: u8 = 0xa0;
    pub const VBIN32: u8 = 0xb0;
    pub const STR8: u8 = 0xa1;
    pub const STR32: u8 = 0xb1;
    pub const SYM8: u8 = 0xa3;
    pub const SYM32: u8 = 0xb3;

    pub const LIST0: u8 = 0x45;
    pub const LIST8: u8 = 0xc0;
    pub const LIST32: u8 = 0xd0;

    /// Human readable name for a type code, used in decoder error messages.
    pub fn name(code: u8) -> &'static str {
        match code {
            NULL => "null",
            TRUE | FALSE | BOOLEAN => "boolean",
            UBYTE => "ubyte",
            USHORT => "ushort",
            UINT0 | SMALL_UINT | UINT => "uint",
            ULONG0 | SMALL_ULONG | ULONG => "ulong",
            SMALL_INT | INT => "int",
            SMALL_LONG | LONG => "long",
            VBIN8 | VBIN32 => "binary",
            STR8 | STR32 => "string",
            SYM8 | SYM32 => "symbol",
            LIST0 | LIST8 | LIST32 => "list",
            super::DESCRIBED => "described",
            _ => "unknown",
        }
    }
}
