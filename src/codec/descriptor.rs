//! Descriptors and symbols.
//!
//! A described type is selected on the wire by its descriptor, which is either
//! a 64-bit numeric code or a symbolic name. Both forms of the same type must
//! resolve to the same constructor in the [`DescriptorRegistry`](super::DescriptorRegistry).

use std::fmt;

/// An AMQP symbol: an ASCII name drawn from a restricted vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol from any string-like value.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the symbol text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Symbol {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Descriptor of a described type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Descriptor {
    /// Numeric descriptor (`ulong` on the wire).
    Code(u64),
    /// Symbolic descriptor (`symbol` on the wire).
    Symbol(Symbol),
}

impl Descriptor {
    /// Shorthand for a symbolic descriptor.
    pub fn symbol(name: impl Into<String>) -> Self {
        Descriptor::Symbol(Symbol::new(name))
    }

    /// The numeric code, if this is a numeric descriptor.
    pub fn code(&self) -> Option<u64> {
        match self {
            Descriptor::Code(code) => Some(*code),
            Descriptor::Symbol(_) => None,
        }
    }
}

impl From<u64> for Descriptor {
    fn from(code: u64) -> Self {
        Descriptor::Code(code)
    }
}

impl From<&str> for Descriptor {
    fn from(name: &str) -> Self {
        Descriptor::symbol(name)
    }
}

impl From<Symbol> for Descriptor {
    fn from(symbol: Symbol) -> Self {
        Descriptor::Symbol(symbol)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Descriptor::Code(code) => write!(f, "{:#x}", code),
            Descriptor::Symbol(symbol) => write!(f, "{}", symbol),
        }
    }
}
