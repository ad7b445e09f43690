//! Descriptor registry for resolving described types.
//!
//! The registry maps descriptors to constructors. A domain type registers its
//! constructor once per equivalent descriptor (numeric code and symbolic
//! name), so either wire form resolves to the same type. Registering a
//! descriptor again replaces the previous constructor.
//!
//! # Example
//!
//! ```
//! use amqp_engine::codec::{Descriptor, DescriptorRegistry};
//! use amqp_engine::types::DeleteOnNoLinksOrMessages;
//!
//! let mut registry = DescriptorRegistry::new();
//! registry.register_type::<DeleteOnNoLinksOrMessages>();
//!
//! let typed = registry
//!     .decode(&Descriptor::symbol("amqp:delete-on-no-links-or-messages:list"), vec![])
//!     .unwrap();
//! assert_eq!(typed.descriptor(), Some(Descriptor::Code(0x2e)));
//! ```

use std::collections::HashMap;
use std::sync::OnceLock;

use super::descriptor::Descriptor;
use super::value::Value;
use crate::error::Result;
use crate::types::{
    Accepted, DeleteOnClose, DeleteOnNoLinks, DeleteOnNoLinksOrMessages, DeleteOnNoMessages,
    DescribedType, Received, Rejected, Released, TypedValue, UnknownDescribed,
};

/// Constructor building a typed value from a decoded field list.
///
/// Constructors must be pure: equal field lists yield equal values.
pub type Constructor = fn(Vec<Value>) -> Result<TypedValue>;

/// Registry mapping descriptors to constructors.
#[derive(Debug, Clone, Default)]
pub struct DescriptorRegistry {
    constructors: HashMap<Descriptor, Constructor>,
}

impl DescriptorRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every composite type this crate defines.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register_type::<DeleteOnClose>();
        registry.register_type::<DeleteOnNoLinks>();
        registry.register_type::<DeleteOnNoMessages>();
        registry.register_type::<DeleteOnNoLinksOrMessages>();

        registry.register_type::<Received>();
        registry.register_type::<Accepted>();
        registry.register_type::<Rejected>();
        registry.register_type::<Released>();

        tracing::debug!(
            descriptors = registry.len(),
            "Populated default descriptor registry"
        );
        registry
    }

    /// Associate `descriptor` with `constructor`.
    ///
    /// A later registration for the same descriptor wins.
    pub fn register(&mut self, descriptor: impl Into<Descriptor>, constructor: Constructor) {
        let descriptor = descriptor.into();
        if self.constructors.insert(descriptor.clone(), constructor).is_some() {
            tracing::debug!(%descriptor, "Replaced constructor for descriptor");
        }
    }

    /// Register a composite type under all of its descriptors.
    pub fn register_type<T>(&mut self)
    where
        T: DescribedType + Into<TypedValue>,
    {
        T::register(self);
    }

    /// Resolve `descriptor` and build a typed value from `fields`.
    ///
    /// Unregistered descriptors never fail: the descriptor and fields come back
    /// unchanged inside [`TypedValue::Unknown`].
    ///
    /// # Errors
    ///
    /// Returns the constructor's error if the fields do not fit the type.
    pub fn decode(&self, descriptor: &Descriptor, fields: Vec<Value>) -> Result<TypedValue> {
        match self.constructors.get(descriptor) {
            Some(constructor) => constructor(fields),
            None => {
                tracing::warn!(%descriptor, "No constructor registered, keeping raw value");
                Ok(TypedValue::Unknown(UnknownDescribed::new(
                    descriptor.clone(),
                    fields,
                )))
            }
        }
    }

    /// Check if a constructor is registered for `descriptor`.
    pub fn contains(&self, descriptor: &Descriptor) -> bool {
        self.constructors.contains_key(descriptor)
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

/// Process-wide registry with every built-in type, built on first use.
pub fn registry() -> &'static DescriptorRegistry {
    static REGISTRY: OnceLock<DescriptorRegistry> = OnceLock::new();
    REGISTRY.get_or_init(DescriptorRegistry::with_defaults)
}
