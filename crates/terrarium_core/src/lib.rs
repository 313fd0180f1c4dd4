//! # TERRARIUM Core
//!
//! Identity and behaviour of simulated objects:
//! - Dense 16-bit ids with a reserved null id
//! - World/region coordinate math
//! - The [`ActiveObject`] capability trait and the kind-keyed [`ObjectFactory`]
//! - The [`ObjectRegistry`], sole owner of every live instance
//!
//! ## Example
//!
//! ```rust,ignore
//! use terrarium_core::{ObjectRegistry, ObjectId};
//!
//! let mut registry = ObjectRegistry::new();
//! let id = registry.insert(Box::new(my_object), None)?;
//! assert_ne!(id, ObjectId::NULL);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod factory;
pub mod id;
pub mod math;
pub mod object;
pub mod registry;

pub use error::{ObjectError, ObjectResult, Rejected, RegistryError};
pub use factory::{ObjectConstructor, ObjectFactory};
pub use id::ObjectId;
pub use math::{RegionCoord, WorldPoint, NODE_SIZE, REGION_SIZE};
pub use object::{ActiveObject, LiveObject, ObjectKind, ObjectMessage, StepOutcome};
pub use registry::ObjectRegistry;
