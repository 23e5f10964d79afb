//! Entity resolution for the scm-assistant platform.
//!
//! Resolvers turn fragments of an operator's message into known Gateway
//! identifiers:
//!
//! - **Locations**: city, region, and project codes from a TTL cache
//! - **Devices**: fuzzy device description to canonical host
//! - **Named entities**: posters, campaigns, and venues by name
//!
//! Resolvers never fail outward. Gateway errors are logged and treated as
//! "not found" so the calling handler decides whether to ask the user.

pub mod cache;
pub mod device;
pub mod error;
pub mod location;
pub mod names;
pub mod text;

pub use cache::{CacheConfig, EntityCache, LocationCodes};
pub use device::{DeviceMatch, DeviceResolver, DeviceSearchConfig};
pub use error::ResolveError;
pub use location::{LocationResolver, LocationScope};
pub use names::{EntityKind, NameResolver, NamedEntity};
