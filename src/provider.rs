//! Provider-facing descriptors (data), strategies (behavior), presets, and the registry.
//!
//! `descriptor` exposes validated metadata (`ProviderDescriptor`) covering the authorization,
//! token, and user-info endpoints, the ordered scope list, and the named secret reference
//! used to fetch client credentials. `strategy` defines [`ProviderStrategy`], the two
//! extension points that shape outgoing requests and normalize user-info payloads, so adding
//! a provider never changes the transport client's control flow. `registry` resolves a
//! provider identifier to its registered descriptor + strategy pair.

pub mod descriptor;
pub mod presets;
pub mod registry;
pub mod strategy;

pub use descriptor::*;
pub use presets::*;
pub use registry::*;
pub use strategy::*;
