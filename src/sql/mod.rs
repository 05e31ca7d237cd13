//! Safe SQL builder for the Postgres store: identifiers quoted, values as parameters.

mod builder;
mod params;
pub use builder::*;
pub use params::*;
