//! Tool registry and dispatch.

mod host;
mod outcome;
mod specs;

pub use host::{Credentials, ToolHost, TravelToolHost};
pub use outcome::{ERR_CREDENTIAL_MISSING, ERR_UNSUPPORTED_TOOL, ToolOutcome};
pub use specs::{SEARCH_KNOWLEDGE_BASE, SEARCH_NEARBY, SEARCH_POI, builtin_specs};
