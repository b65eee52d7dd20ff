//! Part resolution and price validation.

mod discovery;
mod engine;
mod key;

pub use discovery::{
    AutoSkip, Decision, DiscoveryChannel, DiscoveryContext, DiscoveryCoordinator,
    DiscoveryOutcome, DiscoverySession, RecordedDecision,
};
#[cfg(test)]
pub use discovery::ScriptedChannel;
pub use engine::ValidationEngine;
pub use key::{normalize_component, CompositeKey};
