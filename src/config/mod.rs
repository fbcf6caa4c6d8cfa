/// Main configuration module.
///
/// Re-exports submodules for pose sync, reconnection, relay and anti-spam configuration.
pub mod sync;
pub mod reconnect;
pub mod relay;
pub mod anti_spam;
