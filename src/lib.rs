//! In-process topic-based publish/subscribe engine.
//!
//! Subscribers get a private bounded [`DeliveryQueue`]; publishers fan a
//! message out to every queue registered under the named topics. A single
//! serializer task owns all subscription state and applies commands in
//! arrival order.
//!
//! ```no_run
//! # async fn demo() -> Result<(), topicbus::EngineError> {
//! let engine = topicbus::Engine::<String>::new(16)?;
//! let mut news = engine.subscribe(["news"]);
//!
//! engine.publish("hello".to_string(), ["news"]);
//! assert_eq!(news.recv().await.as_deref(), Some("hello"));
//!
//! engine.shutdown();
//! assert_eq!(news.recv().await, None);
//! # Ok(())
//! # }
//! ```

/// Engine configuration (capacity, environment loading).
pub mod config;
/// Logging setup (filters, formats).
pub mod logging;
/// Pub/Sub: Engine, DeliveryQueue, statistics.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

pub use config::{EngineConfig, DEFAULT_CAPACITY};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use pubsub::{
    DeliveryQueue, Engine, QueueId, RegistrySnapshot, StatsSnapshot, Topic,
};
/// Error types.
pub use topicbus_error::{
    ConfigError, EngineError, ErrorExt, LoggingError, RecvError, StatusCode, TryRecvError,
};
