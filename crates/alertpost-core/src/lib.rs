#![forbid(unsafe_code)]

pub mod bufpool;
pub mod config;
pub mod event;
pub mod handler;
pub mod payload;
pub mod registry;
pub mod service;

pub use bufpool::{BufferPool, PooledBuffer};
pub use config::{validate_all, ConfigError, EndpointConfig, HandlerConfig};
pub use event::{AlertEvent, Level};
pub use handler::{AlertHandler, DispatchError, DispatchStats, PostHandler};
pub use payload::AlertPayload;
pub use registry::{EndpointRegistry, UpdateMode};
pub use service::{AlertPostService, TestOptions, UpdateError};
