mod config;
mod endpoint;
mod consumer;
mod chain;
mod mock;
mod publisher;
pub mod scheduler;

pub use config::{ConfirmationPolicy, PublishTarget, PublisherConfig, RetryPolicy};
pub use endpoint::{ConfirmationStatus, PublicationEndpoint};
pub use consumer::HttpConsumerEndpoint;
pub use chain::{ChainEndpoint, ChainReader, Inclusion};
pub use mock::MockEndpoint;
pub use publisher::{DriveOutcome, Publisher};
pub use scheduler::{Scheduler, TickOutcome};
