//! Error types for spawn pools

use crate::prototype::{PoolId, PrototypeId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoolError {
    #[error("Pool for {0} is at maximum capacity with no inactive instances")]
    PoolExhausted(PrototypeId),

    #[error("Pool for {0} has no active instances")]
    PoolEmpty(PrototypeId),

    #[error("Instance belongs to {instance_pool}, not to {pool}")]
    NotOwned {
        pool: PoolId,
        instance_pool: PoolId,
    },

    #[error("Instance is not active in pool {0}")]
    NotActive(PrototypeId),

    #[error("Prototype {0} is configured more than once")]
    DuplicatePrototype(PrototypeId),

    #[error("No pool is registered for prototype {0}")]
    UnknownPrototype(PrototypeId),

    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Metrics export failed: {0}")]
    MetricsExport(String),
}

pub type PoolResult<T> = Result<T, PoolError>;
