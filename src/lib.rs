pub mod checkpoint;
pub mod data;
pub mod dropout;
pub mod error;
pub mod grads;
pub mod network;
pub mod training;

pub mod prelude {
    pub use crate::checkpoint::{CheckpointRecord, load, save};
    pub use crate::data::{ClassBatch, ClassBatcher, ClassItem, SyntheticDataset};
    pub use crate::dropout::{Dropout, DropoutConfig};
    pub use crate::error::Error;
    pub use crate::grads::GradientBuffer;
    pub use crate::network::{Network, NetworkConfig};
    pub use crate::training::{
        Dataloader, EpochSummary, EvalSummary, StepSummary, TrainingConfig, evaluate, train,
    };
}

pub mod utils;

pub use error::{Error, Result};
