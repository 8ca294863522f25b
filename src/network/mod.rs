//! Small feed-forward classifier: dense and dropout layers, softmax
//! cross-entropy, Adam, and an early-stopping training loop.

pub mod activation;
pub mod layers;
pub mod loss;
pub mod model;
pub mod optimizer;
pub mod training;

pub use activation::Activation;
pub use model::{ModelSummary, Sequential};
pub use optimizer::Adam;
pub use training::{fit, EarlyStopping, EpochRecord, History, TrainConfig};
