mod error;
mod observer;
pub mod replay;
mod types;

pub use error::{GridWorldError, Result};
pub use observer::{CompositeObserver, DefaultObserver, EnvObserver};
pub use replay::{EpisodeHeader, ReplayObserver, ReplayReader, ReplayWriter, StepRecord};
pub use types::{Action, InvalidActionError, Position};
