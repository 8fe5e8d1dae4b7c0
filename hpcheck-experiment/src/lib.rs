pub mod config;
pub mod events;
pub mod sampler;
pub mod scoring;
pub mod session;
pub mod source;
pub mod state;

pub use config::{CheckConfig, ConfigError, ConfigOverrides, ThresholdMode};
pub use events::{ChannelObserver, CheckEvent, CheckObserver};
pub use sampler::{SampleError, SampleWarning};
pub use session::Session;
pub use source::{DataLoadError, JsonFileSource, StaticSource, StimulusSource};
pub use state::{
    EngineError, HostSignal, PageTrial, PageView, PlaybackRefused, ResponseRefused,
    TrialStateMachine,
};
