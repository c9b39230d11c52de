// Core engine control - independent of any UI

pub mod command;
pub mod controller;
pub mod duration;
pub mod encoders;
pub mod os;
pub mod paths;
pub mod progress;

pub use command::{
    CommandPlan, ContainerOption, EncodeMode, EncodeOptions, EncodePreset, build_encode,
    build_extract_audio, build_remux,
};
pub use controller::{EngineEvent, ProcessController, SessionState};
pub use duration::resolve_duration;
pub use encoders::{
    CodecFamily, EncoderCapabilities, VideoEncoderOption, best_hardware_encoder, resolve_encoder,
};
pub use os::PriorityClass;
pub use paths::{resolve_engine, resolve_probe_tool};
pub use progress::ProgressSample;
