//! The saturation pipeline controller and its session/daemon seams.
//!
//! `Pipeline::apply` emits the screen shader, hands it to the compositor,
//! then generates, stores and activates a matching ICC profile, reporting
//! each channel's outcome in one `ApplyResult`.
mod activate;
mod controller;
mod session;

pub use activate::{ActivationError, ColordActivator, NoActivation, ProfileActivator};
pub use controller::{
    ApplyResult, ApplyStatus, ChannelError, Pipeline, PipelineError, ProfileApplied,
    ShaderApplied,
};
pub use session::{CommandSession, SessionTool};
