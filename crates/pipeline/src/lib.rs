//! Enhancement Runner.
//!
//! [`runner::EnhancementRunner`] drives one job from `uploaded` to a
//! terminal state: it prepares the stored WAV for the model with
//! [`audio::prepare`], calls the enhancer under a timeout, and reports the
//! outcome through the job state machine.

pub mod audio;
pub mod runner;

pub use audio::AudioError;
pub use runner::{EnhancementRunner, RunOutcome, RunnerSettings};
