//! Data model for Stateline.
//!
//! A user describes a stateful system as a catalogue of [`Command`]s over
//! an abstract model state, wrapped in a [`Spec`]. The engine generates
//! programs of command invocations whose arguments ([`ArgTree`]) may refer
//! to the results of earlier invocations through symbolic [`Handle`]s;
//! at execution time handles are substituted with concrete [`Value`]s via
//! [`Bindings`].

pub mod args;
pub mod command;
pub mod program;
pub mod symbolic;
pub mod value;

pub use args::{realize, ArgSpec, ArgTree};
pub use command::{Command, GenConfig, RunConfig, Spec, MAX_THREADS};
pub use program::{thread_label, Invocation, Program};
pub use symbolic::{
    referenced_handles, substitute, Bindings, EngineError, ExecOutcome, Handle, HandleMint,
    SymValue,
};
pub use value::{Caught, Value};
