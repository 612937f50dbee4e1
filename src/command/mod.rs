//! # Command pipeline
//!
//! Commands are plain implementations of [`Command`] registered into a
//! [`CommandRegistry`]. Each one describes itself with a [`CommandDescriptor`] (names,
//! permission layout, policy flags, argument specs) and the [`CommandDispatcher`] reads
//! those descriptors generically: nothing in the pipeline knows the concrete command.
//!
//! - [`descriptor`] - static metadata and its builder
//! - [`args`] - argument specs and parsing
//! - [`permission`] - node layout and allow/deny resolution
//! - [`ledger`] - cooldown, warmup and cost bookkeeping
//! - [`main_context`] - the serialized executor for game-state mutation
//! - [`context`] - what a command body gets to work with
//! - [`outcome`] - structured results and reason codes
//! - [`registry`] - name and alias lookup
//! - [`dispatcher`] - the pipeline itself

pub mod args;
pub mod context;
pub mod descriptor;
pub mod dispatcher;
pub mod ledger;
pub mod main_context;
pub mod outcome;
pub mod permission;
pub mod registry;

pub use args::{ArgKind, ArgSpec, ArgValue, ParsedArgs};
pub use context::{CommandContext, Services};
pub use descriptor::{CommandDescriptor, ExecutionMode, PolicyFlags, SuggestedLevel};
pub use dispatcher::{CommandDispatcher, DeferredOutcome, DispatcherBuilder};
pub use ledger::CancelTrigger;
pub use main_context::{ExecutionSite, MainContext};
pub use outcome::{CommandError, CommandResult, DenyReason, ErrorCode, FailureCause, Outcome, Report, Warning};
pub use permission::{Access, Exemptions, PermissionResolver};
pub use registry::{Command, CommandRegistry, Registered, RegistryError};
