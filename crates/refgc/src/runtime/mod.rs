//! Runtime Module - Finalization Support
//!
//! Houses the finalization scheduler and the context handed to running
//! finalizers.

pub mod finalizer;

pub use finalizer::{
    finalizer_fn, FinalizationScheduler, FinalizeContext, FinalizerFn, FinalizerOutcome,
    FinalizerRun, Mutation,
};
