// Plantsync Kernel
//
// Reconciles an external metadata feed against the linked rows of project
// documents: feed loading, record matching, row updates, part selection,
// batch orchestration and the run log.

pub mod adapters;
pub mod applier;
pub mod batch;
pub mod config;
pub mod feed;
pub mod log;
pub mod matcher;
pub mod parts;
pub mod project;
pub mod store;
