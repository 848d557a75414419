//! Execution plumbing: blocking child processes and the designated
//! thread for thread-affine state.

pub mod dispatch;
pub mod process;
