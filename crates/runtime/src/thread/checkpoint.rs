//! The checkpoint stack: save points a step can roll the data stack and
//! stash back to without aborting the whole transaction.
//!
//! Every checkpoint is a full snapshot rather than a diff. Values are
//! persistent trees, so cloning one is an `Arc` bump, not a deep copy — the
//! same rationale the value model leans on throughout this engine.

use glas_core::Value;

#[derive(Clone, Debug)]
struct Checkpoint {
    stack: Vec<Value>,
    stash: Vec<Value>,
}

#[derive(Default)]
pub struct CheckpointStack {
    saved: Vec<Checkpoint>,
}

impl CheckpointStack {
    pub fn new() -> Self {
        CheckpointStack { saved: Vec::new() }
    }

    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Push a new checkpoint capturing the current stack/stash.
    pub fn push(&mut self, stack: &[Value], stash: &[Value]) {
        self.saved.push(Checkpoint { stack: stack.to_vec(), stash: stash.to_vec() });
    }

    /// Overwrite the top checkpoint with the current stack/stash, without
    /// changing checkpoint depth.
    pub fn save(&mut self, stack: &[Value], stash: &[Value]) -> Result<(), CheckpointError> {
        let top = self.saved.last_mut().ok_or(CheckpointError::Empty)?;
        top.stack = stack.to_vec();
        top.stash = stash.to_vec();
        Ok(())
    }

    /// Discard the top checkpoint without restoring it.
    pub fn drop_top(&mut self) -> Result<(), CheckpointError> {
        self.saved.pop().map(|_| ()).ok_or(CheckpointError::Empty)
    }

    /// Restore the top checkpoint's stack/stash, keeping the checkpoint in
    /// place so it can be loaded again.
    pub fn load(&self) -> Result<(Vec<Value>, Vec<Value>), CheckpointError> {
        let top = self.saved.last().ok_or(CheckpointError::Empty)?;
        Ok((top.stack.clone(), top.stash.clone()))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CheckpointError {
    #[error("checkpoint stack is empty")]
    Empty,
}
