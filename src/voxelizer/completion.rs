//! Run completion signalling
//!
//! Each submitted run gets its own bounded channel. The sending half travels
//! into the device callback; the receiving half is polled by the voxelizer
//! without blocking. Dropping the token is enough to invalidate a run: a late
//! callback sends into a closed channel and nothing happens.

use crate::error::{VoxelResult, VoxelizerError};
use std::time::Duration;

/// Outcome delivered for one run
pub type CompletionSignal = VoxelResult<()>;

/// Sending half, owned by whatever finishes the run
#[derive(Debug)]
pub struct CompletionSender {
    sender: flume::Sender<CompletionSignal>,
    generation: u64,
}

/// Receiving half, owned by the voxelizer that submitted the run
#[derive(Debug)]
pub struct CompletionToken {
    receiver: flume::Receiver<CompletionSignal>,
    generation: u64,
}

/// What a poll of the token observed
#[derive(Debug)]
pub enum CompletionPoll {
    Pending,
    Completed,
    Failed(VoxelizerError),
}

pub fn completion_channel(generation: u64) -> (CompletionSender, CompletionToken) {
    let (sender, receiver) = flume::bounded(1);
    (
        CompletionSender { sender, generation },
        CompletionToken {
            receiver,
            generation,
        },
    )
}

impl CompletionSender {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver the outcome; returns false when the token is already gone
    pub fn complete(self, signal: CompletionSignal) -> bool {
        let delivered = self.sender.send(signal).is_ok();
        if !delivered {
            log::debug!(
                "[Completion] Run {} finished after its token was dropped",
                self.generation
            );
        }
        delivered
    }
}

impl CompletionToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Non-blocking check
    pub fn poll(&self) -> CompletionPoll {
        match self.receiver.try_recv() {
            Ok(Ok(())) => CompletionPoll::Completed,
            Ok(Err(error)) => CompletionPoll::Failed(error),
            Err(flume::TryRecvError::Empty) => CompletionPoll::Pending,
            Err(flume::TryRecvError::Disconnected) => {
                CompletionPoll::Failed(VoxelizerError::Submission(format!(
                    "run {} was dropped before completing",
                    self.generation
                )))
            }
        }
    }

    /// Block until the run finishes or `timeout` elapses
    ///
    /// Only useful when something else drives the device forward, such as
    /// the CPU backend or a `Maintain::Wait` poll.
    pub fn wait(&self, timeout: Duration) -> CompletionPoll {
        match self.receiver.recv_timeout(timeout) {
            Ok(Ok(())) => CompletionPoll::Completed,
            Ok(Err(error)) => CompletionPoll::Failed(error),
            Err(flume::RecvTimeoutError::Timeout) => CompletionPoll::Pending,
            Err(flume::RecvTimeoutError::Disconnected) => {
                CompletionPoll::Failed(VoxelizerError::Submission(format!(
                    "run {} was dropped before completing",
                    self.generation
                )))
            }
        }
    }
}
