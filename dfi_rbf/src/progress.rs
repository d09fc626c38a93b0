/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines progress reporting messages, sinks, and helper functions for fitting interpolants.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Progress reporting primitives for long-running computations.

use std::fmt::Debug;
use std::sync::{mpsc, Arc};
use std::thread;

/// Progress events emitted while fitting an interpolant.
#[derive(Debug, Clone)]
pub enum ProgressMsg {
    /// Event indicating that the `3n x 3n` system matrix has been assembled.
    SystemAssembled { num_points: usize, elapsed_secs: f64 },

    /// Event indicating that the Cholesky factorisation succeeded.
    Factorised { min_pivot_ratio: f64, elapsed_secs: f64 },

    /// Arbitrary informational message.
    Message { message: String },
}

/// Sink that consumes progress messages.
pub trait ProgressSink: Send + Sync + Debug {
    fn emit(&self, msg: ProgressMsg);
}

/// Progress sink that forwards messages over a bounded channel.
///
/// `emit` never blocks the fit: when the channel buffer is full, or the
/// listener has gone away, the message is dropped.
#[derive(Debug)]
pub struct ClosureSink {
    tx: mpsc::SyncSender<ProgressMsg>,
}

impl ProgressSink for ClosureSink {
    #[inline]
    fn emit(&self, msg: ProgressMsg) {
        let _ = self.tx.try_send(msg);
    }
}

/// Spawns a listener thread that runs a handler closure for each progress message.
///
/// At most `buffer` messages (minimum one) are queued for the handler. Any
/// message emitted while the queue is full is discarded, so pick a buffer
/// that covers the events of a fit if none may be lost.
///
/// The listener exits once every clone of the returned sink has been dropped,
/// so join the handle only after the interpolator holding the sink is gone.
pub fn closure_sink<F>(
    buffer: usize,
    mut handler: F,
) -> (Arc<dyn ProgressSink>, thread::JoinHandle<()>)
where
    F: FnMut(ProgressMsg) + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel::<ProgressMsg>(buffer.max(1));
    let sink: Arc<dyn ProgressSink> = Arc::new(ClosureSink { tx });

    let handle = thread::spawn(move || {
        while let Ok(msg) = rx.recv() {
            handler(msg);
        }
    });

    (sink, handle)
}
