//! Engine Facade
//!
//! Owns the producer thread and the message surface around it. The
//! controller talks to the engine exclusively through the control channel
//! (`Init`, `Start`, `Stop`, `UpdateParams`); the engine answers with
//! `FrameReady` events at roughly the snapshot rate. Configuration never
//! travels through shared memory — only the double buffer is shared, and
//! the flag flip is its single synchronization point.
//!
//! The worker loop drains pending control messages, produces however many
//! samples the pacer says are due, publishes snapshots on cadence, and
//! yields between ticks. Messages that arrive in the wrong state are
//! logged and ignored rather than tearing the engine down; only a
//! mismatched buffer geometry refuses `Init` outright.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::chain::ChainRunner;
use crate::double_buffer::DoubleBuffer;
use crate::error::EngineError;
use crate::pacing::{Clock, Pacer, SystemClock};
use crate::params::{Params, ParamsUpdate};

/// Control messages consumed by the engine.
pub enum ControlMessage {
    /// Wire up the shared double buffer. Must be the first message.
    Init {
        buffer: Arc<DoubleBuffer>,
        snapshot_points: usize,
    },
    /// Build the DSP graph and start producing.
    Start { params: Params },
    /// Cease processing and tear the DSP graph down.
    Stop,
    /// Apply a parameter diff to the running chain.
    UpdateParams(ParamsUpdate),
}

impl std::fmt::Debug for ControlMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlMessage::Init {
                snapshot_points, ..
            } => f
                .debug_struct("Init")
                .field("snapshot_points", snapshot_points)
                .finish(),
            ControlMessage::Start { .. } => f.write_str("Start"),
            ControlMessage::Stop => f.write_str("Stop"),
            ControlMessage::UpdateParams(_) => f.write_str("UpdateParams"),
        }
    }
}

/// Events emitted by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    /// A fresh snapshot was published to the double buffer.
    FrameReady {
        outputs: crate::chain::ScalarOutputs,
        effective_sample_rate: f64,
        data_length: usize,
    },
}

/// Handle to a running engine thread.
///
/// Dropping the handle (or calling [`shutdown`](Self::shutdown)) closes
/// the control channel; the worker notices and exits.
#[derive(Debug)]
pub struct LockinEngine {
    control_tx: Option<Sender<ControlMessage>>,
    event_rx: Receiver<EngineEvent>,
    worker: Option<JoinHandle<()>>,
}

impl LockinEngine {
    /// Spawn the engine on the monotonic system clock.
    pub fn spawn() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Spawn the engine on a caller-provided clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let (control_tx, control_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            EngineWorker::new(control_rx, event_tx, clock).run();
        });
        Self {
            control_tx: Some(control_tx),
            event_rx,
            worker: Some(worker),
        }
    }

    /// Declare the shared buffer geometry.
    pub fn init(&self, buffer: Arc<DoubleBuffer>, snapshot_points: usize) {
        self.send(ControlMessage::Init {
            buffer,
            snapshot_points,
        });
    }

    /// Start the chain with a parameter snapshot.
    pub fn start(&self, params: Params) {
        self.send(ControlMessage::Start { params });
    }

    /// Stop the chain; the worker stays alive for a later `Start`.
    pub fn stop(&self) {
        self.send(ControlMessage::Stop);
    }

    /// Send a parameter diff to the running chain.
    pub fn update(&self, update: ParamsUpdate) {
        self.send(ControlMessage::UpdateParams(update));
    }

    /// The event channel carrying `FrameReady` notifications.
    pub fn events(&self) -> &Receiver<EngineEvent> {
        &self.event_rx
    }

    /// Close the control channel and join the worker.
    pub fn shutdown(mut self) {
        self.control_tx = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("engine worker panicked");
            }
        }
    }

    fn send(&self, message: ControlMessage) {
        if let Some(tx) = &self.control_tx {
            if tx.send(message).is_err() {
                warn!("engine worker is gone; control message dropped");
            }
        }
    }
}

impl Drop for LockinEngine {
    fn drop(&mut self) {
        self.control_tx = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Sleep between producer ticks. Short enough that the 2000-sample cap is
/// never the steady-state limit at the default 50 kHz rate.
const TICK_INTERVAL: Duration = Duration::from_micros(500);

struct EngineWorker {
    control: Receiver<ControlMessage>,
    events: Sender<EngineEvent>,
    clock: Arc<dyn Clock>,
    shared: Option<Arc<DoubleBuffer>>,
    runner: Option<ChainRunner>,
    pacer: Option<Pacer>,
}

impl EngineWorker {
    fn new(
        control: Receiver<ControlMessage>,
        events: Sender<EngineEvent>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            control,
            events,
            clock,
            shared: None,
            runner: None,
            pacer: None,
        }
    }

    fn run(mut self) {
        info!("engine worker up");
        loop {
            loop {
                match self.control.try_recv() {
                    Ok(message) => {
                        if let Err(error) = self.handle(message) {
                            warn!(%error, "control message refused");
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        info!("control channel closed; engine worker down");
                        return;
                    }
                }
            }

            self.tick();
            thread::park_timeout(TICK_INTERVAL);
        }
    }

    /// One producer tick: catch up on due samples, publish on cadence.
    fn tick(&mut self) {
        let (Some(runner), Some(pacer)) = (self.runner.as_mut(), self.pacer.as_mut()) else {
            return;
        };
        let Some(buffer) = self.shared.as_ref() else {
            return;
        };

        let now = self.clock.now_ns();
        let due = pacer.due_samples(now);
        runner.produce(due);

        if pacer.should_publish(now) {
            let frame = runner.write_snapshot(buffer);
            let _ = self.events.send(EngineEvent::FrameReady {
                outputs: frame.outputs,
                effective_sample_rate: frame.effective_sample_rate,
                data_length: frame.data_length,
            });
        }
    }

    fn handle(&mut self, message: ControlMessage) -> Result<(), EngineError> {
        match message {
            ControlMessage::Init {
                buffer,
                snapshot_points,
            } => {
                if buffer.snapshot_points() != snapshot_points {
                    return Err(EngineError::ShapeMismatch {
                        expected: snapshot_points,
                        actual: buffer.snapshot_points(),
                    });
                }
                info!(snapshot_points, "double buffer attached");
                self.shared = Some(buffer);
                Ok(())
            }
            ControlMessage::Start { params } => {
                let Some(buffer) = self.shared.as_ref() else {
                    return Err(EngineError::NotInitialized("Start"));
                };
                let mut params = params.clamped();
                if params.engine.snapshot_points != buffer.snapshot_points() {
                    debug!(
                        declared = params.engine.snapshot_points,
                        buffer = buffer.snapshot_points(),
                        "snapshot_points follows the attached buffer"
                    );
                    params.engine.snapshot_points = buffer.snapshot_points();
                }
                let runner = ChainRunner::new(params)?;
                let now = self.clock.now_ns();
                self.pacer = Some(Pacer::new(
                    runner.params().engine.sample_rate,
                    runner.params().engine.snapshot_rate,
                    now,
                ));
                info!(
                    sample_rate = runner.params().engine.sample_rate,
                    "engine started"
                );
                self.runner = Some(runner);
                Ok(())
            }
            ControlMessage::Stop => {
                if self.shared.is_none() {
                    return Err(EngineError::NotInitialized("Stop"));
                }
                self.runner = None;
                self.pacer = None;
                info!("engine stopped");
                Ok(())
            }
            ControlMessage::UpdateParams(update) => {
                if self.shared.is_none() {
                    return Err(EngineError::NotInitialized("UpdateParams"));
                }
                let Some(runner) = self.runner.as_mut() else {
                    return Err(EngineError::NotRunning("UpdateParams"));
                };
                match runner.apply_update(&update) {
                    Ok(effect) => debug!(?effect, "parameters updated"),
                    // The failed filter keeps its prior coefficients;
                    // the rest of the diff still landed.
                    Err(error) => warn!(%error, "filter design rejected"),
                }
                Ok(())
            }
        }
    }
}
