//! Async driver for authority sessions.
//!
//! [`Authority`] owns the continuity registry shared by every connection and
//! runs one [`Session`] per connection. Each connection is a single task:
//!
//! ```text
//!                   ┌────────────── serve task ──────────────┐
//!  FrameSource ──►  │ reader ─► frames ─┐                    │
//!  (reader task)    │                   ├─► select! ─► Session ─► actions ─► FrameSink
//!  other serve ──►  │ control (retire) ─┤                    │
//!  tasks            │ tick timer ───────┘                    │
//!                   └────────────────────────────────────────┘
//! ```
//!
//! The session itself never awaits. All of its output is drained with
//! [`Session::take_actions`] after each wakeup and executed in order.
//!
//! A connection presenting the token of a session that is still live
//! supersedes it: the old task is asked over its control channel to retire,
//! replies with the serialized state and closes its transport, and the new
//! task starts from that state under a new token.

use std::{
    collections::HashMap,
    io,
    sync::{Mutex, MutexGuard, PoisonError},
};

use bytes::Bytes;
use tephra_core::{
    Admission, Environment, FrameSink, FrameSource, Renderer, Session, SessionAction,
    SessionRegistry, SessionToken, StateSnapshot,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::{config::ServerConfig, error::ServerError};

/// Inbound frames buffered between the reader task and the session.
const FRAME_BUFFER: usize = 32;

/// What the upgrade request told us about a new connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handshake {
    /// Token presented for resumption
    pub resume: Option<String>,
    /// Initial history location
    pub location: String,
}

/// How a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ending {
    /// The client went away
    PeerClosed,
    /// The session closed the connection
    Closed {
        /// Reason sent with the close
        reason: String,
    },
    /// A newer connection took over the session's state
    Retired,
    /// Reading from or writing to the transport failed
    TransportFailed,
}

enum Control {
    Retire { reply: oneshot::Sender<Option<StateSnapshot>> },
}

enum Flow {
    Continue,
    Closed(String),
}

struct Shared {
    sessions: SessionRegistry,
    controls: HashMap<SessionToken, mpsc::Sender<Control>>,
}

/// Shared authority state plus the per-connection driver.
pub struct Authority<E: Environment> {
    env: E,
    config: ServerConfig,
    shared: Mutex<Shared>,
}

impl<E: Environment> Authority<E> {
    /// Authority with an empty continuity registry.
    pub fn new(env: E, config: ServerConfig) -> Self {
        let sessions = SessionRegistry::new(config.registry.clone());
        Self { env, config, shared: Mutex::new(Shared { sessions, controls: HashMap::new() }) }
    }

    /// Configuration in use.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Number of connections currently serving a session.
    pub fn live_sessions(&self) -> usize {
        self.shared().sessions.live_count()
    }

    /// Whether state is retained under `token`.
    pub fn has_saved(&self, token: &SessionToken) -> bool {
        self.shared().sessions.has_saved(token)
    }

    /// Serve one connection until it ends.
    ///
    /// # Errors
    ///
    /// `Session` if the initial render failed. Transport failures and
    /// session-initiated closes are reported through [`Ending`].
    pub async fn serve<R, Si, So>(
        &self,
        mut sink: Si,
        source: So,
        handshake: Handshake,
        mut renderer: R,
    ) -> Result<Ending, ServerError>
    where
        R: Renderer,
        Si: FrameSink,
        So: FrameSource,
    {
        let (control_tx, mut control_rx) = mpsc::channel(1);
        let admission = {
            let mut shared = self.shared();
            let admission =
                shared.sessions.admit(handshake.resume.as_deref(), self.env.now(), &self.env);
            shared.controls.insert(admission.token().clone(), control_tx);
            admission
        };
        let token = admission.token().clone();

        let restored = match admission {
            Admission::Fresh { .. } => None,
            Admission::Resume { snapshot, .. } => Some(snapshot),
            Admission::Supersede { retired, .. } => self.retire(&retired).await,
        };

        let mut session = Session::new(
            token.clone(),
            handshake.location,
            self.config.session.clone(),
            self.env.now(),
        );
        let started = session.start(&mut renderer, restored.as_ref());
        let flow = execute(&mut sink, session.take_actions()).await;
        if let Err(err) = started {
            self.finish(&token, &mut session, &mut renderer);
            return Err(err.into());
        }

        let (frames_tx, mut frames) = mpsc::channel(FRAME_BUFFER);
        let reader = tokio::spawn(read_frames(source, frames_tx));

        let ending = match flow {
            Ok(Flow::Closed(reason)) => Ending::Closed { reason },
            Err(err) => {
                debug!(session = %token, error = %err, "send failed");
                Ending::TransportFailed
            },
            Ok(Flow::Continue) => loop {
                tokio::select! {
                    inbound = frames.recv() => match inbound {
                        Some(Ok(Some(frame))) => {
                            if let Err(err) =
                                session.handle_frame(&frame, &mut renderer, self.env.now())
                            {
                                warn!(session = %token, error = %err, "event failed");
                            }
                        },
                        Some(Ok(None)) | None => break Ending::PeerClosed,
                        Some(Err(err)) => {
                            debug!(session = %token, error = %err, "receive failed");
                            break Ending::TransportFailed;
                        },
                    },
                    Some(Control::Retire { reply }) = control_rx.recv() => {
                        let snapshot = session
                            .retire(&mut renderer)
                            .inspect_err(|err| warn!(session = %token, error = %err, "retired without state"))
                            .ok();
                        if let Err(err) = execute(&mut sink, session.take_actions()).await {
                            debug!(session = %token, error = %err, "close after retire failed");
                        }
                        let _ = reply.send(snapshot);
                        break Ending::Retired;
                    },
                    () = self.env.sleep(self.config.tick_interval) => {
                        session.tick(self.env.now());
                    },
                }

                match execute(&mut sink, session.take_actions()).await {
                    Ok(Flow::Continue) => {},
                    Ok(Flow::Closed(reason)) => break Ending::Closed { reason },
                    Err(err) => {
                        debug!(session = %token, error = %err, "send failed");
                        break Ending::TransportFailed;
                    },
                }
            },
        };
        reader.abort();

        if ending != Ending::Retired {
            self.finish(&token, &mut session, &mut renderer);
        }
        info!(session = %token, ?ending, "connection ended");
        Ok(ending)
    }

    /// Ask the live task behind `retired` for its state and forget the token.
    async fn retire(&self, retired: &SessionToken) -> Option<StateSnapshot> {
        let control = self.shared().controls.remove(retired);
        let snapshot = match control {
            Some(control) => {
                let (reply, response) = oneshot::channel();
                if control.send(Control::Retire { reply }).await.is_ok() {
                    response.await.ok().flatten()
                } else {
                    None
                }
            },
            None => None,
        };
        if snapshot.is_none() {
            debug!(retired = %retired, "superseded session left no state");
        }
        self.shared().sessions.release(retired);
        snapshot
    }

    /// Save what the session can resume from and mark the token disconnected.
    fn finish<R: Renderer>(&self, token: &SessionToken, session: &mut Session, renderer: &mut R) {
        let snapshot = session
            .snapshot(renderer)
            .inspect_err(|err| warn!(session = %token, error = %err, "state not saved"))
            .ok();
        session.teardown(renderer);

        let mut shared = self.shared();
        shared.controls.remove(token);
        shared.sessions.on_disconnect(token, snapshot, self.env.now());
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run the session's actions in order, stopping at a close.
async fn execute<Si: FrameSink>(sink: &mut Si, actions: Vec<SessionAction>) -> io::Result<Flow> {
    for action in actions {
        match action {
            SessionAction::SendFrame(frame) => {
                debug!(len = frame.len(), "sending frame");
                sink.send_frame(frame).await?;
            },
            SessionAction::Close { reason } => {
                if let Err(err) = sink.close(&reason).await {
                    debug!(error = %err, "close failed");
                }
                return Ok(Flow::Closed(reason));
            },
        }
    }
    Ok(Flow::Continue)
}

/// Pump frames off the transport so the session loop never awaits a
/// half-read frame inside `select!`.
async fn read_frames<So: FrameSource>(
    mut source: So,
    frames: mpsc::Sender<io::Result<Option<Bytes>>>,
) {
    loop {
        let received = source.recv_frame().await;
        let last = !matches!(received, Ok(Some(_)));
        if frames.send(received).await.is_err() || last {
            return;
        }
    }
}
