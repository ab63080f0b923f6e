//! Dispatcher and request loop.
//!
//! Flow per frame:
//! 1. Read one frame (EndOfStream ends the loop cleanly)
//! 2. Decode it into a [`Request`]
//! 3. Route to the execute / open_terminal / copy_clipboard / ping handler
//! 4. Write exactly one [`Response`] and flush before reading again
//!
//! Request-level failures become `success: false` responses and the loop
//! continues. Only framing or write failures end it early.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinSet;

use crate::bridge::channel::{Frame, FrameChannel};
use crate::bridge::protocol::{
    CopyClipboardRequest, ExecuteRequest, OpenTerminalRequest, Request, Response,
};
use crate::config::HostConfig;
use crate::desktop::{Desktop, SystemDesktop};
use crate::error::{FrameError, RequestError};
use crate::runner::ProcessRunner;
use crate::synth::{Synthesizer, remove_artifact};

/// How long a file handed to the OS opener survives before it is removed.
pub const OPENED_FILE_GRACE: Duration = Duration::from_secs(5);

pub struct Host<D = SystemDesktop> {
    synthesizer: Synthesizer,
    runner: ProcessRunner,
    desktop: D,
    open_grace: Duration,
    response_limit: usize,
    /// Deferred removals of files passed to the opener.
    cleanups: Mutex<JoinSet<()>>,
}

impl Host<SystemDesktop> {
    pub fn new(config: &HostConfig) -> Self {
        Self::with_desktop(config, SystemDesktop::from_config(config))
    }
}

impl<D: Desktop> Host<D> {
    pub fn with_desktop(config: &HostConfig, desktop: D) -> Self {
        Self {
            synthesizer: config.synthesizer(),
            runner: config.runner(),
            desktop,
            open_grace: config.open_grace,
            response_limit: config.response_limit,
            cleanups: Mutex::new(JoinSet::new()),
        }
    }

    /// Serve requests until the inbound stream closes.
    ///
    /// Returns `Err` only when the transport itself broke; after a malformed
    /// frame a best-effort error response is attempted first. Pending removals
    /// of opened files finish before this returns.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), FrameError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let served = self.serve_frames(reader, writer).await;
        self.finish_cleanups().await;
        served
    }

    async fn serve_frames<R, W>(&self, reader: R, writer: W) -> Result<(), FrameError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut channel =
            FrameChannel::new(reader, writer).with_outbound_limit(self.response_limit);
        tracing::info!("Host ready, awaiting frames");

        loop {
            let frame = match channel.read_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::info!("Input stream closed, exiting");
                    return Ok(());
                }
                Err(e) => {
                    tracing::error!(error = %e, "Framing error, closing channel");
                    let _ = channel
                        .write_frame(Response::failure(format!("Failed to read message: {e}")))
                        .await;
                    return Err(e);
                }
            };

            let response = self.handle_frame(frame).await;
            let written = match channel.write_frame(response).await {
                Err(FrameError::Oversized(e)) => {
                    tracing::warn!(error = %e, "Response too large, replying with failure");
                    channel
                        .write_frame(Response::failure(format!("Response too large: {e}")))
                        .await
                }
                written => written,
            };
            written.inspect_err(|e| {
                tracing::error!(error = %e, "Failed to write response");
            })?;
        }
    }

    /// Wait for pending opener-file removals.
    async fn finish_cleanups(&self) {
        let mut pending = std::mem::take(&mut *self.lock_cleanups());
        if !pending.is_empty() {
            tracing::debug!(pending = pending.len(), "Waiting for deferred cleanups");
        }
        while pending.join_next().await.is_some() {}
    }

    fn lock_cleanups(&self) -> std::sync::MutexGuard<'_, JoinSet<()>> {
        self.cleanups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove `path` once the opener has had time to read it.
    fn defer_removal(&self, path: PathBuf) {
        let grace = self.open_grace;
        let mut cleanups = self.lock_cleanups();
        // Reap finished removals so the set does not grow for a long session.
        while cleanups.try_join_next().is_some() {}
        cleanups.spawn(async move {
            tokio::time::sleep(grace).await;
            remove_artifact(&path);
        });
    }

    /// Turn one frame into exactly one response.
    pub async fn handle_frame(&self, frame: Frame) -> Response {
        let request = match frame {
            Frame::Message(value) => Request::from_value(value),
            Frame::Undecodable(e) => Err(RequestError::Decode(e)),
        };

        let outcome = match request {
            Ok(request) => {
                let action = request.action();
                tracing::debug!(action, "Handling request");
                AssertUnwindSafe(self.dispatch(request))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(RequestError::Internal(panic_message(&*panic))))
            }
            Err(e) => Err(e),
        };

        outcome.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Request failed");
            e.into()
        })
    }

    pub async fn dispatch(&self, request: Request) -> Result<Response, RequestError> {
        match request {
            Request::Execute(req) => self.execute(req).await,
            Request::OpenTerminal(req) => self.open_terminal(req).await,
            Request::CopyClipboard(req) => self.copy_clipboard(req).await,
            Request::Ping => Ok(Response::message("pong")),
        }
    }

    async fn execute(&self, req: ExecuteRequest) -> Result<Response, RequestError> {
        let synthesized =
            self.synthesizer
                .synthesize(&req.code, &req.language, req.filename.as_deref())?;

        let result = self.runner.run(&synthesized.strategy).await;
        tracing::info!(
            language = %req.language,
            returncode = result.returncode,
            command = %result.command,
            "Execution finished"
        );

        if synthesized.defers_cleanup() && result.returncode == 0 {
            self.defer_removal(synthesized.source);
        } else {
            remove_artifact(&synthesized.source);
        }

        Ok(result.into_response())
    }

    async fn open_terminal(&self, req: OpenTerminalRequest) -> Result<Response, RequestError> {
        self.desktop
            .open_terminal(req.command.as_deref())
            .await
            .map_err(RequestError::Terminal)?;
        Ok(Response::message("Terminal opened successfully"))
    }

    async fn copy_clipboard(&self, req: CopyClipboardRequest) -> Result<Response, RequestError> {
        self.desktop
            .copy_to_clipboard(&req.text)
            .await
            .map_err(RequestError::Clipboard)?;
        Ok(Response::message("Text copied to clipboard"))
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "request handler panicked".to_string()
    }
}
