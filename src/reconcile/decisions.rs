//! Request/response channel for confirming external-change actions.
//!
//! The reconciler sends one [`DecisionRequest`] per pass and blocks until a
//! [`Resolver`] replies, the reply sender is dropped, or the pass is
//! cancelled through a [`CancelHandle`].
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, warn};

use super::{Action, ChangeKind, FileEntry, group_by_kind};
use crate::error::{DeployError, Result};

const CANCEL_POLL: Duration = Duration::from_millis(100);

/// Answer to a [`DecisionRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionReply {
    /// Entries with the chosen actions.
    Resolved(Vec<FileEntry>),
    /// Abort the enclosing operation.
    Cancel,
}

/// A batch of changes awaiting confirmation.
#[derive(Debug)]
pub struct DecisionRequest {
    /// Game the changes belong to.
    pub game_id: String,
    /// Changes with their default actions.
    pub changes: Vec<FileEntry>,
    reply: Sender<DecisionReply>,
}

impl DecisionRequest {
    /// Reply with `entries`.
    pub fn resolve(self, entries: Vec<FileEntry>) {
        self.send(DecisionReply::Resolved(entries));
    }

    /// Reply with cancellation.
    pub fn cancel(self) {
        self.send(DecisionReply::Cancel);
    }

    fn send(self, reply: DecisionReply) {
        if self.reply.send(reply).is_err() {
            debug!(game = %self.game_id, "decision requester went away");
        }
    }
}

/// Signals cancellation to a waiting [`DecisionChannel::request`].
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Cancel pending and future requests.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`cancel`](Self::cancel) was called.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sending side of the decision channel, held by the reconciler.
#[derive(Debug)]
pub struct DecisionChannel {
    requests: Sender<DecisionRequest>,
    cancel: CancelHandle,
}

impl DecisionChannel {
    /// Create a channel and the receiver a [`Resolver`] serves.
    #[must_use]
    pub fn new() -> (Self, Receiver<DecisionRequest>) {
        let (requests, rx) = mpsc::channel();
        (
            Self {
                requests,
                cancel: CancelHandle::default(),
            },
            rx,
        )
    }

    /// Handle that cancels requests on this channel.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Publish `changes` and block until they are resolved.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::UserCanceled`] when the reply is
    /// [`DecisionReply::Cancel`], the resolver is gone, or the channel was
    /// cancelled.
    pub fn request(&self, game_id: &str, changes: Vec<FileEntry>) -> Result<Vec<FileEntry>> {
        if self.cancel.is_canceled() {
            return Err(DeployError::UserCanceled);
        }
        let (reply, replies) = mpsc::channel();
        self.requests
            .send(DecisionRequest {
                game_id: game_id.to_string(),
                changes,
                reply,
            })
            .map_err(|_| DeployError::UserCanceled)?;

        loop {
            match replies.recv_timeout(CANCEL_POLL) {
                Ok(DecisionReply::Resolved(entries)) => return Ok(entries),
                Ok(DecisionReply::Cancel) | Err(RecvTimeoutError::Disconnected) => {
                    return Err(DeployError::UserCanceled);
                }
                Err(RecvTimeoutError::Timeout) if self.cancel.is_canceled() => {
                    return Err(DeployError::UserCanceled);
                }
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }
}

/// Decides the actions for a batch of changes.
pub trait Resolver {
    /// Produce the reply for `changes` of `game_id`.
    fn resolve(&mut self, game_id: &str, changes: Vec<FileEntry>) -> DecisionReply;
}

/// Accepts the default action of every change.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoResolver;

impl Resolver for AutoResolver {
    fn resolve(&mut self, game_id: &str, changes: Vec<FileEntry>) -> DecisionReply {
        debug!(game = game_id, count = changes.len(), "accepting default actions");
        DecisionReply::Resolved(changes)
    }
}

/// Asks on a terminal which action to apply to each kind of change.
#[derive(Debug)]
pub struct PromptResolver<R, W> {
    input: R,
    output: W,
}

impl PromptResolver<io::BufReader<io::Stdin>, io::Stdout> {
    /// Prompt on stdin/stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptResolver<R, W> {
    /// Prompt on `input`/`output`.
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print the files of one kind and read the action for all of them.
    /// `None` means cancel.
    fn ask(&mut self, kind: ChangeKind, entries: &[&FileEntry]) -> io::Result<Option<Action>> {
        let options = kind.allowed_actions();
        if let [only] = options {
            return Ok(Some(*only));
        }

        writeln!(self.output, "\n{} ({}):", heading(kind), entries.len())?;
        for entry in entries {
            writeln!(
                self.output,
                "  {} [{}]",
                entry.change.file_path, entry.change.source
            )?;
        }
        for (i, action) in options.iter().enumerate() {
            let marker = if *action == kind.default_action() {
                " (default)"
            } else {
                ""
            };
            writeln!(self.output, "  \x1b[1m{}\x1b[0m) {}{marker}", i + 1, action.describe())?;
        }
        writeln!(self.output, "  \x1b[1m{}\x1b[0m) cancel", options.len() + 1)?;
        write!(self.output, "Select [1-{}]: ", options.len() + 1)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let line = line.trim();
        if line.is_empty() {
            return Ok(Some(kind.default_action()));
        }
        let choice: usize = line
            .parse()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid selection"))?;
        match choice.checked_sub(1).map(|i| options.get(i)) {
            Some(Some(action)) => Ok(Some(*action)),
            Some(None) if choice == options.len() + 1 => Ok(None),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "selection out of range",
            )),
        }
    }
}

fn heading(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::RefChange => "Deployed files were replaced",
        ChangeKind::ValChange => "Staged files were modified",
        ChangeKind::Deleted => "Deployed files were deleted",
        ChangeKind::SrcDeleted => "Staged files were deleted",
    }
}

impl<R: BufRead, W: Write> Resolver for PromptResolver<R, W> {
    fn resolve(&mut self, game_id: &str, changes: Vec<FileEntry>) -> DecisionReply {
        let mut chosen = Vec::new();
        for (kind, entries) in group_by_kind(&changes) {
            match self.ask(kind, &entries) {
                Ok(Some(action)) => chosen.push((kind, action)),
                Ok(None) => return DecisionReply::Cancel,
                Err(e) => {
                    warn!(game = game_id, "failed to read decision: {e}");
                    return DecisionReply::Cancel;
                }
            }
        }
        let resolved = changes
            .into_iter()
            .map(|mut entry| {
                if let Some((_, action)) = chosen.iter().find(|(k, _)| *k == entry.change.kind) {
                    entry.action = *action;
                }
                entry
            })
            .collect();
        DecisionReply::Resolved(resolved)
    }
}

/// Serve requests from `requests` with `resolver` on a background thread
/// until every [`DecisionChannel`] is dropped.
pub fn spawn_resolver<S>(requests: Receiver<DecisionRequest>, mut resolver: S) -> JoinHandle<()>
where
    S: Resolver + Send + 'static,
{
    std::thread::spawn(move || {
        for request in requests {
            let changes = request.changes.clone();
            match resolver.resolve(&request.game_id, changes) {
                DecisionReply::Resolved(entries) => request.resolve(entries),
                DecisionReply::Cancel => request.cancel(),
            }
        }
    })
}
