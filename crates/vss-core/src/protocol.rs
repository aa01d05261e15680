//! Sessions and the tree of protocol instances running in them.
//!
//! A [`Protocol`] is identified by its full name, the concatenation of the
//! session identifiers on the path from the root. Bulletin-board labels and
//! state files of a protocol are scoped by that name, so sub-protocols never
//! collide.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use rand_core::CryptoRngCore;

use crate::bulletin::{BulletinBoard, ReadLimits};
use crate::eio::ByteTree;
use crate::{Params, PartyIndex, Result};

/// Everything the protocols of one party share
pub struct Session {
    params: Params,
    board: Arc<dyn BulletinBoard>,
    directory: PathBuf,
    rng: Mutex<Box<dyn CryptoRngCore + Send>>,
    stat_dist: u32,
    limits: ReadLimits,
}

impl Session {
    /// Create a session
    pub fn new(
        params: Params,
        board: Arc<dyn BulletinBoard>,
        directory: impl Into<PathBuf>,
        rng: Box<dyn CryptoRngCore + Send>,
        stat_dist: u32,
        limits: ReadLimits,
    ) -> Arc<Self> {
        Arc::new(Self {
            params,
            board,
            directory: directory.into(),
            rng: Mutex::new(rng),
            stat_dist,
            limits,
        })
    }

    /// Parameters of the run
    pub fn params(&self) -> Params {
        self.params
    }

    /// The bulletin board
    pub fn board(&self) -> &Arc<dyn BulletinBoard> {
        &self.board
    }

    /// Statistical distance parameter for sampling
    pub fn stat_dist(&self) -> u32 {
        self.stat_dist
    }

    /// Limits applied when reading other parties' messages
    pub fn limits(&self) -> ReadLimits {
        self.limits
    }

    /// Run `f` with exclusive access to the randomness source
    pub fn with_rng<R>(&self, f: impl FnOnce(&mut dyn CryptoRngCore) -> R) -> R {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut **rng)
    }
}

/// A node of the protocol tree
#[derive(Clone)]
pub struct Protocol {
    session: Arc<Session>,
    full_name: String,
}

impl Protocol {
    /// Root protocol of a session
    pub fn root(session: Arc<Session>, sid: &str) -> Self {
        Self {
            session,
            full_name: sid.to_string(),
        }
    }

    /// Sub-protocol with session identifier `sid`
    pub fn child(&self, sid: &str) -> Self {
        Self {
            session: Arc::clone(&self.session),
            full_name: format!("{}/{sid}", self.full_name),
        }
    }

    /// The session
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Full name, unique within the session
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Parameters of the run
    pub fn params(&self) -> Params {
        self.session.params
    }

    /// Index of this party
    pub fn j(&self) -> PartyIndex {
        self.session.params.j
    }

    /// Number of parties
    pub fn k(&self) -> usize {
        self.session.params.k
    }

    /// Threshold
    pub fn t(&self) -> usize {
        self.session.params.t
    }

    /// Bulletin-board label of the message `name` of this protocol
    pub fn label(&self, name: &str) -> String {
        format!("{}/{name}", self.full_name)
    }

    /// Location of the state file `name` of this protocol
    pub fn file(&self, name: &str) -> PathBuf {
        self.session.directory.join(&self.full_name).join(name)
    }

    /// Publish the message `name`
    pub async fn publish(&self, name: &str, message: &ByteTree) -> Result<()> {
        self.session.board.publish(&self.label(name), message).await
    }

    /// Wait for the message `name` of party `l`
    pub async fn wait_for(&self, l: PartyIndex, name: &str) -> Result<Option<ByteTree>> {
        self.session
            .board
            .wait_for(l, &self.label(name), self.session.limits)
            .await
    }

    /// Read the state file `name` if it exists
    pub fn read_state(&self, name: &str, max_depth: usize) -> Result<Option<ByteTree>> {
        let path = self.file(name);
        if !path.exists() {
            return Ok(None);
        }
        ByteTree::read_from(&path, max_depth).map(Some)
    }

    /// Persist the state file `name`
    pub fn write_state(&self, name: &str, state: &ByteTree) -> Result<()> {
        state.write_to(&self.file(name))
    }
}
