//! Reactive signals the client flips after successful calls to matching routes.

use std::time::Duration;
use tokio::sync::watch;

pub const DEFAULT_FLIP_DELAY: Duration = Duration::from_millis(10);

/// A boolean signal; subscribers only care that it changed.
#[derive(Clone, Debug)]
pub struct Atom {
    tx: watch::Sender<bool>,
}

impl Default for Atom {
    fn default() -> Self {
        Self::new()
    }
}

impl Atom {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Atom { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn get(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn flip(&self) {
        self.tx.send_modify(|v| *v = !*v);
    }
}

/// Ties an atom to the routes whose success should refresh it.
#[derive(Clone, Debug)]
pub struct AtomListener {
    pub atom: Atom,
    matchers: Vec<String>,
    delay: Duration,
}

impl AtomListener {
    /// `matchers` are path prefixes, or exact paths when they do not end in `*`.
    pub fn new(atom: Atom, matchers: &[&str]) -> Self {
        AtomListener {
            atom,
            matchers: matchers.iter().map(|m| m.to_string()).collect(),
            delay: DEFAULT_FLIP_DELAY,
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matchers.iter().any(|m| match m.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => m == path,
        })
    }

    /// Flip the atom after the configured delay so it lands after the caller's
    /// own state update.
    pub fn notify(&self) {
        let atom = self.atom.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            atom.flip();
        });
    }
}
