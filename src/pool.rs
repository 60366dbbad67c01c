//! Registry of live components and directed notification links.
//!
//! Components register under a stable name (conventionally their type name,
//! see [`pool_name`]) and may be linked so that one relays messages to
//! another it holds no reference to. The pool only keeps weak references:
//! it never extends a member's lifetime, and messages to a peer that is not
//! currently registered are dropped.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info};

/// Receives messages relayed through a [`ConnectionPool`].
pub trait PoolMember<M>: Send + Sync + 'static {
    /// Called with the sender's pool name.
    fn receive(&self, from: &str, message: &M);
}

/// Default pool name for `T`: its type name without the module path.
pub fn pool_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

struct PoolInner<M> {
    members: HashMap<String, Weak<dyn PoolMember<M>>>,
    links: HashMap<String, HashSet<String>>,
}

/// Name → member directory plus name → peers links.
pub struct ConnectionPool<M> {
    inner: Mutex<PoolInner<M>>,
}

impl<M: 'static> Default for ConnectionPool<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: 'static> ConnectionPool<M> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                members: HashMap::new(),
                links: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner<M>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `member` under `name`, replacing any previous entry.
    pub fn register<T: PoolMember<M>>(&self, name: &str, member: &Arc<T>) {
        let weak = Arc::downgrade(member);
        let weak: Weak<dyn PoolMember<M>> = weak;
        self.lock().members.insert(name.to_string(), weak);
        info!("Pool registered {}", name);
    }

    /// Remove `name`. Links originating from it are kept.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.lock().members.remove(name).is_some();
        if removed {
            info!("Pool unregistered {}", name);
        }
        removed
    }

    /// Whether `name` is registered and still alive.
    pub fn is_registered(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// The live member registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn PoolMember<M>>> {
        self.lock().members.get(name).and_then(Weak::upgrade)
    }

    /// Let `from` signal `to`.
    pub fn link(&self, from: &str, to: &str) {
        self.lock()
            .links
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        debug!("Pool linked {} -> {}", from, to);
    }

    /// Tear down every link originating from `from`.
    pub fn unlink(&self, from: &str) {
        self.lock().links.remove(from);
        debug!("Pool unlinked {}", from);
    }

    /// Names `from` is linked to, sorted.
    pub fn peers(&self, from: &str) -> Vec<String> {
        let mut peers: Vec<String> = self
            .lock()
            .links
            .get(from)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        peers.sort();
        peers
    }

    /// Relay `message` from `from` to every linked, live peer.
    ///
    /// Peers are resolved under the lock and called after it is released,
    /// so a member may touch the pool from `receive`. A peer stays alive
    /// until its delivery returns. Returns the number of deliveries.
    pub fn notify(&self, from: &str, message: &M) -> usize {
        let targets: Vec<Arc<dyn PoolMember<M>>> = {
            let inner = self.lock();
            match inner.links.get(from) {
                Some(peers) => peers
                    .iter()
                    .filter_map(|peer| inner.members.get(peer).and_then(Weak::upgrade))
                    .collect(),
                None => Vec::new(),
            }
        };

        for target in &targets {
            target.receive(from, message);
        }
        targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, String)>>,
    }

    impl PoolMember<String> for Recorder {
        fn receive(&self, from: &str, message: &String) {
            self.seen
                .lock()
                .unwrap()
                .push((from.to_string(), message.clone()));
        }
    }

    struct Leaver {
        pool: Arc<ConnectionPool<String>>,
        delivered: Mutex<usize>,
    }

    impl PoolMember<String> for Leaver {
        fn receive(&self, _from: &str, _message: &String) {
            *self.delivered.lock().unwrap() += 1;
            self.pool.unregister("Leaver");
            self.pool.unlink("Sender");
        }
    }

    #[test]
    fn test_pool_name_strips_path_and_generics() {
        assert_eq!(pool_name::<Recorder>(), "Recorder");
        assert_eq!(pool_name::<ConnectionPool<String>>(), "ConnectionPool");
    }

    #[test]
    fn test_linked_peer_receives() {
        let pool = ConnectionPool::new();
        let album = Arc::new(Recorder::default());
        pool.register("AlbumView", &album);
        pool.link("Search", "AlbumView");

        assert_eq!(pool.notify("Search", &"found".to_string()), 1);
        assert_eq!(
            *album.seen.lock().unwrap(),
            vec![("Search".to_string(), "found".to_string())]
        );
        assert_eq!(pool.peers("Search"), vec!["AlbumView".to_string()]);
    }

    #[test]
    fn test_missing_peer_drops_silently() {
        let pool = ConnectionPool::<String>::new();
        pool.link("Search", "Nobody");
        assert_eq!(pool.notify("Search", &"lost".to_string()), 0);
        assert_eq!(pool.notify("Unlinked", &"lost".to_string()), 0);
    }

    #[test]
    fn test_unregister_and_unlink() {
        let pool = ConnectionPool::new();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        pool.register("A", &a);
        pool.register("B", &b);
        pool.link("S", "A");
        pool.link("S", "B");

        assert!(pool.unregister("A"));
        assert!(!pool.unregister("A"));
        assert_eq!(pool.notify("S", &"x".to_string()), 1);
        assert!(a.seen.lock().unwrap().is_empty());

        pool.unlink("S");
        assert_eq!(pool.notify("S", &"y".to_string()), 0);
        assert_eq!(b.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_pool_does_not_own_members() {
        let pool = ConnectionPool::new();
        let member = Arc::new(Recorder::default());
        pool.register("Gone", &member);
        pool.link("S", "Gone");
        assert!(pool.is_registered("Gone"));

        drop(member);
        assert!(!pool.is_registered("Gone"));
        assert_eq!(pool.notify("S", &"x".to_string()), 0);
    }

    #[test]
    fn test_member_may_leave_during_delivery() {
        let pool = Arc::new(ConnectionPool::new());
        let leaver = Arc::new(Leaver {
            pool: pool.clone(),
            delivered: Mutex::new(0),
        });
        pool.register("Leaver", &leaver);
        pool.link("Sender", "Leaver");

        assert_eq!(pool.notify("Sender", &"bye".to_string()), 1);
        assert_eq!(*leaver.delivered.lock().unwrap(), 1);
        assert!(!pool.is_registered("Leaver"));
        assert_eq!(pool.notify("Sender", &"again".to_string()), 0);
    }
}
