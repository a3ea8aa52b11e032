//! The remote service client: an external collaborator, described only
//! through the interface handlers and the poll loop need. The real
//! implementation (HTTP calls to the cloud music service, credential
//! acquisition) lives outside this crate's scope; this module defines the
//! trait boundary plus a mock used by tests and the demo binding.

/// A remote call's outcome, distinguishing a retryable failure (network
/// blip, rate limit, 5xx) from anything else. Handlers surface this as
/// [`crate::error::SyncError::RemoteCallFailed`]; anything else they return
/// is treated as [`crate::error::SyncError::HandlerBug`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("remote call failed: {message}")]
pub struct RemoteCallFailure {
    pub message: String,
    pub retryable: bool,
}

/// Capability surface handlers are given. Real implementations wrap an
/// authenticated HTTP session; thread-safety is this type's responsibility
/// since one instance is shared read-only across handler invocations.
pub trait RemoteClient: Send + Sync {
    fn authenticated(&self) -> bool;

    fn create_song(&self, title: &str, artist: &str) -> Result<String, RemoteCallFailure>;
    fn create_playlist(&self, name: &str) -> Result<String, RemoteCallFailure>;
    fn rename_playlist(&self, remote_id: &str, name: &str) -> Result<(), RemoteCallFailure>;
    fn delete_playlist(&self, remote_id: &str) -> Result<(), RemoteCallFailure>;
    fn add_playlist_entry(&self, playlist_remote_id: &str, song_remote_id: &str) -> Result<(), RemoteCallFailure>;
}

/// A deterministic in-memory stand-in for the cloud service, used by tests
/// and the demo binding. Mirrors the two `MockApi` classes present (as a
/// duplicate-definition bug) in the original source, collapsed into one.
pub struct MockRemoteClient {
    calls: std::sync::Mutex<Vec<String>>,
    fail_next: std::sync::atomic::AtomicBool,
    fail_next_retryable: std::sync::atomic::AtomicBool,
    next_id: std::sync::atomic::AtomicI64,
}

impl Default for MockRemoteClient {
    fn default() -> Self {
        Self {
            calls: std::sync::Mutex::new(Vec::new()),
            fail_next: std::sync::atomic::AtomicBool::new(false),
            fail_next_retryable: std::sync::atomic::AtomicBool::new(true),
            next_id: std::sync::atomic::AtomicI64::new(1),
        }
    }
}

impl MockRemoteClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next remote call fail with a retryable failure, once.
    pub fn fail_next_call(&self) {
        self.fail_next_retryable.store(true, std::sync::atomic::Ordering::SeqCst);
        self.fail_next.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Make the next remote call fail with a non-retryable failure, once —
    /// e.g. a rejected request the server will never accept on retry.
    pub fn fail_next_call_permanently(&self) {
        self.fail_next_retryable.store(false, std::sync::atomic::Ordering::SeqCst);
        self.fail_next.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn maybe_fail(&self, what: &str) -> Result<(), RemoteCallFailure> {
        if self.fail_next.swap(false, std::sync::atomic::Ordering::SeqCst) {
            let retryable = self.fail_next_retryable.load(std::sync::atomic::Ordering::SeqCst);
            return Err(RemoteCallFailure { message: format!("{what}: simulated failure"), retryable });
        }
        Ok(())
    }

    fn record(&self, what: impl Into<String>) {
        self.calls.lock().unwrap().push(what.into());
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        format!("{prefix}{n}")
    }
}

impl RemoteClient for MockRemoteClient {
    fn authenticated(&self) -> bool {
        true
    }

    fn create_song(&self, title: &str, artist: &str) -> Result<String, RemoteCallFailure> {
        self.maybe_fail("create_song")?;
        self.record(format!("create_song({title}, {artist})"));
        Ok(self.next_id("S"))
    }

    fn create_playlist(&self, name: &str) -> Result<String, RemoteCallFailure> {
        self.maybe_fail("create_playlist")?;
        self.record(format!("create_playlist({name})"));
        Ok(self.next_id("P"))
    }

    fn rename_playlist(&self, remote_id: &str, name: &str) -> Result<(), RemoteCallFailure> {
        self.maybe_fail("rename_playlist")?;
        self.record(format!("rename_playlist({remote_id}, {name})"));
        Ok(())
    }

    fn delete_playlist(&self, remote_id: &str) -> Result<(), RemoteCallFailure> {
        self.maybe_fail("delete_playlist")?;
        self.record(format!("delete_playlist({remote_id})"));
        Ok(())
    }

    fn add_playlist_entry(&self, playlist_remote_id: &str, song_remote_id: &str) -> Result<(), RemoteCallFailure> {
        self.maybe_fail("add_playlist_entry")?;
        self.record(format!("add_playlist_entry({playlist_remote_id}, {song_remote_id})"));
        Ok(())
    }
}
