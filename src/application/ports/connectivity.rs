use tokio::sync::watch;

/// Host online/offline signal. The receiver observes every transition.
pub trait ConnectivitySignal: Send + Sync {
    fn is_online(&self) -> bool;
    fn subscribe(&self) -> watch::Receiver<bool>;
}
