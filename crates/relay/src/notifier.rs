/// Pushes the live subscriber count to passive observers.
///
/// Must not block: it is called from inside registry mutations.
pub trait ObserverNotifier: Send + Sync {
    fn notify_all(&self, count: usize);
}
