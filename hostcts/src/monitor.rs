/// Receives progress events from long running operations
pub trait EventMonitor<T>: Send + Sync {
    fn on_event(&self, evt: T);
}

impl<U> EventMonitor<U> for Box<dyn EventMonitor<U>> {
    fn on_event(&self, evt: U) {
        self.as_ref().on_event(evt)
    }
}

impl<T, U> EventMonitor<U> for Box<T>
where
    T: EventMonitor<U>,
{
    fn on_event(&self, evt: U) {
        self.as_ref().on_event(evt)
    }
}

/// An [EventMonitor] that is just a noop
pub struct NoopMonitor;

impl<T> EventMonitor<T> for NoopMonitor {
    fn on_event(&self, _evt: T) {
        // noop
    }
}

impl NoopMonitor {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for NoopMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// An [EventMonitor] wrapping a closure
pub struct FnMonitor<F> {
    f: F,
}

impl<F> FnMonitor<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, F> EventMonitor<T> for FnMonitor<F>
where
    F: Fn(T) + Send + Sync,
{
    fn on_event(&self, evt: T) {
        (self.f)(evt)
    }
}
