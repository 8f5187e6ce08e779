//! Shutdown-registration capability.
//!
//! The controller must not leave an orphaned server behind when the host
//! process goes down. Registration is an injected capability rather than a
//! module-global exit listener, so tests exercise the lifecycle without
//! touching real process signals.

/// Hook invoked when the host process is about to shut down.
pub type ShutdownFn = Box<dyn FnOnce() + Send + 'static>;

/// Capability to run a hook at host-process shutdown.
pub trait ShutdownRegistry: Send + Sync {
    /// Registers `hook` to run when the host process shuts down.
    ///
    /// The registry only guarantees the hook runs; terminating the host
    /// afterwards remains the host's own responsibility.
    fn register(&self, hook: ShutdownFn);
}

/// Registry backed by tokio's Ctrl-C signal stream.
///
/// Installing a handler takes over SIGINT delivery for the process, so the
/// embedding application still decides when to actually exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalShutdown;

impl ShutdownRegistry for SignalShutdown {
    fn register(&self, hook: ShutdownFn) {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                hook();
            }
        });
    }
}
