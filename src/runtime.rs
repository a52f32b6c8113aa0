//! Runtime abstraction layer for async operations
//!
//! This module provides runtime-agnostic interfaces for async operations,
//! allowing the layer to load archives on Tokio, in the browser, or on a
//! plain background thread.

use crate::prelude::{Future, Pin};

/// A trait for spawning async tasks (object-safe version)
pub trait AsyncSpawner: Send + Sync + 'static {
    /// Spawn a future and return a handle to it
    fn spawn_boxed(
        &self,
        future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
    ) -> Box<dyn AsyncHandle>;
}

/// Handle to a spawned async task
pub trait AsyncHandle: Send + Sync {
    /// Check if the task is finished
    fn is_finished(&self) -> bool;

    /// Cancel the task
    fn cancel(&self);
}

/// Convenience function for spawning on the global runtime
pub fn spawn<F>(future: F) -> Box<dyn AsyncHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    log::trace!("spawning async task");
    runtime().spawn_boxed(Box::pin(future))
}

/// Default spawner implementations
pub mod spawners {
    use super::*;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    #[cfg(feature = "tokio-runtime")]
    pub mod tokio_impl {
        use super::*;
        use ::tokio::task::JoinHandle;

        /// Tokio-based async spawner. Uses the ambient runtime when there is
        /// one, otherwise a lazily created multi-threaded runtime.
        pub struct TokioSpawner;

        static FALLBACK: once_cell::sync::OnceCell<::tokio::runtime::Runtime> =
            once_cell::sync::OnceCell::new();

        impl AsyncSpawner for TokioSpawner {
            fn spawn_boxed(
                &self,
                future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
            ) -> Box<dyn AsyncHandle> {
                if let Ok(handle) = ::tokio::runtime::Handle::try_current() {
                    return Box::new(TokioHandle(handle.spawn(future)));
                }

                match FALLBACK.get_or_try_init(::tokio::runtime::Runtime::new) {
                    Ok(rt) => Box::new(TokioHandle(rt.spawn(future))),
                    Err(e) => {
                        log::error!("could not start a tokio runtime: {}", e);
                        super::ThreadSpawner.spawn_boxed(future)
                    }
                }
            }
        }

        struct TokioHandle(JoinHandle<()>);

        impl AsyncHandle for TokioHandle {
            fn is_finished(&self) -> bool {
                self.0.is_finished()
            }

            fn cancel(&self) {
                self.0.abort();
            }
        }
    }

    #[cfg(feature = "wasm")]
    pub mod wasm {
        use super::*;

        /// WASM-compatible async spawner
        pub struct WasmSpawner;

        impl AsyncSpawner for WasmSpawner {
            fn spawn_boxed(
                &self,
                future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
            ) -> Box<dyn AsyncHandle> {
                let finished = Arc::new(AtomicBool::new(false));
                let finished_clone = finished.clone();
                wasm_bindgen_futures::spawn_local(async move {
                    future.await;
                    finished_clone.store(true, Ordering::SeqCst);
                });
                Box::new(FlagHandle { finished })
            }
        }
    }

    /// Drives each future to completion on its own OS thread.
    pub struct ThreadSpawner;

    impl AsyncSpawner for ThreadSpawner {
        fn spawn_boxed(
            &self,
            future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
        ) -> Box<dyn AsyncHandle> {
            let finished = Arc::new(AtomicBool::new(false));
            let finished_clone = finished.clone();
            std::thread::spawn(move || {
                futures::executor::block_on(future);
                finished_clone.store(true, Ordering::SeqCst);
            });
            Box::new(FlagHandle { finished })
        }
    }

    pub(crate) struct FlagHandle {
        finished: Arc<AtomicBool>,
    }

    impl AsyncHandle for FlagHandle {
        fn is_finished(&self) -> bool {
            self.finished.load(Ordering::SeqCst)
        }

        fn cancel(&self) {
            // Neither threads nor local browser tasks can be aborted; mark
            // the task as done so callers stop waiting on it.
            self.finished.store(true, Ordering::SeqCst);
        }
    }
}

/// Global runtime instance
static RUNTIME: std::sync::OnceLock<Box<dyn AsyncSpawner>> = std::sync::OnceLock::new();

/// Initialize the runtime with a specific spawner. Only the first call wins.
pub fn init_runtime(spawner: Box<dyn AsyncSpawner>) {
    if RUNTIME.set(spawner).is_err() {
        log::debug!("runtime already initialised");
    }
}

/// Get the global runtime spawner
pub fn runtime() -> &'static dyn AsyncSpawner {
    RUNTIME
        .get_or_init(|| {
            #[cfg(feature = "tokio-runtime")]
            {
                Box::new(spawners::tokio_impl::TokioSpawner)
            }

            #[cfg(all(feature = "wasm", not(feature = "tokio-runtime")))]
            {
                Box::new(spawners::wasm::WasmSpawner)
            }

            #[cfg(not(any(feature = "tokio-runtime", feature = "wasm")))]
            {
                Box::new(spawners::ThreadSpawner)
            }
        })
        .as_ref()
}
