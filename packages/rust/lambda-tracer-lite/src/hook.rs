//! Call interception with fail-open before/after hooks.
//!
//! Adapters instrument a client by wrapping one of its operations once and
//! calling the wrapper instead of the original. The wrapper runs the
//! interceptor's hooks around the original call and returns whatever the
//! original returned. Nothing a hook does, including panicking, changes the
//! value, error, panic or timing of the wrapped call.
//!
//! # Per-call context
//!
//! Every call starts from a fresh clone of the static context given at hook
//! time. `before` and `after` receive the same mutable context, which is the
//! only channel between them (typically the id of the span opened in `before`).
//!
//! # Asynchronous completion
//!
//! `after` runs as soon as the original returns. For a future-returning
//! original that is when the future is created, not when it resolves; use
//! [`hook_future`] inside `after` (or around the returned future) to observe
//! the resolution, and [`hook_stream`] or [`HookedEmitter`] when completion is
//! signalled through a stream of items or named events.
//!
//! # Example
//!
//! ```
//! use lambda_tracer_lite::hook::{HookRegistry, Interceptor};
//!
//! struct CountingInterceptor;
//!
//! impl Interceptor<(u32,), u32> for CountingInterceptor {
//!     type Context = u32;
//!
//!     fn before(&self, args: &mut (u32,), ctx: &mut u32) {
//!         *ctx = args.0;
//!     }
//!
//!     fn after(&self, _args: &(u32,), result: &u32, ctx: &mut u32) {
//!         assert_eq!(*result, *ctx * 2);
//!     }
//! }
//!
//! let registry = HookRegistry::new();
//! let double = registry.hook("math", "double", |args: &mut (u32,)| args.0 * 2, CountingInterceptor, 0);
//! assert_eq!(double.call((21,)), 42);
//! ```

use crate::logger::Logger;
use futures_util::Stream;
use pin_project::pin_project;
use std::{
    any::Any,
    cell::Cell,
    collections::HashMap,
    fmt,
    future::Future,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    sync::{Arc, Mutex, OnceLock, PoisonError},
    task::{Context, Poll},
};

static LOGGER: Logger = Logger::const_new("hook");

thread_local! {
    /// Nesting depth of [`try_run`] on this thread.
    static GUARDED: Cell<usize> = const { Cell::new(0) };
}

static QUIET_HOOK: OnceLock<()> = OnceLock::new();

/// Whether the current thread is inside [`try_run`].
pub fn in_guarded_code() -> bool {
    GUARDED.with(|depth| depth.get() > 0)
}

/// Install a panic hook that stays silent for panics [`try_run`] contains.
///
/// Every other panic goes to the hook that was installed before. Only the
/// first call has an effect.
pub fn install_quiet_panic_hook() {
    QUIET_HOOK.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !in_guarded_code() {
                previous(info);
            }
        }));
    });
}

struct GuardedScope;

impl GuardedScope {
    fn enter() -> Self {
        GUARDED.with(|depth| depth.set(depth.get() + 1));
        GuardedScope
    }
}

impl Drop for GuardedScope {
    fn drop(&mut self) {
        GUARDED.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Run `f`, converting a panic into `None`.
///
/// This is the single fail-open combinator used for every piece of tracer
/// code that runs inside a user's call path. The process panic hook still
/// sees the contained panic and, with the default hook, prints it to stderr
/// unless [`install_quiet_panic_hook`] has run ([`Tracer::init`] does this).
///
/// [`Tracer::init`]: crate::tracer::Tracer::init
pub fn try_run<T>(label: &str, f: impl FnOnce() -> T) -> Option<T> {
    let outcome = {
        let _scope = GuardedScope::enter();
        panic::catch_unwind(AssertUnwindSafe(f))
    };
    match outcome {
        Ok(value) => Some(value),
        Err(payload) => {
            LOGGER.debug(format!("{} panicked: {}", label, panic_message(&*payload)));
            None
        }
    }
}

/// Run a fallible `f`, converting both panics and errors into `None`.
pub fn try_run_result<T, E: fmt::Display>(
    label: &str,
    f: impl FnOnce() -> Result<T, E>,
) -> Option<T> {
    match try_run(label, f)? {
        Ok(value) => Some(value),
        Err(err) => {
            LOGGER.debug(format!("{} failed: {}", label, err));
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

/// Hooks run around an intercepted call.
///
/// `A` is the argument bundle of the wrapped operation (usually a tuple) and
/// `R` its return type. All hooks default to no-ops.
pub trait Interceptor<A, R>: Send + Sync + 'static {
    /// Per-call state shared by the hooks of one call.
    type Context: Clone + Send + Sync + 'static;

    /// Runs before the original. May rewrite the arguments.
    fn before(&self, _args: &mut A, _ctx: &mut Self::Context) {}

    /// Runs after the original returned.
    fn after(&self, _args: &A, _result: &R, _ctx: &mut Self::Context) {}

    /// Runs after a hooked constructor produced its instance.
    fn after_construct(&self, _instance: &mut R, _ctx: &mut Self::Context) {}
}

type Original<A, R> = Box<dyn Fn(&mut A) -> R + Send + Sync>;

/// A wrapped operation. Obtain one through [`hook`] or [`HookRegistry::hook`].
pub struct Hooked<A, R, I: Interceptor<A, R>> {
    label: String,
    original: Original<A, R>,
    interceptor: I,
    static_context: I::Context,
}

impl<A, R, I: Interceptor<A, R>> Hooked<A, R, I> {
    fn new(
        label: String,
        original: Original<A, R>,
        interceptor: I,
        static_context: I::Context,
    ) -> Self {
        Self {
            label,
            original,
            interceptor,
            static_context,
        }
    }

    /// `target.method` this wrapper was registered under.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Call the original with the hooks applied.
    pub fn call(&self, mut args: A) -> R {
        let mut ctx = self.static_context.clone();
        try_run(&self.label, || self.interceptor.before(&mut args, &mut ctx));
        let result = (self.original)(&mut args);
        try_run(&self.label, || {
            self.interceptor.after(&args, &result, &mut ctx)
        });
        result
    }
}

impl<A, R, I: Interceptor<A, R>> fmt::Debug for Hooked<A, R, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooked").field("label", &self.label).finish()
    }
}

/// A wrapped constructor: `before` sees the arguments, `after_construct` the
/// fresh instance.
pub struct HookedConstructor<A, T, I: Interceptor<A, T>>(Hooked<A, T, I>);

impl<A, T, I: Interceptor<A, T>> HookedConstructor<A, T, I> {
    /// Build an instance with the hooks applied.
    pub fn construct(&self, mut args: A) -> T {
        let hooked = &self.0;
        let mut ctx = hooked.static_context.clone();
        try_run(&hooked.label, || {
            hooked.interceptor.before(&mut args, &mut ctx)
        });
        let mut instance = (hooked.original)(&mut args);
        try_run(&hooked.label, || {
            hooked.interceptor.after_construct(&mut instance, &mut ctx)
        });
        instance
    }
}

type HookKey = (String, String);

/// Process-wide record of wrapped operations.
///
/// Wrapping the same `(target, method)` pair twice returns the first wrapper,
/// so an operation is never double-wrapped.
#[derive(Default)]
pub struct HookRegistry {
    wrappers: Mutex<HashMap<HookKey, Arc<dyn Any + Send + Sync>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry used by [`hook`] and [`hook_constructor`].
    pub fn global() -> &'static HookRegistry {
        static GLOBAL: OnceLock<HookRegistry> = OnceLock::new();
        GLOBAL.get_or_init(HookRegistry::new)
    }

    /// Wrap `original` once under `(target, method)`.
    pub fn hook<A, R, I, F>(
        &self,
        target: &str,
        method: &str,
        original: F,
        interceptor: I,
        static_context: I::Context,
    ) -> Arc<Hooked<A, R, I>>
    where
        A: 'static,
        R: 'static,
        I: Interceptor<A, R>,
        F: Fn(&mut A) -> R + Send + Sync + 'static,
    {
        self.get_or_insert(target, method, || {
            Hooked::new(
                format!("{}.{}", target, method),
                Box::new(original),
                interceptor,
                static_context,
            )
        })
    }

    /// Wrap a constructor once under `(target, "new")`.
    pub fn hook_constructor<A, T, I, F>(
        &self,
        target: &str,
        original: F,
        interceptor: I,
        static_context: I::Context,
    ) -> Arc<HookedConstructor<A, T, I>>
    where
        A: 'static,
        T: 'static,
        I: Interceptor<A, T>,
        F: Fn(&mut A) -> T + Send + Sync + 'static,
    {
        self.get_or_insert(target, "new", || {
            HookedConstructor(Hooked::new(
                format!("{}.new", target),
                Box::new(original),
                interceptor,
                static_context,
            ))
        })
    }

    /// Whether `(target, method)` has been wrapped.
    pub fn is_hooked(&self, target: &str, method: &str) -> bool {
        self.wrappers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&(target.to_string(), method.to_string()))
    }

    fn get_or_insert<W: Any + Send + Sync>(
        &self,
        target: &str,
        method: &str,
        make: impl FnOnce() -> W,
    ) -> Arc<W> {
        let mut wrappers = self.wrappers.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (target.to_string(), method.to_string());

        if let Some(existing) = wrappers.get(&key) {
            match Arc::clone(existing).downcast::<W>() {
                Ok(wrapper) => {
                    LOGGER.debug(format!("{}.{} already hooked", target, method));
                    return wrapper;
                }
                Err(_) => {
                    // Same key, different signature: keep the registered one untouched
                    LOGGER.debug(format!(
                        "{}.{} hooked with a different signature, returning an unregistered wrapper",
                        target, method
                    ));
                    return Arc::new(make());
                }
            }
        }

        let wrapper = Arc::new(make());
        wrappers.insert(key, wrapper.clone() as Arc<dyn Any + Send + Sync>);
        wrapper
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self
            .wrappers
            .lock()
            .map(|w| w.len())
            .unwrap_or_default();
        f.debug_struct("HookRegistry").field("hooked", &count).finish()
    }
}

/// Wrap `original` through the global registry.
pub fn hook<A, R, I, F>(
    target: &str,
    method: &str,
    original: F,
    interceptor: I,
    static_context: I::Context,
) -> Arc<Hooked<A, R, I>>
where
    A: 'static,
    R: 'static,
    I: Interceptor<A, R>,
    F: Fn(&mut A) -> R + Send + Sync + 'static,
{
    HookRegistry::global().hook(target, method, original, interceptor, static_context)
}

/// Wrap a constructor through the global registry.
pub fn hook_constructor<A, T, I, F>(
    target: &str,
    original: F,
    interceptor: I,
    static_context: I::Context,
) -> Arc<HookedConstructor<A, T, I>>
where
    A: 'static,
    T: 'static,
    I: Interceptor<A, T>,
    F: Fn(&mut A) -> T + Send + Sync + 'static,
{
    HookRegistry::global().hook_constructor(target, original, interceptor, static_context)
}

type ThenHandler<T> = Box<dyn FnOnce(&T) + Send>;

/// A future observed by success/failure handlers.
///
/// Polling behaviour and output are those of the inner future.
#[pin_project]
pub struct HookedFuture<F, T, E> {
    #[pin]
    inner: F,
    then: Option<ThenHandler<T>>,
    catch: Option<ThenHandler<E>>,
}

/// Observe the resolution of `future` without altering it.
pub fn hook_future<F, T, E>(
    future: F,
    then: impl FnOnce(&T) + Send + 'static,
    catch: impl FnOnce(&E) + Send + 'static,
) -> HookedFuture<F, T, E>
where
    F: Future<Output = Result<T, E>>,
{
    HookedFuture {
        inner: future,
        then: Some(Box::new(then)),
        catch: Some(Box::new(catch)),
    }
}

impl<F, T, E> Future for HookedFuture<F, T, E>
where
    F: Future<Output = Result<T, E>>,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let output = match this.inner.poll(cx) {
            Poll::Ready(output) => output,
            Poll::Pending => return Poll::Pending,
        };

        match &output {
            Ok(value) => {
                if let Some(then) = this.then.take() {
                    try_run("future.then", || then(value));
                }
            }
            Err(err) => {
                if let Some(catch) = this.catch.take() {
                    try_run("future.catch", || catch(err));
                }
            }
        }
        Poll::Ready(output)
    }
}

/// Handlers for a stream whose items signal data, errors and completion.
pub struct StreamHooks<T, E> {
    on_data: Option<Box<dyn FnMut(&T) + Send>>,
    on_error: Option<Box<dyn FnMut(&E) + Send>>,
    on_end: Option<Box<dyn FnOnce() + Send>>,
}

impl<T, E> Default for StreamHooks<T, E> {
    fn default() -> Self {
        Self {
            on_data: None,
            on_error: None,
            on_end: None,
        }
    }
}

impl<T, E> StreamHooks<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_data(mut self, f: impl FnMut(&T) + Send + 'static) -> Self {
        self.on_data = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(&E) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn on_end(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_end = Some(Box::new(f));
        self
    }
}

/// A stream observed item by item.
#[pin_project]
pub struct HookedStream<S, T, E> {
    #[pin]
    inner: S,
    hooks: StreamHooks<T, E>,
}

/// Observe every item and the end of `stream` without altering it.
pub fn hook_stream<S, T, E>(stream: S, hooks: StreamHooks<T, E>) -> HookedStream<S, T, E>
where
    S: Stream<Item = Result<T, E>>,
{
    HookedStream {
        inner: stream,
        hooks,
    }
}

impl<S, T, E> Stream for HookedStream<S, T, E>
where
    S: Stream<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let item = match this.inner.poll_next(cx) {
            Poll::Ready(item) => item,
            Poll::Pending => return Poll::Pending,
        };

        match &item {
            Some(Ok(value)) => {
                if let Some(on_data) = this.hooks.on_data.as_mut() {
                    try_run("stream.data", || on_data(value));
                }
            }
            Some(Err(err)) => {
                if let Some(on_error) = this.hooks.on_error.as_mut() {
                    try_run("stream.error", || on_error(err));
                }
            }
            None => {
                if let Some(on_end) = this.hooks.on_end.take() {
                    try_run("stream.end", on_end);
                }
            }
        }
        Poll::Ready(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Something that signals progress through named events.
pub trait Emitter {
    type Payload;

    /// Emit `event`; returns whether anything handled it.
    fn emit(&mut self, event: &str, payload: &Self::Payload) -> bool;
}

type Listener<P> = Box<dyn FnMut(&P) + Send>;

/// Wraps an [`Emitter`] so registered listeners see each named event before
/// the original emission.
pub struct HookedEmitter<E: Emitter> {
    inner: E,
    listeners: HashMap<String, Vec<Listener<E::Payload>>>,
}

impl<E: Emitter> HookedEmitter<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            listeners: HashMap::new(),
        }
    }

    /// Register a listener for `event` (`data`, `end`, `error`, `response`, ...).
    pub fn on(&mut self, event: &str, listener: impl FnMut(&E::Payload) + Send + 'static) {
        self.listeners
            .entry(event.to_string())
            .or_default()
            .push(Box::new(listener));
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl<E: Emitter> Emitter for HookedEmitter<E> {
    type Payload = E::Payload;

    fn emit(&mut self, event: &str, payload: &Self::Payload) -> bool {
        if let Some(listeners) = self.listeners.get_mut(event) {
            for listener in listeners.iter_mut() {
                try_run(event, || listener(payload));
            }
        }
        self.inner.emit(event, payload)
    }
}
