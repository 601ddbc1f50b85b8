//! Construct-once memoization for expensive client resources.
//!
//! Two primitives cover the two kinds of clients the gateway manages:
//!
//! - [`Lazy`] memoizes a synchronous, fallible factory. The cached value can
//!   be dropped with [`Lazy::invalidate`] so the next access rebuilds it
//!   (used for clients whose underlying connections are managed elsewhere,
//!   e.g. REST clients that get rebound to a new endpoint).
//! - [`AsyncLazy`] memoizes an asynchronous factory and pairs it with a
//!   release action. Concurrent first access shares a single in-flight
//!   construction, and [`AsyncLazy::close`] releases the value exactly once
//!   (used for clients that must be disconnected, e.g. producers).
//!
//! Both primitives are pure bookkeeping: every side effect (connect,
//! disconnect, logging) lives in the factory or releaser they are given.

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// A lazily constructed, invalidatable value.
///
/// The factory runs at most once per populated period: `get` either returns
/// the cached value or runs the factory under an internal lock, so concurrent
/// first access from multiple threads still constructs exactly once. A factory
/// error propagates to the caller and leaves the cell empty, so a later `get`
/// retries.
pub struct Lazy<T> {
    factory: Box<dyn Fn() -> anyhow::Result<T> + Send + Sync>,
    value: Mutex<Option<Arc<T>>>,
}

impl<T> Lazy<T> {
    pub fn new(factory: impl Fn() -> anyhow::Result<T> + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            value: Mutex::new(None),
        }
    }

    /// Returns the cached value, constructing it first if necessary.
    pub fn get(&self) -> anyhow::Result<Arc<T>> {
        let mut slot = self.value.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(value) = &*slot {
            return Ok(value.clone());
        }

        let value = Arc::new((self.factory)()?);
        *slot = Some(value.clone());
        Ok(value)
    }

    /// Drops the cached value so the next `get` reconstructs it.
    ///
    /// No release action runs: values held in a `Lazy` have no teardown of
    /// their own. References already handed out stay usable until their
    /// holders drop them.
    pub fn invalidate(&self) {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// A construction failure observed by every caller that shared the same
/// in-flight construction.
///
/// `anyhow::Error` is not cloneable, so the original error is wrapped in an
/// `Arc` and each waiter receives an identical view of it.
#[derive(Clone)]
pub struct ConstructionError(Arc<anyhow::Error>);

impl ConstructionError {
    fn new(err: anyhow::Error) -> Self {
        Self(Arc::new(err))
    }
}

impl fmt::Debug for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // "{:#}" keeps the full context chain in a single line
        write!(f, "{:#}", self.0)
    }
}

impl std::error::Error for ConstructionError {}

type BuildFuture<T> = Shared<BoxFuture<'static, Result<Arc<T>, ConstructionError>>>;

enum Slot<T> {
    Empty,
    Constructing(BuildFuture<T>),
    Ready(Arc<T>),
}

struct Inner<T> {
    /// Bumped on every `close` so a construction that settles afterwards
    /// cannot re-populate the slot.
    epoch: u64,
    slot: Slot<T>,
}

type Factory<T> = Box<dyn Fn() -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;
type Releaser<T> = Box<dyn Fn(Arc<T>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// A lazily constructed resource with an asynchronous factory and releaser.
///
/// The slot moves through `Empty → Constructing → Ready`. All `get` calls
/// that arrive while a construction is in flight await the same shared
/// future, so the factory runs exactly once and every waiter observes the
/// identical value or the identical failure. A failed construction resets
/// the slot to `Empty` so a later `get` can retry.
///
/// `close` is idempotent, awaits an in-flight construction before releasing,
/// and always leaves the slot `Empty`, even when the releaser fails, so a
/// failed disconnect never blocks reconstruction or a later shutdown.
///
/// There is no timeout or cancellation: a factory that never settles leaves
/// the resource `Constructing` and all waiters pending.
pub struct AsyncLazy<T> {
    factory: Factory<T>,
    releaser: Releaser<T>,
    inner: Arc<tokio::sync::Mutex<Inner<T>>>,
}

impl<T: Send + Sync + 'static> AsyncLazy<T> {
    pub fn new<F, FFut, R, RFut>(factory: F, releaser: R) -> Self
    where
        F: Fn() -> FFut + Send + Sync + 'static,
        FFut: Future<Output = anyhow::Result<T>> + Send + 'static,
        R: Fn(Arc<T>) -> RFut + Send + Sync + 'static,
        RFut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            factory: Box::new(move || factory().boxed()),
            releaser: Box::new(move |value| releaser(value).boxed()),
            inner: Arc::new(tokio::sync::Mutex::new(Inner {
                epoch: 0,
                slot: Slot::Empty,
            })),
        }
    }

    /// Returns the resource, constructing it first if necessary.
    ///
    /// Concurrent callers share one construction; none of them triggers a
    /// second factory run while another is in flight.
    pub async fn get(&self) -> anyhow::Result<Arc<T>> {
        let build = {
            let mut inner = self.inner.lock().await;
            match &inner.slot {
                Slot::Ready(value) => return Ok(value.clone()),
                Slot::Constructing(build) => build.clone(),
                Slot::Empty => {
                    let build = self.begin_construction(inner.epoch);
                    inner.slot = Slot::Constructing(build.clone());
                    build
                }
            }
        };

        // The lock is released here; the build future re-acquires it only
        // after the factory settles.
        build.await.map_err(anyhow::Error::new)
    }

    fn begin_construction(&self, epoch: u64) -> BuildFuture<T> {
        let construct = (self.factory)();
        let inner = self.inner.clone();

        async move {
            let result = construct
                .await
                .map(Arc::new)
                .map_err(ConstructionError::new);

            let mut inner = inner.lock().await;
            if inner.epoch == epoch {
                inner.slot = match &result {
                    Ok(value) => Slot::Ready(value.clone()),
                    Err(_) => Slot::Empty,
                };
            }

            result
        }
        .boxed()
        .shared()
    }

    /// Releases the resource and resets the slot to empty.
    ///
    /// A no-op when nothing was ever constructed. If a construction is in
    /// flight, it is awaited first and its value (if any) released. A
    /// releaser failure propagates to the caller, but the slot is already
    /// empty at that point, so the resource stays reusable.
    pub async fn close(&self) -> anyhow::Result<()> {
        let previous = {
            let mut inner = self.inner.lock().await;
            inner.epoch += 1;
            std::mem::replace(&mut inner.slot, Slot::Empty)
        };

        let value = match previous {
            Slot::Empty => return Ok(()),
            Slot::Ready(value) => value,
            Slot::Constructing(build) => match build.await {
                Ok(value) => value,
                // Construction failed: there is nothing to release.
                Err(_) => return Ok(()),
            },
        };

        (self.releaser)(value).await
    }
}
