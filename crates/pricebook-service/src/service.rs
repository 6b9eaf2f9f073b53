use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::time::Instant;

use crate::derived::supported_tiers;
use crate::error::PricingError;
use crate::singleflight::SingleFlight;
use crate::types::PriceBook;

/// How long a fetched price book stays fresh.
const PRICE_BOOK_TTL: Duration = Duration::from_secs(60 * 60);

/// The upstream source of the price book.
///
/// Implementations are expected to report a server-side shutdown of the
/// pricing feature as [`PricingError::ServiceUnavailable`], and everything
/// else as [`PricingError::Fetch`].
#[async_trait]
pub trait PriceBookSource: Send + Sync {
    async fn fetch_price_book(&self) -> Result<PriceBook, PricingError>;
}

/// The local enablement check for the pricing feature.
///
/// This is evaluated on every call; it is cheap and synchronous.
pub trait FeatureGate: Send + Sync {
    fn pricing_enabled(&self) -> bool;
}

/// Receives the derived view produced by a background refresh.
pub trait ViewSink: Send + Sync {
    fn hydrate(&self, tiers: PriceBook);
}

/// A cached price book together with the point in time it goes stale.
///
/// Replaced wholesale on every successful fetch, never partially mutated.
struct CachedBook {
    book: PriceBook,
    expires_at: Instant,
}

struct Inner {
    cached: Mutex<Option<CachedBook>>,
    /// Sticky disablement latch. Transitions false -> true only; there is no
    /// way to clear it within the process lifetime.
    server_disabled: AtomicBool,
    gate: Arc<dyn FeatureGate>,
    sink: Arc<dyn ViewSink>,
}

/// Caches the remotely-fetched price book for [`PRICE_BOOK_TTL`].
///
/// Concurrent callers hitting a cache miss are coalesced into a single
/// upstream fetch. Once the feature is reported as disabled, either by the
/// local [`FeatureGate`] or by the server answering with
/// [`PricingError::ServiceUnavailable`], the service latches into a disabled
/// state for the rest of the process lifetime and never fetches again.
///
/// Construct one instance per process and share it; the cache and the latch
/// are deliberately not global.
pub struct PriceBookService {
    inner: Arc<Inner>,
    fetch: SingleFlight<PriceBook, PricingError>,
}

impl std::fmt::Debug for PriceBookService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self
            .inner
            .cached
            .try_lock()
            .map(|cached| cached.is_some())
            .unwrap_or_default();
        f.debug_struct("PriceBookService")
            .field("cached", &cached)
            .field(
                "server_disabled",
                &self.inner.server_disabled.load(Ordering::Relaxed),
            )
            .field("fetch", &self.fetch)
            .finish()
    }
}

impl PriceBookService {
    pub fn new(
        source: Arc<dyn PriceBookSource>,
        gate: Arc<dyn FeatureGate>,
        sink: Arc<dyn ViewSink>,
    ) -> Self {
        let inner = Arc::new(Inner {
            cached: Mutex::new(None),
            server_disabled: AtomicBool::new(false),
            gate,
            sink,
        });

        // The producer stores the fetched book itself, so that every caller
        // joined on the same invocation observes the same stored state, and a
        // failure leaves the cache untouched.
        let fetch = {
            let inner = Arc::clone(&inner);
            SingleFlight::new("price-book", move || {
                let inner = Arc::clone(&inner);
                let source = Arc::clone(&source);
                async move {
                    match source.fetch_price_book().await {
                        Ok(book) => {
                            let expires_at = Instant::now() + PRICE_BOOK_TTL;
                            tracing::debug!("fetched price book, fresh until {expires_at:?}");
                            *inner.cached.lock().unwrap() = Some(CachedBook {
                                book: book.clone(),
                                expires_at,
                            });
                            Ok(book)
                        }
                        Err(err) => {
                            if let PricingError::ServiceUnavailable(code) = err {
                                tracing::debug!(code, "pricing disabled by server");
                                inner.server_disabled.store(true, Ordering::Relaxed);
                            }
                            Err(err)
                        }
                    }
                }
                .boxed()
            })
        };

        Self { inner, fetch }
    }

    /// Returns the current price book, fetching it if necessary.
    ///
    /// An unexpired cached book is returned without any upstream call.
    /// Otherwise the expired entry is discarded and a deduplicated fetch is
    /// performed. Fetch failures are propagated and leave the (now absent)
    /// cache state unchanged.
    pub async fn price_book(&self) -> Result<PriceBook, PricingError> {
        self.ensure_enabled()?;

        if let Some(book) = self.fresh_book() {
            tracing::trace!("serving cached price book");
            return Ok(book);
        }

        self.fetch.run().await
    }

    /// Returns the tiers of the current price book purchasable by this
    /// client.
    pub async fn supported_tiers(&self) -> Result<PriceBook, PricingError> {
        let book = self.price_book().await?;
        Ok(supported_tiers(&book))
    }

    /// When the cached book goes stale, or `None` if nothing is cached.
    ///
    /// Read-only: this neither fetches nor discards an expired entry.
    pub fn expires_at(&self) -> Option<Instant> {
        self.inner
            .cached
            .lock()
            .unwrap()
            .as_ref()
            .map(|cached| cached.expires_at)
    }

    /// Refreshes the price book if it is absent or stale, handing the
    /// derived view to the [`ViewSink`].
    ///
    /// A no-op when the feature is disabled or the cached book is still
    /// fresh. Fetch failures are propagated; whether to surface or swallow
    /// them is up to the caller.
    pub async fn refresh_if_stale(&self) -> Result<(), PricingError> {
        if self.ensure_enabled().is_err() {
            return Ok(());
        }
        if self.fresh_book().is_some() {
            return Ok(());
        }

        let book = self.fetch.run().await?;
        self.inner.sink.hydrate(supported_tiers(&book));
        Ok(())
    }

    /// Whether pricing is currently disabled, by the latch or by the local
    /// gate.
    ///
    /// The gate is re-evaluated on every call; only the server-driven
    /// disablement is sticky. Reading this does not latch anything.
    pub fn is_disabled(&self) -> bool {
        self.inner.server_disabled.load(Ordering::Relaxed)
            || !self.inner.gate.pricing_enabled()
    }

    /// Checks both disablement signals before a fetch path runs.
    ///
    /// A gate reporting "disabled" latches: re-enabling the local flag later
    /// must not un-stick a disablement the server may have confirmed in the
    /// meantime.
    fn ensure_enabled(&self) -> Result<(), PricingError> {
        if !self.inner.gate.pricing_enabled() {
            if !self.inner.server_disabled.swap(true, Ordering::Relaxed) {
                tracing::debug!("pricing disabled by local gate");
            }
            return Err(PricingError::Disabled);
        }
        if self.inner.server_disabled.load(Ordering::Relaxed) {
            return Err(PricingError::Disabled);
        }
        Ok(())
    }

    /// Returns the cached book if it is still fresh, discarding it if its
    /// expiry has passed.
    fn fresh_book(&self) -> Option<PriceBook> {
        let mut cached = self.inner.cached.lock().unwrap();
        match cached.as_ref() {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.book.clone()),
            Some(_) => {
                tracing::trace!("cached price book expired");
                *cached = None;
                None
            }
            None => None,
        }
    }
}
