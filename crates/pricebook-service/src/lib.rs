//! # Price book caching service
//!
//! This crate provides the in-process cache for the remotely-fetched pricing
//! configuration (the "price book" of subscription/donation tiers).
//!
//! Three mechanisms interact here:
//!
//! - A time-based cache: a fetched price book stays fresh for one hour and is
//!   discarded wholesale afterwards. There is no partially-stale state, the
//!   book is either fresh or absent.
//! - Request coalescing: concurrent callers hitting a cache miss join a
//!   single in-flight upstream fetch via [`SingleFlight`], so N simultaneous
//!   callers trigger exactly one network call.
//! - A sticky disablement latch: once the server reports the pricing feature
//!   as unavailable, or the local feature gate turns it off, the service
//!   latches into a disabled state that survives cache invalidation cycles
//!   and short-circuits all future fetch attempts for the rest of the
//!   process lifetime.
//!
//! The HTTP transport, the local feature flag resolution, and the state
//! hydration done after a background refresh are all injected as traits; see
//! [`PriceBookSource`], [`FeatureGate`] and [`ViewSink`].
//!
//! Fetch failures are never swallowed: they propagate to the immediate
//! caller, while the latch is updated opportunistically when the failure
//! indicates a permanent disablement.

mod derived;
mod error;
mod service;
mod singleflight;
mod types;
mod utils;


pub use derived::supported_tiers;
pub use error::PricingError;
pub use service::{FeatureGate, PriceBookService, PriceBookSource, ViewSink};
pub use singleflight::SingleFlight;
pub use types::{PaymentMethod, PriceBook, Tier};
