// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pexel store: ephemeral artifact storage, reader leases, and the expiry
// scheduler that reaps artifacts once their TTL has passed.

pub mod backoff;
pub mod clock;
pub mod digest;
pub mod expiry;
pub mod store;

pub use backoff::{DeferralDecision, DeferralPolicy};
pub use clock::{Clock, ManualClock, SystemClock};
pub use expiry::{ExpiryScheduler, SweepReport};
pub use store::{ArtifactLease, ArtifactStore, PutOptions, StoreStats};
