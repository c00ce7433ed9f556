// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared server state: the store, its expiry scheduler and the pipeline,
// wired once at startup and cloned into every handler.

use std::sync::Arc;

use pexel_core::ServiceConfig;
use pexel_core::error::Result;
use pexel_document::LopdfEngine;
use pexel_pipeline::OperationPipeline;
use pexel_store::{ArtifactStore, Clock, DeferralPolicy, ExpiryScheduler, SystemClock};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub store: Arc<ArtifactStore>,
    pub pipeline: OperationPipeline<LopdfEngine>,
}

impl AppState {
    /// Open the store against the wall clock.  The sweep is not started.
    pub async fn initialise(config: ServiceConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock)).await
    }

    pub async fn with_clock(config: ServiceConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let scheduler = Arc::new(ExpiryScheduler::new(
            DeferralPolicy::from_config(&config),
            Arc::clone(&clock),
        ));
        let store = ArtifactStore::open(&config, scheduler, clock).await?;
        let pipeline = OperationPipeline::new(LopdfEngine, Arc::clone(&store), &config);
        Ok(Self {
            config: Arc::new(config),
            store,
            pipeline,
        })
    }

    pub fn scheduler(&self) -> &Arc<ExpiryScheduler> {
        self.store.scheduler()
    }

    /// Begin periodic expiry sweeps.
    pub fn start_expiry(&self) {
        self.scheduler()
            .start(&self.store, self.config.sweep_interval());
    }

    /// Stop sweeping and remove whatever is left.
    pub async fn shutdown(&self) -> usize {
        self.scheduler().shutdown(&self.store).await
    }
}
