// Page reconciler: keeps the registry attached and in step with navigation.
// Best effort. A fast-rewriting host page may cause a brief glitch, never a crash.

use log::{debug, info};

use crate::error::OverlayError;
use crate::protocol::LoadConfigRequest;
use crate::registry::OverlayRegistry;
use crate::renderer::Renderer;

/// Issued on navigation; redeem with `on_settled` once `delay_ms` has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleTicket {
    pub generation: u64,
    pub delay_ms: u32,
    pub url: String,
}

#[derive(Debug)]
pub struct PageReconciler {
    url: String,
    settle_ms: u32,
    generation: u64,
}

impl PageReconciler {
    pub fn new(url: impl Into<String>, settle_ms: u32) -> Self {
        PageReconciler {
            url: url.into(),
            settle_ms,
            generation: 0,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// DOM mutation under the body: put back anything the page detached.
    pub fn on_mutation<R: Renderer>(&self, registry: &mut OverlayRegistry<R>) -> usize {
        registry.reattach_detached()
    }

    /// URL changed. Returns a ticket unless the URL is the same page.
    /// A newer navigation invalidates every older ticket.
    pub fn on_navigation(&mut self, url: &str) -> Option<SettleTicket> {
        if url == self.url {
            return None;
        }
        self.generation += 1;
        self.url = url.to_string();
        debug!("navigation to {} (generation {})", url, self.generation);
        Some(SettleTicket {
            generation: self.generation,
            delay_ms: self.settle_ms,
            url: self.url.clone(),
        })
    }

    /// Settling delay elapsed: tear down and ask for the new page's overlays.
    /// Stale tickets do nothing.
    pub fn on_settled<R: Renderer>(
        &mut self,
        ticket: &SettleTicket,
        registry: &mut OverlayRegistry<R>,
    ) -> Option<LoadConfigRequest> {
        if ticket.generation != self.generation {
            debug!("stale settle ticket {} ignored", ticket.generation);
            return None;
        }
        registry.clear();
        info!("registry reset for {}", self.url);
        Some(LoadConfigRequest {
            url: self.url.clone(),
        })
    }
}

/// Result of one readiness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    Ready,
    RetryAfter(u32),
}

/// Fixed-interval poll for a precondition with no completion event (document.body).
#[derive(Debug, Clone)]
pub struct ReadinessPoll {
    interval_ms: u32,
    max_attempts: Option<u32>,
    attempts: u32,
}

impl ReadinessPoll {
    pub fn new(interval_ms: u32, max_attempts: Option<u32>) -> Self {
        ReadinessPoll {
            interval_ms,
            max_attempts,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record one check. Without a ceiling this never gives up.
    pub fn check(&mut self, ready: bool) -> Result<PollStep, OverlayError> {
        self.attempts = self.attempts.saturating_add(1);
        if ready {
            return Ok(PollStep::Ready);
        }
        match self.max_attempts {
            Some(max) if self.attempts >= max => Err(OverlayError::ReadinessGaveUp {
                attempts: self.attempts,
            }),
            _ => Ok(PollStep::RetryAfter(self.interval_ms)),
        }
    }
}
