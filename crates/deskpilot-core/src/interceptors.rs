//! Interceptor stages run before a handler.
//!
//! Provides the `Interceptor` trait and `InterceptorChain`. The chain runs
//! stages in registration order and stops at the first verdict other than
//! `Continue`.

use crate::auth::{AuthDecision, AuthorizationGate};
use crate::dispatcher::Invocation;
use crate::rate_limit::RateLimiter;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of one interceptor stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verdict {
    /// Hand the invocation to the next stage.
    #[default]
    Continue,
    /// Sender is not the operator.
    Deny,
    /// Cooldown still running.
    Throttle {
        /// Whole seconds to wait.
        remaining_secs: u64,
    },
}

/// What a stage sees of the invocation.
pub struct StageContext<'a> {
    /// The invocation being dispatched.
    pub invocation: &'a Invocation,
    /// Rate-limit bucket, `None` for uncooled commands.
    pub cooldown_key: Option<&'a str>,
}

/// A cross-cutting check applied before a handler runs.
pub trait Interceptor: Send + Sync {
    /// Name of the stage for logging.
    fn name(&self) -> &'static str;

    /// Inspect the invocation.
    fn check(&self, ctx: &StageContext<'_>) -> Verdict;
}

/// Admits only the operator.
pub struct AuthorizationStage {
    gate: Arc<AuthorizationGate>,
}

impl AuthorizationStage {
    /// Stage backed by `gate`.
    #[must_use]
    pub const fn new(gate: Arc<AuthorizationGate>) -> Self {
        Self { gate }
    }
}

impl Interceptor for AuthorizationStage {
    fn name(&self) -> &'static str {
        "authorization"
    }

    fn check(&self, ctx: &StageContext<'_>) -> Verdict {
        match self.gate.check(ctx.invocation) {
            AuthDecision::Authorized => Verdict::Continue,
            AuthDecision::Denied => Verdict::Deny,
        }
    }
}

/// Enforces the cooldown of one limiter.
pub struct CooldownStage {
    pool: &'static str,
    limiter: RateLimiter,
}

impl CooldownStage {
    /// Stage consulting `limiter`; `pool` names it in logs.
    #[must_use]
    pub const fn new(pool: &'static str, limiter: RateLimiter) -> Self {
        Self { pool, limiter }
    }
}

impl Interceptor for CooldownStage {
    fn name(&self) -> &'static str {
        self.pool
    }

    fn check(&self, ctx: &StageContext<'_>) -> Verdict {
        let Some(key) = ctx.cooldown_key else {
            return Verdict::Continue;
        };
        match self.limiter.try_acquire(key) {
            Ok(()) => Verdict::Continue,
            Err(throttled) => Verdict::Throttle {
                remaining_secs: throttled.remaining_secs,
            },
        }
    }
}

/// Ordered list of stages.
#[derive(Default)]
pub struct InterceptorChain {
    stages: Vec<Box<dyn Interceptor>>,
}

impl InterceptorChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn register(&mut self, stage: Box<dyn Interceptor>) {
        info!(stage = stage.name(), "Registered interceptor");
        self.stages.push(stage);
    }

    /// Run every stage until one does not continue.
    pub fn run(&self, ctx: &StageContext<'_>) -> Verdict {
        for stage in &self.stages {
            let verdict = stage.check(ctx);
            match verdict {
                Verdict::Continue => {
                    debug!(stage = stage.name(), "Interceptor passed");
                }
                Verdict::Deny => {
                    debug!(stage = stage.name(), command = %ctx.invocation.command, "Interceptor denied");
                    return verdict;
                }
                Verdict::Throttle { remaining_secs } => {
                    debug!(
                        stage = stage.name(),
                        command = %ctx.invocation.command,
                        remaining_secs,
                        "Interceptor throttled"
                    );
                    return verdict;
                }
            }
        }
        Verdict::Continue
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the chain has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
