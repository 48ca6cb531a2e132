use crate::domain::model::{HealthReport, HealthStatus};
use crate::domain::ports::Probe;
use crate::domain::service::HealthCheck;
use crate::utils::error::{Result, WqError};
use std::time::Duration;
use tokio::time::Instant;

/// Tracks probe outcomes the way the container runtime does: failures in
/// the start period are ignored, any success marks the service healthy and
/// `retries` consecutive failures afterwards mark it unhealthy.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    policy: HealthCheck,
    status: HealthStatus,
    failing_streak: u32,
    attempts: u32,
}

impl HealthMonitor {
    pub fn new(policy: HealthCheck) -> Self {
        Self {
            policy,
            status: HealthStatus::Starting,
            failing_streak: 0,
            attempts: 0,
        }
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn failing_streak(&self) -> u32 {
        self.failing_streak
    }

    pub fn policy(&self) -> &HealthCheck {
        &self.policy
    }

    /// Records one probe result taken `since_start` after the container started.
    pub fn record(&mut self, success: bool, since_start: Duration) -> HealthStatus {
        self.attempts += 1;

        if success {
            self.failing_streak = 0;
            self.status = HealthStatus::Healthy;
            return self.status;
        }

        if since_start < self.policy.start_period && self.status == HealthStatus::Starting {
            return self.status;
        }

        self.failing_streak += 1;
        if self.failing_streak >= self.policy.retries {
            self.status = HealthStatus::Unhealthy;
        }
        self.status
    }
}

/// Probes until the target is healthy or the policy declares it unhealthy.
pub async fn wait_until_healthy<P: Probe + ?Sized>(
    probe: &P,
    policy: HealthCheck,
) -> Result<HealthReport> {
    let mut monitor = HealthMonitor::new(policy);
    let started = Instant::now();

    loop {
        let outcome = tokio::time::timeout(monitor.policy().timeout, probe.probe()).await;
        let success = match outcome {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::debug!("Probe of {} failed: {}", probe.target(), e);
                false
            }
            Err(_) => {
                tracing::debug!(
                    "Probe of {} timed out after {:?}",
                    probe.target(),
                    monitor.policy().timeout
                );
                false
            }
        };

        let status = monitor.record(success, started.elapsed());
        tracing::info!(
            "🩺 {} is {:?} (attempt {}, failing streak {})",
            probe.target(),
            status,
            monitor.attempts(),
            monitor.failing_streak()
        );

        match status {
            HealthStatus::Healthy => {
                return Ok(HealthReport {
                    target: probe.target().to_string(),
                    status,
                    attempts: monitor.attempts(),
                    elapsed: started.elapsed(),
                });
            }
            HealthStatus::Unhealthy => {
                return Err(WqError::HealthCheckFailed {
                    target: probe.target().to_string(),
                    attempts: monitor.attempts(),
                });
            }
            HealthStatus::Starting => {
                tokio::time::sleep(monitor.policy().interval).await;
            }
        }
    }
}
