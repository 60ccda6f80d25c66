use std::time::Duration;

/// Backoff applied after the link drops unexpectedly.
///
/// Retry `n` (1-based) waits `min(initial_delay * 2^(n-1), max_delay)`.
/// Once `max_attempts` retries failed the manager gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
	pub initial_delay: Duration,
	pub max_delay: Duration,
	pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
	fn default() -> Self {
		Self {
			initial_delay: Duration::from_millis(500),
			max_delay: Duration::from_secs(30),
			max_attempts: 10,
		}
	}
}

impl ReconnectPolicy {
	/// Policy that never retries.
	pub fn disabled() -> Self {
		Self {
			max_attempts: 0,
			..Self::default()
		}
	}

	/// Delay before retry number `attempt`.
	pub fn delay_for(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1).min(31);
		self.initial_delay
			.saturating_mul(2_u32.saturating_pow(exponent))
			.min(self.max_delay)
	}

	/// Whether retry number `attempt` may still run.
	pub fn allows(&self, attempt: u32) -> bool {
		attempt >= 1 && attempt <= self.max_attempts
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_delay_doubles_until_ceiling() {
		let policy = ReconnectPolicy::default();
		let delays: Vec<u64> = (1 ..= 8)
			.map(|n| policy.delay_for(n).as_millis() as u64)
			.collect();
		assert_eq!(delays, vec![
			500, 1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000
		]);
	}

	#[test]
	fn test_delay_never_overflows() {
		let policy = ReconnectPolicy {
			initial_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(60),
			max_attempts: u32::MAX,
		};
		assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(60));
		assert_eq!(policy.delay_for(0), Duration::from_secs(1));
	}

	#[test]
	fn test_attempt_cap() {
		let policy = ReconnectPolicy::default();
		assert!(policy.allows(1));
		assert!(policy.allows(10));
		assert!(!policy.allows(11));
		assert!(!ReconnectPolicy::disabled().allows(1));
	}
}
