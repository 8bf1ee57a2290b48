// ABOUTME: Hybrid metrics reconciliation: real upstream metering when present, deterministic estimate otherwise
// ABOUTME: Token estimate is a pure function of the emitted text

use std::time::Duration;

use agentdeck_providers::pricing;

use crate::types::Metrics;

/// Fixed ratio for the character-based token estimator.
pub const CHARS_PER_TOKEN: usize = 4;

/// Deterministic fallback estimate: same text in, same count out.
pub fn estimate_tokens(text: &str) -> u64 {
    text.chars().count().div_ceil(CHARS_PER_TOKEN) as u64
}

/// Computes final run metrics from whatever the provider reported.
///
/// A zero/absent output-token count falls back to estimating from the emitted
/// character count; an unknown pricing row prices the run at zero. Either
/// fallback sets `estimated`.
pub fn reconcile(
    provider_id: &str,
    model: &str,
    content: &str,
    duration: Duration,
    input_tokens: u64,
    output_tokens: u64,
) -> Metrics {
    let mut estimated = false;

    let output_tokens = if output_tokens == 0 {
        estimated = true;
        estimate_tokens(content)
    } else {
        output_tokens
    };

    let cost_usd = match pricing::rate_for(provider_id, model) {
        Some(rate) => pricing::cost_usd(rate, input_tokens, output_tokens),
        None => {
            estimated = true;
            0.0
        }
    };

    let duration_seconds = duration.as_secs_f64();
    let tokens_per_second = if duration_seconds > 0.0 {
        output_tokens as f64 / duration_seconds
    } else {
        0.0
    };

    Metrics {
        duration_seconds,
        input_tokens,
        output_tokens,
        tokens_per_second,
        cost_usd,
        estimated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimator_is_pure() {
        let text = "The same text always estimates the same.";
        let first = estimate_tokens(text);
        for _ in 0..100 {
            assert_eq!(estimate_tokens(text), first);
        }
    }

    #[test]
    fn estimator_rounds_up_and_counts_chars() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("Hello"), 2);
        // chars, not bytes
        assert_eq!(estimate_tokens("日本語です"), 1);
    }

    #[test]
    fn zero_output_tokens_fall_back_to_estimate() {
        let metrics = reconcile("openai", "gpt-4o", "Hello", Duration::from_secs(2), 10, 0);
        assert!(metrics.estimated);
        assert_eq!(metrics.output_tokens, estimate_tokens("Hello"));
        assert_eq!(metrics.input_tokens, 10);
    }

    #[test]
    fn real_usage_with_known_pricing_is_not_estimated() {
        let metrics = reconcile(
            "openai",
            "gpt-4o",
            "irrelevant",
            Duration::from_secs(4),
            1000,
            200,
        );
        assert!(!metrics.estimated);
        assert_eq!(metrics.output_tokens, 200);
        assert_eq!(metrics.tokens_per_second, 50.0);
        // 1000 * 2.5/1M + 200 * 10/1M
        assert!((metrics.cost_usd - 0.0045).abs() < 1e-12);
    }

    #[test]
    fn unknown_pricing_zeroes_cost_and_flags_estimated() {
        let metrics = reconcile("demo", "demo-1", "text", Duration::from_secs(1), 5, 10);
        assert!(metrics.estimated);
        assert_eq!(metrics.cost_usd, 0.0);
        assert_eq!(metrics.output_tokens, 10);
    }

    #[test]
    fn zero_duration_defines_zero_throughput() {
        let metrics = reconcile("openai", "gpt-4o", "Hello", Duration::ZERO, 0, 8);
        assert_eq!(metrics.tokens_per_second, 0.0);
        assert!(metrics.tokens_per_second.is_finite());
    }
}
