//! Logprob-based confidence: the geometric-mean token probability of the
//! response, which is `exp(mean(logprobs))`. Only usable when the provider
//! returned per-token log-probabilities.

/// Normalize a sequence of token log-probabilities into [0,1].
pub fn confidence(logprobs: &[f32]) -> f32 {
    if logprobs.is_empty() {
        return 0.0;
    }
    let mean = logprobs.iter().sum::<f32>() / logprobs.len() as f32;
    mean.exp().clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_zero_logprobs_mean_high_confidence() {
        assert!(confidence(&[-0.01, -0.02, -0.05]) > 0.9);
    }

    #[test]
    fn strongly_negative_logprobs_mean_low_confidence() {
        assert!(confidence(&[-3.0, -4.0, -2.5]) < 0.1);
    }

    #[test]
    fn empty_input_scores_zero() {
        assert_eq!(confidence(&[]), 0.0);
    }

    #[test]
    fn confidence_is_monotonic_in_mean() {
        assert!(confidence(&[-0.1]) > confidence(&[-0.5]));
        assert!(confidence(&[-0.5]) > confidence(&[-1.5]));
    }
}
