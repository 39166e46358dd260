// self
use crate::obs::{FlowKind, FlowOutcome};

const FLOW_COUNTER: &str = "tenant_oauth_broker_flow_total";
const CACHE_HIT_COUNTER: &str = "tenant_oauth_broker_token_cache_hits_total";

/// Counts a flow attempt, success, or failure on the global recorder.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(FLOW_COUNTER, "flow" => kind.as_str(), "outcome" => outcome.as_str())
		.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (FLOW_COUNTER, kind, outcome);
}

/// Counts an access-token read served from the store without a refresh.
pub fn record_cache_hit() {
	#[cfg(feature = "metrics")]
	metrics::counter!(CACHE_HIT_COUNTER).increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = CACHE_HIT_COUNTER;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn counters_are_noops_without_a_recorder() {
		record_flow_outcome(FlowKind::Exchange, FlowOutcome::Failure);
		record_cache_hit();
	}
}
