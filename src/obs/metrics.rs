// self
use crate::{
	flows::CallbackErrorKind,
	obs::{FlowKind, FlowOutcome},
};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"resume_oidc_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records a classified callback failure via the global metrics recorder (when enabled).
pub fn record_callback_failure(kind: CallbackErrorKind) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("resume_oidc_callback_failure_total", "kind" => kind.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = kind;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_are_callable_without_a_global_recorder() {
		record_flow_outcome(FlowKind::Callback, FlowOutcome::Failure);
		record_callback_failure(CallbackErrorKind::InvalidOrExpiredState);
	}
}
