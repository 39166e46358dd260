// self
use crate::{_prelude::*, auth::TenantId, obs::FlowKind};

const SPAN_NAME: &str = "tenant_oauth_broker.flow";

/// Future returned by [`FlowSpan::instrument`]; a plain passthrough without `tracing`.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`]; a plain passthrough without `tracing`.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Span opened around one broker flow.
///
/// Carries `flow`, `stage`, and `tenant`. The tenant starts empty for first installs and is
/// filled in by [`record_tenant`] once the identity lookup resolves it.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens a span for `kind` at call site `stage`.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self {
				span: tracing::info_span!(
					SPAN_NAME,
					flow = kind.as_str(),
					stage,
					tenant = tracing::field::Empty
				),
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Opens a span already tagged with `tenant`.
	pub fn for_tenant(kind: FlowKind, stage: &'static str, tenant: &TenantId) -> Self {
		let span = Self::new(kind, stage);

		#[cfg(feature = "tracing")]
		span.span.record("tenant", tracing::field::display(tenant));
		#[cfg(not(feature = "tracing"))]
		let _ = tenant;

		span
	}

	/// Enters the span for a synchronous section.
	pub fn entered(self) -> FlowSpanGuard {
		#[cfg(feature = "tracing")]
		{
			FlowSpanGuard { _guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			FlowSpanGuard {}
		}
	}

	/// Attaches the span to `fut` so it is entered on every poll.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			tracing::Instrument::instrument(fut, self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Guard returned by [`FlowSpan::entered`]; leaving scope exits the span.
pub struct FlowSpanGuard {
	#[cfg(feature = "tracing")]
	_guard: tracing::span::EnteredSpan,
}
impl Debug for FlowSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("FlowSpanGuard(..)")
	}
}

/// Tags the current flow span with the tenant it ended up operating on.
pub fn record_tenant(tenant: &TenantId) {
	#[cfg(feature = "tracing")]
	tracing::Span::current().record("tenant", tracing::field::display(tenant));
	#[cfg(not(feature = "tracing"))]
	let _ = tenant;
}

/// Warns about a failed flow. Only the display text of the error is logged, never tokens.
pub fn log_flow_failure(kind: FlowKind, error: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		flow = kind.as_str(),
		status = error.status_code(),
		error = %error,
		"Broker flow failed."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (kind, error);
}

/// Logs an error on its way to the boundary layer.
///
/// Failures answered with a 5xx are logged at `error` level because the caller only sees a
/// generic message.
pub fn record_boundary_error(error: &Error, status_code: u16) {
	#[cfg(feature = "tracing")]
	{
		match status_code {
			500.. => tracing::error!(status = status_code, error = %error, "Request failed."),
			_ => tracing::warn!(status = status_code, error = %error, "Request rejected."),
		}
	}
	#[cfg(not(feature = "tracing"))]
	let _ = (error, status_code);
}
