use api::error::GkError;
use prometheus::{Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

/// Time-to-last-byte buckets shared by every service histogram, in seconds.
pub const TTLB_BUCKETS: [f64; 16] = [
	0.01,
	0.02,
	0.03,
	0.04,
	0.05,
	0.1,
	0.2,
	0.3,
	0.4,
	0.5,
	1.0,
	2.0,
	3.0,
	4.0,
	5.0,
	f64::INFINITY,
];

/// Per-service observation counters: one `gunkan_<service>_<verb>_ttlb`
/// histogram per verb plus raw byte counters.
///
/// Each process owns exactly one registry, created at service start. Tests
/// build their own instance instead of sharing a global one.
pub struct ServiceMetrics {
	registry: Registry,
	pub time_put: Histogram,
	pub time_get: Histogram,
	pub time_del: Histogram,
	pub time_list: Histogram,
	pub bytes_in: IntCounter,
	pub bytes_out: IntCounter,
}

fn histogram(registry: &Registry, name: String, help: &str) -> Result<Histogram, GkError> {
	let opts = HistogramOpts::new(name, help).buckets(TTLB_BUCKETS.to_vec());
	let histogram =
		Histogram::with_opts(opts).map_err(|e| GkError::Internal(e.to_string()))?;
	registry
		.register(Box::new(histogram.clone()))
		.map_err(|e| GkError::Internal(e.to_string()))?;
	Ok(histogram)
}

fn counter(registry: &Registry, name: String, help: &str) -> Result<IntCounter, GkError> {
	let counter = IntCounter::new(name, help).map_err(|e| GkError::Internal(e.to_string()))?;
	registry
		.register(Box::new(counter.clone()))
		.map_err(|e| GkError::Internal(e.to_string()))?;
	Ok(counter)
}

impl ServiceMetrics {
	/// Builds the collectors of one service. `service` is the short metric
	/// label, e.g. `blob` for `gunkan_blob_put_ttlb`.
	pub fn new(service: &str) -> Result<Self, GkError> {
		let registry = Registry::new();
		let time_put = histogram(
			&registry,
			format!("gunkan_{}_put_ttlb", service),
			"Repartition of the request times of put requests",
		)?;
		let time_get = histogram(
			&registry,
			format!("gunkan_{}_get_ttlb", service),
			"Repartition of the request times of get requests",
		)?;
		let time_del = histogram(
			&registry,
			format!("gunkan_{}_del_ttlb", service),
			"Repartition of the request times of del requests",
		)?;
		let time_list = histogram(
			&registry,
			format!("gunkan_{}_list_ttlb", service),
			"Repartition of the request times of List requests",
		)?;
		let bytes_in = counter(
			&registry,
			format!("gunkan_{}_bytes_in_total", service),
			"Bytes of request bodies accepted",
		)?;
		let bytes_out = counter(
			&registry,
			format!("gunkan_{}_bytes_out_total", service),
			"Bytes of response bodies served",
		)?;
		Ok(Self { registry, time_put, time_get, time_del, time_list, bytes_in, bytes_out })
	}

	/// Renders the Prometheus text exposition of every collector.
	pub fn render(&self) -> String {
		TextEncoder::new().encode_to_string(&self.registry.gather()).unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn exposition_carries_the_ttlb_histograms() {
		let metrics = ServiceMetrics::new("blob").unwrap();
		metrics.time_put.observe(0.015);
		metrics.time_get.observe(2.5);

		let text = metrics.render();
		assert!(text.contains("gunkan_blob_put_ttlb_bucket{le=\"0.02\"} 1"));
		assert!(text.contains("gunkan_blob_get_ttlb_bucket{le=\"3\"} 1"));
		assert!(text.contains("gunkan_blob_list_ttlb_count 0"));
	}

	#[test]
	fn registries_are_independent() {
		let a = ServiceMetrics::new("part").unwrap();
		let b = ServiceMetrics::new("part").unwrap();
		a.time_put.observe(0.1);
		assert!(b.render().contains("gunkan_part_put_ttlb_count 0"));
	}
}
