use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{filter::Targets, fmt};

/// Installs the process-wide subscriber. Called exactly once at service
/// start; the registry refuses a second initialisation.
pub fn init(level: LevelFilter, json: bool) {
	let targets = Targets::new()
		.with_default(LevelFilter::WARN)
		.with_target("gunkan_server", level)
		.with_target("impls", level)
		.with_target("api", level);

	if json {
		tracing_subscriber::registry().with(targets).with(fmt::layer().json()).init();
	} else {
		tracing_subscriber::registry().with(targets).with(fmt::layer()).init();
	}
}
