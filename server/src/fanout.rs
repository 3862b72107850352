use std::future::Future;
use std::sync::Arc;

use api::error::GkError;
use api::index::IndexStore;
use tokio::sync::{mpsc, Mutex};

/// Size of the worker pool behind every replicated call.
pub const FAN_OUT_WORKERS: usize = 5;

/// Runs `call` against every `(address, channel)` pair through a bounded
/// worker pool and fans the per-replica outcomes back in.
///
/// Workers pull jobs from a shared queue; the result channel closes once the
/// last worker terminates, after which aggregation runs on the caller task.
pub async fn fan_out<T, F, Fut>(
	targets: Vec<(String, Arc<dyn IndexStore>)>, call: F,
) -> Vec<(String, Result<T, GkError>)>
where
	T: Send + 'static,
	F: Fn(String, Arc<dyn IndexStore>) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<T, GkError>> + Send + 'static,
{
	let total = targets.len();
	if total == 0 {
		return Vec::new();
	}

	let (job_tx, job_rx) = mpsc::channel(total);
	for target in targets {
		// The queue is sized for every job, the sends cannot block.
		let _ = job_tx.send(target).await;
	}
	drop(job_tx);
	let job_rx = Arc::new(Mutex::new(job_rx));

	let (out_tx, mut out_rx) = mpsc::channel(total);
	let call = Arc::new(call);
	for _ in 0..FAN_OUT_WORKERS.min(total) {
		let job_rx = Arc::clone(&job_rx);
		let out_tx = out_tx.clone();
		let call = Arc::clone(&call);
		tokio::spawn(async move {
			loop {
				let job = { job_rx.lock().await.recv().await };
				let Some((addr, store)) = job else { break };
				let result = (call.as_ref())(addr.clone(), store).await;
				if out_tx.send((addr, result)).await.is_err() {
					break;
				}
			}
		});
	}
	drop(out_tx);

	let mut replies = Vec::with_capacity(total);
	while let Some(reply) = out_rx.recv().await {
		replies.push(reply);
	}
	replies
}

/// K-way merges already sorted slices: each step emits the smallest head
/// among the non-exhausted slices, suppressing an element equal to the one
/// emitted just before it, until `max` emissions or exhaustion.
pub fn merge_sorted(slices: Vec<Vec<String>>, max: usize) -> Vec<String> {
	let mut cursors = vec![0usize; slices.len()];
	let mut merged: Vec<String> = Vec::new();
	while merged.len() < max {
		let mut best: Option<usize> = None;
		for (i, slice) in slices.iter().enumerate() {
			if cursors[i] >= slice.len() {
				continue;
			}
			best = match best {
				None => Some(i),
				Some(b) if slice[cursors[i]] < slices[b][cursors[b]] => Some(i),
				keep => keep,
			};
		}
		let Some(i) = best else { break };
		let item = slices[i][cursors[i]].clone();
		cursors[i] += 1;
		if merged.last() != Some(&item) {
			merged.push(item);
		}
	}
	merged
}

#[cfg(test)]
mod tests {
	use super::*;
	use api::types::{GetRequest, PutRequest};
	use bytes::Bytes;
	use impls::memory_engine::MemoryEngine;
	use impls::ordered_index::OrderedIndex;

	fn strings(items: &[&str]) -> Vec<String> {
		items.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn merge_dedupes_and_truncates() {
		let merged = merge_sorted(
			vec![strings(&["a", "c", "e"]), strings(&["a", "b", "c", "d"])],
			6,
		);
		assert_eq!(merged, strings(&["a", "b", "c", "d", "e"]));
	}

	#[test]
	fn merge_stops_at_max_emissions() {
		let merged = merge_sorted(
			vec![strings(&["a", "c", "e"]), strings(&["a", "b", "c", "d"])],
			3,
		);
		assert_eq!(merged, strings(&["a", "b", "c"]));
	}

	#[test]
	fn merge_keeps_adjacent_duplicates_only_once() {
		let merged = merge_sorted(vec![strings(&["k", "k"]), strings(&["k"])], 10);
		assert_eq!(merged, strings(&["k"]));
	}

	#[test]
	fn merge_of_nothing_is_empty() {
		assert_eq!(merge_sorted(Vec::new(), 5), Vec::<String>::new());
		assert_eq!(merge_sorted(vec![Vec::new(), Vec::new()], 5), Vec::<String>::new());
	}

	#[tokio::test]
	async fn fan_out_reaches_every_target_even_beyond_the_pool_size() {
		let mut targets: Vec<(String, Arc<dyn IndexStore>)> = Vec::new();
		for i in 0..(FAN_OUT_WORKERS * 3) {
			targets.push((format!("s{}", i), Arc::new(OrderedIndex::new(MemoryEngine::new()))));
		}
		let stores: Vec<Arc<dyn IndexStore>> =
			targets.iter().map(|(_, s)| Arc::clone(s)).collect();

		let replies = fan_out(targets, |_addr, store| async move {
			store
				.put(PutRequest {
					base: "b".to_string(),
					key: "k".to_string(),
					version: 4,
					value: Bytes::from("v"),
				})
				.await
		})
		.await;

		assert_eq!(replies.len(), FAN_OUT_WORKERS * 3);
		assert!(replies.iter().all(|(_, r)| r.is_ok()));
		for store in stores {
			let reply = store
				.get(GetRequest { base: "b".to_string(), key: "k".to_string(), version: 0 })
				.await
				.unwrap();
			assert_eq!(reply.version, 4);
		}
	}
}
