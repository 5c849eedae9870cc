//! Locally generated placeholder topology, used when no document is
//! supplied or the supplied one cannot be parsed.

use log::{info, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::types::{GraphData, LinkRecord, NodeRecord};

/// (tier, component type, count, protocol into the next tier, port)
const TIERS: &[(&str, &str, usize, &str, u16)] = &[
	("load-balancer", "haproxy", 2, "HTTPS", 443),
	("web", "nginx", 5, "HTTP", 8080),
	("api", "service", 6, "GRPC", 9090),
	("cache", "redis", 2, "REDIS", 6379),
	("database", "postgres", 3, "SQL", 5432),
	("queue", "rabbitmq", 2, "AMQP", 5672),
];

/// Fixed so the placeholder looks the same on every load.
const PLACEHOLDER_SEED: u64 = 0x70b0;

fn level(r: f64) -> &'static str {
	if r > 0.75 {
		"high"
	} else if r > 0.4 {
		"medium"
	} else {
		"low"
	}
}

/// Builds a layered service topology: load balancers feed web servers,
/// web servers call APIs, APIs use caches, databases and queues.
pub fn placeholder_topology() -> GraphData {
	let mut rng = SmallRng::seed_from_u64(PLACEHOLDER_SEED);
	let mut nodes = Vec::new();
	let mut layers: Vec<Vec<String>> = Vec::new();

	for (t, &(tier, component, count, _, _)) in TIERS.iter().enumerate() {
		let mut ids = Vec::new();
		for i in 0..count {
			let seed = t * 31 + i;
			let r: f64 = rng.r#gen();
			let id = format!("{tier}-{}", i + 1);
			nodes.push(NodeRecord {
				id: id.clone(),
				name: Some(format!("{component}-{}", i + 1)),
				app_id: Some(format!("app-{}", (seed % 3) + 1)),
				tier: Some(tier.into()),
				kind: Some(component.into()),
				component_type: None,
				status: Some(
					match (r * 20.0) as usize {
						0 => "inactive",
						1 | 2 => "degraded",
						_ => "active",
					}
					.into(),
				),
				criticality: Some(["low", "medium", "high", "critical"][seed % 4].into()),
				ip: Some(format!("10.0.{}.{}", t + 1, i + 10)),
				cpu: Some((rng.r#gen::<f64>() * 100.0).round()),
				traffic: Some(level(rng.r#gen()).into()),
				color: None,
				layer: Some(t.min(3) as u8),
				..Default::default()
			});
			ids.push(id);
		}
		layers.push(ids);
	}

	let mut links = Vec::new();
	let mut connect = |source: &str, target: &str, protocol: &str, port: u16| {
		let r: f64 = rng.r#gen();
		links.push(LinkRecord {
			id: None,
			source: source.into(),
			target: target.into(),
			protocol: Some(protocol.into()),
			port: Some(port),
			bandwidth: Some((r * 1000.0).round()),
			status: Some(if r < 0.1 { "degraded" } else { "active" }.into()),
		});
	};

	// lb -> every web, web -> two apis
	for lb in &layers[0] {
		for web in &layers[1] {
			connect(lb, web, TIERS[0].3, TIERS[0].4);
		}
	}
	for (i, web) in layers[1].iter().enumerate() {
		for k in 0..2 {
			let api = &layers[2][(i + k * 3) % layers[2].len()];
			connect(web, api, TIERS[1].3, TIERS[1].4);
		}
	}
	// api -> one of each backing tier
	for (i, api) in layers[2].iter().enumerate() {
		for (t, backing) in layers.iter().enumerate().skip(3) {
			let target = &backing[i % backing.len()];
			connect(api, target, TIERS[t].3, TIERS[t].4);
		}
	}

	GraphData { nodes, links }
}

/// Parses a supplied topology document, falling back to
/// [`placeholder_topology`] when there is none or it is unreadable.
pub fn topology_or_placeholder(json: Option<&str>) -> GraphData {
	match json.map(GraphData::from_json) {
		Some(Ok(data)) => data,
		Some(Err(e)) => {
			warn!("topology document rejected ({e}); using placeholder");
			placeholder_topology()
		}
		None => {
			info!("no topology document supplied; using placeholder");
			placeholder_topology()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::topology::store::GraphStore;
	use crate::components::topology::types::Viewport;

	#[test]
	fn placeholder_is_deterministic_and_fully_connected() {
		let data = placeholder_topology();
		assert_eq!(data, placeholder_topology());
		assert_eq!(data.nodes.len(), 20);
		assert_eq!(data.links.len(), 2 * 5 + 5 * 2 + 6 * 3);

		let (store, report) = GraphStore::ingest(&data, &Viewport::default());
		assert_eq!(report.dropped_edges, 0);
		assert_eq!(report.dropped_nodes, 0);
		assert_eq!(store.node_count(), 20);
		assert_eq!(data.categories().len(), 12);
	}

	#[test]
	fn unreadable_or_missing_document_falls_back() {
		assert_eq!(topology_or_placeholder(None), placeholder_topology());
		assert_eq!(topology_or_placeholder(Some("{ oops")), placeholder_topology());
		let supplied = topology_or_placeholder(Some(r#"{ "nodes": [{ "id": "x" }] }"#));
		assert_eq!(supplied.nodes.len(), 1);
	}

	#[test]
	fn one_bad_field_keeps_the_supplied_graph() {
		for bad in [
			r#""port": 70000"#,
			r#""port": "443""#,
			r#""port": -1"#,
			r#""id": 7"#,
		] {
			let doc = format!(
				r#"{{
					"nodes": [{{ "id": "a", "layer": -1 }}, {{ "id": "b" }}],
					"links": [{{ "source": "a", "target": "b", {bad} }}]
				}}"#
			);
			let data = topology_or_placeholder(Some(&doc));
			assert_eq!(data.nodes.len(), 2, "{bad}");
			assert_eq!(data.links.len(), 1, "{bad}");

			let (store, _) = GraphStore::ingest(&data, &Viewport::default());
			assert_eq!(store.node_count(), 2);
			assert_eq!(store.node("a").unwrap().layer, Some(0));
		}
	}
}
