use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::Result;

/// A point in graph space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
	/// Horizontal coordinate.
	pub x: f64,
	/// Vertical coordinate.
	pub y: f64,
}

impl Position {
	/// Creates a position from its coordinates.
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	/// Both coordinates are finite numbers.
	pub fn is_finite(&self) -> bool {
		self.x.is_finite() && self.y.is_finite()
	}

	/// Returns `self` when finite, `fallback` otherwise.
	pub fn or(self, fallback: Position) -> Position {
		if self.is_finite() { self } else { fallback }
	}

	/// Linear interpolation towards `to`, `t` in `[0, 1]`.
	pub fn lerp(self, to: Position, t: f64) -> Position {
		Position::new(self.x + (to.x - self.x) * t, self.y + (to.y - self.y) * t)
	}
}

/// Drawing surface dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
	/// Width in pixels.
	pub width: f64,
	/// Height in pixels.
	pub height: f64,
}

impl Default for Viewport {
	fn default() -> Self {
		Self {
			width: 800.0,
			height: 600.0,
		}
	}
}

impl Viewport {
	/// Creates a viewport, rejecting non-positive or non-finite sizes.
	pub fn new(width: f64, height: f64) -> Result<Self> {
		if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
			return Err(super::error::TopologyError::InvalidViewport { width, height });
		}
		Ok(Self { width, height })
	}

	/// Center of the drawing surface.
	pub fn center(&self) -> Position {
		Position::new(self.width / 2.0, self.height / 2.0)
	}
}

/// Operational status of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
	/// Serving normally.
	#[default]
	Active,
	/// Down or unreachable.
	Inactive,
	/// Up with reduced health.
	Degraded,
}

impl From<&str> for NodeStatus {
	fn from(s: &str) -> Self {
		match s.trim().to_ascii_lowercase().as_str() {
			"inactive" | "down" | "offline" => NodeStatus::Inactive,
			"degraded" | "warning" => NodeStatus::Degraded,
			_ => NodeStatus::Active,
		}
	}
}

/// Business criticality of a node.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
	#[default]
	Low,
	Medium,
	High,
	Critical,
}

impl From<&str> for Criticality {
	fn from(s: &str) -> Self {
		match s.trim().to_ascii_lowercase().as_str() {
			"medium" => Criticality::Medium,
			"high" => Criticality::High,
			"critical" => Criticality::Critical,
			_ => Criticality::Low,
		}
	}
}

/// Traffic intensity hint, used for node sizing.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLevel {
	#[default]
	Low,
	Medium,
	High,
}

impl From<&str> for TrafficLevel {
	fn from(s: &str) -> Self {
		match s.trim().to_ascii_lowercase().as_str() {
			"high" => TrafficLevel::High,
			"medium" => TrafficLevel::Medium,
			_ => TrafficLevel::Low,
		}
	}
}

/// Status of a link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStatus {
	/// Carrying traffic.
	#[default]
	Active,
	/// Carrying traffic with errors or latency.
	Degraded,
}

impl From<&str> for EdgeStatus {
	fn from(s: &str) -> Self {
		match s.trim().to_ascii_lowercase().as_str() {
			"degraded" | "inactive" | "down" => EdgeStatus::Degraded,
			_ => EdgeStatus::Active,
		}
	}
}

/// Canonical node record held by the graph store.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
	/// Unique, non-empty identifier.
	pub id: String,
	/// Display name; falls back to the id.
	pub name: String,
	/// Owning application.
	pub app_id: Option<String>,
	/// Primary category.
	pub tier: Option<String>,
	/// Secondary category.
	pub kind: Option<String>,
	/// Tertiary category.
	pub component_type: Option<String>,
	/// Operational status.
	pub status: NodeStatus,
	/// Business criticality.
	pub criticality: Criticality,
	/// Address shown by the IP label overlay.
	pub ip: Option<String>,
	/// CPU utilisation percentage.
	pub cpu: Option<f64>,
	/// Traffic intensity hint.
	pub traffic: TrafficLevel,
	/// Explicit fill color.
	pub color: Option<String>,
	/// Explicit hierarchical layer (0-3).
	pub layer: Option<u8>,
	/// Current position.
	pub position: Position,
	/// Current velocity, only meaningful under force layout.
	pub velocity: Position,
	/// Fixed position overriding physics.
	pub pin: Option<Position>,
}

impl Node {
	/// Creates a node with the given id and category and defaults elsewhere.
	pub fn new(id: impl Into<String>, tier: impl Into<String>) -> Self {
		let id = id.into();
		Self {
			name: id.clone(),
			id,
			app_id: None,
			tier: Some(tier.into()),
			kind: None,
			component_type: None,
			status: NodeStatus::Active,
			criticality: Criticality::Low,
			ip: None,
			cpu: None,
			traffic: TrafficLevel::Low,
			color: None,
			layer: None,
			position: Position::new(f64::NAN, f64::NAN),
			velocity: Position::default(),
			pin: None,
		}
	}

	/// Category fields in priority order: tier, type, component type.
	pub fn categories(&self) -> impl Iterator<Item = &str> {
		[&self.tier, &self.kind, &self.component_type]
			.into_iter()
			.filter_map(|c| c.as_deref())
			.filter(|c| !c.is_empty())
	}

	/// Highest priority category, if any.
	pub fn primary_category(&self) -> Option<&str> {
		self.categories().next()
	}

	/// Moves the node and fixes it there.
	pub fn pin_at(&mut self, position: Position) {
		self.position = position;
		self.velocity = Position::default();
		self.pin = Some(position);
	}
}

/// Canonical link record held by the graph store.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
	/// Unique identifier.
	pub id: String,
	/// Source node id.
	pub source: String,
	/// Target node id.
	pub target: String,
	/// Protocol label, e.g. `HTTPS`.
	pub protocol: String,
	/// Destination port.
	pub port: Option<u16>,
	/// Bandwidth in Mbps.
	pub bandwidth: f64,
	/// Link status.
	pub status: EdgeStatus,
}

impl Edge {
	/// Creates an active link with defaults elsewhere.
	pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
		let (source, target) = (source.into(), target.into());
		Self {
			id: format!("{source}->{target}"),
			source,
			target,
			protocol: "TCP".into(),
			port: None,
			bandwidth: 0.0,
			status: EdgeStatus::Active,
		}
	}

	/// `protocol:port` label for the edge label overlay.
	pub fn label(&self) -> String {
		match self.port {
			Some(port) => format!("{}:{}", self.protocol, port),
			None => self.protocol.clone(),
		}
	}
}

/// Node as supplied by the data source.
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeRecord {
	#[serde(deserialize_with = "lenient::id")]
	pub id: String,
	#[serde(deserialize_with = "lenient::text")]
	pub name: Option<String>,
	#[serde(deserialize_with = "lenient::text")]
	pub app_id: Option<String>,
	#[serde(deserialize_with = "lenient::text")]
	pub tier: Option<String>,
	#[serde(rename = "type", deserialize_with = "lenient::text")]
	pub kind: Option<String>,
	#[serde(deserialize_with = "lenient::text")]
	pub component_type: Option<String>,
	#[serde(deserialize_with = "lenient::text")]
	pub status: Option<String>,
	#[serde(deserialize_with = "lenient::text")]
	pub criticality: Option<String>,
	#[serde(deserialize_with = "lenient::text")]
	pub ip: Option<String>,
	#[serde(deserialize_with = "lenient::number")]
	pub cpu: Option<f64>,
	#[serde(deserialize_with = "lenient::text")]
	pub traffic: Option<String>,
	#[serde(deserialize_with = "lenient::text")]
	pub color: Option<String>,
	#[serde(deserialize_with = "lenient::layer")]
	pub layer: Option<u8>,
	#[serde(deserialize_with = "lenient::number")]
	pub x: Option<f64>,
	#[serde(deserialize_with = "lenient::number")]
	pub y: Option<f64>,
	#[serde(deserialize_with = "lenient::number")]
	pub fx: Option<f64>,
	#[serde(deserialize_with = "lenient::number")]
	pub fy: Option<f64>,
}

/// Link as supplied by the data source.
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkRecord {
	#[serde(deserialize_with = "lenient::text")]
	pub id: Option<String>,
	#[serde(deserialize_with = "lenient::id")]
	pub source: String,
	#[serde(deserialize_with = "lenient::id")]
	pub target: String,
	#[serde(deserialize_with = "lenient::text")]
	pub protocol: Option<String>,
	#[serde(deserialize_with = "lenient::port")]
	pub port: Option<u16>,
	#[serde(deserialize_with = "lenient::number")]
	pub bandwidth: Option<f64>,
	#[serde(deserialize_with = "lenient::text")]
	pub status: Option<String>,
}

/// Field deserializers that never fail: values of the wrong shape become
/// `None` (or an empty id) and are logged, so one bad field cannot reject
/// the whole document.
mod lenient {
	use log::warn;
	use serde::{Deserialize, Deserializer};
	use serde_json::Value;

	type Result<T, E> = std::result::Result<T, E>;

	/// Strings pass through, numbers are stringified.
	pub fn id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
		Ok(match Value::deserialize(d)? {
			Value::String(s) => s,
			Value::Number(n) => n.to_string(),
			Value::Null => String::new(),
			other => {
				warn!("ignoring non-scalar id {other}");
				String::new()
			}
		})
	}

	pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
		Ok(match Value::deserialize(d)? {
			Value::String(s) => Some(s),
			Value::Number(n) => Some(n.to_string()),
			Value::Bool(b) => Some(b.to_string()),
			Value::Null => None,
			other => {
				warn!("ignoring non-text value {other}");
				None
			}
		})
	}

	/// Numbers, or strings that parse as one.
	pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
		Ok(as_number(Value::deserialize(d)?))
	}

	/// Integral ports in `0..=65535`.
	pub fn port<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u16>, D::Error> {
		Ok(as_number(Value::deserialize(d)?).and_then(|p| {
			if p.fract() == 0.0 && (0.0..=f64::from(u16::MAX)).contains(&p) {
				Some(p as u16)
			} else {
				warn!("ignoring out-of-range port {p}");
				None
			}
		}))
	}

	/// Layers are clamped into `0..=255`; the layout clamps further.
	pub fn layer<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u8>, D::Error> {
		Ok(as_number(Value::deserialize(d)?).map(|l| l.round().clamp(0.0, f64::from(u8::MAX)) as u8))
	}

	fn as_number(value: Value) -> Option<f64> {
		let n = match &value {
			Value::Number(n) => n.as_f64(),
			Value::String(s) => s.trim().parse::<f64>().ok(),
			Value::Null => return None,
			_ => None,
		};
		match n.filter(|n| n.is_finite()) {
			Some(n) => Some(n),
			None => {
				warn!("ignoring non-numeric value {value}");
				None
			}
		}
	}
}

#[derive(Deserialize)]
struct RawDocument {
	#[serde(default)]
	nodes: Vec<Value>,
	#[serde(default)]
	links: Vec<Value>,
}

fn records<T: DeserializeOwned>(values: Vec<Value>, kind: &str) -> Vec<T> {
	values
		.into_iter()
		.enumerate()
		.filter_map(|(i, value)| match serde_json::from_value(value) {
			Ok(record) => Some(record),
			Err(e) => {
				warn!("dropping {kind} record #{i}: {e}");
				None
			}
		})
		.collect()
}

/// Raw topology document: `{ "nodes": [...], "links": [...] }`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphData {
	/// Node records.
	pub nodes: Vec<NodeRecord>,
	/// Link records.
	pub links: Vec<LinkRecord>,
}

impl GraphData {
	/// Parses a JSON topology document.
	///
	/// Only an unreadable document is an error. Records that are not
	/// objects are dropped with a warning; the rest are kept.
	pub fn from_json(json: &str) -> Result<Self> {
		let raw: RawDocument = serde_json::from_str(json)?;
		Ok(Self {
			nodes: records(raw.nodes, "node"),
			links: records(raw.links, "link"),
		})
	}

	/// Distinct non-empty categories across all node records, sorted.
	pub fn categories(&self) -> Vec<String> {
		self.nodes
			.iter()
			.flat_map(|n| [&n.tier, &n.kind, &n.component_type])
			.filter_map(|c| c.as_deref())
			.filter(|c| !c.is_empty())
			.map(str::to_string)
			.collect::<std::collections::BTreeSet<_>>()
			.into_iter()
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_document_with_type_field_and_defaults() {
		let json = r#"{
			"nodes": [
				{ "id": "web-1", "type": "web", "x": 10, "y": 20 },
				{ "id": "db-1", "tier": "db", "status": "inactive" }
			],
			"links": [{ "source": "web-1", "target": "db-1", "protocol": "SQL", "port": 5432 }]
		}"#;
		let data = GraphData::from_json(json).unwrap();
		assert_eq!(data.nodes.len(), 2);
		assert_eq!(data.nodes[0].kind.as_deref(), Some("web"));
		assert_eq!(data.nodes[0].x, Some(10.0));
		assert_eq!(data.nodes[1].y, None);
		assert_eq!(data.links[0].port, Some(5432));
	}

	#[test]
	fn document_categories_are_sorted_and_unique() {
		let json = r#"{ "nodes": [
			{ "id": "a", "tier": "web", "type": "nginx" },
			{ "id": "b", "tier": "web", "component_type": "" },
			{ "id": "c", "type": "db" }
		] }"#;
		let data = GraphData::from_json(json).unwrap();
		assert_eq!(data.categories(), vec!["db", "nginx", "web"]);
		assert!(data.links.is_empty());
	}

	#[test]
	fn rejects_malformed_json() {
		assert!(GraphData::from_json("{ nodes: ").is_err());
		assert!(GraphData::from_json(r#"{ "nodes": 5 }"#).is_err());
	}

	#[test]
	fn bad_scalars_degrade_to_none_instead_of_failing() {
		let json = r#"{
			"nodes": [
				{ "id": 1, "tier": "web", "layer": -1, "cpu": "87.5" },
				{ "id": "b", "layer": 9, "x": "left", "y": 3 }
			],
			"links": [
				{ "source": 1, "target": "b", "port": 70000 },
				{ "source": "b", "target": 1, "port": "443" },
				{ "source": "b", "target": 1, "port": 80.5, "bandwidth": null }
			]
		}"#;
		let data = GraphData::from_json(json).unwrap();
		assert_eq!(data.nodes[0].id, "1");
		assert_eq!(data.nodes[0].layer, Some(0));
		assert_eq!(data.nodes[0].cpu, Some(87.5));
		assert_eq!(data.nodes[1].layer, Some(9));
		assert_eq!(data.nodes[1].x, None);
		assert_eq!(data.nodes[1].y, Some(3.0));
		assert_eq!(data.links[0].source, "1");
		assert_eq!(data.links[0].port, None);
		assert_eq!(data.links[1].port, Some(443));
		assert_eq!(data.links[2].port, None);
		assert_eq!(data.links[2].bandwidth, None);
	}

	#[test]
	fn non_object_records_are_dropped_individually() {
		let json = r#"{
			"nodes": [{ "id": "a" }, 42, "b", { "id": "c", "tier": ["web"] }],
			"links": [null, { "source": "a", "target": "c" }]
		}"#;
		let data = GraphData::from_json(json).unwrap();
		let ids: Vec<&str> = data.nodes.iter().map(|n| n.id.as_str()).collect();
		assert_eq!(ids, vec!["a", "c"]);
		assert_eq!(data.nodes[1].tier, None);
		assert_eq!(data.links.len(), 1);
	}

	#[test]
	fn lenient_enum_parsing() {
		assert_eq!(NodeStatus::from("Inactive"), NodeStatus::Inactive);
		assert_eq!(NodeStatus::from("bogus"), NodeStatus::Active);
		assert_eq!(Criticality::from("CRITICAL"), Criticality::Critical);
		assert_eq!(EdgeStatus::from("degraded"), EdgeStatus::Degraded);
		assert_eq!(TrafficLevel::from(""), TrafficLevel::Low);
	}

	#[test]
	fn categories_skip_missing_fields_in_priority_order() {
		let mut node = Node::new("a", "");
		node.kind = Some("web".into());
		node.component_type = Some("nginx".into());
		assert_eq!(node.categories().collect::<Vec<_>>(), vec!["web", "nginx"]);
		assert_eq!(node.primary_category(), Some("web"));
	}

	#[test]
	fn viewport_validation() {
		assert!(Viewport::new(0.0, 10.0).is_err());
		assert!(Viewport::new(f64::NAN, 10.0).is_err());
		let vp = Viewport::new(200.0, 100.0).unwrap();
		assert_eq!(vp.center(), Position::new(100.0, 50.0));
	}
}
