//! Outbound notifications for panels outside the canvas.

use std::fmt;

use super::stats::GraphStats;

/// Something external panels may want to reflect.
#[derive(Clone, Debug, PartialEq)]
pub enum TopologyEvent {
	/// Visible counts changed.
	StatsChanged(GraphStats),
	/// Highlighted node ids changed, sorted.
	SelectionChanged(Vec<String>),
}

type Listener = Box<dyn FnMut(&TopologyEvent)>;

/// Synchronous fan-out to registered listeners, in subscription order.
#[derive(Default)]
pub struct EventBus {
	listeners: Vec<Listener>,
}

impl EventBus {
	/// Registers a listener.
	pub fn subscribe(&mut self, listener: impl FnMut(&TopologyEvent) + 'static) {
		self.listeners.push(Box::new(listener));
	}

	/// Delivers `event` to every listener.
	pub fn emit(&mut self, event: &TopologyEvent) {
		for listener in &mut self.listeners {
			listener(event);
		}
	}
}

impl fmt::Debug for EventBus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EventBus")
			.field("listeners", &self.listeners.len())
			.finish()
	}
}
