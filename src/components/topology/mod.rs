//! Network topology canvas: ingestion, filtering, layout, projection and
//! traffic animation, plus the Leptos component that drives them.

pub mod animator;
mod component;
pub mod error;
pub mod events;
pub mod filter;
pub mod layout;
pub mod projector;
mod render;
pub mod sample;
pub mod simulation;
pub mod state;
pub mod stats;
pub mod store;
pub mod types;

pub use component::TopologyCanvas;
pub use error::{Result, TopologyError};
pub use layout::LayoutMode;
pub use projector::DisplayOptions;
pub use state::TopologyState;
pub use stats::GraphStats;
pub use types::{Edge, GraphData, Node};
