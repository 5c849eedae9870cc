use std::collections::BTreeSet;

use leptos::prelude::*;
use log::warn;

use crate::components::topology::projector::DisplayOption;
use crate::components::topology::sample::topology_or_placeholder;
use crate::components::topology::{DisplayOptions, GraphData, GraphStats, LayoutMode, TopologyCanvas};

/// Element whose text content holds the topology document, if any.
const DATA_ELEMENT_ID: &str = "topology-data";

/// Reads the embedded topology document, or generates a placeholder.
fn acquire_topology() -> GraphData {
	let json = web_sys::window()
		.and_then(|w| w.document())
		.and_then(|d| d.get_element_by_id(DATA_ELEMENT_ID))
		.and_then(|el| el.text_content());
	topology_or_placeholder(json.as_deref())
}

fn option_toggle(
	options: RwSignal<DisplayOptions>,
	option: DisplayOption,
	label: &'static str,
) -> impl IntoView {
	view! {
		<label class="toggle">
			<input
				type="checkbox"
				prop:checked=move || options.with(|o| o.get(option))
				on:change=move |_| options.update(|o| o.set(option, !o.get(option)))
			/>
			{label}
		</label>
	}
}

/// Topology dashboard: canvas plus filter, layout, overlay, stats and
/// selection panels.
#[component]
pub fn Home() -> impl IntoView {
	let data = RwSignal::new(acquire_topology());
	let categories = RwSignal::new(BTreeSet::<String>::new());
	let layout = RwSignal::new(LayoutMode::default());
	let options = RwSignal::new(DisplayOptions::default());
	let (stats, set_stats) = signal(GraphStats::default());
	let (selection, set_selection) = signal(Vec::<String>::new());
	let available = Memo::new(move |_| data.with(GraphData::categories));

	let on_stats = Callback::new(move |s: GraphStats| set_stats.set(s));
	let on_selection = Callback::new(move |ids: Vec<String>| set_selection.set(ids));

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph">
				<TopologyCanvas
					data=data
					categories=categories
					layout=layout
					options=options
					on_stats=on_stats
					on_selection=on_selection
					fullscreen=true
				/>
				<div class="graph-overlay">
					<h1>"Network Topology"</h1>
					<p class="subtitle">
						"Click a node to select it and its neighbours. Drag to pin. Scroll to zoom."
					</p>

					<section class="panel">
						<h2>"Categories"</h2>
						<For
							each=move || available.get()
							key=|category| category.clone()
							children=move |category: String| {
								let (for_checked, for_toggle) = (category.clone(), category.clone());
								view! {
									<label class="filter">
										<input
											type="checkbox"
											prop:checked=move || {
												categories.with(|s| s.contains(&for_checked))
											}
											on:change=move |_| {
												categories
													.update(|s| {
														if !s.remove(&for_toggle) {
															s.insert(for_toggle.clone());
														}
													})
											}
										/>
										{category}
									</label>
								}
							}
						/>
						<p class="hint">
							{move || {
								categories.with(BTreeSet::is_empty).then_some("Showing all categories")
							}}
						</p>
						<button on:click=move |_| categories.set(BTreeSet::new())>"Clear"</button>
					</section>

					<section class="panel">
						<h2>"Layout"</h2>
						<select on:change=move |ev| {
							match event_target_value(&ev).parse::<LayoutMode>() {
								Ok(mode) => layout.set(mode),
								Err(e) => warn!("{e}"),
							}
						}>
							{LayoutMode::ALL
								.into_iter()
								.map(|mode| {
									view! {
										<option value=mode.as_str() prop:selected=move || layout.get() == mode>
											{mode.as_str()}
										</option>
									}
								})
								.collect_view()}
						</select>
					</section>

					<section class="panel">
						<h2>"Display"</h2>
						{option_toggle(options, DisplayOption::Labels, "Node labels")}
						{option_toggle(options, DisplayOption::IpLabels, "IP labels")}
						{option_toggle(options, DisplayOption::EdgeLabels, "Link labels")}
						{option_toggle(options, DisplayOption::Traffic, "Traffic")}
					</section>

					<section class="panel">
						<h2>"Stats"</h2>
						<p>{move || format!("Nodes: {}", stats.get().node_count)}</p>
						<p>{move || format!("Links: {}", stats.get().edge_count)}</p>
						<p>{move || format!("Avg degree: {:.2}", stats.get().average_degree)}</p>
						<p>{move || format!("Density: {:.3}", stats.get().density)}</p>
					</section>

					<section class="panel">
						<h2>"Selection"</h2>
						<p>
							{move || {
								let ids = selection.get();
								if ids.is_empty() { "Nothing selected".to_string() } else { ids.join(", ") }
							}}
						</p>
					</section>
				</div>
			</div>
		</ErrorBoundary>
	}
}
