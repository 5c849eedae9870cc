use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use leptos::prelude::*;
use log::{debug, error};
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent, Window};

use super::animator::{AnimationHandle, AnimatorConfig, CycleTimer, TimerId};
use super::events::TopologyEvent;
use super::layout::{LayoutConfig, LayoutMode};
use super::projector::DisplayOptions;
use super::render;
use super::state::TopologyState;
use super::stats::GraphStats;
use super::types::{GraphData, Viewport};

type SharedState = Rc<RefCell<Option<TopologyState>>>;

/// Delay before retrying a traffic cycle that found the state borrowed.
const BUSY_RETRY_MS: u32 = 16;

/// Runs traffic cycles through `setTimeout`.
struct BrowserTimer {
	state: SharedState,
}

impl CycleTimer for BrowserTimer {
	fn schedule(&mut self, delay_ms: u32, handle: AnimationHandle) -> TimerId {
		let state = self.state.clone();
		let callback = Closure::once_into_js(move || {
			let mut timer = BrowserTimer {
				state: state.clone(),
			};
			let Ok(mut guard) = state.try_borrow_mut() else {
				debug!("traffic cycle {handle:?} fired while state was busy; retrying");
				timer.schedule(BUSY_RETRY_MS, handle);
				return;
			};
			if let Some(ref mut s) = *guard {
				s.run_traffic_cycle(handle, &mut timer, js_sys::Date::now());
			}
		});
		web_sys::window()
			.and_then(|w| {
				w.set_timeout_with_callback_and_timeout_and_arguments_0(
					callback.unchecked_ref(),
					delay_ms as i32,
				)
				.ok()
			})
			.unwrap_or_else(|| {
				error!("could not schedule traffic cycle");
				-1
			})
	}

	fn cancel(&mut self, id: TimerId) {
		if let Some(window) = web_sys::window() {
			window.clear_timeout_with_handle(id);
		}
	}
}

fn window_size(window: &Window) -> (f64, f64) {
	(
		window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(800.0),
		window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(600.0),
	)
}

fn local_point(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<(f64, f64)> {
	let canvas: HtmlCanvasElement = canvas_ref.get()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some((
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	))
}

/// Interactive topology canvas.
///
/// Physics and repainting run on `requestAnimationFrame`; traffic cycles run
/// on their own `setTimeout` chain.
#[component]
pub fn TopologyCanvas(
	#[prop(into)] data: Signal<GraphData>,
	#[prop(into)] categories: Signal<BTreeSet<String>>,
	#[prop(into)] layout: Signal<LayoutMode>,
	#[prop(into)] options: Signal<DisplayOptions>,
	#[prop(optional)] on_stats: Option<Callback<GraphStats>>,
	#[prop(optional)] on_selection: Option<Callback<Vec<String>>>,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let state: SharedState = Rc::new(RefCell::new(None));
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let (state_init, animate_init, resize_cb_init) =
		(state.clone(), animate.clone(), resize_cb.clone());

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		if state_init.borrow().is_some() {
			return;
		}
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			error!("no window available");
			return;
		};

		let (w, h) = if fullscreen {
			window_size(&window)
		} else {
			(
				width.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_width() as f64)
						.unwrap_or(800.0)
				}),
				height.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_height() as f64)
						.unwrap_or(600.0)
				}),
			)
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let Some(ctx) = canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
		else {
			error!("canvas 2d context unavailable");
			return;
		};
		let viewport = Viewport::new(w, h).unwrap_or_default();

		let mut topology = TopologyState::new(
			&data.get_untracked(),
			viewport,
			LayoutConfig::default(),
			AnimatorConfig::default(),
		);
		topology.set_active_categories(categories.get_untracked());
		topology.set_layout_mode(layout.get_untracked());
		topology.events.subscribe(move |event| match event {
			TopologyEvent::StatsChanged(stats) => {
				if let Some(cb) = on_stats {
					cb.run(*stats);
				}
			}
			TopologyEvent::SelectionChanged(ids) => {
				if let Some(cb) = on_selection {
					cb.run(ids.clone());
				}
			}
		});
		topology.announce();
		*state_init.borrow_mut() = Some(topology);

		let mut timer = BrowserTimer {
			state: state_init.clone(),
		};
		if let Some(ref mut s) = *state_init.borrow_mut() {
			s.set_display_options(options.get_untracked(), &mut timer);
		}

		if fullscreen {
			let (state_resize, canvas_resize) = (state_init.clone(), canvas.clone());
			*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
				let Some(win) = web_sys::window() else {
					return;
				};
				let (nw, nh) = window_size(&win);
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				if let Some(ref mut s) = *state_resize.borrow_mut() {
					s.resize(nw, nh);
				}
			}));
			if let Some(ref cb) = *resize_cb_init.borrow() {
				let _ =
					window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		let (state_anim, animate_inner) = (state_init.clone(), animate_init.clone());
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			if let Some(ref mut s) = *state_anim.borrow_mut() {
				s.tick(0.016);
				render::render(s, &ctx, js_sys::Date::now());
			}
			if let (Some(cb), Some(win)) = (&*animate_inner.borrow(), web_sys::window()) {
				let _ = win.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	let state_cat = state.clone();
	Effect::new(move |_| {
		let active = categories.get();
		if let Some(ref mut s) = *state_cat.borrow_mut() {
			s.set_active_categories(active);
		}
	});

	let state_layout = state.clone();
	Effect::new(move |_| {
		let mode = layout.get();
		if let Some(ref mut s) = *state_layout.borrow_mut() {
			s.set_layout_mode(mode);
		}
	});

	let state_opts = state.clone();
	Effect::new(move |_| {
		let opts = options.get();
		let mut timer = BrowserTimer {
			state: state_opts.clone(),
		};
		if let Some(ref mut s) = *state_opts.borrow_mut() {
			s.set_display_options(opts, &mut timer);
		}
	});

	let state_data = state.clone();
	Effect::new(move |prev: Option<()>| {
		let next = data.get();
		if prev.is_some() {
			if let Some(ref mut s) = *state_data.borrow_mut() {
				s.replace_graph(&next);
			}
		}
	});

	let state_md = state.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let Some((x, y)) = local_point(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_md.borrow_mut() {
			s.pointer_down(x, y);
		}
	};

	let state_mm = state.clone();
	let on_mousemove = move |ev: MouseEvent| {
		let Some((x, y)) = local_point(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_mm.borrow_mut() {
			s.pointer_move(x, y);
		}
	};

	let state_mu = state.clone();
	let on_mouseup = move |_: MouseEvent| {
		if let Some(ref mut s) = *state_mu.borrow_mut() {
			s.pointer_up();
		}
	};

	let state_ml = state.clone();
	let on_mouseleave = move |_: MouseEvent| {
		if let Some(ref mut s) = *state_ml.borrow_mut() {
			s.pointer_leave();
		}
	};

	let state_wh = state.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some((x, y)) = local_point(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_wh.borrow_mut() {
			s.zoom_at(x, y, ev.delta_y());
		}
	};

	view! {
		<canvas
			node_ref=canvas_ref
			class="topology-canvas"
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseleave=on_mouseleave
			on:wheel=on_wheel
			style="display: block; cursor: grab;"
		/>
	}
}
