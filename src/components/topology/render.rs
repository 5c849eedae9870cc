use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::animator::ParticleFrame;
use super::projector::{EdgeShape, NodeShape, Scene};
use super::state::TopologyState;

const BACKGROUND: &str = "#0f172a";
const PARTICLE_RADIUS: f64 = 3.0;

fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

/// Draws one frame: links, particles, nodes, then labels.
pub fn render(state: &mut TopologyState, ctx: &CanvasRenderingContext2d, now: f64) {
	let viewport = state.viewport();
	let scene = state.scene();
	let particles = state.particle_frames(now);

	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, viewport.width, viewport.height);

	if scene.is_empty() {
		draw_empty_notice(ctx, viewport.width, viewport.height);
		return;
	}

	ctx.save();
	let _ = ctx.translate(state.transform.x, state.transform.y);
	let _ = ctx.scale(state.transform.k, state.transform.k);
	draw_edges(state, &scene, ctx);
	draw_particles(&particles, ctx);
	draw_nodes(state, &scene, ctx);
	ctx.restore();
}

fn draw_empty_notice(ctx: &CanvasRenderingContext2d, width: f64, height: f64) {
	ctx.set_fill_style_str("rgba(226, 232, 240, 0.8)");
	ctx.set_font("16px sans-serif");
	ctx.set_text_align("center");
	let _ = ctx.fill_text("No nodes match the current filters", width / 2.0, height / 2.0);
	ctx.set_text_align("start");
}

fn draw_edges(state: &TopologyState, scene: &Scene, ctx: &CanvasRenderingContext2d) {
	let k = state.transform.k;
	let (dash, gap) = (6.0 / k, 4.0 / k);
	let t = if state.has_active_highlight() {
		ease_out_cubic(state.highlight_level())
	} else {
		0.0
	};

	for edge in &scene.edges {
		let EdgeShape { from, to, .. } = edge;
		let (dx, dy) = (to.x - from.x, to.y - from.y);
		if (dx * dx + dy * dy).sqrt() < 0.001 {
			continue;
		}

		// t=0: all edges at base (0.6), t=1: highlighted at 0.9, others at 0.15
		let (alpha, width) = if edge.highlighted {
			(0.6 + 0.3 * t, edge.width * (1.0 + 0.3 * t))
		} else {
			(0.6 - 0.45 * t, edge.width * (1.0 - 0.3 * t))
		};

		ctx.set_stroke_style_str(&format!("rgba(100, 180, 255, {})", alpha));
		ctx.set_line_width(width / k);
		if edge.dashed {
			let _ = ctx.set_line_dash(&js_sys::Array::of2(
				&JsValue::from_f64(dash),
				&JsValue::from_f64(gap),
			));
		}
		ctx.begin_path();
		ctx.move_to(from.x, from.y);
		ctx.line_to(to.x, to.y);
		ctx.stroke();
		let _ = ctx.set_line_dash(&js_sys::Array::new());

		if let Some(label) = &edge.label {
			ctx.set_fill_style_str(&format!("rgba(148, 163, 184, {})", alpha));
			ctx.set_font(&format!("{}px sans-serif", 9.0 / k.max(0.5)));
			let _ = ctx.fill_text(label, (from.x + to.x) / 2.0, (from.y + to.y) / 2.0 - 3.0);
		}
	}
}

fn draw_particles(particles: &[ParticleFrame], ctx: &CanvasRenderingContext2d) {
	for particle in particles {
		ctx.set_global_alpha(particle.opacity);
		ctx.begin_path();
		let _ = ctx.arc(
			particle.position.x,
			particle.position.y,
			PARTICLE_RADIUS,
			0.0,
			2.0 * PI,
		);
		ctx.set_fill_style_str(particle.color);
		ctx.fill();
	}
	ctx.set_global_alpha(1.0);
}

fn draw_nodes(state: &TopologyState, scene: &Scene, ctx: &CanvasRenderingContext2d) {
	let (has_highlight, k) = (state.has_active_highlight(), state.transform.k);
	let t = ease_out_cubic(state.hover.highlight_t);
	let dim = ease_out_cubic(state.highlight_level());

	// dimmed nodes first so highlighted ones draw on top
	for node in scene.nodes.iter().filter(|n| !(has_highlight && n.highlighted)) {
		let alpha = if has_highlight { 1.0 - 0.6 * dim } else { 1.0 };
		draw_node(node, alpha, node.radius, ctx, k);
	}

	if !has_highlight {
		return;
	}

	for node in scene.nodes.iter().filter(|n| n.highlighted) {
		let hovered = state.is_hovered(&node.id);
		let radius = if hovered {
			node.radius * (1.0 + 0.35 * t)
		} else {
			node.radius * (1.0 + 0.15 * t)
		};

		if hovered && t > 0.01 {
			let glow_radius = node.radius * (1.8 + 1.2 * t);
			if let Ok(gradient) = ctx.create_radial_gradient(
				node.center.x,
				node.center.y,
				radius * 0.3,
				node.center.x,
				node.center.y,
				glow_radius,
			) {
				let _ = gradient.add_color_stop(0.0, &format!("rgba(255, 255, 255, {})", 0.35 * t));
				let _ = gradient.add_color_stop(1.0, "rgba(255, 255, 255, 0)");
				ctx.begin_path();
				let _ = ctx.arc(node.center.x, node.center.y, glow_radius, 0.0, 2.0 * PI);
				#[allow(deprecated)]
				ctx.set_fill_style(&gradient);
				ctx.fill();
			}
		}

		draw_node(node, 1.0, radius, ctx, k);
		ctx.begin_path();
		let _ = ctx.arc(node.center.x, node.center.y, radius + 2.0 / k, 0.0, 2.0 * PI);
		ctx.set_stroke_style_str("rgba(255, 255, 255, 0.7)");
		ctx.set_line_width(1.5 / k);
		ctx.stroke();
	}
}

fn draw_node(node: &NodeShape, alpha: f64, radius: f64, ctx: &CanvasRenderingContext2d, k: f64) {
	let (x, y) = (node.center.x, node.center.y);
	ctx.set_global_alpha(alpha);
	ctx.begin_path();
	let _ = ctx.arc(x, y, radius, 0.0, 2.0 * PI);
	ctx.set_fill_style_str(&node.fill);
	ctx.fill();
	ctx.set_global_alpha(1.0);

	let font = format!("{}px sans-serif", 10.0 / k.max(0.5));
	if let Some(label) = &node.label {
		ctx.set_fill_style_str(&format!("rgba(255, 255, 255, {})", alpha * 0.85));
		ctx.set_font(&font);
		let _ = ctx.fill_text(label, x + radius + 3.0, y + 3.0);
	}
	if let Some(ip) = &node.ip_label {
		ctx.set_fill_style_str(&format!("rgba(148, 163, 184, {})", alpha * 0.85));
		ctx.set_font(&font);
		let _ = ctx.fill_text(ip, x + radius + 3.0, y + 14.0);
	}
}
