use catalog_core::input::{PointerPhase, PointerSample};
use glam::Vec2;
use web_sys as web;

/// Client coordinates to canvas-relative CSS pixels.
#[inline]
pub fn canvas_css_point(client_x: f64, client_y: f64, canvas: &web::HtmlCanvasElement) -> Vec2 {
    let rect = canvas.get_bounding_client_rect();
    Vec2::new(
        (client_x - rect.left()) as f32,
        (client_y - rect.top()) as f32,
    )
}

/// Mouse and pen only; touch arrives through [`touch_samples`].
pub fn pointer_sample(
    ev: &web::PointerEvent,
    canvas: &web::HtmlCanvasElement,
    phase: PointerPhase,
) -> Option<PointerSample> {
    if ev.pointer_type() == "touch" {
        return None;
    }
    let p = canvas_css_point(ev.client_x() as f64, ev.client_y() as f64, canvas);
    Some(PointerSample::new(p.x, p.y, ev.pointer_id(), phase))
}

pub fn touch_samples(
    ev: &web::TouchEvent,
    canvas: &web::HtmlCanvasElement,
    phase: PointerPhase,
) -> Vec<PointerSample> {
    let list = ev.changed_touches();
    (0..list.length())
        .filter_map(|i| list.get(i))
        .map(|t| {
            let p = canvas_css_point(t.client_x() as f64, t.client_y() as f64, canvas);
            PointerSample::new(p.x, p.y, t.identifier(), phase)
        })
        .collect()
}
