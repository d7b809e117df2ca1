use catalog_core::{AnchorRect, PageSurface, ScrollSource, Viewport};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys as web;

#[inline]
pub fn window_document() -> Option<web::Document> {
    web::window().and_then(|w| w.document())
}

pub fn js_err(e: wasm_bindgen::JsValue) -> anyhow::Error {
    anyhow::anyhow!(format!("{:?}", e))
}

/// Attach a typed listener for the lifetime of the page.
pub fn add_listener<E, F>(target: &web::EventTarget, kind: &str, passive: bool, mut handler: F)
where
    E: JsCast + 'static,
    F: FnMut(E) + 'static,
{
    let closure = Closure::wrap(Box::new(move |ev: web::Event| {
        if let Ok(ev) = ev.dyn_into::<E>() {
            handler(ev);
        }
    }) as Box<dyn FnMut(web::Event)>);
    let opts = web::AddEventListenerOptions::new();
    opts.set_passive(passive);
    if let Err(e) = target.add_event_listener_with_callback_and_add_event_listener_options(
        kind,
        closure.as_ref().unchecked_ref(),
        &opts,
    ) {
        log::warn!("[dom] could not listen for {}: {:?}", kind, e);
    }
    closure.forget();
}

/// Keep the canvas drawing buffer at CSS size times devicePixelRatio.
pub fn sync_canvas_backing_size(canvas: &web::HtmlCanvasElement) {
    if let Some(w) = web::window() {
        let dpr = w.device_pixel_ratio();
        let rect = canvas.get_bounding_client_rect();
        let w_px = (rect.width() * dpr) as u32;
        let h_px = (rect.height() * dpr) as u32;
        if canvas.width() != w_px.max(1) || canvas.height() != h_px.max(1) {
            canvas.set_width(w_px.max(1));
            canvas.set_height(h_px.max(1));
        }
    }
}

/// Canvas-backed viewport plus the selection anchor element.
pub struct DomSurface {
    canvas: web::HtmlCanvasElement,
    anchor_id: String,
}

impl DomSurface {
    pub fn new(canvas: web::HtmlCanvasElement, anchor_id: &str) -> Self {
        Self {
            canvas,
            anchor_id: anchor_id.to_string(),
        }
    }
}

impl PageSurface for DomSurface {
    fn viewport(&self) -> Viewport {
        let rect = self.canvas.get_bounding_client_rect();
        let mut vp = Viewport::new(rect.width() as f32, rect.height() as f32);
        vp.visible = window_document()
            .map(|d| d.visibility_state() == web::VisibilityState::Visible)
            .unwrap_or(true);
        vp
    }

    fn selection_anchor(&self) -> Option<AnchorRect> {
        let el = window_document()?.get_element_by_id(&self.anchor_id)?;
        let r = el.get_bounding_client_rect();
        let c = self.canvas.get_bounding_client_rect();
        Some(AnchorRect {
            left: (r.left() - c.left()) as f32,
            top: (r.top() - c.top()) as f32,
            width: r.width() as f32,
            height: r.height() as f32,
        })
    }
}

/// The page's scrolling container.
pub struct DomScroll {
    el: web::Element,
}

impl DomScroll {
    pub fn new(el: web::Element) -> Self {
        Self { el }
    }
}

impl ScrollSource for DomScroll {
    fn scroll_top(&self) -> f32 {
        self.el.scroll_top() as f32
    }

    fn set_scroll_top(&self, value: f32) {
        if value.is_finite() {
            self.el.set_scroll_top(value.round() as i32);
        }
    }
}
