#![cfg(target_arch = "wasm32")]
//! Browser bindings for the catalog engine.

mod app;
mod dom;
mod events;
mod frame;
mod input;
mod loader;
mod render;

use app::{to_js, App};
use catalog_core::{EngineConfig, ProductItem};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys as web;

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("catalog-web starting");
    Ok(())
}

fn to_js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn json_string(value: &JsValue) -> Result<Option<String>, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }
    Ok(js_sys::JSON::stringify(value)?.as_string())
}

/// Handle the page holds on to; clones share one engine.
#[wasm_bindgen]
#[derive(Clone)]
pub struct CatalogHandle {
    inner: Rc<App>,
}

thread_local! {
    static SHARED: RefCell<Option<CatalogHandle>> = const { RefCell::new(None) };
}

/// Lazily created page-wide engine. `config` only applies on first use.
#[wasm_bindgen(js_name = getEngine)]
pub fn get_engine(config: JsValue) -> Result<CatalogHandle, JsValue> {
    if let Some(h) = SHARED.with(|s| s.borrow().clone()) {
        return Ok(h);
    }
    let handle = CatalogHandle::new(config)?;
    SHARED.with(|s| *s.borrow_mut() = Some(handle.clone()));
    Ok(handle)
}

#[wasm_bindgen]
impl CatalogHandle {
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<CatalogHandle, JsValue> {
        let config = match json_string(&config)? {
            Some(json) => EngineConfig::from_json(&json).map_err(to_js_err)?,
            None => EngineConfig::default(),
        };
        Ok(Self {
            inner: App::new(config),
        })
    }

    /// Bind the engine to its canvas and start rendering. Later calls are no-ops.
    pub fn init(&self, canvas: web::HtmlCanvasElement) {
        let app = &self.inner;
        if app.canvas.borrow().is_some() {
            return;
        }
        dom::sync_canvas_backing_size(&canvas);
        *app.canvas.borrow_mut() = Some(canvas.clone());
        let anchor_id = app.engine.borrow().config().selection_anchor_id.clone();
        app.engine
            .borrow_mut()
            .init(Box::new(dom::DomSurface::new(canvas.clone(), &anchor_id)));
        events::wire_page_handlers(app, &canvas);

        let bg = app.engine.borrow_mut().begin_background_load();
        if let Some(request) = bg {
            loader::spawn_background(app.clone(), request);
        }
        loader::spawn_environment(app.clone());

        let gpu_app = app.clone();
        spawn_local(async move {
            if let Err(e) = frame::create_gpu(&gpu_app).await {
                log::error!("init error: {:?}", e);
            }
        });
        frame::start_loop(app.clone());
        app.flush_events();
    }

    /// Follow `el`'s scroll offset. Re-attaching the same element is a no-op.
    #[wasm_bindgen(js_name = attachScroll)]
    pub fn attach_scroll(&self, el: web::Element) {
        let app = &self.inner;
        let same = app
            .scroll_el
            .borrow()
            .as_ref()
            .map_or(false, |prev| AsRef::<JsValue>::as_ref(prev) == AsRef::<JsValue>::as_ref(&el));
        if same {
            return;
        }
        app.engine
            .borrow_mut()
            .attach_scroll(Box::new(dom::DomScroll::new(el.clone())));
        events::wire_scroll(app, &el);
        *app.scroll_el.borrow_mut() = Some(el);
        app.engine.borrow_mut().on_scroll();
        app.flush_events();
    }

    /// Replace the product list and start fetching its models.
    #[wasm_bindgen(js_name = loadProducts)]
    pub fn load_products(&self, items: JsValue) -> Result<(), JsValue> {
        let items: Vec<ProductItem> = match json_string(&items)? {
            Some(json) => serde_json::from_str(&json).map_err(to_js_err)?,
            None => Vec::new(),
        };
        let app = &self.inner;
        app.meter.borrow_mut().reset();
        let requests = app.engine.borrow_mut().load_products(&items);
        for request in requests {
            loader::spawn_model(app.clone(), request);
        }
        app.flush_events();
        Ok(())
    }

    #[wasm_bindgen(js_name = relayoutEntries)]
    pub fn relayout_entries(&self) {
        self.inner.engine.borrow_mut().relayout_entries();
    }

    #[wasm_bindgen(js_name = selectById)]
    pub fn select_by_id(&self, id: Option<String>) {
        self.inner.engine.borrow_mut().select_by_id(id.as_deref());
        self.inner.flush_events();
    }

    #[wasm_bindgen(js_name = focusSelectedToAnchor)]
    pub fn focus_selected_to_anchor(&self) {
        self.inner.engine.borrow_mut().focus_selected_to_anchor();
    }

    #[wasm_bindgen(js_name = releaseSelectedToScroll)]
    pub fn release_selected_to_scroll(&self) {
        self.inner.engine.borrow_mut().release_selected_to_scroll();
    }

    #[wasm_bindgen(js_name = focusSectionToFixed)]
    pub fn focus_section_to_fixed(&self, name: &str) {
        self.inner.engine.borrow_mut().focus_section_to_fixed(name);
    }

    #[wasm_bindgen(js_name = releaseSectionToScroll)]
    pub fn release_section_to_scroll(&self) {
        self.inner.engine.borrow_mut().release_section_to_scroll();
    }

    #[wasm_bindgen(js_name = setLockGridY)]
    pub fn set_lock_grid_y(&self, lock: bool) {
        self.inner.engine.borrow_mut().set_lock_grid_y(lock);
    }

    /// `{ rects, contentHeightPx, topOffsetPx, version }`
    #[wasm_bindgen(js_name = getOverlayData)]
    pub fn get_overlay_data(&self) -> JsValue {
        to_js(&self.inner.engine.borrow().overlay_data())
    }

    /// Cheap poll: only changes when the overlay does.
    #[wasm_bindgen(js_name = overlayVersion)]
    pub fn overlay_version(&self) -> f64 {
        self.inner.engine.borrow().overlay_version() as f64
    }

    #[wasm_bindgen(js_name = onSelectionDragStart)]
    pub fn on_selection_drag_start(&self, x: f32) {
        let now = self.inner.now();
        self.inner.engine.borrow_mut().on_selection_drag_start(x, now);
    }

    #[wasm_bindgen(js_name = onSelectionDragMove)]
    pub fn on_selection_drag_move(&self, x: f32) {
        let now = self.inner.now();
        self.inner.engine.borrow_mut().on_selection_drag_move(x, now);
    }

    #[wasm_bindgen(js_name = onSelectionDragEnd)]
    pub fn on_selection_drag_end(&self) {
        let now = self.inner.now();
        self.inner.engine.borrow_mut().on_selection_drag_end(now);
    }

    #[wasm_bindgen(js_name = playTalkOnce)]
    pub fn play_talk_once(&self) {
        self.inner.engine.borrow_mut().play_talk_once();
    }

    /// Loading overlay fill in `[0, 1]`.
    #[wasm_bindgen(js_name = loadingFraction)]
    pub fn loading_fraction(&self) -> f32 {
        self.inner.meter.borrow().fraction()
    }

    /// Subscribe to `progress`, `context_lost`, `context_restored`,
    /// `character_click` or `scrolled`. Returns an id for [`Self::off`].
    pub fn on(&self, name: &str, callback: js_sys::Function) -> u32 {
        self.inner.add_listener(name, callback)
    }

    pub fn off(&self, id: u32) -> bool {
        self.inner.remove_listener(id)
    }
}

