//! Shared state behind every exported handle.

use crate::render::GpuState;
use catalog_core::{CatalogEngine, EngineConfig, EngineEvent, ProgressMeter};
use catalog_core::model::TextureData;
use instant::Instant;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use wasm_bindgen::JsValue;
use web_sys as web;

struct Listener {
    id: u32,
    name: String,
    callback: js_sys::Function,
}

pub struct App {
    pub engine: RefCell<CatalogEngine>,
    pub canvas: RefCell<Option<web::HtmlCanvasElement>>,
    pub scroll_el: RefCell<Option<web::Element>>,
    pub gpu: RefCell<Option<GpuState>>,
    /// Decoded environment map, kept until a GPU is available to take it.
    pub environment: RefCell<Option<Rc<TextureData>>>,
    pub meter: RefCell<ProgressMeter>,
    queue: Rc<RefCell<VecDeque<EngineEvent>>>,
    listeners: RefCell<Vec<Listener>>,
    next_listener: Cell<u32>,
    epoch: Instant,
}

impl App {
    pub fn new(config: EngineConfig) -> Rc<Self> {
        let mut engine = CatalogEngine::new(config);
        let queue: Rc<RefCell<VecDeque<EngineEvent>>> = Rc::new(RefCell::new(VecDeque::new()));
        let sink = queue.clone();
        // listeners run after the engine borrow is released
        engine.subscribe(move |ev| sink.borrow_mut().push_back(ev.clone()));
        Rc::new(Self {
            engine: RefCell::new(engine),
            canvas: RefCell::new(None),
            scroll_el: RefCell::new(None),
            gpu: RefCell::new(None),
            environment: RefCell::new(None),
            meter: RefCell::new(ProgressMeter::default()),
            queue,
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
            epoch: Instant::now(),
        })
    }

    /// Seconds since the engine was created.
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    pub fn add_listener(&self, name: &str, callback: js_sys::Function) -> u32 {
        let id = self.next_listener.get() + 1;
        self.next_listener.set(id);
        self.listeners.borrow_mut().push(Listener {
            id,
            name: name.to_string(),
            callback,
        });
        id
    }

    pub fn remove_listener(&self, id: u32) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    fn next_event(&self) -> Option<EngineEvent> {
        self.queue.borrow_mut().pop_front()
    }

    /// Forward queued engine events to page listeners.
    pub fn flush_events(&self) {
        while let Some(ev) = self.next_event() {
            if let EngineEvent::Progress(p) = &ev {
                self.meter.borrow_mut().apply(p);
            }
            let payload = event_payload(&ev);
            let targets: Vec<js_sys::Function> = self
                .listeners
                .borrow()
                .iter()
                .filter(|l| l.name == ev.name())
                .map(|l| l.callback.clone())
                .collect();
            for f in targets {
                if let Err(e) = f.call1(&JsValue::NULL, &payload) {
                    log::warn!("[events] {} listener threw: {:?}", ev.name(), e);
                }
            }
        }
    }

    pub fn set_environment(&self, data: Rc<TextureData>) {
        if let Some(gpu) = self.gpu.borrow_mut().as_mut() {
            gpu.set_environment(&data);
        }
        *self.environment.borrow_mut() = Some(data);
    }
}

/// Serialise through JSON so the page receives a plain object.
pub fn to_js<T: serde::Serialize>(value: &T) -> JsValue {
    serde_json::to_string(value)
        .ok()
        .and_then(|s| js_sys::JSON::parse(&s).ok())
        .unwrap_or(JsValue::NULL)
}

fn event_payload(ev: &EngineEvent) -> JsValue {
    match ev {
        EngineEvent::Progress(p) => to_js(p),
        EngineEvent::ScrolledPastFold(past) => JsValue::from_bool(*past),
        EngineEvent::ContextLost | EngineEvent::ContextRestored | EngineEvent::CharacterClicked => {
            JsValue::UNDEFINED
        }
    }
}
