//! requestAnimationFrame loop and GPU (re)creation.

use crate::app::App;
use crate::loader;
use crate::render::{self, GpuState};
use catalog_core::recovery::RecoveryDecision;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys as web;

type Tick = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

fn request_frame(tick: &Tick) {
    if let (Some(w), Some(cb)) = (web::window(), tick.borrow().as_ref()) {
        let _ = w.request_animation_frame(cb.as_ref().unchecked_ref());
    }
}

pub fn start_loop(app: Rc<App>) {
    let tick: Tick = Rc::new(RefCell::new(None));
    let tick_clone = tick.clone();
    *tick.borrow_mut() = Some(Closure::wrap(Box::new(move || {
        frame(&app);
        request_frame(&tick_clone);
    }) as Box<dyn FnMut()>));
    request_frame(&tick);
}

fn frame(app: &Rc<App>) {
    if render::take_device_lost() {
        on_context_lost(app);
    }
    let now = app.now();
    let advanced = app.engine.borrow_mut().frame(now);
    if advanced {
        let released = app.engine.borrow_mut().scene_mut().drain_released();
        let mut gpu = app.gpu.borrow_mut();
        if let Some(gpu) = gpu.as_mut() {
            gpu.release(&released);
            if let Some(canvas) = app.canvas.borrow().as_ref() {
                gpu.resize_if_needed(canvas.width(), canvas.height());
            }
            let engine = app.engine.borrow();
            match gpu.render(engine.scene(), engine.view_proj(), engine.camera().position) {
                Ok(()) => {}
                Err(wgpu::SurfaceError::Timeout) => log::warn!("[gpu] frame timeout"),
                Err(e) => log::error!("render error: {:?}", e),
            }
        }
    }
    app.flush_events();
}

/// Create the GPU state for the attached canvas and hand it the current
/// environment map.
pub async fn create_gpu(app: &Rc<App>) -> anyhow::Result<()> {
    let canvas = app
        .canvas
        .borrow()
        .clone()
        .ok_or_else(|| anyhow::anyhow!("engine not initialised"))?;
    let mut gpu = GpuState::new(&canvas).await?;
    if let Some(env) = app.environment.borrow().as_ref() {
        gpu.set_environment(env);
    }
    *app.gpu.borrow_mut() = Some(gpu);
    Ok(())
}

fn on_context_lost(app: &Rc<App>) {
    let decision = app.engine.borrow_mut().on_context_lost(app.now());
    // drop every GPU resource; the rebuild starts from empty caches
    app.gpu.borrow_mut().take();
    app.flush_events();
    if let RecoveryDecision::Schedule { delay_ms } = decision {
        schedule_rebuild(app, delay_ms);
    }
}

fn schedule_rebuild(app: &Rc<App>, delay_ms: i32) {
    let Some(window) = web::window() else {
        return;
    };
    let app = app.clone();
    let cb = Closure::once_into_js(move || {
        spawn_local(async move {
            if let Err(e) = create_gpu(&app).await {
                log::error!("[gpu] rebuild failed: {:?}", e);
                let retry = app.engine.borrow_mut().on_context_rebuild_failed(app.now());
                if let RecoveryDecision::Schedule { delay_ms } = retry {
                    schedule_rebuild(&app, delay_ms);
                }
                return;
            }
            let bg = app.engine.borrow_mut().on_context_restored();
            if let Some(request) = bg {
                loader::spawn_background(app.clone(), request);
            }
            loader::spawn_environment(app.clone());
            app.flush_events();
            log::info!("[gpu] context restored");
        });
    });
    if let Err(e) = window
        .set_timeout_with_callback_and_timeout_and_arguments_0(cb.unchecked_ref(), delay_ms)
    {
        log::error!("[gpu] could not schedule rebuild: {:?}", e);
    }
}
