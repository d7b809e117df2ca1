use crate::app::App;
use crate::dom::{add_listener, sync_canvas_backing_size, window_document};
use crate::input::{pointer_sample, touch_samples};
use catalog_core::input::PointerPhase;
use std::rc::Rc;
use web_sys as web;

pub fn wire_page_handlers(app: &Rc<App>, canvas: &web::HtmlCanvasElement) {
    let Some(window) = web::window() else {
        return;
    };

    {
        let app = app.clone();
        let canvas = canvas.clone();
        add_listener(&window, "resize", true, move |_: web::Event| {
            sync_canvas_backing_size(&canvas);
            app.engine.borrow_mut().on_resize();
        });
    }
    if let Some(document) = window_document() {
        let app = app.clone();
        add_listener(&document, "visibilitychange", true, move |_: web::Event| {
            // hidden pages report an unstable viewport and skip layout
            app.engine.borrow_mut().refresh_viewport();
        });
    }

    {
        let app = app.clone();
        let canvas_c = canvas.clone();
        add_listener(canvas, "click", true, move |ev: web::MouseEvent| {
            let p = crate::input::canvas_css_point(ev.client_x() as f64, ev.client_y() as f64, &canvas_c);
            let hit = app.engine.borrow_mut().on_click(p.x, p.y);
            if hit {
                log::info!("[input] character clicked");
            }
            app.flush_events();
        });
    }

    wire_pointer(app, canvas, canvas, "pointerdown", PointerPhase::Down);
    wire_pointer(app, canvas, &window, "pointermove", PointerPhase::Move);
    wire_pointer(app, canvas, &window, "pointerup", PointerPhase::Up);
    wire_pointer(app, canvas, &window, "pointercancel", PointerPhase::Cancel);

    wire_touch(app, canvas, canvas, "touchstart", PointerPhase::Down);
    wire_touch(app, canvas, &window, "touchmove", PointerPhase::Move);
    wire_touch(app, canvas, &window, "touchend", PointerPhase::Up);
    wire_touch(app, canvas, &window, "touchcancel", PointerPhase::Cancel);
}

fn wire_pointer(
    app: &Rc<App>,
    canvas: &web::HtmlCanvasElement,
    target: &web::EventTarget,
    kind: &str,
    phase: PointerPhase,
) {
    let app = app.clone();
    let canvas = canvas.clone();
    add_listener(target, kind, true, move |ev: web::PointerEvent| {
        if let Some(sample) = pointer_sample(&ev, &canvas, phase) {
            let now = app.now();
            app.engine.borrow_mut().handle_pointer(sample, now);
        }
    });
}

fn wire_touch(
    app: &Rc<App>,
    canvas: &web::HtmlCanvasElement,
    target: &web::EventTarget,
    kind: &str,
    phase: PointerPhase,
) {
    let app = app.clone();
    let canvas = canvas.clone();
    add_listener(target, kind, true, move |ev: web::TouchEvent| {
        let now = app.now();
        let mut engine = app.engine.borrow_mut();
        for sample in touch_samples(&ev, &canvas, phase) {
            engine.handle_pointer(sample, now);
        }
    });
}

/// Scroll notifications from the page's scrolling container.
pub fn wire_scroll(app: &Rc<App>, el: &web::Element) {
    let app = app.clone();
    add_listener(el, "scroll", true, move |_: web::Event| {
        app.engine.borrow_mut().on_scroll();
        app.flush_events();
    });
}
