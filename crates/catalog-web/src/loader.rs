//! Asset fetches. Each load runs as its own task and reports back to the
//! engine; generation checks there drop superseded results.

use crate::app::App;
use crate::dom::js_err;
use catalog_core::background::BackgroundRequest;
use catalog_core::model::TextureData;
use catalog_core::{CatalogError, ModelData, ModelRequest};
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys as web;

pub async fn fetch_bytes(url: &str) -> anyhow::Result<Vec<u8>> {
    let window = web::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
    let resp = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(js_err)?;
    let resp: web::Response = resp.dyn_into().map_err(js_err)?;
    if !resp.ok() {
        anyhow::bail!("HTTP {} {}", resp.status(), resp.status_text());
    }
    let buf = JsFuture::from(resp.array_buffer().map_err(js_err)?)
        .await
        .map_err(js_err)?;
    Ok(js_sys::Uint8Array::new(&buf).to_vec())
}

async fn fetch_model(url: &str) -> catalog_core::Result<ModelData> {
    let bytes = fetch_bytes(url).await.map_err(|e| CatalogError::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    ModelData::from_glb(&bytes)
}

pub fn spawn_model(app: Rc<App>, request: ModelRequest) {
    spawn_local(async move {
        let result = fetch_model(&request.url).await;
        app.engine.borrow_mut().complete_model_load(&request, result);
        app.flush_events();
    });
}

pub fn spawn_background(app: Rc<App>, request: BackgroundRequest) {
    log::info!("[loader] background {}", request.url);
    spawn_local(async move {
        let result = fetch_model(&request.url).await;
        app.engine
            .borrow_mut()
            .complete_background_load(&request, result);
        app.flush_events();
    });
}

/// Fetch and decode the reflection map. Failure leaves the neutral map.
pub fn spawn_environment(app: Rc<App>) {
    let Some(url) = app
        .engine
        .borrow()
        .config()
        .environment_url
        .clone()
        .filter(|u| !u.is_empty())
    else {
        return;
    };
    app.engine.borrow_mut().track_asset_start(&url);
    app.flush_events();
    spawn_local(async move {
        let decoded = match fetch_bytes(&url).await {
            Ok(bytes) => TextureData::from_encoded(&bytes).map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };
        let ok = match decoded {
            Ok(tex) => {
                log::info!("[loader] environment {}x{}", tex.width, tex.height);
                app.set_environment(Rc::new(tex));
                true
            }
            Err(e) => {
                log::warn!("[loader] environment map {} unavailable: {}", url, e);
                false
            }
        };
        app.engine.borrow_mut().track_asset_end(&url, ok);
        app.flush_events();
    });
}
