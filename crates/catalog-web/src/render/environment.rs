//! Equirectangular environment map used for reflections.

use super::helpers::{solid_texture, upload_rgba_texture};
use catalog_core::model::TextureData;

pub(crate) struct Environment {
    _tex: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) loaded: bool,
}

impl Environment {
    /// Neutral grey stand-in until (or unless) a real map arrives.
    pub(crate) fn neutral(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let (tex, view) = solid_texture(device, queue, "env_neutral", [128, 128, 128, 255]);
        Self {
            _tex: tex,
            view,
            loaded: false,
        }
    }

    pub(crate) fn from_texture(device: &wgpu::Device, queue: &wgpu::Queue, data: &TextureData) -> Self {
        let (tex, view) = upload_rgba_texture(device, queue, "env_map", data);
        log::info!("[gpu] environment map {}x{}", data.width, data.height);
        Self {
            _tex: tex,
            view,
            loaded: true,
        }
    }

    pub(crate) fn params(&self) -> [f32; 4] {
        [ENV_INTENSITY, if self.loaded { 1.0 } else { 0.0 }, 0.0, 0.0]
    }
}

const ENV_INTENSITY: f32 = 0.8;
