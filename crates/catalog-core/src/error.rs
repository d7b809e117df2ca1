use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("model decode failed: {0}")]
    ModelDecode(#[from] gltf::Error),
    #[error("model has no scene")]
    EmptyScene,
    #[error("unsupported texture format {0:?}")]
    UnsupportedTexture(gltf::image::Format),
    #[error("image decode failed: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("asset fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },
}

pub type Result<T> = std::result::Result<T, CatalogError>;
