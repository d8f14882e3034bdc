use anyhow::{Context, Result, bail};
use base64::Engine;
use std::fs;
use std::path::Path;

/// MIME type for an image path, from its extension.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => return None,
    };
    Some(mime)
}

pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{payload}")
}

/// Read an image file into a `data:` URI suitable for an image part.
pub fn read_data_uri(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let Some(mime) = mime_for_path(path) else {
        bail!("Unsupported image type: {}", path.display());
    };
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "encoded image attachment");
    Ok(encode_data_uri(mime, &bytes))
}
