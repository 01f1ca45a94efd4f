//! Background image loading.
//!
//! Decoding happens on worker threads. Finished images are handed to the
//! render thread through an [`ImageLoadQueue`], which the renderer drains once
//! per frame to create the GPU textures and run the completion callbacks.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use image::{DynamicImage, GenericImageView};
use parking_lot::Mutex;
use thiserror::Error;

use crate::backend::traits::*;
use crate::backend::types::*;

#[derive(Error, Debug)]
pub enum ImageLoadError {
    #[error("Failed to decode image {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },
}

/// Decoded RGBA8 pixels
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
}

impl ImageData {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ImageLoadError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        match image::open(path) {
            Ok(image) => Ok(Self::from_image(image, name)),
            Err(source) => Err(ImageLoadError::Decode { name, source }),
        }
    }

    pub fn from_bytes(bytes: &[u8], name: &str) -> Result<Self, ImageLoadError> {
        match image::load_from_memory(bytes) {
            Ok(image) => Ok(Self::from_image(image, name.to_string())),
            Err(source) => Err(ImageLoadError::Decode {
                name: name.to_string(),
                source,
            }),
        }
    }

    fn from_image(image: DynamicImage, name: String) -> Self {
        let (width, height) = image.dimensions();
        Self {
            name,
            width,
            height,
            format: TextureFormat::Rgba8UnormSrgb,
            data: image.to_rgba8().into_raw(),
        }
    }

    /// Single pixel image
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self {
            name: name.to_string(),
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8UnormSrgb,
            data: color.to_vec(),
        }
    }

    /// Number of mip levels down to 1x1
    pub fn mip_levels(&self) -> u32 {
        32 - self.width.max(self.height).max(1).leading_zeros()
    }

    /// Sampled, mipmapped texture description of this image
    pub fn texture_descriptor(&self) -> TextureDescriptor {
        TextureDescriptor {
            label: Some(self.name.clone()),
            width: self.width,
            height: self.height,
            format: self.format,
            mip_levels: self.mip_levels(),
            ..Default::default()
        }
        .with_usage(TextureUsage::GENERATE_MIPS)
    }

    /// Create the texture, upload the pixels and build the mip chain
    pub fn upload(&self, backend: &mut dyn Backend) -> BackendResult<TextureHandle> {
        let handle = backend.create_texture(&self.texture_descriptor(), SamplerDescriptor::Mipmapped)?;
        backend.write_texture(handle, &self.data);
        backend.generate_mipmap(handle);
        Ok(handle)
    }
}

/// Called on the render thread once the texture exists
pub type ImageLoadedCallback = Box<dyn FnOnce(TextureHandle) + Send>;

/// A decoded image waiting for texture creation
pub struct LoadedImage {
    pub image: ImageData,
    pub callback: ImageLoadedCallback,
}

impl std::fmt::Debug for LoadedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedImage")
            .field("name", &self.image.name)
            .field("width", &self.image.width)
            .field("height", &self.image.height)
            .finish_non_exhaustive()
    }
}

/// Queue between loader threads and the render thread
#[derive(Clone, Default)]
pub struct ImageLoadQueue {
    inner: Arc<Mutex<VecDeque<LoadedImage>>>,
}

impl ImageLoadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, image: ImageData, callback: impl FnOnce(TextureHandle) + Send + 'static) {
        self.inner.lock().push_back(LoadedImage {
            image,
            callback: Box::new(callback),
        });
    }

    /// Take everything queued so far without waiting for loaders
    pub fn pop_all(&self) -> VecDeque<LoadedImage> {
        std::mem::take(&mut *self.inner.lock())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl std::fmt::Debug for ImageLoadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoadQueue")
            .field("pending", &self.len())
            .finish()
    }
}

/// Decodes images on worker threads
#[derive(Debug, Clone)]
pub struct AsyncImageLoader {
    queue: ImageLoadQueue,
}

impl AsyncImageLoader {
    pub fn new(queue: ImageLoadQueue) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &ImageLoadQueue {
        &self.queue
    }

    /// Decode `path` in the background. Images that fail to decode are
    /// logged and their callback is dropped.
    pub fn load(
        &self,
        path: impl Into<PathBuf>,
        callback: impl FnOnce(TextureHandle) + Send + 'static,
    ) -> JoinHandle<()> {
        let path = path.into();
        let queue = self.queue.clone();
        std::thread::spawn(move || match ImageData::from_file(&path) {
            Ok(image) => {
                log::debug!("Decoded {} ({}x{})", image.name, image.width, image.height);
                queue.push(image, callback);
            }
            Err(err) => log::error!("{}", err),
        })
    }

    /// Decode an in-memory image in the background
    pub fn load_bytes(
        &self,
        name: &str,
        bytes: Vec<u8>,
        callback: impl FnOnce(TextureHandle) + Send + 'static,
    ) -> JoinHandle<()> {
        let name = name.to_string();
        let queue = self.queue.clone();
        std::thread::spawn(move || match ImageData::from_bytes(&bytes, &name) {
            Ok(image) => queue.push(image, callback),
            Err(err) => log::error!("{}", err),
        })
    }
}
