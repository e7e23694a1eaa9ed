//! Opaque handle types exposed to C.
//!
//! Each handle owns one engine object and is exposed to C as an opaque
//! pointer created with `Box::into_raw` and released by the matching
//! `_free` function.
//!
//! # Thread Safety
//!
//! Handles are NOT thread-safe. All operations on a handle must occur from
//! one thread at a time; distinct handles may be used from distinct threads.

use crate::engine::{BBox, Datasource, Image, Layer, Map, Parameters};
use crate::error::{LastError, MapnikError};
use crate::util::to_cstring;
use std::ffi::CString;
use std::os::raw::{c_char, c_uint};
use std::sync::Arc;

macro_rules! from_ptr {
    ($handle:ty) => {
        impl $handle {
            /// Convert a raw pointer to a shared reference.
            ///
            /// # Safety
            ///
            /// The pointer must be NULL or point to a live handle.
            pub unsafe fn from_ptr<'a>(ptr: *const $handle) -> Option<&'a Self> {
                unsafe { ptr.as_ref() }
            }

            /// Convert a raw pointer to a mutable reference.
            ///
            /// # Safety
            ///
            /// The pointer must be NULL or point to a live handle that is not
            /// aliased for the duration of the borrow.
            pub unsafe fn from_ptr_mut<'a>(ptr: *mut $handle) -> Option<&'a mut Self> {
                unsafe { ptr.as_mut() }
            }
        }
    };
}

/// `mapnik_bbox_t`: an immutable bounding box.
#[derive(Debug)]
pub struct BBoxHandle {
    pub(crate) inner: BBox,
}
from_ptr!(BBoxHandle);

/// `mapnik_image_t`: a raster plus its last error.
#[derive(Debug)]
pub struct ImageHandle {
    pub(crate) inner: Image,
    pub(crate) last_error: LastError,
}
from_ptr!(ImageHandle);

impl ImageHandle {
    pub fn new(image: Image) -> Box<Self> {
        Box::new(Self {
            inner: image,
            last_error: LastError::default(),
        })
    }
}

/// `mapnik_image_blob_t`: an encoded image owned by the caller.
///
/// # Memory Ownership
///
/// Release with `mapnik_image_blob_free()`, which also frees `ptr`.
#[repr(C)]
#[derive(Debug)]
pub struct MapnikImageBlob {
    /// Encoded bytes
    pub ptr: *mut c_char,
    /// Number of bytes at `ptr`
    pub len: c_uint,
}

/// `mapnik_parameters_t`.
#[derive(Debug, Default)]
pub struct ParametersHandle {
    pub(crate) inner: Parameters,
}
from_ptr!(ParametersHandle);

/// `mapnik_datasource_t`. Shared with every layer it is attached to.
#[derive(Debug)]
pub struct DatasourceHandle {
    pub(crate) inner: Arc<dyn Datasource>,
}
from_ptr!(DatasourceHandle);

/// `mapnik_layer_t`. Copied into a map by `mapnik_map_add_layer`.
#[derive(Debug)]
pub struct LayerHandle {
    pub(crate) inner: Layer,
}
from_ptr!(LayerHandle);

/// `mapnik_map_t`.
///
/// Besides the map itself the handle keeps the strings handed out to C:
/// the SRS and the layer names stay valid until the next call that changes
/// them.
#[derive(Debug)]
pub struct MapHandle {
    inner: Map,
    pub(crate) last_error: LastError,
    srs: CString,
    layer_names: Vec<CString>,
}
from_ptr!(MapHandle);

impl MapHandle {
    pub fn new(map: Map) -> Box<Self> {
        let mut handle = Box::new(Self {
            inner: map,
            last_error: LastError::default(),
            srs: CString::default(),
            layer_names: Vec::new(),
        });
        handle.refresh();
        handle
    }

    pub fn map(&self) -> &Map {
        &self.inner
    }

    /// Mutate the map and refresh the cached strings afterwards.
    pub fn update<T>(&mut self, f: impl FnOnce(&mut Map) -> T) -> T {
        let out = f(&mut self.inner);
        self.refresh();
        out
    }

    /// Mutate the map without touching the cached strings.
    ///
    /// For changes that cannot affect the SRS or the layer list.
    pub fn map_mut(&mut self) -> &mut Map {
        &mut self.inner
    }

    pub fn set_error(&mut self, err: MapnikError) {
        self.last_error.set(err);
    }

    pub fn srs_ptr(&self) -> *const c_char {
        self.srs.as_ptr()
    }

    pub fn layer_name_ptr(&self, idx: usize) -> *const c_char {
        self.layer_names
            .get(idx)
            .map_or(std::ptr::null(), |name| name.as_ptr())
    }

    fn refresh(&mut self) {
        if self.srs.to_bytes() != self.inner.srs().as_bytes() {
            self.srs = to_cstring(self.inner.srs());
        }
        let layers = self.inner.layers();
        let keep = self
            .layer_names
            .iter()
            .zip(layers)
            .take_while(|(c, l)| c.to_bytes() == l.name.as_bytes())
            .count();
        self.layer_names.truncate(keep);
        self.layer_names
            .extend(layers[keep..].iter().map(|l| to_cstring(&l.name)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::projection::DEFAULT_SRS;
    use std::ffi::CStr;

    #[test]
    fn test_map_handle_caches_strings() {
        let mut handle = MapHandle::new(Map::new(256, 256).unwrap());
        let srs = unsafe { CStr::from_ptr(handle.srs_ptr()) };
        assert_eq!(srs.to_str().unwrap(), DEFAULT_SRS);
        assert!(handle.layer_name_ptr(0).is_null());

        handle.update(|m| m.add_layer(Layer::new("roads", "")));
        let first = handle.layer_name_ptr(0);
        handle.update(|m| m.add_layer(Layer::new("rivers", "")));
        assert_eq!(unsafe { CStr::from_ptr(first) }.to_str().unwrap(), "roads");
        let second = unsafe { CStr::from_ptr(handle.layer_name_ptr(1)) };
        assert_eq!(second.to_str().unwrap(), "rivers");
    }
}
