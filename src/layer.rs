//! Layer handles.

use crate::engine::Layer;
use crate::handle::{DatasourceHandle, LayerHandle};
use crate::util::{cstr_to_option_str, cstr_to_str, guard, guard_void};
use std::os::raw::c_char;

/// Create an active layer with no styles and no datasource.
///
/// # Parameters
///
/// - `name`: layer name
/// - `srs`: projection of the layer's data; NULL or empty selects
///   `+proj=longlat +ellps=WGS84 +datum=WGS84 +no_defs`
///
/// # Returns
///
/// Handle on success, NULL when `name` is NULL or not UTF-8.
///
/// # Ownership
///
/// Caller owns the returned handle. Must call `mapnik_layer_free()` to free.
///
/// # Safety
///
/// `name` and `srs` must be valid null-terminated strings or NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_layer(name: *const c_char, srs: *const c_char) -> *mut LayerHandle {
    let result = guard(|| {
        let name = unsafe { cstr_to_str(name, "name") }?;
        let srs = unsafe { cstr_to_option_str(srs, "srs") }?.unwrap_or_default();
        Ok(Layer::new(name, srs))
    });
    match result {
        Ok(inner) => Box::into_raw(Box::new(LayerHandle { inner })),
        Err(e) => {
            log::warn!("mapnik_layer: {}", e.message.to_string_lossy());
            std::ptr::null_mut()
        }
    }
}

/// Free a layer handle. NULL is a no-op.
///
/// # Safety
///
/// `l` must be NULL or a live layer handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_layer_free(l: *mut LayerHandle) {
    if l.is_null() {
        return;
    }
    guard_void(|| unsafe { drop(Box::from_raw(l)) });
}

/// Append a style name to the layer.
///
/// # Safety
///
/// `l` must be NULL or a live layer handle; `stylename` a valid string or NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_layer_add_style(l: *mut LayerHandle, stylename: *const c_char) {
    let Some(layer) = (unsafe { LayerHandle::from_ptr_mut(l) }) else {
        return;
    };
    let result = guard(|| {
        let name = unsafe { cstr_to_str(stylename, "stylename") }?;
        layer.inner.add_style(name);
        Ok(())
    });
    if let Err(e) = result {
        log::warn!("mapnik_layer_add_style: {}", e.message.to_string_lossy());
    }
}

/// Attach a datasource, replacing the previous one. NULL `ds` detaches.
///
/// The layer shares the datasource, so `ds` may be freed afterwards.
///
/// # Safety
///
/// `l` and `ds` must each be NULL or a live handle of their type.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_layer_set_datasource(l: *mut LayerHandle, ds: *const DatasourceHandle) {
    let Some(layer) = (unsafe { LayerHandle::from_ptr_mut(l) }) else {
        return;
    };
    let ds = unsafe { DatasourceHandle::from_ptr(ds) }.map(|h| h.inner.clone());
    layer.inner.set_datasource(ds);
}
