//! Map handles: construction, stylesheet loading, extent and layer control.

use crate::engine::{AspectFixMode, BBox, Color, Error, Map};
use crate::error::{MapnikError, MapnikErrorCode, set_register_error};
use crate::handle::{BBoxHandle, LayerHandle, MapHandle};
use crate::util::{cstr_to_option_str, cstr_to_path, cstr_to_str, guard, guard_void};
use std::os::raw::{c_char, c_int, c_uint};
use std::path::Path;

/// Run `f` on a live map, recording any failure as the map's last error.
///
/// Returns `fallback` when `m` is NULL or `f` fails.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
pub(crate) unsafe fn with_map<T>(
    m: *mut MapHandle,
    fallback: T,
    f: impl FnOnce(&mut MapHandle) -> Result<T, MapnikError>,
) -> T {
    let Some(handle) = (unsafe { MapHandle::from_ptr_mut(m) }) else {
        return fallback;
    };
    match guard(|| f(&mut *handle)) {
        Ok(value) => value,
        Err(e) => {
            handle.set_error(e);
            fallback
        }
    }
}

/// Create a map of `width` x `height` pixels.
///
/// The map starts with the default geographic SRS, no background, no
/// layers and aspect fix mode `GROW_BBOX`.
///
/// # Returns
///
/// Handle on success. NULL when a side is outside 16..=16384, with the
/// reason in `mapnik_register_last_error()`.
///
/// # Ownership
///
/// Caller owns the returned handle. Must call `mapnik_map_free()` to free.
#[unsafe(no_mangle)]
pub extern "C" fn mapnik_map(width: c_uint, height: c_uint) -> *mut MapHandle {
    match guard(|| Ok(Map::new(width, height)?)) {
        Ok(map) => Box::into_raw(MapHandle::new(map)),
        Err(e) => {
            set_register_error(e);
            std::ptr::null_mut()
        }
    }
}

/// Free a map. NULL is a no-op.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_free(m: *mut MapHandle) {
    if m.is_null() {
        return;
    }
    guard_void(|| unsafe { drop(Box::from_raw(m)) });
}

/// Last error recorded on this map.
///
/// # Returns
///
/// The message, or NULL when `m` is NULL or no error has happened.
/// Owned by the map; valid until the next failing call on it.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_last_error(m: *const MapHandle) -> *const c_char {
    unsafe { MapHandle::from_ptr(m) }.map_or(std::ptr::null(), |h| h.last_error.as_ptr())
}

/// Code of the last error on this map, 0 when none.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_last_error_code(m: *const MapHandle) -> MapnikErrorCode {
    unsafe { MapHandle::from_ptr(m) }
        .map_or(MapnikErrorCode::InvalidHandle, |h| h.last_error.code())
}

/// Load an XML stylesheet from a file.
///
/// Relative datasource paths resolve against the stylesheet's directory.
/// A failed load leaves the map unchanged.
///
/// # Returns
///
/// 0 on success, -1 on failure with the reason in `mapnik_map_last_error(m)`.
///
/// # Safety
///
/// - `m` must be NULL or a live map handle
/// - `stylesheet` must be a valid null-terminated UTF-8 string or NULL
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_load(m: *mut MapHandle, stylesheet: *const c_char) -> c_int {
    unsafe {
        with_map(m, -1, |h| {
            let path = cstr_to_path(stylesheet, "stylesheet")?;
            h.update(|map| map.load(&path))?;
            Ok(0)
        })
    }
}

/// Load an XML stylesheet from memory.
///
/// # Parameters
///
/// - `m`: map
/// - `s`: stylesheet XML
/// - `base_path`: directory that relative datasource paths resolve
///   against; NULL or empty for none
///
/// # Returns
///
/// 0 on success, -1 on failure with the reason in `mapnik_map_last_error(m)`.
///
/// # Safety
///
/// - `m` must be NULL or a live map handle
/// - `s` and `base_path` must be valid null-terminated UTF-8 strings or NULL
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_load_string(
    m: *mut MapHandle,
    s: *const c_char,
    base_path: *const c_char,
) -> c_int {
    unsafe {
        with_map(m, -1, |h| {
            let xml = cstr_to_str(s, "stylesheet")?;
            let base = cstr_to_option_str(base_path, "base_path")?.unwrap_or_default();
            h.update(|map| map.load_string(xml, base))?;
            Ok(0)
        })
    }
}

/// The map's SRS.
///
/// # Returns
///
/// Owned by the map; valid until the SRS changes or the map is freed.
/// NULL when `m` is NULL.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_get_srs(m: *const MapHandle) -> *const c_char {
    unsafe { MapHandle::from_ptr(m) }.map_or(std::ptr::null(), MapHandle::srs_ptr)
}

/// Set the map's SRS. An empty string is rejected.
///
/// # Returns
///
/// 0 on success, -1 on failure.
///
/// # Safety
///
/// - `m` must be NULL or a live map handle
/// - `srs` must be a valid null-terminated UTF-8 string or NULL
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_set_srs(m: *mut MapHandle, srs: *const c_char) -> c_int {
    unsafe {
        with_map(m, -1, |h| {
            let srs = cstr_to_str(srs, "srs")?;
            h.update(|map| map.set_srs(srs))?;
            Ok(0)
        })
    }
}

/// Set how the extent and canvas are reconciled when their aspect ratios differ.
///
/// # Parameters
///
/// - `afm`: 0 `GROW_BBOX`, 1 `GROW_CANVAS`, 2 `SHRINK_BBOX`, 3 `SHRINK_CANVAS`,
///   4 `ADJUST_BBOX_WIDTH`, 5 `ADJUST_BBOX_HEIGHT`, 6 `ADJUST_CANVAS_WIDTH`,
///   7 `ADJUST_CANVAS_HEIGHT`, 8 `RESPECT`
///
/// # Returns
///
/// 0 on success, -1 for an unknown mode. The error is recorded on the map
/// and as the process-wide error.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_set_aspect_fix_mode(m: *mut MapHandle, afm: c_int) -> c_int {
    unsafe {
        with_map(m, -1, |h| match AspectFixMode::try_from(afm) {
            Ok(mode) => {
                h.map_mut().set_aspect_fix_mode(mode);
                Ok(0)
            }
            Err(e) => {
                let err = MapnikError::from(e);
                set_register_error(err.clone());
                Err(err)
            }
        })
    }
}

/// Current aspect fix mode, -1 when `m` is NULL.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_get_aspect_fix_mode(m: *const MapHandle) -> c_int {
    unsafe { MapHandle::from_ptr(m) }.map_or(-1, |h| h.map().aspect_fix_mode() as c_int)
}

/// Resize the canvas and re-apply the aspect fix to the current extent.
///
/// Sizes outside 16..=16384 are rejected: the map keeps its size and the
/// reason goes to `mapnik_map_last_error(m)`.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_resize(m: *mut MapHandle, width: c_uint, height: c_uint) {
    unsafe { with_map(m, (), |h| Ok(h.map_mut().resize(width, height)?)) }
}

/// Canvas width. Canvas-adjusting aspect modes may change it.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_get_width(m: *const MapHandle) -> c_uint {
    unsafe { MapHandle::from_ptr(m) }.map_or(0, |h| h.map().width())
}

/// Canvas height. Canvas-adjusting aspect modes may change it.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_get_height(m: *const MapHandle) -> c_uint {
    unsafe { MapHandle::from_ptr(m) }.map_or(0, |h| h.map().height())
}

/// Scale denominator of the current extent, assuming 0.28 mm pixels.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_get_scale_denominator(m: *const MapHandle) -> f64 {
    unsafe { MapHandle::from_ptr(m) }.map_or(0.0, |h| h.map().scale_denominator())
}

/// Set the number of pixels features are queried beyond the canvas edge.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_set_buffer_size(m: *mut MapHandle, buffer_size: c_int) {
    if let Some(h) = unsafe { MapHandle::from_ptr_mut(m) } {
        h.map_mut().set_buffer_size(buffer_size);
    }
}

/// Buffer size in pixels, 0 when `m` is NULL.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_get_buffer_size(m: *const MapHandle) -> c_int {
    unsafe { MapHandle::from_ptr(m) }.map_or(0, |h| h.map().buffer_size())
}

/// Read the background color.
///
/// # Parameters
///
/// - `m`: map
/// - `r`, `g`, `b`, `a`: receive the channels; NULL pointers are skipped
///
/// # Returns
///
/// 1 when a background is set and was written, 0 when the map has no
/// background (outputs untouched) or `m` is NULL.
///
/// # Safety
///
/// `m` must be NULL or a live map handle; each output must be NULL or
/// writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_background(
    m: *const MapHandle,
    r: *mut u8,
    g: *mut u8,
    b: *mut u8,
    a: *mut u8,
) -> c_int {
    let Some(color) = unsafe { MapHandle::from_ptr(m) }.and_then(|h| h.map().background()) else {
        return 0;
    };
    for (out, value) in [(r, color.r), (g, color.g), (b, color.b), (a, color.a)] {
        if let Some(out) = unsafe { out.as_mut() } {
            *out = value;
        }
    }
    1
}

/// Set the background color (straight alpha).
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_set_background(m: *mut MapHandle, r: u8, g: u8, b: u8, a: u8) {
    if let Some(h) = unsafe { MapHandle::from_ptr_mut(m) } {
        h.map_mut().set_background(Color::rgba(r, g, b, a));
    }
}

/// Zoom to the union of all active layers' extents, clipped to the maximum extent.
///
/// # Returns
///
/// 0 on success, -1 when no layer extent is usable.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_zoom_all(m: *mut MapHandle) -> c_int {
    unsafe {
        with_map(m, -1, |h| {
            h.map_mut().zoom_all()?;
            Ok(0)
        })
    }
}

/// Set the current extent, then apply the aspect fix.
///
/// # Safety
///
/// `m` must be NULL or a live map handle; `b` NULL or a live bbox handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_zoom_to_box(m: *mut MapHandle, b: *const BBoxHandle) {
    unsafe {
        with_map(m, (), |h| {
            let bbox = BBoxHandle::from_ptr(b).ok_or_else(|| MapnikError::null_pointer("bbox"))?;
            h.map_mut().zoom_to_box(bbox.inner);
            Ok(())
        })
    }
}

/// Limit `zoom_all` to this extent.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_set_maximum_extent(
    m: *mut MapHandle,
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
) {
    unsafe {
        with_map(m, (), |h| {
            if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
                return Err(Error::InvalidBBox(format!("{x0},{y0},{x1},{y1}")).into());
            }
            h.map_mut().set_maximum_extent(BBox::new(x0, y0, x1, y1));
            Ok(())
        })
    }
}

/// Remove the maximum extent.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_reset_maximum_extent(m: *mut MapHandle) {
    if let Some(h) = unsafe { MapHandle::from_ptr_mut(m) } {
        h.map_mut().reset_maximum_extent();
    }
}

/// Read the current extent into `out` as `[minx, miny, maxx, maxy]`.
///
/// # Returns
///
/// 1 when the map has a valid extent and `out` was written, 0 otherwise.
///
/// # Safety
///
/// `m` must be NULL or a live map handle; `out` NULL or writable for four doubles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_get_current_extent(m: *const MapHandle, out: *mut f64) -> c_int {
    let Some(h) = (unsafe { MapHandle::from_ptr(m) }) else {
        return 0;
    };
    let ext = h.map().current_extent();
    if out.is_null() || !ext.is_valid() {
        return 0;
    }
    let out = unsafe { std::slice::from_raw_parts_mut(out, 4) };
    out.copy_from_slice(&[ext.minx, ext.miny, ext.maxx, ext.maxy]);
    1
}

/// Append a copy of `l` to the map's layers. The layer handle stays owned by the caller.
///
/// # Safety
///
/// `m` must be NULL or a live map handle; `l` NULL or a live layer handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_add_layer(m: *mut MapHandle, l: *const LayerHandle) {
    unsafe {
        with_map(m, (), |h| {
            let layer = LayerHandle::from_ptr(l).ok_or_else(|| MapnikError::null_pointer("layer"))?;
            h.update(|map| map.add_layer(layer.inner.clone()));
            Ok(())
        })
    }
}

/// Number of layers, 0 when `m` is NULL.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_layer_count(m: *const MapHandle) -> c_int {
    unsafe { MapHandle::from_ptr(m) }
        .map_or(0, |h| c_int::try_from(h.map().layers().len()).unwrap_or(c_int::MAX))
}

/// Name of the layer at `idx`.
///
/// # Returns
///
/// Owned by the map; valid until the layer list changes or the map is
/// freed. NULL when `idx` is out of range.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_layer_name(m: *const MapHandle, idx: libc::size_t) -> *const c_char {
    unsafe { MapHandle::from_ptr(m) }.map_or(std::ptr::null(), |h| h.layer_name_ptr(idx))
}

/// 1 when the layer at `idx` is active, 0 when inactive or out of range.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_layer_is_active(m: *const MapHandle, idx: libc::size_t) -> c_int {
    unsafe { MapHandle::from_ptr(m) }
        .and_then(|h| h.map().layers().get(idx))
        .map_or(0, |l| c_int::from(l.active))
}

/// Activate (non-zero) or deactivate (0) the layer at `idx`.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_layer_set_active(m: *mut MapHandle, idx: libc::size_t, active: c_int) {
    unsafe {
        with_map(m, (), |h| {
            let count = h.map().layers().len();
            let layer = h.map_mut().layer_mut(idx).ok_or_else(|| {
                MapnikError::new(
                    MapnikErrorCode::InvalidHandle,
                    format!("layer index {idx} out of range (map has {count} layers)"),
                )
            })?;
            layer.active = active != 0;
            Ok(())
        })
    }
}

/// Load a stylesheet file into a handle. Used by the tests of the render module.
#[cfg(test)]
pub(crate) fn load_fixture(m: *mut MapHandle, path: &Path) -> c_int {
    let path = std::ffi::CString::new(path.to_string_lossy().into_owned()).unwrap();
    unsafe { mapnik_map_load(m, path.as_ptr()) }
}
