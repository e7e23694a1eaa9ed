//! Rendering a map to an image handle or a file.

use crate::engine::{self, RenderOptions};
use crate::handle::{ImageHandle, MapHandle};
use crate::map::with_map;
use crate::util::{cstr_to_option_str, cstr_to_path};
use std::os::raw::{c_char, c_int};

/// Render the map and encode it to a file.
///
/// # Parameters
///
/// - `m`: map
/// - `filepath`: output path
/// - `scale`: scale denominator for layer and rule selection, 0 to compute
///   it from the current extent
/// - `scale_factor`: multiplier for line widths and marker sizes, must be > 0
/// - `format`: output format as for `mapnik_image_to_blob()`; NULL or empty
///   guesses from the file extension
///
/// # Returns
///
/// 0 on success, -1 on failure with the reason in `mapnik_map_last_error(m)`.
///
/// # Safety
///
/// - `m` must be NULL or a live map handle
/// - `filepath` and `format` must be valid null-terminated UTF-8 strings or NULL
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_render_to_file(
    m: *mut MapHandle,
    filepath: *const c_char,
    scale: f64,
    scale_factor: f64,
    format: *const c_char,
) -> c_int {
    unsafe {
        with_map(m, -1, |h| {
            let path = cstr_to_path(filepath, "filepath")?;
            let format = cstr_to_option_str(format, "format")?.unwrap_or_default();
            let options = RenderOptions::new(scale, scale_factor);
            engine::render_to_file(h.map(), &options, &path, format)?;
            Ok(0)
        })
    }
}

/// Render the map into a new image.
///
/// # Parameters
///
/// - `m`: map
/// - `scale`: scale denominator for layer and rule selection, 0 to compute
///   it from the current extent
/// - `scale_factor`: multiplier for line widths and marker sizes, must be > 0
///
/// # Returns
///
/// Image handle on success, NULL on failure with the reason in
/// `mapnik_map_last_error(m)`.
///
/// # Ownership
///
/// Caller owns the returned image. Must call `mapnik_image_free()` to free.
///
/// # Safety
///
/// `m` must be NULL or a live map handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_map_render_to_image(
    m: *mut MapHandle,
    scale: f64,
    scale_factor: f64,
) -> *mut ImageHandle {
    unsafe {
        with_map(m, std::ptr::null_mut(), |h| {
            let options = RenderOptions::new(scale, scale_factor);
            let image = engine::render(h.map(), &options)?;
            Ok(Box::into_raw(ImageHandle::new(image)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MapnikErrorCode;
    use crate::map::{
        load_fixture, mapnik_map, mapnik_map_free, mapnik_map_last_error,
        mapnik_map_last_error_code, mapnik_map_layer_set_active, mapnik_map_set_background,
        mapnik_map_zoom_all,
    };
    use crate::raster::{
        mapnik_image_blob_free, mapnik_image_free, mapnik_image_height, mapnik_image_to_blob,
        mapnik_image_to_raw, mapnik_image_raw_free, mapnik_image_width,
    };
    use std::ffi::{CStr, CString};
    use std::path::Path;

    fn loaded_map() -> *mut MapHandle {
        let m = mapnik_map(256, 256);
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/map.xml");
        assert_eq!(load_fixture(m, &path), 0);
        unsafe { assert_eq!(mapnik_map_zoom_all(m), 0) };
        m
    }

    unsafe fn raw_pixels(i: *mut ImageHandle) -> Vec<u8> {
        let mut size: libc::size_t = 0;
        unsafe {
            let raw = mapnik_image_to_raw(i, &mut size);
            let pixels = std::slice::from_raw_parts(raw, size).to_vec();
            mapnik_image_raw_free(raw, size);
            pixels
        }
    }

    unsafe fn blob_bytes(i: *mut ImageHandle, format: &str) -> Vec<u8> {
        let format = CString::new(format).unwrap();
        unsafe {
            let blob = mapnik_image_to_blob(i, format.as_ptr());
            assert!(!blob.is_null());
            let b = &*blob;
            let bytes = std::slice::from_raw_parts(b.ptr.cast::<u8>(), b.len as usize).to_vec();
            mapnik_image_blob_free(blob);
            bytes
        }
    }

    #[test]
    fn test_background_appears_in_pixels() {
        let m = mapnik_map(32, 32);
        unsafe {
            mapnik_map_set_background(m, 0, 0, 255, 255);
            let i = mapnik_map_render_to_image(m, 0.0, 1.0);
            assert!(!i.is_null());
            assert_eq!((mapnik_image_width(i), mapnik_image_height(i)), (32, 32));
            let pixels = raw_pixels(i);
            assert!(pixels.chunks(4).all(|px| px == [0, 0, 255, 255]));
            mapnik_image_free(i);
            mapnik_map_free(m);
        }
    }

    #[test]
    fn test_render_fixture_draws_features() {
        let m = loaded_map();
        unsafe {
            let i = mapnik_map_render_to_image(m, 0.0, 1.0);
            assert!(!i.is_null(), "{:?}", CStr::from_ptr(mapnik_map_last_error(m)));
            let pixels = raw_pixels(i);
            let background = [240u8, 240, 230, 255];
            assert!(pixels.chunks(4).any(|px| px != background));
            mapnik_image_free(i);
            mapnik_map_free(m);
        }
    }

    #[test]
    fn test_layer_toggle_changes_output() {
        let m = loaded_map();
        unsafe {
            let before = mapnik_map_render_to_image(m, 0.0, 1.0);
            for idx in 0..3 {
                mapnik_map_layer_set_active(m, idx, 0);
            }
            let after = mapnik_map_render_to_image(m, 0.0, 1.0);
            let blank = raw_pixels(after);
            assert_ne!(raw_pixels(before), blank);
            assert!(blank.chunks(4).all(|px| px == [240, 240, 230, 255]));
            mapnik_image_free(before);
            mapnik_image_free(after);
            mapnik_map_free(m);
        }
    }

    #[test]
    fn test_render_to_file_matches_blob() {
        let m = loaded_map();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("map.png");
        let path = CString::new(out.to_str().unwrap()).unwrap();
        let png = CString::new("png").unwrap();
        unsafe {
            assert_eq!(mapnik_map_render_to_file(m, path.as_ptr(), 0.0, 1.0, png.as_ptr()), 0);
            let i = mapnik_map_render_to_image(m, 0.0, 1.0);
            assert_eq!(std::fs::read(&out).unwrap(), blob_bytes(i, "png"));

            assert_eq!(
                mapnik_map_render_to_file(m, path.as_ptr(), 0.0, 1.0, std::ptr::null()),
                0
            );
            assert_eq!(std::fs::read(&out).unwrap(), blob_bytes(i, "png"));
            mapnik_image_free(i);
            mapnik_map_free(m);
        }
    }

    #[test]
    fn test_render_errors_go_to_map() {
        let m = mapnik_map(32, 32);
        let dir = tempfile::tempdir().unwrap();
        let path = CString::new(dir.path().join("out.xyz").to_str().unwrap()).unwrap();
        unsafe {
            assert!(mapnik_map_render_to_image(m, 0.0, 0.0).is_null());
            assert_eq!(mapnik_map_last_error_code(m), MapnikErrorCode::InvalidScaleFactor);

            assert_eq!(
                mapnik_map_render_to_file(m, path.as_ptr(), 0.0, 1.0, std::ptr::null()),
                -1
            );
            assert_eq!(mapnik_map_last_error_code(m), MapnikErrorCode::UnknownImageFormat);
            assert!(mapnik_map_render_to_image(std::ptr::null_mut(), 0.0, 1.0).is_null());
            mapnik_map_free(m);
        }
    }
}
