//! C API for a compact map rendering engine.
//!
//! This crate exposes the functions and globals declared in
//! `include/mapnik_c_api.h`: opaque handles for bounding boxes, images,
//! parameters, datasources, layers and maps, plus process-wide
//! registration and logging control. The rendering engine itself lives in
//! [`engine`] and can be used directly from Rust.
//!
//! # Thread Safety
//!
//! Handles are NOT `Sync`. All operations on one handle must be serialized
//! by the caller; distinct handles may be used from distinct threads.
//! Process-wide state (datasource and font registries, the registration
//! error, the log severity) is internally synchronized.
//!
//! # Memory Management
//!
//! - Every handle returned by a constructor must be freed with its `_free` function
//! - Blobs from `mapnik_image_to_blob` are freed with `mapnik_image_blob_free`
//! - Buffers from `mapnik_image_to_raw` are freed with `mapnik_image_raw_free`
//! - Strings returned by accessors and last-error functions are owned by the
//!   library and must not be freed
//!
//! # Errors
//!
//! Constructors return NULL on failure and status functions return their
//! documented failure value. The message is available from
//! `mapnik_map_last_error` or `mapnik_image_last_error` for handle
//! operations, and from `mapnik_register_last_error` for registration,
//! datasource creation, image import and map construction. Panics never
//! cross the boundary.
//!
//! # Feature Flags
//!
//! - `jpeg` (default): JPEG output
//! - `tiff`: TIFF output
//! - `webp`: lossless WebP output
//! - `full`: All of the above
//!
//! PNG output is always available.

#![allow(clippy::missing_safety_doc)]
#![allow(non_upper_case_globals)]

pub mod engine;

mod bbox;
mod datasource;
mod error;
mod handle;
mod layer;
mod logging;
mod map;
mod parameters;
mod raster;
mod registry;
mod render;
mod util;

// Re-export all public FFI types and functions
pub use bbox::{mapnik_bbox, mapnik_bbox_free};
pub use datasource::{mapnik_datasource, mapnik_datasource_free};
pub use error::{
    MapnikError, MapnikErrorCode, mapnik_register_last_error, mapnik_register_last_error_code,
};
pub use handle::{
    BBoxHandle, DatasourceHandle, ImageHandle, LayerHandle, MapHandle, MapnikImageBlob,
    ParametersHandle,
};
pub use layer::{mapnik_layer, mapnik_layer_add_style, mapnik_layer_free, mapnik_layer_set_datasource};
pub use logging::{
    MAPNIK_DEBUG, MAPNIK_ERROR, MAPNIK_NONE, MAPNIK_WARN, mapnik_logging_get_severity,
    mapnik_logging_set_severity,
};
pub use map::{
    mapnik_map, mapnik_map_add_layer, mapnik_map_background, mapnik_map_free,
    mapnik_map_get_aspect_fix_mode, mapnik_map_get_buffer_size, mapnik_map_get_current_extent,
    mapnik_map_get_height, mapnik_map_get_scale_denominator, mapnik_map_get_srs,
    mapnik_map_get_width, mapnik_map_last_error, mapnik_map_last_error_code,
    mapnik_map_layer_count, mapnik_map_layer_is_active, mapnik_map_layer_name,
    mapnik_map_layer_set_active, mapnik_map_load, mapnik_map_load_string,
    mapnik_map_reset_maximum_extent, mapnik_map_resize, mapnik_map_set_aspect_fix_mode,
    mapnik_map_set_background, mapnik_map_set_buffer_size, mapnik_map_set_maximum_extent,
    mapnik_map_set_srs, mapnik_map_zoom_all, mapnik_map_zoom_to_box,
};
pub use parameters::{mapnik_parameters, mapnik_parameters_free, mapnik_parameters_set};
pub use raster::{
    mapnik_image_blob_free, mapnik_image_free, mapnik_image_from_raw, mapnik_image_height,
    mapnik_image_last_error, mapnik_image_last_error_code, mapnik_image_raw_free,
    mapnik_image_to_blob, mapnik_image_to_raw, mapnik_image_width,
};
pub use registry::{mapnik_register_datasources, mapnik_register_fonts};
pub use render::{mapnik_map_render_to_file, mapnik_map_render_to_image};

use std::os::raw::{c_char, c_int};

const fn parse_version(s: &str) -> c_int {
    match c_int::from_str_radix(s, 10) {
        Ok(v) => v,
        Err(_) => panic!("package version component is not a number"),
    }
}

/// A pointer to a static NUL-terminated string, exported as `const char *`.
#[repr(transparent)]
pub struct StaticCStr(*const c_char);

// Points to immutable 'static data.
unsafe impl Sync for StaticCStr {}

impl StaticCStr {
    pub fn as_ptr(&self) -> *const c_char {
        self.0
    }
}

/// Major version.
#[unsafe(no_mangle)]
pub static mapnik_version_major: c_int = parse_version(env!("CARGO_PKG_VERSION_MAJOR"));

/// Minor version.
#[unsafe(no_mangle)]
pub static mapnik_version_minor: c_int = parse_version(env!("CARGO_PKG_VERSION_MINOR"));

/// Patch version.
#[unsafe(no_mangle)]
pub static mapnik_version_patch: c_int = parse_version(env!("CARGO_PKG_VERSION_PATCH"));

/// Numeric version: `major * 100000 + minor * 100 + patch`.
#[unsafe(no_mangle)]
pub static mapnik_version: c_int = parse_version(env!("CARGO_PKG_VERSION_MAJOR")) * 100_000
    + parse_version(env!("CARGO_PKG_VERSION_MINOR")) * 100
    + parse_version(env!("CARGO_PKG_VERSION_PATCH"));

/// Version string (e.g., "0.1.0"). Do not free.
#[unsafe(no_mangle)]
pub static mapnik_version_string: StaticCStr =
    StaticCStr(concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr().cast());

/// Feature flags bitmask.
///
/// # Returns
///
/// Bitmask indicating which output codecs are compiled in:
/// - Bit 0 (0x01): PNG (always set)
/// - Bit 1 (0x02): `jpeg`
/// - Bit 2 (0x04): `tiff`
/// - Bit 3 (0x08): `webp`
///
/// # Example
///
/// ```c
/// uint32_t features = mapnik_features();
/// if (features & 0x02) { /* jpeg output available */ }
/// ```
#[unsafe(no_mangle)]
pub extern "C" fn mapnik_features() -> u32 {
    let mut flags = 1u32 << 0;

    #[cfg(feature = "jpeg")]
    {
        flags |= 1 << 1;
    }

    #[cfg(feature = "tiff")]
    {
        flags |= 1 << 2;
    }

    #[cfg(feature = "webp")]
    {
        flags |= 1 << 3;
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::{CStr, CString};

    fn fixture(name: &str) -> CString {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("testdata")
            .join(name);
        CString::new(path.to_str().unwrap()).unwrap()
    }

    #[test]
    fn test_version() {
        let version = unsafe { CStr::from_ptr(mapnik_version_string.as_ptr()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
        assert_eq!(
            mapnik_version,
            mapnik_version_major * 100_000 + mapnik_version_minor * 100 + mapnik_version_patch
        );
    }

    #[test]
    fn test_features() {
        let features = mapnik_features();
        assert_eq!(features & 0x01, 0x01);
        assert_eq!(features & 0x02 != 0, cfg!(feature = "jpeg"));
        assert_eq!(features & 0x04 != 0, cfg!(feature = "tiff"));
        assert_eq!(features & 0x08 != 0, cfg!(feature = "webp"));
    }

    #[test]
    fn test_logging_severity() {
        // Any call through the boundary installs the logger at the default severity.
        unsafe { mapnik_bbox_free(mapnik_bbox(0.0, 0.0, 1.0, 1.0)) };
        assert_eq!(mapnik_logging_get_severity(), MAPNIK_ERROR);
        assert_eq!(log::max_level(), log::LevelFilter::Error);

        let before = mapnik_logging_get_severity();
        mapnik_logging_set_severity(42);
        assert_eq!(mapnik_logging_get_severity(), before);
        mapnik_logging_set_severity(-1);
        assert_eq!(mapnik_logging_get_severity(), before);

        mapnik_logging_set_severity(MAPNIK_WARN);
        assert_eq!(mapnik_logging_get_severity(), MAPNIK_WARN);
        assert_eq!(log::max_level(), log::LevelFilter::Warn);
        mapnik_logging_set_severity(MAPNIK_NONE);
        assert_eq!(mapnik_logging_get_severity(), MAPNIK_NONE);
        assert_eq!(log::max_level(), log::LevelFilter::Off);
    }

    #[test]
    fn test_register_datasources() {
        let _lock = error::register_error_lock();
        let dir = tempfile::tempdir().unwrap();
        let path = CString::new(dir.path().to_str().unwrap()).unwrap();
        let missing = CString::new(dir.path().join("nope").to_str().unwrap()).unwrap();
        unsafe {
            assert_eq!(mapnik_register_datasources(path.as_ptr()), 0);
            assert_eq!(mapnik_register_datasources(missing.as_ptr()), -1);
            assert_eq!(mapnik_register_last_error_code(), MapnikErrorCode::Io);
            assert!(!mapnik_register_last_error().is_null());
            assert_eq!(mapnik_register_datasources(std::ptr::null()), -1);
            assert_eq!(mapnik_register_last_error_code(), MapnikErrorCode::NullPointer);
        }
    }

    #[test]
    fn test_register_fonts_failure() {
        let _lock = error::register_error_lock();
        let missing = CString::new("/nonexistent/fonts/dir").unwrap();
        unsafe {
            assert_eq!(mapnik_register_fonts(missing.as_ptr()), -1);
            let msg = CStr::from_ptr(mapnik_register_last_error()).to_str().unwrap();
            assert!(msg.contains("/nonexistent/fonts/dir"), "{msg}");
        }
    }

    #[test]
    fn test_every_handle_type_frees() {
        let name = CString::new("layer").unwrap();
        unsafe {
            mapnik_bbox_free(mapnik_bbox(0.0, 0.0, 10.0, 10.0));
            mapnik_parameters_free(mapnik_parameters());
            mapnik_layer_free(mapnik_layer(name.as_ptr(), std::ptr::null()));
            mapnik_map_free(mapnik_map(256, 256));
            let px = [0u8; 16 * 16 * 4];
            mapnik_image_free(mapnik_image_from_raw(px.as_ptr(), 16, 16));

            mapnik_bbox_free(std::ptr::null_mut());
            mapnik_parameters_free(std::ptr::null_mut());
            mapnik_datasource_free(std::ptr::null_mut());
            mapnik_layer_free(std::ptr::null_mut());
            mapnik_map_free(std::ptr::null_mut());
            mapnik_image_free(std::ptr::null_mut());
        }
    }

    #[test]
    fn test_build_map_by_hand() {
        let (k_type, v_type) = (CString::new("type").unwrap(), CString::new("geojson").unwrap());
        let (k_file, v_file) = (CString::new("file").unwrap(), fixture("countries.geojson"));
        let layer_name = CString::new("countries").unwrap();
        let style_name = CString::new("land").unwrap();
        let style = CString::new(
            r#"<Map srs="+proj=longlat +ellps=WGS84 +datum=WGS84 +no_defs">
                 <Style name="land"><Rule><PolygonSymbolizer fill="black"/></Rule></Style>
               </Map>"#,
        )
        .unwrap();
        unsafe {
            let m = mapnik_map(100, 100);
            assert_eq!(mapnik_map_load_string(m, style.as_ptr(), std::ptr::null()), 0);

            let p = mapnik_parameters();
            mapnik_parameters_set(p, k_type.as_ptr(), v_type.as_ptr());
            mapnik_parameters_set(p, k_file.as_ptr(), v_file.as_ptr());
            let ds = mapnik_datasource(p);
            mapnik_parameters_free(p);
            assert!(!ds.is_null());

            let l = mapnik_layer(layer_name.as_ptr(), std::ptr::null());
            mapnik_layer_add_style(l, style_name.as_ptr());
            mapnik_layer_set_datasource(l, ds);
            mapnik_datasource_free(ds);
            mapnik_map_add_layer(m, l);
            mapnik_layer_free(l);

            let b = mapnik_bbox(-5.0, 42.0, 5.0, 51.0);
            mapnik_map_zoom_to_box(m, b);
            mapnik_bbox_free(b);

            let i = mapnik_map_render_to_image(m, 0.0, 1.0);
            assert!(!i.is_null());
            let mut size: libc::size_t = 0;
            let raw = mapnik_image_to_raw(i, &mut size);
            let pixels = std::slice::from_raw_parts(raw, size);
            let center = (50 * 100 + 50) * 4;
            assert_eq!(&pixels[center..center + 4], &[0, 0, 0, 255]);
            mapnik_image_raw_free(raw, size);
            mapnik_image_free(i);
            mapnik_map_free(m);
        }
    }

    #[test]
    fn test_aspect_fix_modes() {
        let cases = [
            (0, [-10.0, 0.0, 30.0, 20.0], (200, 100)),
            (2, [0.0, 5.0, 20.0, 15.0], (200, 100)),
            (7, [0.0, 0.0, 20.0, 20.0], (200, 200)),
            (5, [0.0, 5.0, 20.0, 15.0], (200, 100)),
            (8, [0.0, 0.0, 20.0, 20.0], (200, 100)),
        ];
        for (mode, expected, size) in cases {
            unsafe {
                let m = mapnik_map(200, 100);
                assert_eq!(mapnik_map_set_aspect_fix_mode(m, mode), 0);
                let b = mapnik_bbox(0.0, 0.0, 20.0, 20.0);
                mapnik_map_zoom_to_box(m, b);
                mapnik_bbox_free(b);
                let mut ext = [0.0; 4];
                assert_eq!(mapnik_map_get_current_extent(m, ext.as_mut_ptr()), 1);
                assert_eq!(ext, expected, "mode {mode}");
                assert_eq!((mapnik_map_get_width(m), mapnik_map_get_height(m)), size);
                mapnik_map_free(m);
            }
        }
    }
}
