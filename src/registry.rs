//! Process-wide registration of datasource plugin directories and fonts.

use crate::engine::{datasource, fonts};
use crate::error::{MapnikError, set_register_error};
use crate::util::{cstr_to_path, guard};
use std::os::raw::{c_char, c_int};

fn status(result: Result<usize, MapnikError>) -> c_int {
    match result {
        Ok(_) => 0,
        Err(e) => {
            set_register_error(e);
            -1
        }
    }
}

/// Register a directory of datasource plugins.
///
/// The built-in `geojson` and `csv` providers are always available; the
/// directory is remembered so that errors for unknown types can name it.
///
/// # Returns
///
/// 0 on success, -1 on failure. The reason is available from
/// `mapnik_register_last_error()`.
///
/// # Safety
///
/// `path` must be a valid null-terminated UTF-8 string or NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_register_datasources(path: *const c_char) -> c_int {
    status(guard(|| {
        let path = unsafe { cstr_to_path(path, "path") }?;
        Ok(datasource::register_datasources(&path)?)
    }))
}

/// Register a font file, or all fonts below a directory.
///
/// # Returns
///
/// 0 on success, -1 on failure (missing path, or no usable font found).
///
/// # Safety
///
/// `path` must be a valid null-terminated UTF-8 string or NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_register_fonts(path: *const c_char) -> c_int {
    status(guard(|| {
        let path = unsafe { cstr_to_path(path, "path") }?;
        Ok(fonts::register_fonts(&path)?)
    }))
}
