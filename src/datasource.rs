//! Datasource handles.

use crate::engine::datasource;
use crate::error::{MapnikError, set_register_error};
use crate::handle::{DatasourceHandle, ParametersHandle};
use crate::util::{guard, guard_void};

/// Create a datasource from parameters.
///
/// The `type` parameter selects the provider (`geojson` or `csv`); the
/// remaining parameters configure it. `p` is only read and remains owned
/// by the caller.
///
/// # Returns
///
/// Handle on success. NULL when `type` is missing or unknown or the
/// provider fails, with the reason in `mapnik_register_last_error()`.
///
/// # Ownership
///
/// Caller owns the returned handle. Must call `mapnik_datasource_free()` to
/// free. Layers the datasource is attached to keep their own reference.
///
/// # Safety
///
/// `p` must be NULL or a live parameters handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_datasource(p: *const ParametersHandle) -> *mut DatasourceHandle {
    let result = guard(|| {
        let params = unsafe { ParametersHandle::from_ptr(p) }
            .ok_or_else(|| MapnikError::null_pointer("parameters"))?;
        Ok(datasource::create(&params.inner)?)
    });
    match result {
        Ok(inner) => Box::into_raw(Box::new(DatasourceHandle { inner })),
        Err(e) => {
            set_register_error(e);
            std::ptr::null_mut()
        }
    }
}

/// Free a datasource handle. NULL is a no-op.
///
/// # Safety
///
/// `ds` must be NULL or a live datasource handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_datasource_free(ds: *mut DatasourceHandle) {
    if ds.is_null() {
        return;
    }
    guard_void(|| unsafe { drop(Box::from_raw(ds)) });
}
