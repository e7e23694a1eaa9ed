//! Datasource parameter handles.

use crate::handle::ParametersHandle;
use crate::util::{cstr_to_str, guard, guard_void};
use std::os::raw::c_char;

/// Create an empty parameter set.
///
/// # Ownership
///
/// Caller owns the returned handle. Must call `mapnik_parameters_free()` to free.
#[unsafe(no_mangle)]
pub extern "C" fn mapnik_parameters() -> *mut ParametersHandle {
    Box::into_raw(Box::default())
}

/// Free a parameter set. NULL is a no-op.
///
/// # Safety
///
/// `p` must be NULL or a live parameters handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_parameters_free(p: *mut ParametersHandle) {
    if p.is_null() {
        return;
    }
    guard_void(|| unsafe { drop(Box::from_raw(p)) });
}

/// Set `key` to `value`, replacing any previous value.
///
/// NULL or non-UTF-8 arguments leave the set unchanged.
///
/// # Safety
///
/// - `p` must be NULL or a live parameters handle
/// - `key` and `value` must be valid null-terminated strings or NULL
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_parameters_set(
    p: *mut ParametersHandle,
    key: *const c_char,
    value: *const c_char,
) {
    let Some(params) = (unsafe { ParametersHandle::from_ptr_mut(p) }) else {
        return;
    };
    let result = guard(|| {
        let key = unsafe { cstr_to_str(key, "key") }?;
        let value = unsafe { cstr_to_str(value, "value") }?;
        params.inner.set(key, value);
        Ok(())
    });
    if let Err(e) = result {
        log::warn!("mapnik_parameters_set: {}", e.message.to_string_lossy());
    }
}
