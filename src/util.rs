//! Utility functions for FFI operations.

use crate::error::MapnikError;
use std::any::Any;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;

/// Borrow a C string as `&str`.
///
/// Returns an error if the pointer is null or contains invalid UTF-8.
///
/// # Safety
///
/// The caller must ensure `ptr` is either null or points to a valid
/// null-terminated C string that outlives `'a`.
pub unsafe fn cstr_to_str<'a>(ptr: *const c_char, param_name: &str) -> Result<&'a str, MapnikError> {
    if ptr.is_null() {
        return Err(MapnikError::null_pointer(param_name));
    }

    let cstr = unsafe { CStr::from_ptr(ptr) };
    cstr.to_str()
        .map_err(|_| MapnikError::invalid_utf8(param_name))
}

/// Convert a C string to a PathBuf.
///
/// # Safety
///
/// Same as [`cstr_to_str`].
pub unsafe fn cstr_to_path(ptr: *const c_char, param_name: &str) -> Result<PathBuf, MapnikError> {
    unsafe { cstr_to_str(ptr, param_name) }.map(PathBuf::from)
}

/// Convert an optional C string; NULL becomes `None`.
///
/// # Safety
///
/// Same as [`cstr_to_str`].
pub unsafe fn cstr_to_option_str<'a>(
    ptr: *const c_char,
    param_name: &str,
) -> Result<Option<&'a str>, MapnikError> {
    if ptr.is_null() {
        return Ok(None);
    }
    unsafe { cstr_to_str(ptr, param_name) }.map(Some)
}

/// Convert a Rust string to an owned C string.
///
/// Interior NUL bytes are replaced so the conversion cannot fail.
pub fn to_cstring(s: &str) -> CString {
    CString::new(s.replace('\0', " ")).unwrap_or_default()
}

/// Run `f`, turning a panic into an error.
///
/// Every exported function that does real work goes through this so that
/// nothing unwinds into the caller.
pub fn guard<T>(f: impl FnOnce() -> Result<T, MapnikError>) -> Result<T, MapnikError> {
    crate::logging::init();
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        log::error!("panic caught at the C boundary: {message}");
        Err(MapnikError::panic(message))
    })
}

/// Run `f` for its side effect, swallowing a panic.
///
/// For functions without an error channel, such as destructors.
pub fn guard_void(f: impl FnOnce()) {
    crate::logging::init();
    if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
        log::error!(
            "panic caught at the C boundary: {}",
            panic_message(payload.as_ref())
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MapnikErrorCode;

    #[test]
    fn test_cstr_conversions() {
        let s = CString::new("hello").unwrap();
        assert_eq!(unsafe { cstr_to_str(s.as_ptr(), "s") }.unwrap(), "hello");
        assert_eq!(
            unsafe { cstr_to_str(std::ptr::null(), "s") }.unwrap_err().code,
            MapnikErrorCode::NullPointer
        );
        assert_eq!(unsafe { cstr_to_option_str(std::ptr::null(), "s") }.unwrap(), None);

        let bad = [0xffu8, 0xfe, 0];
        let err = unsafe { cstr_to_path(bad.as_ptr().cast(), "path") }.unwrap_err();
        assert_eq!(err.code, MapnikErrorCode::InvalidUtf8);
    }

    #[test]
    fn test_guard_catches_panic() {
        let result: Result<(), _> = guard(|| panic!("boom"));
        let err = result.unwrap_err();
        assert_eq!(err.code, MapnikErrorCode::Panic);
        assert_eq!(err.message.to_str().unwrap(), "internal panic: boom");
        assert_eq!(guard(|| Ok(7)).unwrap(), 7);
    }
}
