//! Image handles: encoding to blobs and raw RGBA export/import.

use crate::engine::Image;
use crate::error::{MapnikError, MapnikErrorCode, set_register_error};
use crate::handle::{ImageHandle, MapnikImageBlob};
use crate::util::{cstr_to_str, guard, guard_void};
use std::os::raw::{c_char, c_int, c_uint};

/// Free an image. NULL is a no-op.
///
/// # Safety
///
/// `i` must be NULL or a live image handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_image_free(i: *mut ImageHandle) {
    if i.is_null() {
        return;
    }
    guard_void(|| unsafe { drop(Box::from_raw(i)) });
}

/// Last error recorded on this image.
///
/// # Returns
///
/// The message, or NULL when `i` is NULL or no error has happened.
/// Owned by the image; valid until the next failing call on it.
///
/// # Safety
///
/// `i` must be NULL or a live image handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_image_last_error(i: *const ImageHandle) -> *const c_char {
    unsafe { ImageHandle::from_ptr(i) }.map_or(std::ptr::null(), |h| h.last_error.as_ptr())
}

/// Code of the last error on this image, 0 when none.
///
/// # Safety
///
/// `i` must be NULL or a live image handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_image_last_error_code(i: *const ImageHandle) -> MapnikErrorCode {
    unsafe { ImageHandle::from_ptr(i) }
        .map_or(MapnikErrorCode::InvalidHandle, |h| h.last_error.code())
}

/// Image width in pixels, 0 for NULL.
///
/// # Safety
///
/// `i` must be NULL or a live image handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_image_width(i: *const ImageHandle) -> c_uint {
    unsafe { ImageHandle::from_ptr(i) }.map_or(0, |h| h.inner.width())
}

/// Image height in pixels, 0 for NULL.
///
/// # Safety
///
/// `i` must be NULL or a live image handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_image_height(i: *const ImageHandle) -> c_uint {
    unsafe { ImageHandle::from_ptr(i) }.map_or(0, |h| h.inner.height())
}

/// Encode an image.
///
/// # Parameters
///
/// - `i`: image to encode
/// - `format`: `png`, `png8`, `png24`, `png32`, `png256`, `jpeg`, `jpegNN`,
///   `tiff` or `webp`, optionally followed by `:options`
///
/// # Returns
///
/// A new blob, or NULL on failure with the reason in
/// `mapnik_image_last_error(i)`. The image is unchanged either way.
///
/// # Ownership
///
/// Caller owns the blob. Must call `mapnik_image_blob_free()` to free.
///
/// # Safety
///
/// - `i` must be NULL or a live image handle
/// - `format` must be a valid null-terminated UTF-8 string or NULL
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_image_to_blob(
    i: *mut ImageHandle,
    format: *const c_char,
) -> *mut MapnikImageBlob {
    let Some(handle) = (unsafe { ImageHandle::from_ptr_mut(i) }) else {
        return std::ptr::null_mut();
    };
    let result = guard(|| {
        let format = unsafe { cstr_to_str(format, "format") }?;
        let bytes = handle.inner.encode(format)?;
        let len = c_uint::try_from(bytes.len()).map_err(|_| {
            MapnikError::new(
                MapnikErrorCode::Encode,
                format!("encoded image of {} bytes is too large for a blob", bytes.len()),
            )
        })?;
        let ptr = Box::into_raw(bytes.into_boxed_slice()).cast::<c_char>();
        Ok(Box::into_raw(Box::new(MapnikImageBlob { ptr, len })))
    });
    match result {
        Ok(blob) => blob,
        Err(e) => {
            handle.last_error.set(e);
            std::ptr::null_mut()
        }
    }
}

/// Free a blob and its bytes. NULL is a no-op.
///
/// # Safety
///
/// `b` must be NULL or a blob from `mapnik_image_to_blob()` not yet freed,
/// with `ptr` and `len` unmodified.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_image_blob_free(b: *mut MapnikImageBlob) {
    if b.is_null() {
        return;
    }
    guard_void(|| unsafe {
        let blob = Box::from_raw(b);
        free_bytes(blob.ptr.cast::<u8>(), blob.len as usize);
    });
}

/// Copy the image's pixels out as straight-alpha RGBA8, rows top to bottom.
///
/// # Parameters
///
/// - `i`: image
/// - `size`: receives the buffer length in bytes (`width * height * 4`)
///
/// # Returns
///
/// A new buffer, or NULL on failure.
///
/// # Ownership
///
/// Caller owns the buffer. Must call `mapnik_image_raw_free()` with the
/// returned size to free.
///
/// # Safety
///
/// - `i` must be NULL or a live image handle
/// - `size` must be a valid pointer or NULL
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_image_to_raw(i: *mut ImageHandle, size: *mut libc::size_t) -> *const u8 {
    let Some(handle) = (unsafe { ImageHandle::from_ptr_mut(i) }) else {
        return std::ptr::null();
    };
    let Some(size) = (unsafe { size.as_mut() }) else {
        handle.last_error.set(MapnikError::null_pointer("size"));
        return std::ptr::null();
    };
    let data: Box<[u8]> = handle.inner.data().into();
    *size = data.len();
    Box::into_raw(data).cast::<u8>()
}

/// Free a buffer returned by `mapnik_image_to_raw()`. NULL is a no-op.
///
/// # Safety
///
/// `raw` must be NULL or a buffer from `mapnik_image_to_raw()` not yet
/// freed, and `size` the size reported with it.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_image_raw_free(raw: *const u8, size: libc::size_t) {
    guard_void(|| unsafe { free_bytes(raw.cast_mut(), size) });
}

/// Create an image from straight-alpha RGBA8 pixels.
///
/// The `width * height * 4` bytes at `raw` are copied; the caller keeps
/// ownership of `raw`.
///
/// # Returns
///
/// Handle on success, NULL on invalid arguments with the reason in
/// `mapnik_register_last_error()`.
///
/// # Ownership
///
/// Caller owns the returned handle. Must call `mapnik_image_free()` to free.
///
/// # Safety
///
/// `raw` must be NULL or point to at least `width * height * 4` readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_image_from_raw(
    raw: *const u8,
    width: c_int,
    height: c_int,
) -> *mut ImageHandle {
    let result = guard(|| {
        if raw.is_null() {
            return Err(MapnikError::null_pointer("raw"));
        }
        let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
            return Err(MapnikError::new(
                MapnikErrorCode::InvalidSize,
                format!("invalid image size {width}x{height}"),
            ));
        };
        let len = w as usize * h as usize * 4;
        let bytes = unsafe { std::slice::from_raw_parts(raw, len) };
        Ok(Image::from_rgba(w, h, bytes.to_vec())?)
    });
    match result {
        Ok(image) => Box::into_raw(ImageHandle::new(image)),
        Err(e) => {
            set_register_error(e);
            std::ptr::null_mut()
        }
    }
}

/// # Safety
///
/// `ptr` must be NULL or come from `Box<[u8]>::into_raw` with length `len`.
unsafe fn free_bytes(ptr: *mut u8, len: usize) {
    if ptr.is_null() {
        return;
    }
    unsafe { drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, len))) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::{CStr, CString};

    fn red_image() -> *mut ImageHandle {
        let pixels = [255u8, 0, 0, 255].repeat(4 * 3);
        unsafe { mapnik_image_from_raw(pixels.as_ptr(), 4, 3) }
    }

    #[test]
    fn test_from_raw_copies_and_to_raw_round_trips() {
        let img = red_image();
        assert!(!img.is_null());
        unsafe {
            assert_eq!(mapnik_image_width(img), 4);
            assert_eq!(mapnik_image_height(img), 3);

            let mut size: libc::size_t = 0;
            let raw = mapnik_image_to_raw(img, &mut size);
            assert_eq!(size, 48);
            let bytes = std::slice::from_raw_parts(raw, size);
            assert!(bytes.chunks(4).all(|px| px == [255, 0, 0, 255]));
            mapnik_image_raw_free(raw, size);

            assert!(mapnik_image_to_raw(img, std::ptr::null_mut()).is_null());
            assert_eq!(mapnik_image_last_error_code(img), MapnikErrorCode::NullPointer);
            mapnik_image_free(img);
        }
    }

    #[test]
    fn test_from_raw_rejects_bad_input() {
        let _lock = crate::error::register_error_lock();
        unsafe {
            assert!(mapnik_image_from_raw(std::ptr::null(), 4, 4).is_null());
            let px = [0u8; 4];
            assert!(mapnik_image_from_raw(px.as_ptr(), -1, 1).is_null());
            assert_eq!(
                crate::error::mapnik_register_last_error_code(),
                MapnikErrorCode::InvalidSize
            );
        }
    }

    #[test]
    fn test_blob_leaves_image_usable() {
        let img = red_image();
        let png = CString::new("png").unwrap();
        unsafe {
            let blob = mapnik_image_to_blob(img, png.as_ptr());
            assert!(!blob.is_null());
            let b = &*blob;
            let bytes = std::slice::from_raw_parts(b.ptr.cast::<u8>(), b.len as usize);
            assert_eq!(&bytes[1..4], b"PNG");
            mapnik_image_blob_free(blob);

            let again = mapnik_image_to_blob(img, png.as_ptr());
            assert!(!again.is_null());
            mapnik_image_blob_free(again);
            assert!(mapnik_image_last_error(img).is_null());
            mapnik_image_free(img);
        }
    }

    #[test]
    fn test_unknown_format_sets_image_error() {
        let img = red_image();
        let format = CString::new("invalidformat").unwrap();
        unsafe {
            assert!(mapnik_image_to_blob(img, format.as_ptr()).is_null());
            let msg = CStr::from_ptr(mapnik_image_last_error(img)).to_str().unwrap();
            assert_eq!(msg, "unknown file type: invalidformat");
            assert_eq!(
                mapnik_image_last_error_code(img),
                MapnikErrorCode::UnknownImageFormat
            );
            mapnik_image_free(img);
        }
    }

    #[test]
    fn test_null_handles() {
        unsafe {
            mapnik_image_free(std::ptr::null_mut());
            mapnik_image_blob_free(std::ptr::null_mut());
            mapnik_image_raw_free(std::ptr::null(), 0);
            assert!(mapnik_image_last_error(std::ptr::null()).is_null());
            assert_eq!(mapnik_image_width(std::ptr::null()), 0);
            assert!(mapnik_image_to_blob(std::ptr::null_mut(), std::ptr::null()).is_null());
        }
    }
}
