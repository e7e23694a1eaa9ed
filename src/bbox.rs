//! Bounding box handles.

use crate::engine::BBox;
use crate::handle::BBoxHandle;
use crate::util::guard_void;

/// Create a bounding box.
///
/// Corners are normalized, so `minx > maxx` is accepted and swapped.
///
/// # Returns
///
/// Handle on success, NULL when any coordinate is NaN or infinite.
///
/// # Ownership
///
/// Caller owns the returned handle. Must call `mapnik_bbox_free()` to free.
#[unsafe(no_mangle)]
pub extern "C" fn mapnik_bbox(minx: f64, miny: f64, maxx: f64, maxy: f64) -> *mut BBoxHandle {
    if ![minx, miny, maxx, maxy].iter().all(|v| v.is_finite()) {
        log::warn!("mapnik_bbox: non-finite coordinate in ({minx}, {miny}, {maxx}, {maxy})");
        return std::ptr::null_mut();
    }
    Box::into_raw(Box::new(BBoxHandle {
        inner: BBox::new(minx, miny, maxx, maxy),
    }))
}

/// Free a bounding box. NULL is a no-op.
///
/// # Safety
///
/// `b` must be NULL or a handle from `mapnik_bbox()` not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapnik_bbox_free(b: *mut BBoxHandle) {
    if b.is_null() {
        return;
    }
    guard_void(|| unsafe { drop(Box::from_raw(b)) });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_normalizes() {
        let b = mapnik_bbox(10.0, 10.0, 0.0, 0.0);
        assert!(!b.is_null());
        let inner = unsafe { BBoxHandle::from_ptr(b) }.unwrap().inner;
        assert_eq!(inner, BBox::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(inner.minx, 0.0);
        unsafe { mapnik_bbox_free(b) };
    }

    #[test]
    fn test_bbox_rejects_nan() {
        assert!(mapnik_bbox(f64::NAN, 0.0, 1.0, 1.0).is_null());
        assert!(mapnik_bbox(0.0, 0.0, f64::INFINITY, 1.0).is_null());
        unsafe { mapnik_bbox_free(std::ptr::null_mut()) };
    }
}
