//! Error handling for the FFI layer.
//!
//! Engine errors are converted into a stable numeric code plus a message
//! that is kept alive in the scope the error belongs to: the process-wide
//! registration slot, or the map or image handle that failed.

use crate::engine;
use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;
use std::sync::{Mutex, PoisonError};

/// Error codes for FFI functions.
///
/// These codes are stable and can be matched in C code.
/// Codes 1-99 map to engine error variants.
/// Codes 100+ are FFI-specific errors.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapnikErrorCode {
    /// No error
    Ok = 0,

    // Input and stylesheet errors (1-10)
    /// General I/O error
    Io = 1,
    /// Malformed XML
    XmlParse = 2,
    /// Well-formed XML that is not a valid stylesheet
    Stylesheet = 3,
    /// Invalid filter expression
    Filter = 4,
    /// Invalid color
    Color = 5,

    // Datasource errors (11-20)
    /// Required datasource parameter missing
    MissingParameter = 11,
    /// Datasource parameter has an unusable value
    InvalidParameter = 12,
    /// No provider for the requested datasource type
    UnknownDatasource = 13,
    /// Provider failed to initialize
    Datasource = 14,
    /// Malformed GeoJSON
    Json = 15,

    // Map errors (21-30)
    /// Projection pair cannot be transformed
    UnsupportedProjection = 21,
    /// Map dimensions out of range
    InvalidSize = 22,
    /// Aspect fix mode out of range
    InvalidAspectFixMode = 23,
    /// Bounding box cannot be used
    InvalidBBox = 24,
    /// No layer extent to zoom to
    ZoomAll = 25,
    /// Empty or unusable SRS
    InvalidSrs = 26,
    /// Scale factor not finite or not positive
    InvalidScaleFactor = 27,

    // Image errors (31-40)
    /// Unknown output format
    UnknownImageFormat = 31,
    /// Encoder failure
    Encode = 32,
    /// Raw buffer does not match the image dimensions
    RawSize = 33,
    /// Canvas could not be allocated
    Canvas = 34,

    // Registration errors (41-50)
    /// No font could be loaded
    NoFonts = 41,

    // FFI-specific errors (100+)
    /// Null pointer passed
    NullPointer = 100,
    /// Invalid UTF-8 string
    InvalidUtf8 = 101,
    /// Invalid handle
    InvalidHandle = 103,
    /// A panic was caught at the boundary
    Panic = 254,
    /// Unknown error
    Unknown = 255,
}

/// An error ready to be handed across the boundary.
///
/// The message never contains interior NUL bytes, so it can always be
/// exposed as a C string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapnikError {
    pub code: MapnikErrorCode,
    pub message: CString,
}

impl MapnikError {
    pub fn new(code: MapnikErrorCode, message: impl Into<String>) -> Self {
        let message = message.into().replace('\0', " ");
        Self {
            code,
            message: CString::new(message).unwrap_or_default(),
        }
    }

    /// Create an error from an engine error.
    pub fn from_engine(e: &engine::Error) -> Self {
        Self::new(error_code_from_engine(e), e.to_string())
    }

    /// Create a null pointer error.
    pub fn null_pointer(param: &str) -> Self {
        Self::new(
            MapnikErrorCode::NullPointer,
            format!("null pointer passed for parameter: {param}"),
        )
    }

    /// Create an invalid UTF-8 error.
    pub fn invalid_utf8(context: &str) -> Self {
        Self::new(MapnikErrorCode::InvalidUtf8, format!("invalid UTF-8 in {context}"))
    }

    /// Create an invalid handle error.
    pub fn invalid_handle() -> Self {
        Self::new(MapnikErrorCode::InvalidHandle, "invalid or null handle")
    }

    /// Create an error for a panic caught at the boundary.
    pub fn panic(message: &str) -> Self {
        Self::new(MapnikErrorCode::Panic, format!("internal panic: {message}"))
    }
}

impl From<engine::Error> for MapnikError {
    fn from(e: engine::Error) -> Self {
        Self::from_engine(&e)
    }
}

/// Convert an engine error to an FFI error code.
fn error_code_from_engine(e: &engine::Error) -> MapnikErrorCode {
    use engine::Error::*;

    match e {
        Io { .. } => MapnikErrorCode::Io,
        XmlParse(_) => MapnikErrorCode::XmlParse,
        Stylesheet(_) => MapnikErrorCode::Stylesheet,
        Filter { .. } => MapnikErrorCode::Filter,
        Color(_) => MapnikErrorCode::Color,
        MissingParameter(_) => MapnikErrorCode::MissingParameter,
        InvalidParameter { .. } => MapnikErrorCode::InvalidParameter,
        UnknownDatasource { .. } => MapnikErrorCode::UnknownDatasource,
        Datasource { .. } => MapnikErrorCode::Datasource,
        Json(_) => MapnikErrorCode::Json,
        UnsupportedProjection { .. } => MapnikErrorCode::UnsupportedProjection,
        InvalidSize { .. } => MapnikErrorCode::InvalidSize,
        InvalidAspectFixMode(_) => MapnikErrorCode::InvalidAspectFixMode,
        InvalidBBox(_) => MapnikErrorCode::InvalidBBox,
        ZoomAll(_) => MapnikErrorCode::ZoomAll,
        InvalidSrs(_) => MapnikErrorCode::InvalidSrs,
        InvalidScaleFactor(_) => MapnikErrorCode::InvalidScaleFactor,
        UnknownImageFormat(_) => MapnikErrorCode::UnknownImageFormat,
        Encode(_) => MapnikErrorCode::Encode,
        RawSize { .. } => MapnikErrorCode::RawSize,
        Canvas { .. } => MapnikErrorCode::Canvas,
        NoFonts(_) => MapnikErrorCode::NoFonts,
        Internal(_) => MapnikErrorCode::Unknown,
    }
}

/// The most recent failure in one scope.
///
/// Success never clears the slot; the next failure overwrites it.
#[derive(Debug, Default)]
pub struct LastError(Option<MapnikError>);

impl LastError {
    pub fn set(&mut self, err: MapnikError) {
        log::debug!("{:?}: {}", err.code, err.message.to_string_lossy());
        self.0 = Some(err);
    }

    /// Message pointer, valid until the next `set` or until the owner is dropped.
    pub fn as_ptr(&self) -> *const c_char {
        self.0
            .as_ref()
            .map_or(std::ptr::null(), |e| e.message.as_ptr())
    }

    pub fn code(&self) -> MapnikErrorCode {
        self.0.as_ref().map_or(MapnikErrorCode::Ok, |e| e.code)
    }

    pub fn message(&self) -> Option<&str> {
        self.0.as_ref().and_then(|e| e.message.to_str().ok())
    }
}

/// Process-wide error for registration, datasource and map construction.
static REGISTER_ERROR: Mutex<LastError> = Mutex::new(LastError(None));

/// Record a process-wide error.
pub(crate) fn set_register_error(err: MapnikError) {
    REGISTER_ERROR
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .set(err);
}

/// Serializes tests that assert on the process-wide error.
#[cfg(test)]
pub(crate) fn register_error_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

thread_local! {
    /// Per-thread copy handed out by `mapnik_register_last_error`.
    static REGISTER_MESSAGE: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Last process-wide error message.
///
/// Covers `mapnik_register_datasources`, `mapnik_register_fonts`,
/// `mapnik_datasource` and `mapnik_map`.
///
/// # Returns
///
/// The message, or NULL when no such error has happened yet.
///
/// # Ownership
///
/// The string is a copy owned by the calling thread. It stays valid until
/// the same thread calls this function again, even if another thread
/// records a new error meanwhile. Do not free it.
#[unsafe(no_mangle)]
pub extern "C" fn mapnik_register_last_error() -> *const c_char {
    let message = REGISTER_ERROR
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .0
        .as_ref()
        .map(|e| e.message.clone());
    REGISTER_MESSAGE.with(|slot| {
        let mut slot = slot.borrow_mut();
        *slot = message;
        slot.as_ref().map_or(std::ptr::null(), |m| m.as_ptr())
    })
}

/// Code of the last process-wide error, `MAPNIK_OK` (0) when none.
#[unsafe(no_mangle)]
pub extern "C" fn mapnik_register_last_error_code() -> MapnikErrorCode {
    REGISTER_ERROR
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .code()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_engine_codes() {
        let err = MapnikError::from(engine::Error::InvalidAspectFixMode(42));
        assert_eq!(err.code, MapnikErrorCode::InvalidAspectFixMode);
        assert_eq!(err.message.to_str().unwrap(), "invalid aspect_fix_mode: 42");
    }

    #[test]
    fn test_interior_nul_is_replaced() {
        let err = MapnikError::new(MapnikErrorCode::Unknown, "a\0b");
        assert_eq!(err.message.to_str().unwrap(), "a b");
    }

    #[test]
    fn test_last_error_slot() {
        let mut slot = LastError::default();
        assert!(slot.as_ptr().is_null());
        assert_eq!(slot.code(), MapnikErrorCode::Ok);

        slot.set(MapnikError::null_pointer("map"));
        assert_eq!(slot.code(), MapnikErrorCode::NullPointer);
        assert_eq!(slot.message(), Some("null pointer passed for parameter: map"));

        slot.set(MapnikError::invalid_handle());
        assert_eq!(slot.message(), Some("invalid or null handle"));
    }

    #[test]
    fn test_register_message_survives_other_threads() {
        let _lock = register_error_lock();
        set_register_error(MapnikError::new(MapnikErrorCode::NoFonts, "first failure"));
        let ptr = mapnik_register_last_error();
        assert!(!ptr.is_null());

        std::thread::spawn(|| {
            set_register_error(MapnikError::new(MapnikErrorCode::Io, "second failure"));
            let ptr = mapnik_register_last_error();
            assert_eq!(unsafe { CStr::from_ptr(ptr) }.to_str().unwrap(), "second failure");
        })
        .join()
        .unwrap();

        assert_eq!(unsafe { CStr::from_ptr(ptr) }.to_str().unwrap(), "first failure");
        assert_eq!(mapnik_register_last_error_code(), MapnikErrorCode::Io);
        let refreshed = mapnik_register_last_error();
        assert_eq!(unsafe { CStr::from_ptr(refreshed) }.to_str().unwrap(), "second failure");
    }
}
