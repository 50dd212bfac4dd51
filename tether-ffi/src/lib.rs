//! C ABI for the Tether license subsystem.
//!
//! Every exported function exchanges NUL-terminated UTF-8 JSON. Strings
//! returned by this library are owned by the caller and must be released
//! with [`tether_free_string`].
//!
//! Call [`tether_init`] once before anything else. It builds one
//! multi-threaded tokio runtime and a [`LicenseService`] that lives until
//! [`tether_shutdown`].
//!
//! Calls that cannot be served (not initialized, null or invalid input)
//! return `{"success":false,"error_code":..,"error_message":..}`.

mod license;

pub use license::{
    tether_activate, tether_activate_async, tether_check_license, tether_check_license_async,
    tether_fingerprint, LicenseCallback,
};

use serde::Serialize;
use std::ffi::{c_char, CStr, CString};
use std::sync::{Arc, Mutex, MutexGuard, Once, PoisonError};
use tether_license::{LicenseConfig, LicenseService};
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Process-wide state created by [`tether_init`].
pub(crate) struct Handle {
    pub(crate) runtime: Runtime,
    pub(crate) service: Arc<LicenseService>,
}

static HANDLE: Mutex<Option<Handle>> = Mutex::new(None);
static LOGGING: Once = Once::new();

pub(crate) fn lock_handle() -> MutexGuard<'static, Option<Handle>> {
    HANDLE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Envelope for calls that can fail before reaching the license service.
#[derive(Debug, Serialize)]
pub(crate) struct SdkResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

impl SdkResponse {
    pub(crate) fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            error_code: None,
            error_message: None,
            data: Some(data),
        }
    }

    pub(crate) fn ok_empty() -> Self {
        Self {
            success: true,
            error_code: None,
            error_message: None,
            data: None,
        }
    }

    pub(crate) fn err(code: &str, message: &str) -> Self {
        Self {
            success: false,
            error_code: Some(code.to_string()),
            error_message: Some(message.to_string()),
            data: None,
        }
    }
}

const SERIALIZE_FAILED: &str =
    r#"{"success":false,"error_code":"json_error","error_message":"Failed to serialize response"}"#;

/// Serializes `value` into a caller-owned C string.
pub(crate) fn to_json_string<T: Serialize>(value: &T) -> CString {
    let json = serde_json::to_string(value).unwrap_or_else(|_| SERIALIZE_FAILED.to_string());
    CString::new(json).unwrap_or_default()
}

/// Reads an optional C string argument. Null maps to `Ok(None)`.
///
/// # Safety
/// `ptr` must be null or point to a valid NUL-terminated string.
pub(crate) unsafe fn read_str<'a>(ptr: *const c_char) -> Result<Option<&'a str>, SdkResponse> {
    if ptr.is_null() {
        return Ok(None);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(Some)
        .map_err(|_| SdkResponse::err("invalid_utf8", "Argument is not valid UTF-8"))
}

fn init_logging() {
    LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_env("TETHER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
        // A host that already installed a subscriber keeps it.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    });
}

/// Initializes the license runtime.
///
/// `config_json` is a `LicenseConfig` object; null or `{}` uses the
/// built-in defaults. Calling this again replaces the previous runtime.
///
/// # Safety
/// `config_json` must be null or a valid NUL-terminated UTF-8 string.
/// The returned pointer must be freed with `tether_free_string`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tether_init(config_json: *const c_char) -> *mut c_char {
    let response = unsafe { init_inner(config_json) };
    to_json_string(&response).into_raw()
}

unsafe fn init_inner(config_json: *const c_char) -> SdkResponse {
    init_logging();

    let config = match unsafe { read_str(config_json) } {
        Ok(Some(json)) => match LicenseConfig::from_json(json) {
            Ok(config) => config,
            Err(e) => return SdkResponse::err("invalid_config", &e.to_string()),
        },
        Ok(None) => LicenseConfig::default(),
        Err(resp) => return resp,
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("tether-license")
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => return SdkResponse::err("runtime_error", &format!("Failed to start runtime: {e}")),
    };

    let service = match LicenseService::from_config(&config) {
        Ok(service) => Arc::new(service),
        Err(e) => return SdkResponse::err("init_failed", &e.to_string()),
    };

    let previous = lock_handle().replace(Handle { runtime, service });
    if let Some(old) = previous {
        warn!("tether_init called twice; replacing the previous runtime");
        old.runtime.shutdown_background();
    }
    info!(app = %config.app_name, "license runtime initialized");
    SdkResponse::ok_empty()
}

/// Stops the runtime. In-flight callbacks may be dropped.
#[unsafe(no_mangle)]
pub extern "C" fn tether_shutdown() {
    if let Some(handle) = lock_handle().take() {
        handle.runtime.shutdown_background();
        info!("license runtime shut down");
    }
}

/// Frees a string returned by this library.
///
/// # Safety
/// `ptr` must be null or a pointer previously returned by this library,
/// and must not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tether_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}
