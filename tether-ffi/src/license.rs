//! License verbs: check, activate, fingerprint.
//!
//! The synchronous forms block the calling thread until the service
//! answers or its timeout fires. The `_async` forms return at once and
//! invoke the callback exactly once, from a runtime thread, or from the
//! calling thread when the call cannot be scheduled.

use crate::{lock_handle, read_str, to_json_string, SdkResponse};
use serde::Serialize;
use std::ffi::{c_char, c_void};
use std::future::Future;
use std::sync::Arc;
use tether_license::{ActivateResponse, CheckResponse, LicenseOutcome, LicenseService};
use tokio::runtime;
use tracing::debug;

/// Completion callback. `response` is a NUL-terminated JSON string that is
/// only valid for the duration of the call; copy it if it must outlive it.
pub type LicenseCallback = extern "C" fn(response: *const c_char, user_data: *mut c_void);

/// Caller context handed back untouched to the callback.
struct UserData(*mut c_void);

// SAFETY: the pointer is never dereferenced here; the caller is
// responsible for whatever it points to being usable from another thread.
unsafe impl Send for UserData {}

fn not_initialized() -> SdkResponse {
    SdkResponse::err("not_initialized", "License runtime not initialized")
}

fn service_handle() -> Result<(runtime::Handle, Arc<LicenseService>), SdkResponse> {
    let guard = lock_handle();
    let handle = guard.as_ref().ok_or_else(not_initialized)?;
    Ok((handle.runtime.handle().clone(), Arc::clone(&handle.service)))
}

/// Runs `call` to completion on the license runtime and serializes the
/// outcome as `R`.
fn run_blocking<F, Fut, R>(call: F) -> *mut c_char
where
    F: FnOnce(Arc<LicenseService>) -> Fut,
    Fut: Future<Output = LicenseOutcome>,
    R: for<'a> From<&'a LicenseOutcome> + Serialize,
{
    if runtime::Handle::try_current().is_ok() {
        let resp = SdkResponse::err(
            "async_context",
            "Blocking call made from an async runtime; use the _async variant",
        );
        return to_json_string(&resp).into_raw();
    }
    let (rt, service) = match service_handle() {
        Ok(pair) => pair,
        Err(resp) => return to_json_string(&resp).into_raw(),
    };
    let outcome = rt.block_on(call(service));
    to_json_string(&R::from(&outcome)).into_raw()
}

/// Schedules `call` on the license runtime and reports through `callback`.
fn run_with_callback<F, Fut, R>(call: F, callback: LicenseCallback, user_data: *mut c_void)
where
    F: FnOnce(Arc<LicenseService>) -> Fut,
    Fut: Future<Output = LicenseOutcome> + Send + 'static,
    R: for<'a> From<&'a LicenseOutcome> + Serialize,
{
    let user_data = UserData(user_data);
    let (rt, service) = match service_handle() {
        Ok(pair) => pair,
        Err(resp) => {
            let json = to_json_string(&resp);
            callback(json.as_ptr(), user_data.0);
            return;
        }
    };
    let fut = call(service);
    rt.spawn(async move {
        let outcome = fut.await;
        let json = to_json_string(&R::from(&outcome));
        let user_data = user_data;
        callback(json.as_ptr(), user_data.0);
    });
}

/// Startup license check.
///
/// Returns `{"valid":bool,"msg":string,"remainingDays"?:int}`. The returned
/// pointer must be freed with `tether_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn tether_check_license() -> *mut c_char {
    debug!("check license");
    run_blocking::<_, _, CheckResponse>(|service| async move { service.check_license().await })
}

/// Activates `code` on this machine.
///
/// Returns `{"success":bool,"msg":string,"remainingDays"?:int}`.
///
/// # Safety
/// `code` must be a valid NUL-terminated UTF-8 string.
/// The returned pointer must be freed with `tether_free_string`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tether_activate(code: *const c_char) -> *mut c_char {
    let code = match unsafe { read_code(code) } {
        Ok(code) => code,
        Err(resp) => return to_json_string(&resp).into_raw(),
    };
    run_blocking::<_, _, ActivateResponse>(|service| async move { service.activate(code).await })
}

/// Callback form of [`tether_check_license`].
///
/// # Safety
/// `user_data` is passed through untouched and must stay valid until the
/// callback runs.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tether_check_license_async(
    callback: LicenseCallback,
    user_data: *mut c_void,
) {
    run_with_callback::<_, _, CheckResponse>(
        |service| async move { service.check_license().await },
        callback,
        user_data,
    );
}

/// Callback form of [`tether_activate`].
///
/// # Safety
/// `code` must be a valid NUL-terminated UTF-8 string. `user_data` is
/// passed through untouched and must stay valid until the callback runs.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tether_activate_async(
    code: *const c_char,
    callback: LicenseCallback,
    user_data: *mut c_void,
) {
    let code = match unsafe { read_code(code) } {
        Ok(code) => code,
        Err(resp) => {
            let json = to_json_string(&resp);
            callback(json.as_ptr(), user_data);
            return;
        }
    };
    run_with_callback::<_, _, ActivateResponse>(
        |service| async move { service.activate(code).await },
        callback,
        user_data,
    );
}

/// Returns `{"success":true,"data":"<fingerprint>"}` for support screens.
/// The returned pointer must be freed with `tether_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn tether_fingerprint() -> *mut c_char {
    let resp = match service_handle() {
        Ok((_, service)) => SdkResponse::ok(serde_json::Value::String(
            service.fingerprint().id().to_string(),
        )),
        Err(resp) => resp,
    };
    to_json_string(&resp).into_raw()
}

unsafe fn read_code(code: *const c_char) -> Result<String, SdkResponse> {
    match unsafe { read_str(code) }? {
        Some(code) => Ok(code.to_string()),
        None => Err(SdkResponse::err("null_pointer", "Activation code is null")),
    }
}
