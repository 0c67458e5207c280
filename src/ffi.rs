//! FFI bindings for User Interaction Events
//!
//! This module lets a host (webview shell, native app) embed the tracker. The
//! host owns the DOM listeners and timers and forwards them here; it then
//! drains the queued payloads and hands them to its analytics collector.
//!
//! All functions use C strings (null-terminated) and return allocated memory
//! that must be freed by the caller using `uie_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::adapter::parse_event_line;
use crate::encoder::DataLayerEncoder;
use crate::schedule::{TimerSchedule, Variant};
use crate::sink::DataLayer;
use crate::tracker::InteractionTracker;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Opaque tracker handle
pub struct UieTrackerHandle {
    tracker: InteractionTracker<DataLayer>,
    queue: DataLayer,
    schedule: TimerSchedule,
    /// Index of the next timer allowed to fire
    next_tick: usize,
}

/// Create a tracker. `variant` is 0 for classic, 1 for extended.
///
/// # Safety
/// - Returns a pointer that must be freed with `uie_tracker_free`.
/// - Returns NULL for an unknown variant; call `uie_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn uie_tracker_new(variant: i32) -> *mut UieTrackerHandle {
    clear_last_error();

    let variant = match variant {
        0 => Variant::Classic,
        1 => Variant::Extended,
        other => {
            set_last_error(&format!("Unknown variant: {}", other));
            return ptr::null_mut();
        }
    };

    let queue = DataLayer::new();
    let handle = Box::new(UieTrackerHandle {
        tracker: InteractionTracker::new(variant.event_category(), queue.clone()),
        queue,
        schedule: variant.schedule(),
        next_tick: 0,
    });
    Box::into_raw(handle)
}

/// Free a tracker handle.
///
/// # Safety
/// - `tracker` must be a pointer returned by `uie_tracker_new`, or NULL.
#[no_mangle]
pub unsafe extern "C" fn uie_tracker_free(tracker: *mut UieTrackerHandle) {
    if !tracker.is_null() {
        drop(Box::from_raw(tracker));
    }
}

/// Forward one DOM event, given as an interaction event JSON object.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `uie_tracker_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn uie_tracker_dispatch(
    tracker: *mut UieTrackerHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }
    let handle = &mut *tracker;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    let result = parse_event_line(&json_str).and_then(|event| {
        event.validate()?;
        handle.tracker.dispatch(&event)
    });

    match result {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Fire the timer at `index` in the tracker's schedule.
///
/// Timers are one-shot and fire in schedule order: `index` must be the next
/// pending timer. Anything else is rejected and pushes nothing.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `uie_tracker_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn uie_tracker_tick(tracker: *mut UieTrackerHandle, index: u32) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }
    let handle = &mut *tracker;

    let index = index as usize;
    if index < handle.next_tick {
        set_last_error(&format!("Timer {} already fired", index));
        return -1;
    }
    if index > handle.next_tick {
        set_last_error(&format!(
            "Timer {} is not due; timer {} fires first",
            index, handle.next_tick
        ));
        return -1;
    }

    let tick = match handle.schedule.get(index) {
        Some(tick) => tick.clone(),
        None => {
            set_last_error(&format!("No timer at index {}", index));
            return -1;
        }
    };
    handle.next_tick += 1;

    match handle.tracker.on_timer(&tick) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Return the timer schedule as a JSON array of `{delay_ms, label}`.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `uie_tracker_new`.
/// - Returns a newly allocated string that must be freed with `uie_free_string`.
#[no_mangle]
pub unsafe extern "C" fn uie_tracker_schedule(tracker: *mut UieTrackerHandle) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }
    let handle = &*tracker;

    match serde_json::to_string(handle.schedule.ticks()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Remove all queued payloads and return them as a JSON array.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `uie_tracker_new`.
/// - Returns a newly allocated string that must be freed with `uie_free_string`.
#[no_mangle]
pub unsafe extern "C" fn uie_tracker_drain(tracker: *mut UieTrackerHandle) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }
    let handle = &*tracker;

    match DataLayerEncoder::encode_to_json(&handle.queue.drain()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by a `uie_*` function.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a `uie_*` function, or NULL.
#[no_mangle]
pub unsafe extern "C" fn uie_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Get the last error message.
///
/// # Safety
/// - The returned pointer is valid until the next `uie_*` call on this thread.
/// - Do NOT free the returned pointer. Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn uie_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn uie_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Classification, DataLayerEvent};

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        uie_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_tracker_lifecycle() {
        unsafe {
            let tracker = uie_tracker_new(0);
            assert!(!tracker.is_null());

            let click = CString::new(r#"{"type": "click"}"#).unwrap();
            assert_eq!(uie_tracker_dispatch(tracker, click.as_ptr()), 0);
            assert_eq!(uie_tracker_dispatch(tracker, click.as_ptr()), 0);
            assert_eq!(uie_tracker_tick(tracker, 0), 0);

            let drained = take_string(uie_tracker_drain(tracker));
            let payloads: Vec<DataLayerEvent> = serde_json::from_str(&drained).unwrap();
            assert_eq!(payloads.len(), 2);
            assert_eq!(payloads[0].event_action, "Click");
            assert_eq!(payloads[1].event_action, "5 seconds");
            assert_eq!(payloads[1].event_label, Classification::Active);

            let empty = take_string(uie_tracker_drain(tracker));
            assert_eq!(empty, "[]");

            uie_tracker_free(tracker);
        }
    }

    #[test]
    fn test_ffi_timers_fire_once_in_order() {
        unsafe {
            let tracker = uie_tracker_new(0);

            assert_eq!(uie_tracker_tick(tracker, 0), 0);
            assert_ne!(uie_tracker_tick(tracker, 0), 0);
            let message = CStr::from_ptr(uie_last_error()).to_str().unwrap();
            assert!(message.contains("already fired"));

            assert_ne!(uie_tracker_tick(tracker, 3), 0);
            assert_eq!(uie_tracker_tick(tracker, 1), 0);
            assert_eq!(uie_tracker_tick(tracker, 2), 0);
            assert_eq!(uie_tracker_tick(tracker, 3), 0);
            assert_ne!(uie_tracker_tick(tracker, 4), 0);

            let drained = take_string(uie_tracker_drain(tracker));
            let payloads: Vec<DataLayerEvent> = serde_json::from_str(&drained).unwrap();
            let actions: Vec<&str> = payloads.iter().map(|p| p.event_action.as_str()).collect();
            assert_eq!(
                actions,
                vec!["5 seconds", "19 seconds", "39 seconds", "67 seconds"]
            );

            uie_tracker_free(tracker);
        }
    }

    #[test]
    fn test_ffi_schedule() {
        unsafe {
            let tracker = uie_tracker_new(1);
            let json = take_string(uie_tracker_schedule(tracker));
            let ticks: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
            assert_eq!(ticks.len(), 7);
            assert_eq!(ticks[6]["label"], "233 seconds");
            uie_tracker_free(tracker);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            assert!(uie_tracker_new(7).is_null());
            assert!(!uie_last_error().is_null());

            let tracker = uie_tracker_new(0);
            let bad = CString::new(r#"{"type": "wheel"}"#).unwrap();
            assert_ne!(uie_tracker_dispatch(tracker, bad.as_ptr()), 0);
            assert!(!uie_last_error().is_null());

            assert_ne!(uie_tracker_tick(tracker, 4), 0);
            assert_ne!(uie_tracker_dispatch(ptr::null_mut(), bad.as_ptr()), 0);

            uie_tracker_free(tracker);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = CStr::from_ptr(uie_version()).to_str().unwrap();
            assert_eq!(version, env!("CARGO_PKG_VERSION"));
        }
    }
}
