//! libcanberra playback.
//!
//! One context and one property list live for the whole process. The
//! property list carries the theme and cache policy; each request only
//! swaps in its event id before calling `ca_context_play_full`.

use std::ffi::{c_void, CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr::{self, NonNull};

use libc::pid_t;
use tracing::{debug, trace};

use super::{PlaybackError, Player, SoundEvent};

#[repr(C)]
struct CaContext {
    _private: [u8; 0],
}

#[repr(C)]
struct CaProplist {
    _private: [u8; 0],
}

type CaFinishCallback =
    extern "C" fn(c: *mut CaContext, id: u32, error_code: c_int, userdata: *mut c_void);

#[link(name = "canberra")]
extern "C" {
    fn ca_context_create(c: *mut *mut CaContext) -> c_int;
    fn ca_context_destroy(c: *mut CaContext) -> c_int;
    fn ca_context_set_driver(c: *mut CaContext, driver: *const c_char) -> c_int;
    fn ca_context_play_full(
        c: *mut CaContext,
        id: u32,
        p: *mut CaProplist,
        cb: Option<CaFinishCallback>,
        userdata: *mut c_void,
    ) -> c_int;
    fn ca_proplist_create(p: *mut *mut CaProplist) -> c_int;
    fn ca_proplist_destroy(p: *mut CaProplist) -> c_int;
    fn ca_proplist_sets(p: *mut CaProplist, key: *const c_char, value: *const c_char) -> c_int;
    fn ca_strerror(code: c_int) -> *const c_char;
}

const CA_SUCCESS: c_int = 0;

const PROP_EVENT_ID: &CStr = c"event.id";
const PROP_XDG_THEME_NAME: &CStr = c"canberra.xdg-theme.name";
const PROP_CACHE_CONTROL: &CStr = c"canberra.cache-control";

fn check(op: &'static str, code: c_int) -> Result<(), PlaybackError> {
    if code == CA_SUCCESS {
        return Ok(());
    }
    // SAFETY: ca_strerror returns a static string, or NULL for unknown codes.
    let message = unsafe {
        let s = ca_strerror(code);
        if s.is_null() {
            "unknown error".to_string()
        } else {
            CStr::from_ptr(s).to_string_lossy().into_owned()
        }
    };
    Err(PlaybackError::Canberra { op, code, message })
}

fn c_string(value: &str) -> Result<CString, PlaybackError> {
    CString::new(value).map_err(|_| PlaybackError::InvalidSetting(value.to_string()))
}

/// Runs on libcanberra's own thread once the cue is done; only raises the
/// abort signal.
extern "C" fn on_finished(_c: *mut CaContext, _id: u32, _error_code: c_int, userdata: *mut c_void) {
    crate::shutdown::raise_abort(userdata as usize as pid_t);
}

/// Owned `ca_proplist`.
struct Proplist(NonNull<CaProplist>);

impl Proplist {
    fn new() -> Result<Self, PlaybackError> {
        let mut raw = ptr::null_mut();
        // SAFETY: out-pointer to a local.
        check("ca_proplist_create", unsafe { ca_proplist_create(&mut raw) })?;
        NonNull::new(raw).map(Proplist).ok_or(PlaybackError::Canberra {
            op: "ca_proplist_create",
            code: CA_SUCCESS,
            message: "returned a null property list".to_string(),
        })
    }

    fn set(&mut self, key: &CStr, value: &CStr) -> Result<(), PlaybackError> {
        // SAFETY: the list is live; key and value are NUL-terminated and copied.
        check("ca_proplist_sets", unsafe {
            ca_proplist_sets(self.0.as_ptr(), key.as_ptr(), value.as_ptr())
        })
    }
}

impl Drop for Proplist {
    fn drop(&mut self) {
        // SAFETY: created in `new`, released exactly once.
        unsafe {
            ca_proplist_destroy(self.0.as_ptr());
        }
    }
}

/// Owned `ca_context`.
struct Context(NonNull<CaContext>);

impl Context {
    fn new() -> Result<Self, PlaybackError> {
        let mut raw = ptr::null_mut();
        // SAFETY: out-pointer to a local.
        check("ca_context_create", unsafe { ca_context_create(&mut raw) })?;
        NonNull::new(raw).map(Context).ok_or(PlaybackError::Canberra {
            op: "ca_context_create",
            code: CA_SUCCESS,
            message: "returned a null context".to_string(),
        })
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        // SAFETY: created in `new`, released exactly once.
        unsafe {
            ca_context_destroy(self.0.as_ptr());
        }
    }
}

pub struct CanberraPlayer {
    props: Proplist,
    context: Context,
}

impl CanberraPlayer {
    /// Create the playback context for `theme` on output `driver`.
    ///
    /// libcanberra starts its worker threads here, so handled signals should
    /// already be blocked on the calling thread.
    pub fn new(theme: &str, driver: &str) -> Result<Self, PlaybackError> {
        let theme = c_string(theme)?;
        let driver = c_string(driver)?;

        let mut props = Proplist::new()?;
        props.set(PROP_XDG_THEME_NAME, &theme)?;
        props.set(PROP_CACHE_CONTROL, c"volatile")?;

        let context = Context::new()?;
        // SAFETY: the context is live; `driver` is NUL-terminated and copied.
        check("ca_context_set_driver", unsafe {
            ca_context_set_driver(context.0.as_ptr(), driver.as_ptr())
        })?;

        debug!(
            theme = %theme.to_string_lossy(),
            driver = %driver.to_string_lossy(),
            "libcanberra ready"
        );
        Ok(Self { props, context })
    }
}

impl Player for CanberraPlayer {
    fn play(&mut self, event: &SoundEvent) -> Result<(), PlaybackError> {
        let name = c_string(event.name())?;

        let (callback, userdata): (Option<CaFinishCallback>, *mut c_void) = match event.on_complete {
            Some(completion) => (Some(on_finished as CaFinishCallback), completion.target as usize as *mut c_void),
            None => (None, ptr::null_mut()),
        };

        self.props.set(PROP_EVENT_ID, &name)?;
        // SAFETY: context and property list are live for &mut self; libcanberra
        // copies the property list before returning.
        check("ca_context_play_full", unsafe {
            ca_context_play_full(self.context.0.as_ptr(), 0, self.props.0.as_ptr(), callback, userdata)
        })?;

        trace!(cue = %event.cue, "play requested");
        Ok(())
    }
}
