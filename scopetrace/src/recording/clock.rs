//! Monotonic clock and thread identity
//!
//! Both are read on every begin/end call, so they avoid allocation and
//! locking. The thread id is fetched from the kernel once per thread and
//! cached in a thread local.

use std::cell::Cell;

use crate::domain::{ThreadId, Timestamp};

/// Current `CLOCK_MONOTONIC` time in nanoseconds
#[allow(unsafe_code, clippy::cast_sign_loss)]
#[must_use]
pub fn now() -> Timestamp {
    let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    // SAFETY: `ts` is a valid, writable timespec for the duration of the call
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    Timestamp(ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64)
}

thread_local! {
    static THREAD_ID: Cell<Option<ThreadId>> = const { Cell::new(None) };
}

/// Opaque id of the calling thread
///
/// Unique among live threads; may be reused after a thread exits.
#[must_use]
pub fn current_thread_id() -> ThreadId {
    THREAD_ID.with(|cached| {
        if let Some(id) = cached.get() {
            return id;
        }
        let id = ThreadId(os_thread_id());
        cached.set(Some(id));
        id
    })
}

#[cfg(target_os = "linux")]
#[allow(unsafe_code, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn os_thread_id() -> u32 {
    // SAFETY: gettid takes no arguments and cannot fail
    unsafe { libc::syscall(libc::SYS_gettid) as u32 }
}

#[cfg(not(target_os = "linux"))]
fn os_thread_id() -> u32 {
    use std::sync::atomic::{AtomicU32, Ordering};

    static NEXT: AtomicU32 = AtomicU32::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}
