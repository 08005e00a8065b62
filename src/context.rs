//! Machine context save and restore
//!
//! Wraps the POSIX ucontext family into the three operations the
//! dispatcher relies on: prime a fresh context onto a new stack, swap the
//! CPU out of one context into another, and activate a context without
//! saving anything. A saved context carries the stack pointer, resume
//! address, callee-saved registers, and the signal mask.

use std::mem;
use std::ptr;

use crate::error::fatal;
use crate::stack::Stack;

/// Saved CPU state of one thread.
///
/// The blob is boxed and never moves after capture: glibc's `mcontext_t`
/// holds an interior pointer into the structure, so a captured context is
/// only valid at the address it was captured at.
pub struct MachineContext {
    inner: Box<libc::ucontext_t>,
}

// All contexts live and die on the single kernel thread that runs the
// scheduler; nothing here ever crosses OS threads.
unsafe impl Send for MachineContext {}

impl MachineContext {
    /// An empty context, to be filled by the first swap out of it.
    pub fn new() -> Self {
        Self {
            inner: Box::new(unsafe { mem::zeroed() }),
        }
    }

    /// Arrange for a later activation to enter `entry` on `stack` with an
    /// empty signal mask.
    ///
    /// The mask must be cleared explicitly: priming happens inside a
    /// masked critical section, and `getcontext` captures that mask.
    pub fn prime(&mut self, stack: &Stack, entry: extern "C" fn()) {
        let ucp = self.as_raw();
        unsafe {
            if libc::getcontext(ucp) != 0 {
                fatal("failed to capture a machine context");
            }
            (*ucp).uc_link = ptr::null_mut();
            (*ucp).uc_stack.ss_sp = stack.base() as *mut libc::c_void;
            (*ucp).uc_stack.ss_size = stack.len();
            (*ucp).uc_stack.ss_flags = 0;
            if libc::sigemptyset(&mut (*ucp).uc_sigmask) != 0 {
                fatal("failed to clear a context signal mask");
            }
            libc::makecontext(ucp, entry, 0);
        }
    }

    /// Raw pointer for the dispatcher, valid for the lifetime of the box.
    pub fn as_raw(&mut self) -> *mut libc::ucontext_t {
        &mut *self.inner
    }

    /// Capture the CPU into `from` and resume `to`.
    ///
    /// Returns when `from` is next dispatched.
    ///
    /// # Safety
    /// Both pointers must come from live `MachineContext` boxes, and `to`
    /// must hold a primed or previously captured context.
    pub unsafe fn swap(from: *mut libc::ucontext_t, to: *const libc::ucontext_t) {
        if libc::swapcontext(from, to) != 0 {
            fatal("failed to switch machine contexts");
        }
    }

    /// Resume `to` without saving the current CPU state.
    ///
    /// Used when the outgoing thread is a reaped corpse.
    ///
    /// # Safety
    /// `to` must hold a primed or previously captured context.
    pub unsafe fn activate(to: *const libc::ucontext_t) -> ! {
        libc::setcontext(to);
        // setcontext only returns on failure.
        fatal("failed to activate a machine context");
    }
}
