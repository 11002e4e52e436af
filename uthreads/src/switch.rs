//! The stack switch.
//!
//! A suspended thread is nothing but a stack pointer: the callee-saved
//! registers live on its stack, pushed by [`switch_stacks`] on the way out
//! and popped on the way back in. The System V ABI guarantees everything
//! else is dead across a call.

use core::arch::naked_asm;

/// Stack image consumed by [`switch_stacks`] the first time a thread is
/// dispatched: the registers the switch pops, the address it returns to, and
/// the boxed entry closure that [`start`] hands over.
#[repr(C)]
struct SwitchFrame<F: FnOnce()> {
    r15: usize,
    r14: usize,
    r13: usize,
    r12: usize,
    rbx: usize,
    rbp: usize,
    ret_addr: usize,
    thread_fn: *mut F,
    end_of_stack: usize,
}

/// Saves the callee-saved registers on the current stack, stores the
/// resulting stack pointer through `save_sp`, and resumes the context that
/// `next_sp` was saved from. Returns when some later switch restores the
/// saved context.
///
/// Must be entered with the quantum signal blocked; the landing context is
/// responsible for unblocking it.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn switch_stacks(_save_sp: *mut usize, _next_sp: usize) {
    naked_asm!(
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov [rdi], rsp",
        "mov rsp, rsi",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
    )
}

/// First landing point of a fresh thread. The word on top of the stack is
/// the boxed entry closure; pass it along as the first argument.
#[unsafe(naked)]
unsafe extern "C" fn start<F: FnOnce() + 'static>() -> ! {
    naked_asm!("pop rdi", "jmp {}", sym thread_start::<F>)
}

extern "C" fn thread_start<F: FnOnce() + 'static>(thread_fn: *mut F) -> ! {
    // Still running with the quantum signal blocked: clean up after a thread
    // that died handing control to us, then open the preemption window.
    crate::runtime::expect().reap();
    crate::signal::unblock_quantum();
    let f = unsafe { Box::from_raw(thread_fn) };
    f();
    let tid = crate::current();
    let _ = crate::terminate(tid);
    unreachable!("terminated thread kept running")
}

/// Lays the initial [`SwitchFrame`] just below the aligned top of `stack`
/// and returns the stack pointer to dispatch from.
pub(crate) fn prepare_stack<F>(stack: &mut [u8], thread_fn: F) -> usize
where
    F: FnOnce() + 'static,
{
    let top = (stack.as_ptr() as usize + stack.len()) & !0xf;
    let frame_addr = top - size_of::<SwitchFrame<F>>();
    let frame = frame_addr as *mut SwitchFrame<F>;
    unsafe {
        frame.write(SwitchFrame {
            r15: 0,
            r14: 0,
            r13: 0,
            r12: 0,
            rbx: 0,
            rbp: 0,
            ret_addr: start::<F> as usize,
            thread_fn: Box::into_raw(Box::new(thread_fn)),
            end_of_stack: 0,
        });
    }
    frame_addr
}
