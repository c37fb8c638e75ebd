//! x86_64 context switching
//!
//! Saves and restores the System V callee-saved set. Caller-saved registers
//! are dead across the `switch` call boundary, so they need no slots.

use std::arch::naked_asm;

/// Callee-saved register set captured at a suspension point.
///
/// Field offsets are baked into the assembly below; keep them in sync.
#[repr(C)]
#[derive(Debug, Default)]
pub struct SavedRegs {
    pub rsp: u64,
    pub rip: u64,
    pub rbx: u64,
    pub rbp: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
}

/// Prepare `regs` so the first switch into it enters `entry(arg)` on the
/// stack ending at `stack_top`.
///
/// # Safety
///
/// `regs` must point to valid `SavedRegs` memory and `stack_top` must point
/// one past the highest usable byte of a mapped stack region.
pub unsafe fn init_context(regs: *mut SavedRegs, stack_top: *mut u8, entry: usize, arg: usize) {
    // 16-byte aligned before the trampoline's call, per the SysV AMD64 ABI.
    let sp = (stack_top as usize) & !0xF;

    let regs = &mut *regs;
    regs.rsp = sp as u64;
    regs.rip = entry_trampoline as usize as u64;
    regs.rbx = 0;
    regs.rbp = 0;
    regs.r12 = entry as u64;
    regs.r13 = arg as u64;
    regs.r14 = 0;
    regs.r15 = 0;
}

/// First landing point of a fresh context: forwards the argument in r13 to
/// the entry function in r12. The entry switches away for good, so falling
/// through is a hard fault.
#[unsafe(naked)]
unsafe extern "C" fn entry_trampoline() {
    naked_asm!(
        "mov rdi, r13",
        "call r12",
        "ud2",
    );
}

/// Save the current callee-saved state into `from` and continue from `to`.
///
/// Returns when something later switches back into `from`.
///
/// # Safety
///
/// Both pointers must reference valid `SavedRegs`. `to` must describe either
/// a live suspension point or a context prepared by `init_context`, and no
/// other kernel thread may be running on that state.
#[unsafe(naked)]
pub unsafe extern "C" fn switch(_from: *mut SavedRegs, _to: *const SavedRegs) {
    naked_asm!(
        // Save callee-saved registers into `from` (RDI)
        "mov [rdi + 0x00], rsp",
        "lea rax, [rip + 1f]",
        "mov [rdi + 0x08], rax",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], rbp",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], r13",
        "mov [rdi + 0x30], r14",
        "mov [rdi + 0x38], r15",
        // Load callee-saved registers from `to` (RSI)
        "mov rsp, [rsi + 0x00]",
        "mov rax, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov rbp, [rsi + 0x18]",
        "mov r12, [rsi + 0x20]",
        "mov r13, [rsi + 0x28]",
        "mov r14, [rsi + 0x30]",
        "mov r15, [rsi + 0x38]",
        "jmp rax",
        // Resume point for a saved context: return into its caller.
        "1:",
        "ret",
    );
}
