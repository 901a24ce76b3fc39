//! Fault-signal diagnostics.
//!
//! SIGSEGV and SIGBUS get a handler that writes a one-line diagnostic with
//! the node id before handing control back to the default action, so a
//! crashing node at least says which member of the cluster it was. The
//! handler sticks to async-signal-safe calls: raw `write` and re-raise.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Once;

// Layer 2: Third-party crate imports
// (nix, under cfg below)

// Layer 3: Internal module imports
use crate::util::NodeId;

static FAULT_NODE: AtomicU32 = AtomicU32::new(0);
static INSTALL: Once = Once::new();

/// Install the diagnostic handlers once per process.
#[cfg(unix)]
pub(crate) fn install(node: NodeId) {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    FAULT_NODE.store(node.raw(), Ordering::Relaxed);
    INSTALL.call_once(|| {
        let action = SigAction::new(
            SigHandler::Handler(fault_handler),
            SaFlags::empty(),
            SigSet::empty(),
        );
        unsafe {
            let _ = sigaction(Signal::SIGSEGV, &action);
            let _ = sigaction(Signal::SIGBUS, &action);
        }
    });
}

/// No fault handlers off Unix.
#[cfg(not(unix))]
pub(crate) fn install(node: NodeId) {
    FAULT_NODE.store(node.raw(), Ordering::Relaxed);
    INSTALL.call_once(|| {});
}

#[cfg(unix)]
extern "C" fn fault_handler(signum: nix::libc::c_int) {
    use nix::libc;
    use nix::sys::signal::{signal, SigHandler, Signal};

    // write(2) only: this runs in a corrupted process.
    let mut line = [0u8; 64];
    let mut at = 0;
    for byte in b"niobium: fatal signal " {
        line[at] = *byte;
        at += 1;
    }
    at += write_u32(&mut line[at..], signum as u32);
    for byte in b" on node " {
        line[at] = *byte;
        at += 1;
    }
    at += write_u32(&mut line[at..], FAULT_NODE.load(Ordering::Relaxed));
    line[at] = b'\n';
    at += 1;
    unsafe {
        let _ = libc::write(libc::STDERR_FILENO, line.as_ptr().cast(), at);
    }

    // Back to the default action so the process still dumps core.
    if let Ok(sig) = Signal::try_from(signum) {
        unsafe {
            let _ = signal(sig, SigHandler::SigDfl);
        }
        let _ = nix::sys::signal::raise(sig);
    }
}

/// Render `value` in decimal into `out`; returns bytes written.
/// Async-signal-safe: no allocation, no formatting machinery.
#[cfg(unix)]
fn write_u32(out: &mut [u8], mut value: u32) -> usize {
    let mut digits = [0u8; 10];
    let mut count = 0;
    loop {
        digits[count] = b'0' + (value % 10) as u8;
        value /= 10;
        count += 1;
        if value == 0 {
            break;
        }
    }
    for i in 0..count {
        out[i] = digits[count - 1 - i];
    }
    count
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_write_u32_renders_decimal() {
        let mut out = [0u8; 10];
        assert_eq!(write_u32(&mut out, 0), 1);
        assert_eq!(&out[..1], b"0");
        assert_eq!(write_u32(&mut out, 11), 2);
        assert_eq!(&out[..2], b"11");
        assert_eq!(write_u32(&mut out, 4096), 4);
        assert_eq!(&out[..4], b"4096");
    }

    #[test]
    fn test_install_is_idempotent() {
        install(NodeId::from_raw(1));
        install(NodeId::from_raw(1));
    }
}
