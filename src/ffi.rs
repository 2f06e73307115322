//! C ABI function exports for the proc runtime
//!
//! Host-language drivers build a network from IR text, feed and drain
//! bits-typed channels, and tick. All functions take the opaque
//! [`ProcSimContext`] returned by `proc_sim_create`.
//!
//! Status codes: `0` success, `-1` error. Functions that take `error_out`
//! write a message there on error; free it with `proc_sim_free_error`.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_ulong};
use std::ptr;
use std::slice;

use crate::config::RuntimeConfig;
use crate::error::Error;
use crate::evaluator::EngineKind;
use crate::ir::parser::parse_package;
use crate::ir::value::compute_mask;
use crate::ir::Value;
use crate::runtime::ProcRuntime;

// ============================================================================
// Simulator Context
// ============================================================================

/// Opaque simulator context passed to all FFI functions
pub struct ProcSimContext {
    pub runtime: ProcRuntime,
}

impl ProcSimContext {
    pub fn new(ir: &str, engine: EngineKind) -> Result<Self, Error> {
        let package = parse_package(ir)?;
        let runtime = ProcRuntime::new(package, RuntimeConfig::with_engine(engine))?;
        Ok(Self { runtime })
    }
}

fn engine_from_code(code: c_int) -> Option<EngineKind> {
    match code {
        0 => Some(EngineKind::Interpreter),
        1 => Some(EngineKind::Compiled),
        _ => None,
    }
}

unsafe fn set_error(error_out: *mut *mut c_char, message: String) {
    if error_out.is_null() {
        return;
    }
    let message = CString::new(message.replace('\0', " ")).unwrap_or_default();
    *error_out = message.into_raw();
}

unsafe fn channel_name<'a>(name: *const c_char) -> Option<&'a str> {
    if name.is_null() {
        return None;
    }
    CStr::from_ptr(name).to_str().ok()
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Create a proc runtime from textual IR
/// `engine`: 0 = interpreter, 1 = compiled
/// Returns null on error, error message written to error_out if provided
#[no_mangle]
pub unsafe extern "C" fn proc_sim_create(
    ir: *const c_char,
    ir_len: usize,
    engine: c_int,
    error_out: *mut *mut c_char,
) -> *mut ProcSimContext {
    if ir.is_null() {
        set_error(error_out, "IR text is null".to_string());
        return ptr::null_mut();
    }
    let ir_slice = slice::from_raw_parts(ir as *const u8, ir_len);
    let ir_str = match std::str::from_utf8(ir_slice) {
        Ok(s) => s,
        Err(e) => {
            set_error(error_out, format!("Invalid UTF-8 in IR: {}", e));
            return ptr::null_mut();
        }
    };
    let Some(engine) = engine_from_code(engine) else {
        set_error(error_out, format!("Unknown engine code {}", engine));
        return ptr::null_mut();
    };

    match ProcSimContext::new(ir_str, engine) {
        Ok(ctx) => Box::into_raw(Box::new(ctx)),
        Err(e) => {
            set_error(error_out, e.to_string());
            ptr::null_mut()
        }
    }
}

/// Destroy a proc runtime
#[no_mangle]
pub unsafe extern "C" fn proc_sim_destroy(ctx: *mut ProcSimContext) {
    if !ctx.is_null() {
        drop(Box::from_raw(ctx));
    }
}

/// Free an error string written to an error_out parameter
#[no_mangle]
pub unsafe extern "C" fn proc_sim_free_error(error: *mut c_char) {
    if !error.is_null() {
        drop(CString::from_raw(error));
    }
}

/// Free a string returned by proc_sim functions
#[no_mangle]
pub unsafe extern "C" fn proc_sim_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Run one network tick
#[no_mangle]
pub unsafe extern "C" fn proc_sim_tick(ctx: *mut ProcSimContext, error_out: *mut *mut c_char) -> c_int {
    if ctx.is_null() {
        return -1;
    }
    let ctx = &mut *ctx;
    match ctx.runtime.tick() {
        Ok(()) => 0,
        Err(e) => {
            set_error(error_out, e.to_string());
            -1
        }
    }
}

/// Tick until no proc with channel I/O makes progress
/// `max_ticks` of 0 uses the configured default budget.
/// The number of productive ticks is written to ticks_out if provided.
#[no_mangle]
pub unsafe extern "C" fn proc_sim_tick_until_blocked(
    ctx: *mut ProcSimContext,
    max_ticks: c_ulong,
    ticks_out: *mut c_ulong,
    error_out: *mut *mut c_char,
) -> c_int {
    if ctx.is_null() {
        return -1;
    }
    let ctx = &mut *ctx;
    let max_ticks = if max_ticks == 0 { None } else { Some(max_ticks as u64) };
    match ctx.runtime.tick_until_blocked(max_ticks) {
        Ok(ticks) => {
            if !ticks_out.is_null() {
                *ticks_out = ticks as c_ulong;
            }
            0
        }
        Err(e) => {
            set_error(error_out, e.to_string());
            -1
        }
    }
}

/// Reset procs and channels to their initial state
#[no_mangle]
pub unsafe extern "C" fn proc_sim_reset(ctx: *mut ProcSimContext) {
    if ctx.is_null() {
        return;
    }
    (*ctx).runtime.reset_state();
}

// ============================================================================
// Channel Access
// ============================================================================

/// Number of values stored in a channel queue
/// Returns -1 for an unknown channel
#[no_mangle]
pub unsafe extern "C" fn proc_sim_queue_size(ctx: *const ProcSimContext, channel: *const c_char) -> c_int {
    if ctx.is_null() {
        return -1;
    }
    let Some(name) = channel_name(channel) else {
        return -1;
    };
    match (*ctx).runtime.queue(name) {
        Ok(queue) => queue.size() as c_int,
        Err(_) => -1,
    }
}

/// Write a value to a bits-typed channel
/// Returns -1 for an unknown channel, a non-bits channel, or a value that
/// does not fit the channel width
#[no_mangle]
pub unsafe extern "C" fn proc_sim_write_bits(
    ctx: *mut ProcSimContext,
    channel: *const c_char,
    value: c_ulong,
) -> c_int {
    if ctx.is_null() {
        return -1;
    }
    let Some(name) = channel_name(channel) else {
        return -1;
    };
    let Ok(queue) = (*ctx).runtime.queue(name) else {
        return -1;
    };
    let Some(width) = queue.channel().ty.bit_width() else {
        return -1;
    };
    let value = value as u64;
    if value & !compute_mask(width) != 0 {
        return -1;
    }
    match queue.write(Value::ubits(width, value)) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Read a value from a bits-typed channel
/// Returns 1 and writes value_out when a value was read, 0 when the queue
/// is empty, -1 on error
#[no_mangle]
pub unsafe extern "C" fn proc_sim_read_bits(
    ctx: *mut ProcSimContext,
    channel: *const c_char,
    value_out: *mut c_ulong,
) -> c_int {
    if ctx.is_null() || value_out.is_null() {
        return -1;
    }
    let Some(name) = channel_name(channel) else {
        return -1;
    };
    let Ok(queue) = (*ctx).runtime.queue(name) else {
        return -1;
    };
    match queue.read() {
        Ok(Some(value)) => match value.bits_value() {
            Some(bits) => {
                *value_out = bits as c_ulong;
                1
            }
            None => -1,
        },
        Ok(None) => 0,
        Err(_) => -1,
    }
}

/// Textual IR of the loaded package (caller must free with proc_sim_free_string)
#[no_mangle]
pub unsafe extern "C" fn proc_sim_dump_ir(ctx: *const ProcSimContext) -> *mut c_char {
    if ctx.is_null() {
        return ptr::null_mut();
    }
    match CString::new((*ctx).runtime.package().dump_ir()) {
        Ok(s) => s.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASS_THROUGH: &str = r#"package pass

chan in(bits[32], id=0, kind=streaming, ops=receive_only, flow_control=ready_valid, metadata="")
chan out(bits[32], id=1, kind=streaming, ops=send_only, flow_control=ready_valid, metadata="")

proc pass(tkn: token, init={}) {
  receive.1: (token, bits[32]) = receive(tkn, channel=in)
  tuple_index.2: token = tuple_index(receive.1, index=0)
  tuple_index.3: bits[32] = tuple_index(receive.1, index=1)
  send.4: token = send(tuple_index.2, tuple_index.3, channel=out)
  next (send.4)
}
"#;

    unsafe fn create(ir: &str, engine: c_int) -> (*mut ProcSimContext, Option<String>) {
        let mut error: *mut c_char = ptr::null_mut();
        let ctx = proc_sim_create(ir.as_ptr() as *const c_char, ir.len(), engine, &mut error);
        let message = if error.is_null() {
            None
        } else {
            let message = CStr::from_ptr(error).to_string_lossy().into_owned();
            proc_sim_free_error(error);
            Some(message)
        };
        (ctx, message)
    }

    #[test]
    fn test_pass_through_over_c_abi() {
        unsafe {
            for engine in [0, 1] {
                let (ctx, error) = create(PASS_THROUGH, engine);
                assert!(!ctx.is_null(), "{:?}", error);
                let input = CString::new("in").unwrap();
                let output = CString::new("out").unwrap();

                assert_eq!(proc_sim_write_bits(ctx, input.as_ptr(), 10), 0);
                assert_eq!(proc_sim_write_bits(ctx, input.as_ptr(), 20), 0);
                assert_eq!(proc_sim_write_bits(ctx, input.as_ptr(), 1 << 40), -1);
                assert_eq!(proc_sim_queue_size(ctx, input.as_ptr()), 2);

                let mut ticks: c_ulong = 0;
                assert_eq!(proc_sim_tick_until_blocked(ctx, 10, &mut ticks, ptr::null_mut()), 0);
                // Two transfers, then a tick that only reaches the empty receive.
                assert_eq!(ticks, 3);

                let mut value: c_ulong = 0;
                assert_eq!(proc_sim_read_bits(ctx, output.as_ptr(), &mut value), 1);
                assert_eq!(value, 10);
                assert_eq!(proc_sim_read_bits(ctx, output.as_ptr(), &mut value), 1);
                assert_eq!(value, 20);
                assert_eq!(proc_sim_read_bits(ctx, output.as_ptr(), &mut value), 0);

                let mut error: *mut c_char = ptr::null_mut();
                assert_eq!(proc_sim_tick(ctx, &mut error), -1);
                let message = CStr::from_ptr(error).to_string_lossy().into_owned();
                assert_eq!(message, "Proc network is deadlocked. Blocked channels: in");
                proc_sim_free_error(error);

                proc_sim_destroy(ctx);
            }
        }
    }

    #[test]
    fn test_create_errors() {
        unsafe {
            let (ctx, error) = create("package p\nfn f() {}", 0);
            assert!(ctx.is_null());
            assert!(error.is_some());

            let (ctx, error) = create(PASS_THROUGH, 7);
            assert!(ctx.is_null());
            assert_eq!(error.as_deref(), Some("Unknown engine code 7"));
        }
    }

    #[test]
    fn test_dump_ir_roundtrips() {
        unsafe {
            let (ctx, _) = create(PASS_THROUGH, 1);
            let text = proc_sim_dump_ir(ctx);
            assert!(!text.is_null());
            let dumped = CStr::from_ptr(text).to_str().unwrap().to_string();
            proc_sim_free_string(text);
            assert_eq!(parse_package(&dumped).unwrap(), (*ctx).runtime.package().clone());
            proc_sim_destroy(ctx);
        }
    }
}
