//! WASM guest transport for plugins compiled to `.wasm` (§4.4). Adapted
//! from the teacher's Wasmtime/WASIP1 stdio-JSON approach: the guest is
//! compiled once, instantiated fresh per call with its own linear
//! memory and I/O pipes, and talks over stdin/stdout using the same
//! [`crate::rpc::PluginRequest`]/[`crate::rpc::PluginResponse`] shapes
//! used by subprocess plugins, so the capability broker and timeout
//! logic in `host.rs` don't need to know which transport is in play.

use std::path::Path;

use scrybe_types::ScrybeError;
use wasmtime::{Config, Engine, Linker, Module, Store};
use wasmtime_wasi::preview1::{add_to_linker_sync, WasiP1Ctx};
use wasmtime_wasi::pipe::{MemoryInputPipe, MemoryOutputPipe};
use wasmtime_wasi::WasiCtxBuilder;

use crate::rpc::{PluginRequest, PluginResponse, ResponseStatus};

struct GuestState {
    wasi: WasiP1Ctx,
}

/// A loaded, AOT-compiled WASM plugin module. One instance is created
/// per plugin at host startup; `call` re-instantiates per invocation
/// (stateless, one-shot execution — no persistent WASM state between
/// calls, matching the teacher's `WasmTool`).
#[derive(Clone)]
pub struct WasmPlugin {
    engine: Engine,
    module: Module,
}

impl WasmPlugin {
    pub fn load(path: &Path) -> Result<Self, ScrybeError> {
        let bytes = std::fs::read(path)
            .map_err(|e| ScrybeError::DependencyUnavailable(format!("reading wasm plugin {}: {e}", path.display())))?;

        let mut config = Config::new();
        config.async_support(false);
        let engine = Engine::new(&config)
            .map_err(|e| ScrybeError::DependencyUnavailable(format!("creating wasmtime engine: {e}")))?;
        let module = Module::new(&engine, &bytes)
            .map_err(|e| ScrybeError::SchemaMismatch(format!("compiling wasm module {}: {e}", path.display())))?;

        Ok(Self { engine, module })
    }

    /// Run one request/response call synchronously. Call this from a
    /// `spawn_blocking` context — Wasmtime's sync API must not run on an
    /// async executor thread.
    pub fn call_sync(&self, request: &PluginRequest, max_msg_bytes: usize) -> Result<PluginResponse, ScrybeError> {
        let stdin_bytes = serde_json::to_vec(request)
            .map_err(|e| ScrybeError::SchemaMismatch(format!("encoding request for wasm guest: {e}")))?;
        if stdin_bytes.len() > max_msg_bytes {
            return Err(ScrybeError::SchemaMismatch("request exceeds max_msg_bytes".to_string()));
        }

        let stdout_pipe = MemoryOutputPipe::new(max_msg_bytes);
        let stderr_pipe = MemoryOutputPipe::new(4 * 1024);

        let wasi = WasiCtxBuilder::new()
            .stdin(MemoryInputPipe::new(bytes::Bytes::from(stdin_bytes)))
            .stdout(stdout_pipe.clone())
            .stderr(stderr_pipe.clone())
            .build_p1();

        let mut store = Store::new(&self.engine, GuestState { wasi });
        let mut linker: Linker<GuestState> = Linker::new(&self.engine);
        add_to_linker_sync(&mut linker, |s: &mut GuestState| &mut s.wasi)
            .map_err(|e| ScrybeError::PluginCrash(format!("linking wasi: {e}")))?;

        let instance = linker
            .instantiate(&mut store, &self.module)
            .map_err(|e| ScrybeError::PluginCrash(format!("instantiating wasm module: {e}")))?;
        let start = instance
            .get_typed_func::<(), ()>(&mut store, "_start")
            .map_err(|e| ScrybeError::PluginCrash(format!("missing _start entry point: {e}")))?;

        // proc_exit(0) surfaces as a trap; treated as a clean exit the
        // same way the teacher's `WasmTool::run_sync` does.
        let _ = start.call(&mut store, ());
        drop(store);

        let out = stdout_pipe.contents();
        match serde_json::from_slice::<PluginResponse>(&out) {
            Ok(resp) => Ok(resp),
            Err(parse_err) => {
                let raw = String::from_utf8_lossy(&out);
                let stderr_raw = String::from_utf8_lossy(&stderr_pipe.contents());
                Ok(PluginResponse {
                    request_id: request.request_id,
                    status: ResponseStatus::Error,
                    payload: serde_json::json!({
                        "error": format!("guest produced non-JSON stdout: {parse_err}"),
                        "raw": raw,
                        "stderr": stderr_raw,
                    }),
                    quality_counters: serde_json::Value::Null,
                })
            }
        }
    }
}
