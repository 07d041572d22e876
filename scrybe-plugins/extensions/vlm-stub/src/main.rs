//! Illustrative out-of-process vision-language captioner.
//!
//! Same stdio frame protocol as `ocr-stub`: one request frame in, one
//! response frame out, then exit. Produces a fixed placeholder caption
//! rather than running any real model — this exists to demonstrate that
//! a second, independent plugin binary can register for a different
//! `derived.text.*` capability and be dispatched the same way, not to
//! caption anything for real.

use std::io::{self, Read, Write};

use serde_json::{json, Value};
use uuid::Uuid;

const MAX_MSG_BYTES: usize = 16 * 1024 * 1024;

fn read_frame<R: Read>(reader: &mut R) -> io::Result<Value> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_MSG_BYTES {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "request frame exceeds size cap"));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    serde_json::from_slice(&body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn write_frame<W: Write>(writer: &mut W, value: &Value) -> io::Result<()> {
    let body = serde_json::to_vec(value)?;
    writer.write_all(&(body.len() as u32).to_be_bytes())?;
    writer.write_all(&body)?;
    writer.flush()
}

fn main() {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut stdin = stdin.lock();
    let mut stdout = stdout.lock();

    let request = match read_frame(&mut stdin) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("vlm-stub: failed to read request frame: {e}");
            std::process::exit(1);
        }
    };

    let request_id = request.get("request_id").cloned().unwrap_or_else(|| json!(Uuid::nil()));
    let capability = request.get("capability").and_then(Value::as_str).unwrap_or("");
    let frame_id = request.get("payload").and_then(|p| p.get("frame_id")).and_then(Value::as_str).unwrap_or("unknown-frame");

    let response = if capability != "records.write(derived.text.vlm)" {
        json!({
            "request_id": request_id,
            "status": "error",
            "payload": {"error": format!("vlm-stub does not implement capability `{capability}`")},
            "quality_counters": {},
        })
    } else {
        json!({
            "request_id": request_id,
            "status": "ok",
            "payload": {
                "text": format!("[vlm-stub] placeholder caption for frame {frame_id}"),
                "spans": [],
            },
            "quality_counters": {"confidence": 0.0},
        })
    };

    if let Err(e) = write_frame(&mut stdout, &response) {
        eprintln!("vlm-stub: failed to write response frame: {e}");
        std::process::exit(1);
    }
}
