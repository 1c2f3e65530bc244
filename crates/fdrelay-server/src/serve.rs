//! The sequential service loop.

use std::io::{Read, Write};

use tracing::debug;

use fdrelay_proto::{frame, wire::WireError};

use crate::dispatch::Dispatcher;

/// Service one connected client: decode a request, dispatch it, send the
/// reply, repeat. Strictly sequential, so request ordering at the server
/// defines the cross-thread ordering the clients observe.
///
/// Returns only on client disconnect or a codec error; either way this
/// connection is finished. An invalid discriminator or truncated record is
/// not answered — the connection is dropped and the client observes a
/// transport error on its next exchange.
pub fn serve<S: Read + Write>(mut stream: S, dispatcher: &mut Dispatcher) -> Result<(), WireError> {
    loop {
        let request = frame::read_request(&mut stream)?;
        let opcode = request.opcode();
        let reply = dispatcher.dispatch(&request);
        debug!(
            ?opcode,
            result = reply.result,
            err = reply.err,
            "request handled"
        );
        frame::send_reply(&mut stream, opcode, &reply)?;
    }
}
