#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Server messages are produced locally, but clients of other SDKs parse
    // them; keep the deserializer robust against arbitrary bytes too.
    let _ = serde_json::from_slice::<gambit_server::protocol::ServerMessage>(data);

    if let Ok(s) = std::str::from_utf8(data) {
        let _ = serde_json::from_str::<gambit_server::protocol::ServerMessage>(s);
    }
});
