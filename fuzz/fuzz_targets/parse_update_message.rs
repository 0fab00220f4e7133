#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use routewire::bgp::message::{SessionConfig, UpdateMessage};

fuzz_target!(|data: (Vec<u8>, SessionConfig)| {
    let (buf, config) = data;
    let Ok(upd) = UpdateMessage::from_octets(Bytes::from(buf), &config) else {
        return
    };
    for pa in upd.attributes().iter() {
        let _ = pa.decode(&config);
    }
    let _ = upd.as_path();
    let _ = upd.is_eor();

    let Ok(collections) = upd.collections() else { return };
    // Whatever we could parse, we must be able to send back.
    let reply = config.as_peer();
    for coll in collections {
        if let Ok(msgs) = coll.pack(&reply) {
            for msg in msgs {
                assert!(msg.as_ref().len() <= reply.max_message_size());
            }
        }
    }
});
