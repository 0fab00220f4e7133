#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use routewire::bgp::message::NlriCollection;
use routewire::bgp::nlri::AfiSafiType;

fuzz_target!(|data: (AfiSafiType, bool, Vec<u8>)| {
    let (afisafi, addpath, buf) = data;
    let raw = Bytes::from(buf);
    let received = NlriCollection::from_wire(raw.clone(), afisafi, addpath);
    let Ok(nlris) = received.nlris() else { return };

    for nlri in nlris {
        let _ = nlri.to_string();
    }
    let rebuilt = NlriCollection::from_nlris(
        nlris.to_vec(), afisafi, addpath
    ).expect("decoded NLRI are of the requested family");
    let again = NlriCollection::from_wire(rebuilt.packed(), afisafi, addpath);
    assert_eq!(again.nlris().ok(), Some(nlris));
});
