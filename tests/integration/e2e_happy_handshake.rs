// Scenario 1: a module reads the orchestrator's init record over its
// control channel and answers with a well-formed announce + identify.

use module_sdk::handshake::{read_init, send_announce};
use rt_wire::{AnnounceBlob, EndpointAnnounce};

#[tokio::test]
async fn init_record_drives_a_correct_announce() {
    let init_json = rt_test_support::sample_init_json("demo-module");
    let mut cursor = std::io::Cursor::new(format!("{init_json}\n").into_bytes());

    let init = read_init(&mut cursor).await.expect("valid init record");
    assert_eq!(init.module_id, "demo-module");
    assert_eq!(init.orchestrator_api, "http://127.0.0.1:9900");
    assert!(init.listen.is_tcp());

    let announce = AnnounceBlob {
        listen: "127.0.0.1:45678".to_owned(),
        endpoints: vec![EndpointAnnounce { path: "/ping".to_owned(), methods: vec!["GET".to_owned()], auth: None }],
    };
    let mut out = Vec::new();
    send_announce(&mut out, &announce).await.unwrap();

    assert!(out.ends_with(b"\n"));
    let parsed: AnnounceBlob = serde_json::from_slice(&out[..out.len() - 1]).unwrap();
    assert_eq!(parsed.endpoints.len(), 1);
    assert_eq!(parsed.endpoints[0].path, "/ping");
}

#[tokio::test]
async fn oversized_handshake_line_is_rejected() {
    let mut line = vec![b'{'; 2 * 1024 * 1024];
    line.push(b'\n');
    let mut cursor = std::io::Cursor::new(line);
    assert!(read_init(&mut cursor).await.is_err());
}
