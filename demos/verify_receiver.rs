use bytes::Bytes;
use http::Request;
use webhook_jobs::{
    compute_signature, verify_signed_request, SignatureScheme, SigningSecrets, SIGNATURE_HEADER,
    TIMESTAMP_HEADER,
};

fn main() {
    let secrets = SigningSecrets::new("supersecret").with_next("rotated");
    let payload = r#"{"name":"sarim"}"#;
    let timestamp = "1700000000";
    let now_secs = 1_700_000_200;

    // Signed with the next secret, as a sender would be mid-rotation.
    let signature = compute_signature(b"rotated", payload.as_bytes(), timestamp);

    let request = Request::post("/jobs/email")
        .header(SIGNATURE_HEADER, signature)
        .header(TIMESTAMP_HEADER, timestamp)
        .body(Bytes::from_static(payload.as_bytes()))
        .unwrap();

    let result = verify_signed_request(
        &request,
        &secrets,
        &SignatureScheme::default(),
        now_secs,
    );
    println!("verified: {result:?}");
}
