use super::*;

#[test]
fn default_is_localhost_fallbacks_only() {
    assert_eq!(EndpointCandidates::new().build(), ["ws://localhost:3000", "ws://127.0.0.1:3000"]);
}

#[test]
fn order_is_overrides_env_origin_then_localhost() {
    let list = EndpointCandidates::new()
        .with_overrides(["ws://primary:9000"])
        .with_env_endpoint(Some("https://fleet.example.com".into()))
        .with_page_origin(Some("http://preview.example.com".into()))
        .build();
    assert_eq!(
        list,
        [
            "ws://primary:9000",
            "wss://fleet.example.com",
            "ws://preview.example.com",
            "ws://localhost:3000",
            "ws://127.0.0.1:3000",
        ]
    );
}

#[test]
fn duplicates_keep_first_position() {
    let list = EndpointCandidates::new()
        .with_overrides(["ws://localhost:3000/", "ws://localhost:3000"])
        .with_env_endpoint(Some("http://localhost:3000".into()))
        .build();
    assert_eq!(list, ["ws://localhost:3000", "ws://127.0.0.1:3000"]);
}

#[test]
fn page_origin_yields_one_candidate_per_live_url() {
    let list = EndpointCandidates::new()
        .with_page_origin(Some("http://fleet.local:3000".into()))
        .without_localhost()
        .build();
    assert_eq!(list, ["ws://fleet.local:3000"]);
    let urls: Vec<String> = list.iter().map(|c| live_url(c)).collect();
    assert_eq!(urls, ["ws://fleet.local:3000/api/socketio"]);
}

#[test]
fn candidates_differing_only_in_scheme_or_path_collapse() {
    let list = EndpointCandidates::new()
        .with_overrides(["ws://edge:4000/api/socketio", "http://edge:4000", "ws://edge:4000"])
        .with_env_endpoint(Some("https://secure.example.com".into()))
        .with_page_origin(Some("wss://secure.example.com/".into()))
        .without_localhost()
        .build();
    assert_eq!(list, ["ws://edge:4000/api/socketio", "wss://secure.example.com"]);
}

#[test]
fn without_localhost_and_blank_entries() {
    let list = EndpointCandidates::new()
        .with_overrides(["", "   "])
        .with_env_endpoint(Some("wss://edge.example.com".into()))
        .without_localhost()
        .build();
    assert_eq!(list, ["wss://edge.example.com"]);
}

#[test]
fn scheme_translation_both_ways() {
    assert_eq!(to_live_scheme("https://a.b"), "wss://a.b");
    assert_eq!(to_live_scheme("http://a.b:3000"), "ws://a.b:3000");
    assert_eq!(to_live_scheme("ws://a.b"), "ws://a.b");
    assert_eq!(to_http_scheme("wss://a.b"), "https://a.b");
    assert_eq!(to_http_scheme("ws://a.b:3000"), "http://a.b:3000");
}

#[test]
fn live_url_appends_channel_path_once() {
    assert_eq!(live_url("http://localhost:3000"), "ws://localhost:3000/api/socketio");
    assert_eq!(live_url("ws://localhost:3000/"), "ws://localhost:3000/api/socketio");
    assert_eq!(live_url("ws://localhost:3000/api/socketio"), "ws://localhost:3000/api/socketio");
}

#[test]
fn probe_target_fills_default_ports() {
    assert_eq!(probe_target("wss://fleet.example.com/x").as_deref(), Some("fleet.example.com:443"));
    assert_eq!(probe_target("http://fleet.example.com").as_deref(), Some("fleet.example.com:80"));
    assert_eq!(probe_target("ws://127.0.0.1:3000").as_deref(), Some("127.0.0.1:3000"));
    assert_eq!(probe_target("ftp://nope"), None);
}
