//! `pagepulse-replay` 바이너리 통합 테스트.

use std::io::Write;
use std::process::Command;

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn replays_trace_file_and_prints_rating() {
    let trace = write_temp(
        r#"{
            "page": {"url": "https://shop.example.com/", "hostname": "shop.example.com"},
            "elements": [
                {"tag": "link", "attrs": {"rel": "stylesheet", "href": "/css/theme.css"}}
            ],
            "steps": [
                {"type": "vital", "name": "LCP", "value": 5200},
                {"type": "vital", "name": "FCP", "value": 1800},
                {"type": "network", "online": false},
                {"type": "event", "name": "cta_click", "params": {"id": "hero"}}
            ]
        }"#,
    );

    let output = Command::new(env!("CARGO_BIN_EXE_pagepulse-replay"))
        .arg(trace.path())
        .args(["--log-level", "error"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    // (85 + 100) / 2
    assert_eq!(result["rating"]["score"], 92.5);
    assert_eq!(result["rating"]["level"], "good");
    assert_eq!(result["mitigation"]["LCP"]["runs"], 1);
    assert_eq!(result["pending"], serde_json::json!(["cta_click"]));
    assert_eq!(result["dom"][0]["attrs"]["media"], "print");
    // 기본 핵심 리소스 프리로드는 문서 끝에 추가
    assert_eq!(
        result["dom"][1]["attrs"]["href"],
        "/fonts/inter-v12-latin-regular.woff2"
    );
    assert_eq!(result["dom"][2]["attrs"]["href"], "/images/hero.webp");
}

#[test]
fn invalid_config_fails_with_message() {
    let trace = write_temp(r#"{"steps": []}"#);
    let config = write_temp(r#"{"queue": {"max_attempts": 1}}"#);

    let output = Command::new(env!("CARGO_BIN_EXE_pagepulse-replay"))
        .arg(trace.path())
        .arg("--config")
        .arg(config.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("queue.max_attempts"));
}
