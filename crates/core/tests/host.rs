//! Tests for host type normalization.

use fleetbench_core::{Host, HostKind, normalize_kind};

#[test]
fn ollama_is_case_folded_and_trimmed() {
    assert_eq!(normalize_kind("  Ollama "), "ollama");
    assert_eq!(normalize_kind("OLLAMA"), "ollama");
}

#[test]
fn llamacpp_spellings_collapse() {
    for raw in ["llamacpp", "llama.cpp", "Llama-CPP", "llama_cpp", "llama-server"] {
        assert_eq!(normalize_kind(raw), "llamacpp", "spelling {raw}");
    }
}

#[test]
fn unknown_type_passes_through() {
    assert_eq!(normalize_kind(" vLLM "), "vllm");
    assert_eq!(normalize_kind(""), "");
}

#[test]
fn kind_key_uses_declared_type() {
    let host = Host::new("http://10.0.0.12:8080", "llama.cpp");
    assert_eq!(host.kind_key(), "llamacpp");
    assert_eq!(HostKind::from_key(&host.kind_key()), Some(HostKind::LlamaCpp));
}

#[test]
fn host_deserializes_type_field() {
    let host: Host = serde_json::from_str(
        r#"{"address": "http://gpu-a:11434", "type": "ollama", "name": "gpu-a"}"#,
    )
    .unwrap();
    assert_eq!(host.kind, "ollama");
    assert_eq!(host.label(), "gpu-a");
    assert!(host.metadata.is_empty());
}
