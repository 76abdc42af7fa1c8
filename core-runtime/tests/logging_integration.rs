//! Integration tests for logging configuration and redaction helpers

use bridge_traits::LogLevel;
use core_runtime::logging::{
    default_filter, redact_if_sensitive, redact_url, strip_path, LogFormat, LoggingConfig,
};

#[test]
fn test_config_builder() {
    // Logging can only be initialized once per process, so only the
    // builder is exercised here.
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Debug)
        .with_spans(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Debug);
    assert!(config.enable_spans);
    assert!(config.logger_sink.is_none());
}

#[test]
fn test_token_fields_redacted() {
    assert_eq!(
        redact_if_sensitive("access_token", "BQD9x-secret"),
        "[REDACTED]"
    );
    assert_eq!(redact_if_sensitive("Authorization", "Bearer x"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("track_id", "remote:42"), "remote:42");
}

#[test]
fn test_stream_url_signature_dropped() {
    assert_eq!(
        redact_url("https://cdn.example/a.mp3?sig=abc&exp=1"),
        "https://cdn.example/a.mp3"
    );
    assert_eq!(
        redact_url("ivormusic://spotify-callback#access_token=abc"),
        "ivormusic://spotify-callback"
    );
    assert_eq!(redact_url("https://cdn.example/a.mp3"), "https://cdn.example/a.mp3");
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/home/user/Music/downloads/42.mp3"), "42.mp3");
    assert_eq!(strip_path("C:\\Users\\Ana\\Music\\song.mp3"), "song.mp3");
    assert_eq!(strip_path("song.mp3"), "song.mp3");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_default_filter_covers_workspace() {
    let filter = default_filter(LogLevel::Debug);
    for krate in ["core_playback", "core_auth", "core_service", "core_library"] {
        assert!(filter.contains(&format!("{krate}=debug")), "{filter}");
    }
}

#[test]
fn test_filter_override_kept_verbatim() {
    let config = LoggingConfig::default().with_filter("core_playback=trace,reqwest=info");
    assert_eq!(
        config.filter.as_deref(),
        Some("core_playback=trace,reqwest=info")
    );
}
