//! CLI command implementations

use crate::output::{seconds, to_json, OutputFormat};
use chrono::{DateTime, Utc};
use kino_engine::{
    CapabilityRegistry, Engine, EngineEvent, MediaConfig, MemorySink, SourceKind, TrackSnapshot,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use url::Url;

/// Read a media config from a local path or an http(s) URL
pub async fn load_config(location: &str) -> anyhow::Result<MediaConfig> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let url = Url::parse(location)?;
        info!(%url, "Fetching media config");
        let body = reqwest::get(url).await?.error_for_status()?.text().await?;
        Ok(MediaConfig::from_json(&body)?)
    } else {
        Ok(MediaConfig::from_path(location)?)
    }
}

// =============================================================================
// Probe
// =============================================================================

#[derive(Debug, Serialize)]
struct SourceReport {
    id: String,
    mimetype: String,
    kind: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<&'static str>,
    playable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    drm: Option<&'static str>,
}

/// Report adapter and DRM support for every source in a config
pub async fn probe(location: &str, format: &str) -> anyhow::Result<()> {
    let config = load_config(location).await?;
    let registry = CapabilityRegistry::with_defaults();
    let sink = MemorySink::new();

    let reports: Vec<SourceReport> = config
        .sources
        .iter()
        .map(|source| SourceReport {
            id: source.id.clone(),
            mimetype: source.mimetype.clone(),
            kind: source.kind(),
            quality: source.resolution().map(|r| r.quality_name()),
            playable: registry.can_play_source(&sink, source, &config.engine),
            drm: source
                .drm
                .as_ref()
                .and_then(|drm| registry.negotiate_drm(&drm.systems))
                .map(|protocol| protocol.name()),
        })
        .collect();

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", to_json(&reports)?),
        OutputFormat::Text => {
            println!("Probing: {}", location);
            println!(
                "Registry: {} adapter(s), {} DRM protocol(s)",
                registry.adapter_count(),
                registry.drm_protocol_count()
            );
            println!("\nSources:");
            for (i, r) in reports.iter().enumerate() {
                println!(
                    "  {}. {} [{}] {:?} {} - {}{}",
                    i + 1,
                    r.id,
                    r.mimetype,
                    r.kind,
                    r.quality.unwrap_or("-"),
                    if r.playable { "PLAYABLE" } else { "UNSUPPORTED" },
                    r.drm.map(|d| format!(" via {d}")).unwrap_or_default(),
                );
            }
        }
    }

    Ok(())
}

// =============================================================================
// Simulate
// =============================================================================

#[derive(Debug, Serialize)]
struct LoggedEvent {
    at: DateTime<Utc>,
    name: &'static str,
    event: EngineEvent,
}

#[derive(Debug, Serialize)]
struct SwitchReport {
    from: Option<String>,
    to: String,
    position_before: f64,
    position_after: f64,
    within_tolerance: bool,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    session: String,
    kind: Option<SourceKind>,
    bound_source: Option<String>,
    duration: f64,
    live: bool,
    tracks: TrackSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    switch: Option<SwitchReport>,
    events: Vec<LoggedEvent>,
}

fn record(rx: &mut broadcast::Receiver<EngineEvent>, log: &mut Vec<LoggedEvent>) {
    while let Ok(event) = rx.try_recv() {
        log.push(LoggedEvent {
            at: Utc::now(),
            name: event.name(),
            event,
        });
    }
}

/// Run a session against a `MemorySink` and report what happened
pub async fn simulate(
    location: &str,
    start: Option<f64>,
    switch_to: Option<usize>,
    position: Option<f64>,
    format: &str,
) -> anyhow::Result<()> {
    let config = load_config(location).await?;
    let tolerance = config.engine.seek_tolerance;
    let registry = CapabilityRegistry::with_defaults();
    let sink = Arc::new(MemorySink::new());

    let mut engine = Engine::from_config(sink, config, &registry);
    let mut rx = engine.subscribe();
    let mut events = Vec::new();

    let load = engine.load(start);
    engine.pump();
    let Some(outcome) = load.outcome() else {
        anyhow::bail!("load did not settle");
    };
    outcome?;
    record(&mut rx, &mut events);

    if let Some(position) = position {
        engine.seek(position)?;
        engine.pump();
        record(&mut rx, &mut events);
    }

    let switch = match switch_to {
        Some(index) => {
            let track = engine
                .video_tracks()
                .get(index)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no video track at index {index}"))?;
            let from = engine.tracks().active_video().map(|t| t.id().to_string());
            let position_before = engine.current_time();

            engine.select_video_track(&track)?;
            engine.pump();
            record(&mut rx, &mut events);

            let position_after = engine.current_time();
            Some(SwitchReport {
                from,
                to: track.id().to_string(),
                position_before,
                position_after,
                within_tolerance: (position_after - position_before).abs() <= tolerance,
            })
        }
        None => None,
    };

    let report = SimulationReport {
        session: engine.id().to_string(),
        kind: engine.source_kind(),
        bound_source: engine.bound_source().map(|s| s.id.clone()),
        duration: engine.duration(),
        live: engine.is_live(),
        tracks: engine.tracks(),
        switch,
        events,
    };
    engine.destroy();

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", to_json(&report)?),
        OutputFormat::Text => print_report(&report),
    }

    Ok(())
}

fn print_report(report: &SimulationReport) {
    println!("Session: {}", report.session);
    println!("  Kind: {:?}", report.kind);
    println!("  Source: {}", report.bound_source.as_deref().unwrap_or("-"));
    println!("  Duration: {}", seconds(report.duration));
    println!(
        "  Active: video {} / text {}",
        report.tracks.active_video().map(|t| t.id().as_str()).unwrap_or("-"),
        report.tracks.active_text().map(|t| t.id().as_str()).unwrap_or("-"),
    );

    println!("\nVideo tracks:");
    for t in &report.tracks.video {
        println!(
            "  {} {} {}x{} {}",
            if t.is_active() { "*" } else { " " },
            t.id(),
            t.width.unwrap_or(0),
            t.height.unwrap_or(0),
            t.bandwidth.map(|b| format!("{}kbps", b / 1000)).unwrap_or_default(),
        );
    }
    if !report.tracks.audio.is_empty() {
        println!("\nAudio tracks:");
        for t in &report.tracks.audio {
            println!("  {} {}", if t.is_enabled() { "*" } else { " " }, t.id());
        }
    }
    if !report.tracks.text.is_empty() {
        println!("\nText tracks:");
        for t in &report.tracks.text {
            println!("  {} {} ({})", if t.is_active() { "*" } else { " " }, t.id(), t.kind);
        }
    }

    if let Some(switch) = &report.switch {
        println!("\nSwitch: {} -> {}", switch.from.as_deref().unwrap_or("-"), switch.to);
        println!(
            "  Position: {} -> {} ({})",
            seconds(switch.position_before),
            seconds(switch.position_after),
            if switch.within_tolerance { "OK" } else { "DRIFTED" }
        );
    }

    println!("\nEvents:");
    for e in &report.events {
        println!("[{}] {}", e.at.format("%H:%M:%S%.3f"), e.name);
    }
}
