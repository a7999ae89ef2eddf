use anyhow::Context;
use chronotile::prelude::*;
use clap::Parser;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "chronotile-app", version, about = "Plays a monthly tile series headlessly and prints its status")]
struct Options {
    /// Manifest file or http(s) URL
    manifest: String,

    /// JSON file overriding viewer settings
    #[arg(long)]
    config: Option<String>,

    /// Start playback right away
    #[arg(long)]
    play: bool,

    /// Stop after this many seconds
    #[arg(long, default_value_t = 30.0)]
    seconds: f64,
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

async fn read_text(location: &str) -> anyhow::Result<String> {
    if is_remote(location) {
        let response = reqwest::get(location).await?.error_for_status()?;
        Ok(response.text().await?)
    } else {
        Ok(tokio::fs::read_to_string(location)
            .await
            .with_context(|| format!("reading {location}"))?)
    }
}

/// Absolute URL relative tile templates are resolved against
async fn manifest_base_url(location: &str) -> anyhow::Result<Url> {
    if is_remote(location) {
        return Ok(Url::parse(location)?);
    }
    let path = tokio::fs::canonicalize(location)
        .await
        .with_context(|| format!("resolving {location}"))?;
    Url::from_file_path(&path).map_err(|()| anyhow::anyhow!("{} is not an absolute path", path.display()))
}

/// Result of loading one tile the map asked for
struct TileResult {
    request: TileRequest,
    loaded: bool,
}

fn spawn_tile_download(request: TileRequest, tx: mpsc::UnboundedSender<TileResult>) {
    tokio::spawn(async move {
        if let Some(path) = Url::parse(&request.url)
            .ok()
            .filter(|url| url.scheme() == "file")
            .and_then(|url| url.to_file_path().ok())
        {
            let loaded = tokio::fs::metadata(&path).await.is_ok_and(|meta| meta.is_file());
            let _ = tx.send(TileResult { request, loaded });
            return;
        }
        let loaded = match reqwest::get(&request.url).await {
            Ok(response) if response.status().is_success() => response.bytes().await.is_ok(),
            Ok(response) => {
                log::debug!("tile {} answered {}", request.url, response.status());
                false
            }
            Err(e) => {
                log::debug!("tile {} failed: {}", request.url, e);
                false
            }
        };
        let _ = tx.send(TileResult { request, loaded });
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chronotile::init_logging();
    let options = Options::parse();

    let config = match &options.config {
        Some(path) => ViewerConfig::from_json_str(&read_text(path).await?)?,
        None => ViewerConfig::default(),
    };
    let manifest = Manifest::from_json_str(&read_text(&options.manifest).await?)?;
    let base_url = manifest_base_url(&options.manifest).await?;
    let source = TimeSeriesSource::from_manifest(&manifest, base_url.as_str(), TimeSeriesSource::default_coverage()?)?;
    log::info!(
        "{} months from {} to {}",
        source.months.len(),
        source.months.as_slice().first().map(|m| m.to_string()).unwrap_or_default(),
        source.months.as_slice().last().map(|m| m.to_string()).unwrap_or_default()
    );

    let viewport = Viewport::new(LatLng::new(20.0, 0.0), 2.0, Point::new(1024.0, 768.0));
    let surface = HeadlessMap::new(
        viewport,
        ViewSampler::new(source.min_zoom, source.max_zoom, config.tile_size),
    );
    let fetcher = HttpTileFetcher::current()?;
    let mut viewer = ViewerController::new(source, config, surface, fetcher, PanelState::new());

    let clock = MonotonicClock::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut ticker = tokio::time::interval(Duration::from_millis(16));
    let deadline = options.seconds * 1000.0;

    viewer.request_month(0);
    if options.play {
        viewer.dispatch(ViewerCommand::TogglePlayback);
    }

    let mut last_status = String::new();
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupted");
                break;
            }
        }
        let now = clock.elapsed_ms();
        if now > deadline {
            break;
        }

        viewer.advance(now);
        for request in viewer.surface_mut().take_tile_requests() {
            spawn_tile_download(request, tx.clone());
        }
        while let Ok(result) = rx.try_recv() {
            let events = viewer
                .surface_mut()
                .resolve_tile(result.request.month, result.request.coord, result.loaded);
            for event in events {
                viewer.handle_tile_event(event);
            }
        }
        viewer.render_frame(clock.elapsed_ms());

        if viewer.ui().status != last_status {
            last_status = viewer.ui().status.clone();
            println!("[{:>8.0} ms] {}", now, last_status);
        }
    }

    viewer.stop_playback();
    viewer.cancel_prefetch(None);
    println!(
        "stopped on {}",
        viewer
            .state()
            .visible_month()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "nothing".to_string())
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = Options::try_parse_from(["chronotile-app", "data/manifest.json"]).unwrap();
        assert_eq!(options.manifest, "data/manifest.json");
        assert_eq!(options.config, None);
        assert!(!options.play);
        assert_eq!(options.seconds, 30.0);
    }

    #[test]
    fn test_options_flags() {
        let options = Options::try_parse_from([
            "chronotile-app",
            "https://host/manifest.json",
            "--config",
            "viewer.json",
            "--play",
            "--seconds",
            "4.5",
        ])
        .unwrap();
        assert_eq!(options.config.as_deref(), Some("viewer.json"));
        assert!(options.play);
        assert_eq!(options.seconds, 4.5);
    }

    #[test]
    fn test_options_reject_bad_input() {
        assert!(Options::try_parse_from(["chronotile-app"]).is_err());
        assert!(Options::try_parse_from(["chronotile-app", "m.json", "--seconds", "soon"]).is_err());
        assert!(Options::try_parse_from(["chronotile-app", "m.json", "extra"]).is_err());
    }

    #[tokio::test]
    async fn test_remote_manifest_is_its_own_base() {
        let base = manifest_base_url("https://host/data/v2/manifest.json").await.unwrap();
        assert_eq!(base.as_str(), "https://host/data/v2/manifest.json");
    }

    #[tokio::test]
    async fn test_local_manifest_becomes_file_url() {
        let path = std::env::temp_dir().join(format!("chronotile-manifest-{}.json", std::process::id()));
        tokio::fs::write(&path, "{}").await.unwrap();
        let base = manifest_base_url(path.to_str().unwrap()).await.unwrap();
        assert_eq!(base.scheme(), "file");
        assert!(base.path().ends_with(".json"));
        let _ = tokio::fs::remove_file(&path).await;
    }
}
