//! Bilisound - command line front end for the resolver and the local server

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bilisound::api::{BiliClient, Identity, ResolveError};
use bilisound::server::LocalFileServer;
use bilisound::settings::Settings;
use bilisound::utils::format_duration;

const USAGE: &str = "\
Usage:
  bilisound serve [FILE...]          serve local files, printing their URLs
  bilisound search <KEYWORD> [PAGE]  search videos
  bilisound info <BVID>              show video metadata and parts
  bilisound audio <BVID> <CID>       resolve playable audio URLs";

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let settings = Settings::load();

    match args.first().map(String::as_str) {
        Some("serve") => serve(&settings, &args[1..]).await,
        Some("search") => {
            let Some(keyword) = args.get(1) else {
                bail!("missing keyword\n\n{}", USAGE);
            };
            let page = match args.get(2) {
                Some(p) => p.parse()?,
                None => 1,
            };
            search(&settings, keyword, page).await
        }
        Some("info") => {
            let Some(video_id) = args.get(1) else {
                bail!("missing video id\n\n{}", USAGE);
            };
            video_info(&settings, video_id).await
        }
        Some("audio") => {
            let (Some(video_id), Some(part_id)) = (args.get(1), args.get(2)) else {
                bail!("missing video id or part id\n\n{}", USAGE);
            };
            audio(&settings, video_id, part_id).await
        }
        _ => {
            println!("{}", USAGE);
            Ok(())
        }
    }
}

fn client(settings: &Settings) -> Result<BiliClient> {
    let identity = Arc::new(Identity::new());
    info!("Session identity {}", identity.session_token());
    BiliClient::from_settings(settings, identity)
}

fn report(err: ResolveError) -> anyhow::Error {
    anyhow::anyhow!("{} ({:?})", err, err.user_hint())
}

async fn serve(settings: &Settings, files: &[String]) -> Result<()> {
    let server = LocalFileServer::start(&settings.server).await?;
    for file in files {
        let url = server
            .url_for_file(Path::new(file))
            .with_context(|| format!("Failed to resolve {}", file))?;
        println!("{}", url);
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    server.shutdown();
    Ok(())
}

async fn search(settings: &Settings, keyword: &str, page: u32) -> Result<()> {
    let result = client(settings)?
        .search_videos(keyword, page)
        .await
        .map_err(report)?;

    println!(
        "Page {} ({} results total, {} per page)",
        result.page, result.total, result.page_size
    );
    for item in &result.items {
        println!(
            "{}  {:>6}  {}  [{}]",
            item.video_id,
            format_duration(item.duration),
            item.title,
            item.author
        );
    }
    Ok(())
}

async fn video_info(settings: &Settings, video_id: &str) -> Result<()> {
    let meta = client(settings)?
        .get_video_info(video_id)
        .await
        .map_err(report)?;

    println!("{} - {}", meta.video_id, meta.title);
    println!("cover: {}", meta.cover_url);
    for part in &meta.parts {
        let marker = if part.part_id == meta.default_part_id {
            "*"
        } else {
            " "
        };
        println!(
            "{} P{:<3} {:>12}  {:>6}  {}",
            marker,
            part.index,
            part.part_id,
            format_duration(part.duration),
            part.label
        );
    }
    Ok(())
}

async fn audio(settings: &Settings, video_id: &str, part_id: &str) -> Result<()> {
    let candidate = client(settings)?
        .get_audio_url(video_id, part_id)
        .await
        .map_err(report)?;

    println!("{}", candidate.primary());
    for backup in candidate.backups() {
        println!("{}", backup);
    }
    Ok(())
}
