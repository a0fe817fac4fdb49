use crate::model::Track;
use anyhow::{Context, Result};
use lofty::prelude::*;
use lofty::probe::Probe;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "opus"];
const COVER_NAMES: &[&str] = &["cover", "folder", "front", "album"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Default)]
struct TrackMetadata {
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
}

/// Reads a JSON array of tracks. Relative track and cover paths are resolved
/// against the catalog's own directory.
pub fn load_catalog(path: &Path) -> Result<Vec<Track>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    let mut tracks: Vec<Track> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse catalog {}", path.display()))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for track in &mut tracks {
        track.path = resolve(base, &track.path);
        track.cover_art = track.cover_art.as_deref().map(|cover| resolve(base, cover));
    }
    log::info!("loaded {} tracks from {}", tracks.len(), path.display());
    Ok(tracks)
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

pub fn scan_folder(root: &Path) -> Vec<Track> {
    let mut tracks = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_audio(path) {
            continue;
        }

        let metadata = metadata_for(path);
        let title = metadata
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| {
                path.file_stem()
                    .and_then(OsStr::to_str)
                    .unwrap_or("unknown")
                    .to_string()
            });

        tracks.push(Track {
            title,
            artist: metadata.artist.unwrap_or_else(|| String::from("Unknown artist")),
            album: metadata.album,
            path: PathBuf::from(path),
            cover_art: path.parent().and_then(sibling_cover),
        });
    }

    tracks.sort_by(|a, b| a.path.cmp(&b.path));
    log::info!("scanned {} tracks under {}", tracks.len(), root.display());
    tracks
}

fn metadata_for(path: &Path) -> TrackMetadata {
    let Ok(tagged_file) = Probe::open(path).and_then(|probe| probe.read()) else {
        return TrackMetadata::default();
    };
    let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
        return TrackMetadata::default();
    };

    TrackMetadata {
        title: tag.title().as_deref().and_then(clean_metadata_value),
        artist: tag.artist().as_deref().and_then(clean_metadata_value),
        album: tag.album().as_deref().and_then(clean_metadata_value),
    }
}

/// First picture embedded in the file's tags, if any.
pub fn embedded_cover_art(path: &Path) -> Option<Vec<u8>> {
    let tagged_file = Probe::open(path).and_then(|probe| probe.read()).ok()?;
    tagged_file
        .tags()
        .iter()
        .flat_map(|tag| tag.pictures())
        .next()
        .map(|picture| picture.data().to_vec())
}

/// Length read from the container headers. Zero counts as unknown.
pub fn container_duration(path: &Path) -> Option<Duration> {
    let tagged_file = Probe::open(path).and_then(|probe| probe.read()).ok()?;
    Some(tagged_file.properties().duration()).filter(|duration| !duration.is_zero())
}

fn sibling_cover(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            let stem = path.file_stem().and_then(OsStr::to_str).unwrap_or_default();
            let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
            COVER_NAMES.iter().any(|name| stem.eq_ignore_ascii_case(name))
                && IMAGE_EXTENSIONS
                    .iter()
                    .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

fn clean_metadata_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn is_audio(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}
