use async_trait::async_trait;
use mediaref::export::{ExportProvider, LibraryExport};
use mediaref::output::to_pretty_json;
use mediaref::reduce::aggregate_unique;
use mediaref::{rollup_library, LibraryDocument, LibraryKind, RollupError};
use serde_json::{json, Value};
use std::collections::HashMap;

struct FakeProvider {
    documents: HashMap<LibraryKind, Value>,
}

#[async_trait]
impl ExportProvider for FakeProvider {
    async fn fetch(&self, kind: LibraryKind) -> anyhow::Result<LibraryExport> {
        let doc = self
            .documents
            .get(&kind)
            .ok_or_else(|| anyhow::anyhow!("no export for {}", kind))?;
        Ok(LibraryExport {
            document: serde_json::to_vec(doc)?,
            images: Vec::new(),
        })
    }
}

fn media(res: &str, audio: &str, video: &str, container: &str, size: u64) -> Value {
    json!([{
        "audioCodec": audio,
        "videoCodec": video,
        "videoResolution": res,
        "duration": 1_320_000,
        "parts": [{"size": size, "container": container}]
    }])
}

fn movies_export() -> Value {
    json!([
        {
            "ratingKey": 101,
            "title": "Alien",
            "year": 1979,
            "contentRating": "R",
            "duration": 7_020_000,
            "media": media("4k", "truehd", "hevc", "mkv", 60_000_000_000)
        },
        {"ratingKey": 102, "title": "Aliens", "year": 1986},
        {
            "ratingKey": 103,
            "title": "Alien 3",
            "year": 1992,
            "media": media("1080", "ac3", "h264", "mp4", 15_000_000_000)
        }
    ])
}

fn shows_export() -> Value {
    json!([{
        "ratingKey": 200,
        "title": "Twin Peaks",
        "contentRating": "TV-14",
        "seasonCount": 2,
        "duration": 2_820_000,
        "seasons": [
            {"ratingKey": 201, "seasonNumber": 1, "episodes": [
                {
                    "ratingKey": 2011,
                    "year": 1990,
                    "media": media("sd", "aac", "mpeg4", "avi", 400_000_000)
                },
                {
                    "ratingKey": 2012,
                    "year": 1990,
                    "media": media("sd", "aac", "mpeg4", "avi", 400_000_000)
                }
            ]},
            {"ratingKey": 202, "seasonNumber": 2, "episodes": [
                {
                    "ratingKey": 2021,
                    "year": 1991,
                    "media": media("480", "AC3", "h264", "mkv", 600_000_000)
                },
                {"ratingKey": 2022, "year": 1991}
            ]}
        ]
    }])
}

fn music_export() -> Value {
    let album = |key: u64, title: &str, year: i32, size: u64, duration: u64| {
        json!({
            "ratingKey": key,
            "title": title,
            "year": year,
            "tracks": [{"media": [{
                "duration": duration,
                "parts": [{"size": size, "container": "mp3"}]
            }]}]
        })
    };
    json!([
        {"ratingKey": 1, "title": "A", "albums": [album(11, "Solo", 2018, 5_000, 30_000)]},
        {"ratingKey": 3, "title": "A;B;Nobody", "albums": [album(31, "Duet", 2020, 1_000, 60_000)]},
        {"ratingKey": 2, "title": "B", "albums": []}
    ])
}

fn as_value(doc: &LibraryDocument) -> Value {
    serde_json::from_slice(&to_pretty_json(doc).unwrap()).unwrap()
}

#[tokio::test]
async fn movies_library_end_to_end() {
    let provider = FakeProvider {
        documents: HashMap::from([(LibraryKind::Movies, movies_export())]),
    };
    let export = provider.fetch(LibraryKind::Movies).await.unwrap();
    let rollup = rollup_library(LibraryKind::Movies, &export.document).unwrap();
    let doc = as_value(&rollup.document);

    assert_eq!(
        doc["metadata"],
        json!({"totalMovies": 2, "totalSizeHuman": "75.00 GB"})
    );
    assert_eq!(
        doc["movies"][0],
        json!({
            "ratingKey": 101,
            "title": "Alien",
            "year": 1979,
            "contentRating": "R",
            "durationHuman": "117 mins",
            "audioCodec": "TRUEHD",
            "container": "mkv",
            "videoCodec": "HEVC",
            "videoResolution": "2160p",
            "sizeHuman": "60.00 GB"
        })
    );
    assert_eq!(doc["movies"][1]["title"], "Alien 3");
    assert_eq!(doc["movies"][1]["durationHuman"], "22 mins");
    assert_eq!(rollup.report.summary(), "processed 2 of 3, skipped 1");
}

#[tokio::test]
async fn shows_library_end_to_end() {
    let rollup =
        rollup_library(LibraryKind::Shows, &serde_json::to_vec(&shows_export()).unwrap()).unwrap();
    let doc = as_value(&rollup.document);
    let show = &doc["shows"][0];

    assert_eq!(show["seasonCount"], 2);
    assert_eq!(show["totalEpisodeCount"], 3);
    assert_eq!(show["avgEpisodeDurationHuman"], "47 mins");
    assert_eq!(show["seasons"][0]["seasonNumber"], 1);
    assert_eq!(show["seasons"][0]["uniqueContainers"], "avi");
    assert_eq!(show["seasons"][1]["uniqueAudioCodecs"], "AC3");
    assert_eq!(show["seasons"][1]["episodeCount"], 1);

    // Show uniques are computed over the raw per-episode values.
    let raw_resolutions = vec![Some("sd"), Some("sd"), Some("480p")];
    assert_eq!(show["uniqueResolutions"], aggregate_unique(raw_resolutions));
    assert_eq!(show["uniqueResolutions"], "480p, sd");
    assert_eq!(show["uniqueVideoCodecs"], "H264, MPEG4");
    assert_eq!(show["yearRange"], "1990-1991");

    assert_eq!(
        doc["metadata"],
        json!({
            "totalShows": 1,
            "totalSeasons": 2,
            "totalEpisodes": 3,
            "totalSizeHuman": "1.40 GB"
        })
    );
    assert_eq!(rollup.report.skipped.len(), 1);
}

#[test]
fn music_collaboration_counts_library_totals_once() {
    let rollup =
        rollup_library(LibraryKind::Music, &serde_json::to_vec(&music_export()).unwrap()).unwrap();
    let doc = as_value(&rollup.document);
    let artists = doc["artists"].as_array().unwrap();

    let names: Vec<_> = artists.iter().map(|a| a["artistName"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["A", "B"]);

    assert_eq!(artists[0]["albumCount"], 2);
    assert_eq!(artists[0]["totalSizeBytes"], 6_000);
    assert_eq!(artists[0]["yearRange"], "2018-2020");
    assert_eq!(artists[1]["ratingKey"], 2);
    assert_eq!(artists[1]["albumCount"], 1);
    assert_eq!(artists[1]["totalSizeBytes"], 1_000);
    assert_eq!(artists[1]["albums"][0]["title"], "Duet");

    // Solo 30s + Duet 60s credited to A and B.
    assert_eq!(
        doc["metadata"],
        json!({
            "totalArtists": 2,
            "totalAlbums": 2,
            "totalTracks": 2,
            "totalSizeHuman": "0.01 MB",
            "totalDurationHuman": "2 mins 30 secs"
        })
    );
}

#[test]
fn output_is_byte_identical_across_runs() {
    for (kind, export) in [
        (LibraryKind::Movies, movies_export()),
        (LibraryKind::Shows, shows_export()),
        (LibraryKind::Music, music_export()),
    ] {
        let bytes = serde_json::to_vec(&export).unwrap();
        let first = to_pretty_json(&rollup_library(kind, &bytes).unwrap().document).unwrap();
        let second = to_pretty_json(&rollup_library(kind, &bytes).unwrap().document).unwrap();
        assert_eq!(first, second, "{kind} output differs between runs");
    }
}

#[test]
fn output_keys_keep_declaration_order() {
    let bytes = serde_json::to_vec(&movies_export()).unwrap();
    let rollup = rollup_library(LibraryKind::Movies, &bytes).unwrap();
    let text = String::from_utf8(to_pretty_json(&rollup.document).unwrap()).unwrap();
    let metadata_at = text.find("\"metadata\"").unwrap();
    let movies_at = text.find("\"movies\"").unwrap();
    assert!(metadata_at < movies_at);
    let rating_key_at = text.find("\"ratingKey\"").unwrap();
    let size_at = text.find("\"sizeHuman\": \"60.00 GB\"").unwrap();
    assert!(rating_key_at < size_at);
}

#[test]
fn malformed_documents_abort_the_library() {
    for bad in [&b"{\"artists\": []}"[..], &b"[1, 2]"[..], &b"<xml/>"[..]] {
        let err = rollup_library(LibraryKind::Music, bad).unwrap_err();
        assert!(matches!(err, RollupError::MalformedInput(_)));
    }
}
