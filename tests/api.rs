// HTTP API tests driving the router directly

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use choirloop_lib::api::{router, AppState};
use choirloop_lib::config::Config;
use choirloop_lib::song::{SongStore, INDEX_FILE, SONGS_DIR};
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use serde_json::{json, Value};
use tower::ServiceExt;

const BOUNDARY: &str = "choirloop-test-boundary";

struct TestApp {
    dir: tempfile::TempDir,
    app: Router,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(|_| {})
    }

    fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config {
            data_dir: dir.path().to_path_buf(),
            app_base_url: "http://choir.test/practice".into(),
            render_sample_rate: 8_000,
            ..Config::default()
        };
        tweak(&mut config);
        let store = SongStore::open(&config.data_dir).unwrap();
        let app = router(AppState::new(config, store));
        Self { dir, app }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>, Option<String>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec(), content_type)
    }

    async fn json(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let (status, bytes, _) = self.send(request).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn upload(&self, uri: &str, parts: &[(&str, Option<&str>, &[u8])]) -> (StatusCode, Value) {
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        let (status, bytes, _) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn create_song(&self, title: &str) -> String {
        let (status, body) = self
            .json("POST", "/api/songs", Some(json!({ "title": title })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["song"]["id"].as_str().unwrap().to_string()
    }
}

/// Conductor at 120 BPM plus Soprano and Alto tracks, each one 4/4 measure long
fn choir_midi() -> Vec<u8> {
    let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(u15::new(480))));

    smf.tracks.push(vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(500_000))),
        },
        TrackEvent { delta: u28::new(0), kind: TrackEventKind::Meta(MetaMessage::EndOfTrack) },
    ]);

    for (name, channel, pitches) in [
        ("Soprano", 0u8, [72u8, 74, 76, 77]),
        ("Alto", 1u8, [65u8, 67, 69, 69]),
    ] {
        let mut track = vec![TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
        }];
        for pitch in pitches {
            track.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel: u4::new(channel),
                    message: MidiMessage::NoteOn { key: u7::new(pitch), vel: u7::new(90) },
                },
            });
            track.push(TrackEvent {
                delta: u28::new(480),
                kind: TrackEventKind::Midi {
                    channel: u4::new(channel),
                    message: MidiMessage::NoteOff { key: u7::new(pitch), vel: u7::new(0) },
                },
            });
        }
        track.push(TrackEvent { delta: u28::new(0), kind: TrackEventKind::Meta(MetaMessage::EndOfTrack) });
        smf.tracks.push(track);
    }

    let mut out = Vec::new();
    smf.write_std(&mut out).unwrap();
    out
}

#[tokio::test]
async fn health_check() {
    let app = TestApp::new();
    let (status, body) = app.json("GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn song_lifecycle() {
    let app = TestApp::new();
    let id = app.create_song("Ave Verum").await;

    let (status, body) = app.json("GET", "/api/songs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["songs"].as_array().unwrap().len(), 1);
    assert_eq!(body["songs"][0]["title"], "Ave Verum");

    let (status, body) = app
        .json(
            "PUT",
            &format!("/api/songs/{}", id),
            Some(json!({ "description": "Mozart, K. 618" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["song"]["description"], "Mozart, K. 618");
    assert_eq!(body["song"]["revision"], 2);

    let (status, _) = app.json("DELETE", &format!("/api/songs/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!app.dir.path().join(SONGS_DIR).join(&id).exists());
    let index = std::fs::read_to_string(app.dir.path().join(INDEX_FILE)).unwrap();
    assert!(!index.contains(&id));

    let (status, body) = app.json("GET", &format!("/api/songs/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn delete_accepts_uppercase_id() {
    let app = TestApp::new();
    let id = app.create_song("Ubi Caritas").await;

    let (status, _) = app
        .json("DELETE", &format!("/api/songs/{}", id.to_uppercase()), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.json("GET", "/api/songs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["songs"].as_array().unwrap().is_empty());
    assert!(!app.dir.path().join(SONGS_DIR).join(&id).exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_are_all_indexed() {
    let app = std::sync::Arc::new(TestApp::new());
    let tasks: Vec<_> = (0..8)
        .map(|n| {
            let app = app.clone();
            tokio::spawn(async move { app.create_song(&format!("Canon {}", n)).await })
        })
        .collect();
    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap());
    }

    let (status, body) = app.json("GET", "/api/songs", None).await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<&str> = body["songs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(listed.len(), 8);
    for id in &ids {
        assert!(listed.contains(&id.as_str()));
    }
}

#[tokio::test]
async fn song_errors() {
    let app = TestApp::new();

    let (status, _) = app.json("GET", "/api/songs/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.json("POST", "/api/songs", Some(json!({ "title": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "title must not be empty");

    let id = app.create_song("Locus Iste").await;
    let (status, _) = app
        .json(
            "PUT",
            &format!("/api/songs/{}", id),
            Some(json!({ "title": "Locus iste", "revision": 7 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .json(
            "PUT",
            &format!("/api/songs/{}", id),
            Some(json!({ "title": "Locus iste", "revision": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn sections_crud() {
    let app = TestApp::new();
    let id = app.create_song("Cantique").await;
    let base = format!("/api/songs/{}/sections", id);

    let (status, body) = app
        .json(
            "POST",
            &base,
            Some(json!({
                "label": "Bridge",
                "start_measure": 9, "start_beat": 1,
                "end_measure": 12, "end_beat": 4,
                "relevant_voices": [1]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let section_id = body["section"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .json(
            "PUT",
            &format!("{}/{}", base, section_id),
            Some(json!({ "label": "Bridge (altos)" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["section"]["label"], "Bridge (altos)");
    assert_eq!(body["section"]["end_measure"], 12);

    let (_, body) = app.json("GET", &base, None).await;
    assert_eq!(body["sections"].as_array().unwrap().len(), 1);

    let (status, _) = app.json("DELETE", &format!("{}/{}", base, section_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.json("DELETE", &format!("{}/{}", base, section_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .json(
            "POST",
            &base,
            Some(json!({
                "label": "Bad", "start_measure": 0, "start_beat": 1,
                "end_measure": 2, "end_beat": 1
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn uploads_and_downloads() {
    let app = TestApp::new();
    let id = app.create_song("Ubi Caritas").await;
    let midi = choir_midi();

    let (status, body) = app
        .upload(
            &format!("/api/songs/{}/upload/midi", id),
            &[("midi_file", Some("ubi.mid"), &midi[..])],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["midi_file"], "song.mid");
    let voices = body["voices"].as_array().unwrap();
    assert_eq!(voices.len(), 2);
    assert_eq!(voices[0]["track_number"], 1);
    assert_eq!(voices[0]["names"], json!(["Soprano"]));

    let (status, bytes, content_type) = app
        .send(
            Request::builder()
                .uri(format!("/api/songs/{}/midi", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, midi);
    assert_eq!(content_type.as_deref(), Some("audio/midi"));

    let (status, body) = app
        .upload(
            &format!("/api/songs/{}/upload/mp3", id),
            &[("voice", None, &b"Alto"[..]), ("mp3", Some("alto take.mp3"), &b"ID3\x03"[..])],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["file"], "Alto.mp3");

    let (status, bytes, content_type) = app
        .send(
            Request::builder()
                .uri(format!("/api/songs/{}/mp3/Alto", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"ID3\x03".to_vec());
    assert_eq!(content_type.as_deref(), Some("audio/mpeg"));

    let (status, _) = app
        .upload(
            &format!("/api/songs/{}/upload/score", id),
            &[("score_file", Some("ubi.docx"), &b"nope"[..])],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.json("GET", &format!("/api/songs/{}/score", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .upload(&format!("/api/songs/{}/upload/midi", id), &[("voice", None, &b"Alto"[..])])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn voice_aggregation() {
    let app = TestApp::new();
    let id = app.create_song("Sicut Cervus").await;
    app.upload(
        &format!("/api/songs/{}/upload/midi", id),
        &[("midi", Some("sicut.midi"), &choir_midi()[..])],
    )
    .await;

    app.json(
        "POST",
        &format!("/api/songs/{}/sections", id),
        Some(json!({
            "label": "Alto entry", "start_measure": 1, "start_beat": 1,
            "end_measure": 1, "end_beat": 3, "relevant_voices": [2]
        })),
    )
    .await;

    let (_, body) = app.json("GET", "/api/voices", None).await;
    assert_eq!(body["voices"], json!(["Alto", "Soprano"]));

    let (_, body) = app.json("GET", "/api/voices/Alto/sections", None).await;
    let sections = body["sections"].as_array().unwrap();
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0]["song_title"], "Sicut Cervus");
    assert_eq!(sections[0]["label"], "Alto entry");

    let (_, body) = app.json("GET", "/api/voices/Soprano/sections", None).await;
    assert!(body["sections"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn playback_plan_and_render() {
    let app = TestApp::new();
    let id = app.create_song("Jubilate").await;

    let (status, _) = app
        .json("POST", &format!("/api/songs/{}/playback/plan", id), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.upload(
        &format!("/api/songs/{}/upload/midi", id),
        &[("midi_file", Some("jubilate.mid"), &choir_midi()[..])],
    )
    .await;

    let (status, body) = app
        .json(
            "POST",
            &format!("/api/songs/{}/playback/plan", id),
            Some(json!({ "loop_count": 2, "tempo_percent": 100 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    // (2 s count-in + 2 s song + 2 s break) x 2
    assert_eq!(body["plan"]["total_seconds"], 12.0);
    assert_eq!(body["plan"]["auto_stop_at"], 12.0);
    assert_eq!(body["plan"]["iterations"].as_array().unwrap().len(), 2);

    let (status, body) = app
        .json(
            "POST",
            &format!("/api/songs/{}/playback/plan", id),
            Some(json!({ "practice_mode": "guided", "guided_step": 3, "voice": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mix"]["enabled"], json!({ "1": false, "2": true }));
    assert_eq!(body["mix"]["volumes"]["1"], -100.0);

    let (status, _) = app
        .json(
            "POST",
            &format!("/api/songs/{}/playback/plan", id),
            Some(json!({ "tempo_percent": 200 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, bytes, content_type) = app
        .send(
            Request::builder()
                .method("POST")
                .uri(format!("/api/songs/{}/playback/render", id))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "loop_count": 1 }).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("audio/wav"));
    assert_eq!(&bytes[..4], b"RIFF");
    let wav = hound::WavReader::new(std::io::Cursor::new(bytes)).unwrap();
    assert_eq!(wav.spec().sample_rate, 8_000);
    // (2 s count-in + 2 s song + 2 s break) once
    assert_eq!(wav.len(), 6 * 8_000);

    let (status, _) = app
        .json(
            "POST",
            &format!("/api/songs/{}/playback/render", id),
            Some(json!({ "loop_count": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn render_length_is_capped() {
    let app = TestApp::with_config(|config| config.max_render_seconds = 10.0);
    let id = app.create_song("Sicut Cervus").await;
    app.upload(
        &format!("/api/songs/{}/upload/midi", id),
        &[("midi_file", Some("sicut.mid"), &choir_midi()[..])],
    )
    .await;

    let (status, body) = app
        .json(
            "POST",
            &format!("/api/songs/{}/playback/render", id),
            Some(json!({ "loop_count": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Render of 12s exceeds the 10s limit");

    let (status, bytes, _) = app
        .send(
            Request::builder()
                .method("POST")
                .uri(format!("/api/songs/{}/playback/render", id))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "loop_count": 1 }).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&bytes[..4], b"RIFF");
}

#[tokio::test]
async fn deeplinks() {
    let app = TestApp::new();

    let (status, body) = app
        .json(
            "POST",
            "/api/deeplink",
            Some(json!({
                "song_id": "abc",
                "voice_id": "1",
                "tempo_percent": 100,
                "track_volumes": { "0": -10, "2": -40 },
                "enabled_tracks": { "2": false }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["url"],
        "http://choir.test/practice?song=abc&voice=1&volumes=0%3A-10%2C2%3A-40&disabled=2"
    );

    let (status, body) = app
        .json("GET", "/api/deeplink?song=abc&tempo=200&mode=guided&step=2", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["song_id"], "abc");
    assert_eq!(body["session"]["tempo_percent"], 100);
    assert_eq!(body["session"]["practice_mode"], "guided");
    assert_eq!(body["session"]["guided_step"], 2);

    let (_, body) = app.json("GET", "/api/deeplink?voice=1", None).await;
    assert_eq!(body["session"], Value::Null);

    let (status, _) = app
        .json("POST", "/api/deeplink", Some(json!({ "song_id": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
