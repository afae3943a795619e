//! Gzip-compressed set file fixtures

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Values baked into a generated set file
#[derive(Debug, Clone)]
pub struct SetFixture {
    pub tempo: &'static str,
    pub master_name: &'static str,
    pub tracks: Vec<&'static str>,
    pub samples: usize,
    pub arrangement_beats: Option<&'static str>,
}

impl Default for SetFixture {
    fn default() -> Self {
        Self {
            tempo: "128",
            master_name: "Anthem Am",
            tracks: vec!["Kick", "Bass"],
            samples: 3,
            arrangement_beats: Some("256"),
        }
    }
}

/// Minimal set document in the live-set XML layout
pub fn set_xml(fixture: &SetFixture) -> String {
    let tracks: String = fixture
        .tracks
        .iter()
        .enumerate()
        .map(|(i, name)| {
            format!(
                r#"<AudioTrack Id="{i}"><Name><EffectiveName Value="{name}"/></Name><DeviceChain><Mixer><IsMuted Value="{muted}"/><IsSoloed Value="false"/></Mixer></DeviceChain></AudioTrack>"#,
                muted = (i == 1),
            )
        })
        .collect();

    let samples: String = (0..fixture.samples)
        .map(|i| format!(r#"<SampleRef><FileRef><Name Value="s{i}.wav"/></FileRef></SampleRef>"#))
        .collect();

    let length = fixture
        .arrangement_beats
        .map(|beats| format!(r#"<ArrangementLength Value="{beats}"/>"#))
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Ableton MajorVersion="5" MinorVersion="11.0_433" Creator="Ableton Live 11.3">
  <LiveSet>
    <MasterTrack>
      <Name Value="{master}"/>
      <DeviceChain><Mixer><Tempo><Manual Value="{tempo}"/></Tempo></Mixer></DeviceChain>
    </MasterTrack>
    <Tracks>{tracks}</Tracks>
    <Samples>{samples}</Samples>
    {length}
  </LiveSet>
</Ableton>"#,
        master = fixture.master_name,
        tempo = fixture.tempo,
    )
}

/// Gzip `xml` into `path`
pub fn write_set_file(path: &Path, xml: &str) {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(xml.as_bytes()).unwrap();
    fs::write(path, encoder.finish().unwrap()).unwrap();
}

/// Create `<parent>/<name> Project/<name>.als` and return the set file path
pub fn make_project(parent: &Path, name: &str, fixture: &SetFixture) -> PathBuf {
    let dir = parent.join(format!("{} Project", name));
    fs::create_dir_all(&dir).unwrap();
    let payload = dir.join(format!("{}.als", name));
    write_set_file(&payload, &set_xml(fixture));
    payload
}

/// Project whose set file is not gzip at all
pub fn write_corrupt_project(parent: &Path, name: &str) -> PathBuf {
    let dir = parent.join(format!("{} Project", name));
    fs::create_dir_all(&dir).unwrap();
    let payload = dir.join(format!("{}.als", name));
    fs::write(&payload, b"definitely not gzip").unwrap();
    payload
}
