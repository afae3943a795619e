//! Set metadata extraction
//!
//! Each field is recovered by walking an ordered list of sources and keeping
//! the first value that passes the field's validity gate. The set schema
//! drifts between application versions, so no single path is reliable.
//!
//! Extraction is best effort: a missing path, malformed attribute or
//! non-numeric value resolves to `None` for that field and never fails the
//! whole set.

use crate::models::{ExtractedMetadata, ParsedDocument, TrackInfo};
use chrono::{DateTime, Utc};
use regex::Regex;
use setlist_common::config::ExtractionConfig;
use std::sync::OnceLock;
use tracing::debug;

/// Text-valued lookup into a document
pub type TextSource = for<'a> fn(&'a ParsedDocument) -> Option<&'a str>;

/// Number-valued lookup into a document
pub type NumberSource = fn(&ParsedDocument) -> Option<f64>;

/// Tempo sources, highest priority first
pub const TEMPO_SOURCES: [(&str, TextSource); 4] = [
    ("master mixer tempo", master_mixer_tempo),
    ("transport tempo", transport_tempo),
    ("set tempo", set_tempo),
    ("master mixer tempo value", master_mixer_tempo_value),
];

/// Text sources searched for a musical key, highest priority first
pub const KEY_SOURCES: [(&str, TextSource); 3] = [
    ("master track name", master_track_name),
    ("set annotation", set_annotation),
    ("set name", set_name),
];

/// Arrangement length sources (in beats), highest priority first
pub const SET_LENGTH_SOURCES: [(&str, NumberSource); 2] = [
    ("arrangement length", arrangement_length),
    ("furthest clip end", furthest_clip_end),
];

/// Tag of a sample reference element
pub const SAMPLE_REFERENCE_TAG: &str = "SampleRef";

fn master_mixer_tempo(doc: &ParsedDocument) -> Option<&str> {
    doc.attr_at("LiveSet/MasterTrack/DeviceChain/Mixer/Tempo/Manual", "Value")
}

fn transport_tempo(doc: &ParsedDocument) -> Option<&str> {
    doc.attr_at("LiveSet/Transport/Tempo/Manual", "Value")
}

fn set_tempo(doc: &ParsedDocument) -> Option<&str> {
    doc.attr_at("LiveSet/Tempo/Manual", "Value")
}

fn master_mixer_tempo_value(doc: &ParsedDocument) -> Option<&str> {
    doc.attr_at("LiveSet/MasterTrack/DeviceChain/Mixer/Tempo", "Value")
}

fn master_track_name(doc: &ParsedDocument) -> Option<&str> {
    doc.attr_at("LiveSet/MasterTrack/Name", "Value")
}

fn set_annotation(doc: &ParsedDocument) -> Option<&str> {
    doc.attr_at("LiveSet/Annotation", "Value")
}

fn set_name(doc: &ParsedDocument) -> Option<&str> {
    doc.attr_at("LiveSet/Name", "Value")
}

fn arrangement_length(doc: &ParsedDocument) -> Option<f64> {
    parse_number(doc.attr_at("LiveSet/ArrangementLength", "Value")?)
}

fn furthest_clip_end(doc: &ParsedDocument) -> Option<f64> {
    let live_set = doc.find("LiveSet")?;
    ["AudioClip", "MidiClip"]
        .iter()
        .flat_map(|tag| live_set.descendants_named(tag))
        .filter_map(|clip| clip.child("CurrentEnd")?.attr("Value"))
        .filter_map(parse_number)
        .fold(None, |furthest: Option<f64>, end| {
            Some(furthest.map_or(end, |f| f.max(end)))
        })
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Pitch letter, optional accidental, optional mode suffix
fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b([A-G])([#b]?)(\s?(?i:major|minor)|(?i:maj|min)|m)?(?:[^\w#]|$)")
            .expect("key pattern is a valid regex")
    })
}

/// Field extractor with configurable heuristic limits
#[derive(Clone)]
pub struct FieldExtractor {
    limits: ExtractionConfig,
    tempo_sources: Vec<(&'static str, TextSource)>,
    key_sources: Vec<(&'static str, TextSource)>,
    set_length_sources: Vec<(&'static str, NumberSource)>,
}

impl FieldExtractor {
    pub fn new(limits: ExtractionConfig) -> Self {
        Self {
            limits,
            tempo_sources: TEMPO_SOURCES.to_vec(),
            key_sources: KEY_SOURCES.to_vec(),
            set_length_sources: SET_LENGTH_SOURCES.to_vec(),
        }
    }

    /// Replace the tempo fallback chain
    pub fn with_tempo_sources(mut self, sources: Vec<(&'static str, TextSource)>) -> Self {
        self.tempo_sources = sources;
        self
    }

    /// Replace the key fallback chain
    pub fn with_key_sources(mut self, sources: Vec<(&'static str, TextSource)>) -> Self {
        self.key_sources = sources;
        self
    }

    pub fn limits(&self) -> &ExtractionConfig {
        &self.limits
    }

    /// Extract every field and assemble the cacheable metadata unit
    pub fn extract_all(
        &self,
        doc: &ParsedDocument,
        file_size_bytes: u64,
        last_modified: DateTime<Utc>,
    ) -> ExtractedMetadata {
        let tempo_bpm = self.tempo(doc);
        let metadata = ExtractedMetadata {
            tempo_bpm,
            musical_key: self.key(doc),
            format_version: self.version(doc),
            tracks: self.tracks(doc),
            sample_reference_count: self.sample_reference_count(doc),
            estimated_set_length: self.set_length(doc, tempo_bpm),
            file_size_bytes,
            last_modified,
        };

        debug!(
            tempo = ?metadata.tempo_bpm,
            key = ?metadata.musical_key,
            version = ?metadata.format_version,
            tracks = metadata.tracks.len(),
            samples = metadata.sample_reference_count,
            length = ?metadata.estimated_set_length,
            "Extracted set metadata"
        );

        metadata
    }

    /// Tempo in BPM, gated to `(tempo_min, tempo_max)`
    pub fn tempo(&self, doc: &ParsedDocument) -> Option<f64> {
        for (label, source) in &self.tempo_sources {
            let Some(raw) = source(doc) else {
                continue;
            };
            match parse_number(raw) {
                Some(bpm) if bpm > self.limits.tempo_min && bpm < self.limits.tempo_max => {
                    debug!(source = label, bpm, "Found tempo");
                    return Some(bpm);
                }
                _ => {
                    debug!(source = label, raw, "Rejected tempo value");
                }
            }
        }
        debug!("Tempo not found in any known location");
        None
    }

    /// Musical key such as `"C minor"` or `"F#"`
    pub fn key(&self, doc: &ParsedDocument) -> Option<String> {
        for (label, source) in &self.key_sources {
            if let Some(key) = source(doc).and_then(find_key) {
                debug!(source = label, key = %key, "Found key");
                return Some(key);
            }
        }
        debug!("Key not found in any known location");
        None
    }

    /// Format tag: minor version, else creator string
    pub fn version(&self, doc: &ParsedDocument) -> Option<String> {
        let root = doc.root();
        ["MinorVersion", "Creator"]
            .iter()
            .filter_map(|attr| root.attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string)
    }

    /// Audio tracks in set order
    pub fn tracks(&self, doc: &ParsedDocument) -> Vec<TrackInfo> {
        let Some(container) = doc.find("LiveSet/Tracks") else {
            return Vec::new();
        };

        container
            .children("AudioTrack")
            .enumerate()
            .map(|(index, track)| {
                let name = ["Name", "Name/EffectiveName", "Name/UserName"]
                    .iter()
                    .filter_map(|path| track.attr_at(path, "Value"))
                    .map(str::trim)
                    .find(|name| !name.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Track {}", index + 1));

                TrackInfo {
                    index,
                    name,
                    is_muted: track.attr_at("DeviceChain/Mixer/IsMuted", "Value") == Some("true"),
                    is_soloed: track.attr_at("DeviceChain/Mixer/IsSoloed", "Value") == Some("true"),
                }
            })
            .collect()
    }

    /// Every sample reference anywhere in the tree
    pub fn sample_reference_count(&self, doc: &ParsedDocument) -> u32 {
        let count = doc.root().descendants_named(SAMPLE_REFERENCE_TAG).len();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Arrangement length as `m:ss`
    ///
    /// Falls back to `default_tempo` when the set tempo is unknown.
    pub fn set_length(&self, doc: &ParsedDocument, tempo_bpm: Option<f64>) -> Option<String> {
        let beats = self.set_length_sources.iter().find_map(|(label, source)| {
            let beats = source(doc).filter(|beats| *beats > 0.0)?;
            debug!(source = label, beats, "Found arrangement length");
            Some(beats)
        })?;

        let tempo = tempo_bpm.unwrap_or(self.limits.default_tempo);
        if !(tempo.is_finite() && tempo > 0.0) {
            return None;
        }

        let beats_per_bar = f64::from(self.limits.beats_per_bar.max(1));
        let bars = beats / beats_per_bar;
        let seconds = (bars * beats_per_bar * 60.0 / tempo).round();
        if !seconds.is_finite() {
            return None;
        }

        let seconds = seconds as u64;
        Some(format!("{}:{:02}", seconds / 60, seconds % 60))
    }
}

impl std::fmt::Debug for FieldExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels = |sources: &[(&'static str, _)]| -> Vec<&'static str> {
            sources.iter().map(|(label, _)| *label).collect()
        };
        f.debug_struct("FieldExtractor")
            .field("limits", &self.limits)
            .field("tempo_sources", &labels(&self.tempo_sources))
            .field("key_sources", &labels(&self.key_sources))
            .finish_non_exhaustive()
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new(ExtractionConfig::default())
    }
}

/// Find and normalize the first key token in free text
pub fn find_key(text: &str) -> Option<String> {
    let captures = key_pattern().captures(text)?;
    let letter = captures.get(1)?.as_str();
    let accidental = captures.get(2).map_or("", |m| m.as_str());
    let mode = match captures.get(3).map(|m| m.as_str().trim().to_ascii_lowercase()) {
        Some(mode) if mode.starts_with("maj") => " major",
        Some(_) => " minor",
        None => "",
    };
    Some(format!("{letter}{accidental}{mode}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Element;

    fn value(name: &str, v: &str) -> Element {
        Element::new(name).with_attr("Value", v)
    }

    fn tempo_chain(manual: &str) -> Element {
        Element::new("Tempo").with_child(value("Manual", manual))
    }

    fn doc_with(live_set: Element) -> ParsedDocument {
        ParsedDocument::new(Element::new("Ableton").with_child(live_set))
    }

    fn master_track(children: Vec<Element>) -> Element {
        let mut master = Element::new("MasterTrack");
        master.children = children;
        master
    }

    #[test]
    fn test_custom_source_chains_replace_defaults() {
        fn annotation_tempo(doc: &ParsedDocument) -> Option<&str> {
            doc.attr_at("LiveSet/TempoNote", "Value")
        }
        fn scene_key(doc: &ParsedDocument) -> Option<&str> {
            doc.attr_at("LiveSet/Scene", "Value")
        }

        let doc = doc_with(
            Element::new("LiveSet")
                .with_child(Element::new("Tempo").with_child(value("Manual", "128")))
                .with_child(value("TempoNote", "93.5"))
                .with_child(value("Scene", "Drop in F#m")),
        );

        let extractor = FieldExtractor::default()
            .with_tempo_sources(vec![("tempo note", annotation_tempo as TextSource)])
            .with_key_sources(vec![("scene", scene_key as TextSource)]);

        assert_eq!(extractor.tempo(&doc), Some(93.5));
        assert_eq!(extractor.key(&doc).as_deref(), Some("F# minor"));
        assert_eq!(FieldExtractor::default().tempo(&doc), Some(128.0));
        assert_eq!(extractor.limits(), &ExtractionConfig::default());
    }

    #[test]
    fn test_tempo_gate_falls_through_to_next_path() {
        let doc = doc_with(
            Element::new("LiveSet")
                .with_child(master_track(vec![Element::new("DeviceChain").with_child(
                    Element::new("Mixer").with_child(tempo_chain("999999")),
                )]))
                .with_child(Element::new("Transport").with_child(tempo_chain("128"))),
        );

        assert_eq!(FieldExtractor::default().tempo(&doc), Some(128.0));
    }

    #[test]
    fn test_tempo_bounds_are_exclusive() {
        let extractor = FieldExtractor::default();
        for raw in ["0", "500", "-20", "NaN", "inf", "fast"] {
            let doc = doc_with(Element::new("LiveSet").with_child(tempo_chain(raw)));
            assert_eq!(extractor.tempo(&doc), None, "raw tempo {raw:?} must be rejected");
        }
        let doc = doc_with(Element::new("LiveSet").with_child(tempo_chain(" 499.5 ")));
        assert_eq!(extractor.tempo(&doc), Some(499.5));
    }

    #[test]
    fn test_tempo_alternate_mixer_path() {
        let doc = doc_with(Element::new("LiveSet").with_child(master_track(vec![
            Element::new("DeviceChain").with_child(
                Element::new("Mixer").with_child(value("Tempo", "92.5")),
            ),
        ])));
        assert_eq!(FieldExtractor::default().tempo(&doc), Some(92.5));
    }

    #[test]
    fn test_custom_tempo_limits() {
        let limits = ExtractionConfig {
            tempo_max: 200.0,
            ..Default::default()
        };
        let doc = doc_with(Element::new("LiveSet").with_child(tempo_chain("240")));
        assert_eq!(FieldExtractor::new(limits).tempo(&doc), None);
    }

    #[test]
    fn test_key_from_master_track_name() {
        let doc = doc_with(
            Element::new("LiveSet").with_child(master_track(vec![value("Name", "Intro Cm Bounce")])),
        );
        assert_eq!(FieldExtractor::default().key(&doc), Some("C minor".to_string()));
    }

    #[test]
    fn test_key_falls_back_to_annotation_then_name() {
        let doc = doc_with(
            Element::new("LiveSet")
                .with_child(master_track(vec![value("Name", "Master")]))
                .with_child(value("Annotation", "rough mix"))
                .with_child(value("Name", "Sketch in F#maj")),
        );
        assert_eq!(FieldExtractor::default().key(&doc), Some("F# major".to_string()));
    }

    #[test]
    fn test_key_absent_without_pitch_token() {
        let doc = doc_with(
            Element::new("LiveSet").with_child(master_track(vec![value("Name", "Master")])),
        );
        assert_eq!(FieldExtractor::default().key(&doc), None);
    }

    #[test]
    fn test_find_key_normalization() {
        assert_eq!(find_key("Abm pad").as_deref(), Some("Ab minor"));
        assert_eq!(find_key("groove in D minor").as_deref(), Some("D minor"));
        assert_eq!(find_key("Bb").as_deref(), Some("Bb"));
        assert_eq!(find_key("E Major vibes").as_deref(), Some("E major"));
        assert_eq!(find_key("G#min").as_deref(), Some("G# minor"));
        assert_eq!(find_key("Bounce"), None);
        assert_eq!(find_key("Ebony"), None);
        assert_eq!(find_key("Master"), None);
    }

    #[test]
    fn test_version_prefers_minor_version() {
        let doc = ParsedDocument::new(
            Element::new("Ableton")
                .with_attr("MinorVersion", "11.0_433")
                .with_attr("Creator", "Ableton Live 11.3"),
        );
        assert_eq!(FieldExtractor::default().version(&doc).as_deref(), Some("11.0_433"));

        let doc = ParsedDocument::new(Element::new("Ableton").with_attr("Creator", "Ableton Live 10.1"));
        assert_eq!(FieldExtractor::default().version(&doc).as_deref(), Some("Ableton Live 10.1"));

        let doc = ParsedDocument::new(Element::new("Ableton"));
        assert_eq!(FieldExtractor::default().version(&doc), None);
    }

    #[test]
    fn test_tracks_names_and_flags() {
        let mixer = |muted: &str, soloed: &str| {
            Element::new("DeviceChain").with_child(
                Element::new("Mixer")
                    .with_child(value("IsMuted", muted))
                    .with_child(value("IsSoloed", soloed)),
            )
        };
        let doc = doc_with(
            Element::new("LiveSet").with_child(
                Element::new("Tracks")
                    .with_child(
                        Element::new("AudioTrack")
                            .with_child(value("Name", "Drums"))
                            .with_child(mixer("true", "false")),
                    )
                    .with_child(Element::new("MidiTrack").with_child(value("Name", "Keys")))
                    .with_child(
                        Element::new("AudioTrack")
                            .with_child(Element::new("Name").with_child(value("EffectiveName", "Vox")))
                            .with_child(mixer("false", "TRUE")),
                    )
                    .with_child(Element::new("AudioTrack").with_child(mixer("false", "true"))),
            ),
        );

        let tracks = FieldExtractor::default().tracks(&doc);
        assert_eq!(tracks.len(), 3);
        assert_eq!(tracks[0].name, "Drums");
        assert!(tracks[0].is_muted && !tracks[0].is_soloed);
        assert_eq!(tracks[1].name, "Vox");
        assert!(!tracks[1].is_soloed, "only the literal \"true\" counts");
        assert_eq!(tracks[2].index, 2);
        assert_eq!(tracks[2].name, "Track 3");
        assert!(tracks[2].is_soloed);
    }

    #[test]
    fn test_tracks_missing_container() {
        let doc = doc_with(Element::new("LiveSet"));
        assert!(FieldExtractor::default().tracks(&doc).is_empty());
    }

    #[test]
    fn test_sample_census_counts_every_depth() {
        let doc = ParsedDocument::new(
            Element::new("Ableton")
                .with_child(Element::new("SampleRef"))
                .with_child(
                    Element::new("LiveSet")
                        .with_child(
                            Element::new("Devices").with_child(
                                Element::new("Simpler").with_child(Element::new("SampleRef")),
                            ),
                        )
                        .with_child(Element::new("Tracks").with_child(
                            Element::new("AudioTrack").with_child(
                                Element::new("ClipSlot").with_child(
                                    Element::new("AudioClip")
                                        .with_child(Element::new("SampleRef"))
                                        .with_child(Element::new("SampleRef")),
                                ),
                            ),
                        )),
                ),
        );
        assert_eq!(FieldExtractor::default().sample_reference_count(&doc), 4);
    }

    #[test]
    fn test_set_length_uses_tempo() {
        let doc = doc_with(Element::new("LiveSet").with_child(value("ArrangementLength", "256")));
        // 256 beats at 128 BPM = 120 s
        assert_eq!(
            FieldExtractor::default().set_length(&doc, Some(128.0)).as_deref(),
            Some("2:00")
        );
        // 256 beats at the default 120 BPM = 128 s
        assert_eq!(FieldExtractor::default().set_length(&doc, None).as_deref(), Some("2:08"));
    }

    #[test]
    fn test_set_length_from_clip_ends() {
        let clip = |end: &str| Element::new("AudioClip").with_child(value("CurrentEnd", end));
        let doc = doc_with(
            Element::new("LiveSet").with_child(
                Element::new("Tracks").with_child(
                    Element::new("AudioTrack")
                        .with_child(clip("64"))
                        .with_child(clip("96"))
                        .with_child(clip("garbage")),
                ),
            ),
        );
        // 96 beats at 120 BPM = 48 s
        assert_eq!(FieldExtractor::default().set_length(&doc, None).as_deref(), Some("0:48"));
    }

    #[test]
    fn test_set_length_absent_without_value() {
        let doc = doc_with(Element::new("LiveSet"));
        assert_eq!(FieldExtractor::default().set_length(&doc, Some(120.0)), None);

        let doc = doc_with(Element::new("LiveSet").with_child(value("ArrangementLength", "0")));
        assert_eq!(FieldExtractor::default().set_length(&doc, Some(120.0)), None);
    }

    #[test]
    fn test_extract_all_on_empty_document() {
        let doc = ParsedDocument::new(Element::new("Ableton"));
        let modified = Utc::now();
        let metadata = FieldExtractor::default().extract_all(&doc, 42, modified);
        assert_eq!(metadata.tempo_bpm, None);
        assert_eq!(metadata.musical_key, None);
        assert!(metadata.tracks.is_empty());
        assert_eq!(metadata.sample_reference_count, 0);
        assert_eq!(metadata.estimated_set_length, None);
        assert_eq!(metadata.file_size_bytes, 42);
        assert_eq!(metadata.last_modified, modified);
    }
}
