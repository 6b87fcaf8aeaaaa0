//! Audio/text pair matching
//!
//! A session upload is a flat listing of files; alignable work is the
//! subset that forms complete audio/text pairs sharing a base name.
//! Callers must not assume every uploaded file ends up in a pair.

use std::collections::HashMap;

use crate::models::{FileKind, FilePair, RawFile};

#[derive(Default)]
struct Slots {
    audio: Option<RawFile>,
    text: Option<RawFile>,
}

/// Pair audio and text files by name without extension.
///
/// Files with no extension or an unrecognized one are ignored. When two
/// files share a base name and kind, the later one in input order wins.
/// Pairs are emitted in first-appearance order of their base name; keys
/// with only one side present are silently dropped.
pub fn match_files(files: &[RawFile]) -> Vec<FilePair> {
    let mut order: Vec<String> = Vec::new();
    let mut slots: HashMap<String, Slots> = HashMap::new();

    for file in files {
        let Some((base, ext)) = file.split_name() else {
            continue;
        };
        let Some(kind) = FileKind::from_extension(ext) else {
            continue;
        };

        let entry = slots.entry(base.to_string()).or_insert_with(|| {
            order.push(base.to_string());
            Slots::default()
        });
        match kind {
            FileKind::Audio => entry.audio = Some(file.clone()),
            FileKind::Text => entry.text = Some(file.clone()),
        }
    }

    order
        .into_iter()
        .filter_map(|base| {
            let slot = slots.remove(&base)?;
            Some(FilePair {
                audio: slot.audio?,
                text: slot.text?,
            })
        })
        .collect()
}
