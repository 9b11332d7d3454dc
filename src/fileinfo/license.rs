//! License detection
//!
//! Matches the top of a file against a curated corpus of license
//! keyphrases. Full-corpus matching only runs for license-ish filenames;
//! every file still gets an SPDX tag scan, which is cheap and exact.

use crate::models::License;

/// Keyphrases per license, all lowercase. Confidence is the fraction of
/// phrases found, so more specific licenses list their distinguishing
/// lines.
static CORPUS: &[(&str, &[&str])] = &[
    (
        "Apache-2.0",
        &["apache license", "version 2.0", "www.apache.org/licenses"],
    ),
    (
        "AGPL-3.0",
        &["gnu affero general public license", "version 3"],
    ),
    (
        "LGPL-3.0",
        &["gnu lesser general public license", "version 3"],
    ),
    (
        "GPL-3.0",
        &["gnu general public license", "version 3, 29 june 2007"],
    ),
    (
        "GPL-2.0",
        &["gnu general public license", "version 2, june 1991"],
    ),
    ("MPL-2.0", &["mozilla public license version 2.0"]),
    (
        "BSD-3-Clause",
        &[
            "redistribution and use in source and binary forms",
            "neither the name of",
        ],
    ),
    (
        "BSD-2-Clause",
        &["redistribution and use in source and binary forms"],
    ),
    (
        "MIT",
        &[
            "permission is hereby granted, free of charge",
            "without restriction, including without limitation",
        ],
    ),
    (
        "ISC",
        &["permission to use, copy, modify, and/or distribute this software"],
    ),
    (
        "Unlicense",
        &["this is free and unencumbered software released into the public domain"],
    ),
    ("CC0-1.0", &["cc0 1.0 universal", "public domain dedication"]),
];

const MIN_CONFIDENCE: f32 = 0.5;

/// How many leading lines participate in matching.
pub const HEAD_LINES: usize = 40;

/// True when the basename looks like a license file worth full-corpus
/// matching.
pub fn is_license_filename(path: &str) -> bool {
    let basename = path.rsplit('/').next().unwrap_or(path);
    let stem = basename.split('.').next().unwrap_or(basename).to_uppercase();
    matches!(
        stem.as_str(),
        "LICENSE" | "LICENCE" | "COPYING" | "COPYRIGHT" | "UNLICENSE" | "NOTICE"
    ) || stem.starts_with("LICENSE-")
        || stem.starts_with("LICENCE-")
}

/// Detects a license from the head of a file's content.
pub fn detect(path: &str, head: &str) -> Option<License> {
    // An SPDX tag is exact wherever it appears.
    for line in head.lines() {
        if let Some(rest) = line.split("SPDX-License-Identifier:").nth(1) {
            let id = rest.trim().trim_end_matches("*/").trim();
            if !id.is_empty() {
                return Some(License {
                    name: id.to_string(),
                    confidence: 1.0,
                });
            }
        }
    }

    if !is_license_filename(path) {
        return None;
    }

    let hay = head.to_lowercase();
    let mut best: Option<License> = None;
    for (name, phrases) in CORPUS {
        let hits = phrases.iter().filter(|p| hay.contains(**p)).count();
        if hits == 0 {
            continue;
        }
        let confidence = hits as f32 / phrases.len() as f32;
        if confidence < MIN_CONFIDENCE {
            continue;
        }
        let better = match &best {
            Some(b) => confidence > b.confidence,
            None => true,
        };
        if better {
            best = Some(License {
                name: name.to_string(),
                confidence,
            });
        }
    }
    best
}
