//! Loads the optional asset files named in `[assets]` and assembles a
//! `MemorySystem` from them.

use std::fs;
use std::path::Path;

use highway_core::{
    FrequencyCalibration, FrequencyTable, MemoryConfig, MemorySystem, WordVectorTable,
};

use crate::config::HighwayConfig;
use crate::error::{Result, StoreError};

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        StoreError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read {}: {e}", path.display()),
        ))
    })
}

pub fn load_calibration(path: &Path) -> Result<FrequencyCalibration> {
    Ok(FrequencyCalibration::from_json(&read(path)?)?)
}

pub fn load_vectors(path: &Path) -> Result<WordVectorTable> {
    Ok(WordVectorTable::from_text(&read(path)?)?)
}

pub fn load_frequencies(path: &Path, config: &MemoryConfig) -> Result<FrequencyTable> {
    Ok(FrequencyTable::from_text(
        &read(path)?,
        config.frequency_fallback_avg_freq,
    )?)
}

/// Build an empty engine wired to every configured asset. Assets that are
/// not configured fall back to the engine defaults.
pub fn build_system(config: &HighwayConfig) -> Result<MemorySystem> {
    let assets = &config.assets;
    let mut builder =
        MemorySystem::builder(config.memory.clone()).segmenter(assets.segmenter.build());

    if let Some(path) = &assets.vectors {
        let vectors = load_vectors(path)?;
        tracing::info!(path = %path.display(), words = vectors.len(), "loaded word vectors");
        builder = builder.vectors(Box::new(vectors));
    }
    if let Some(path) = &assets.frequencies {
        let frequencies = load_frequencies(path, &config.memory)?;
        tracing::info!(path = %path.display(), words = frequencies.len(), "loaded frequencies");
        builder = builder.frequency(Box::new(frequencies));
    }
    if let Some(path) = &assets.calibration {
        builder = builder.calibration(load_calibration(path)?);
        tracing::info!(path = %path.display(), "loaded calibration");
    }

    Ok(builder.build())
}
