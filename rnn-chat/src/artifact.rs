// ============================================================================
// MODEL ARTIFACT - JSON (`.json`) or bincode (`.bin`) on disk
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RnnError};
use crate::model::{Model, ModelMeta, Params};
use crate::ops::Matrix;
use crate::vocab::Vocabulary;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactFormat {
    Json,
    Binary,
}

impl ArtifactFormat {
    /// `.bin` is bincode; anything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("bin") => ArtifactFormat::Binary,
            _ => ArtifactFormat::Json,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Json => "json",
            ArtifactFormat::Binary => "bin",
        }
    }
}

/// On-disk layout. Matrices are stored as arrays of rows.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelArtifact {
    #[serde(rename = "V")]
    pub vocab_size: usize,
    #[serde(rename = "H")]
    pub hidden_size: usize,
    pub vocab: BTreeMap<String, usize>,
    pub ivocab: BTreeMap<usize, String>,
    #[serde(rename = "Wxh")]
    pub wxh: Vec<Vec<f32>>,
    #[serde(rename = "Whh")]
    pub whh: Vec<Vec<f32>>,
    #[serde(rename = "Why")]
    pub why: Vec<Vec<f32>>,
    pub bh: Vec<f32>,
    pub by: Vec<f32>,
    #[serde(default)]
    pub meta: ModelMeta,
}

impl ModelArtifact {
    pub fn from_model(model: &Model) -> Self {
        let p = model.params();
        let tokens = model.vocab().tokens();
        ModelArtifact {
            vocab_size: model.vocab_size(),
            hidden_size: model.hidden_size(),
            vocab: tokens.iter().enumerate().map(|(i, t)| (t.clone(), i)).collect(),
            ivocab: tokens.iter().enumerate().map(|(i, t)| (i, t.clone())).collect(),
            wxh: p.wxh.to_rows(),
            whh: p.whh.to_rows(),
            why: p.why.to_rows(),
            bh: p.bh.clone(),
            by: p.by.clone(),
            meta: model.meta.clone(),
        }
    }

    /// Validates every field and builds a model; nothing is accepted partially.
    pub fn into_model(self) -> Result<Model> {
        let (v, h) = (self.vocab_size, self.hidden_size);
        if v == 0 || h == 0 {
            return Err(RnnError::Artifact(format!("V and H must be positive (V={}, H={})", v, h)));
        }
        if self.ivocab.len() != v || self.vocab.len() != v {
            return Err(RnnError::Artifact(format!(
                "V={} but vocab has {} and ivocab has {} entries", v, self.vocab.len(), self.ivocab.len())));
        }
        let mut ordered = Vec::with_capacity(v);
        for id in 0..v {
            let token = self.ivocab.get(&id)
                .ok_or_else(|| RnnError::Artifact(format!("ivocab is missing id {}", id)))?;
            if self.vocab.get(token) != Some(&id) {
                return Err(RnnError::Artifact(format!("vocab and ivocab disagree on {:?}", token)));
            }
            ordered.push(token.clone());
        }
        let vocab = Vocabulary::from_ordered(ordered)?;

        if self.bh.len() != h {
            return Err(RnnError::Artifact(format!("bh has {} entries, expected {}", self.bh.len(), h)));
        }
        if self.by.len() != v {
            return Err(RnnError::Artifact(format!("by has {} entries, expected {}", self.by.len(), v)));
        }
        let params = Params {
            wxh: Matrix::from_rows("Wxh", &self.wxh, h, v)?,
            whh: Matrix::from_rows("Whh", &self.whh, h, h)?,
            why: Matrix::from_rows("Why", &self.why, v, h)?,
            bh: self.bh,
            by: self.by,
        };
        Model::new(params, vocab, self.meta)
    }

    pub fn to_bytes(&self, format: ArtifactFormat) -> Result<Vec<u8>> {
        Ok(match format {
            ArtifactFormat::Json => serde_json::to_vec(self)?,
            ArtifactFormat::Binary => bincode::serialize(self)?,
        })
    }

    pub fn from_bytes(bytes: &[u8], format: ArtifactFormat) -> Result<Self> {
        Ok(match format {
            ArtifactFormat::Json => {
                let mut value: serde_json::Value = serde_json::from_slice(bytes)?;
                ivocab_list_to_map(&mut value);
                serde_json::from_value(value)?
            }
            ArtifactFormat::Binary => bincode::deserialize(bytes)?,
        })
    }
}

// Older artifacts store `ivocab` as a plain array whose index is the id.
fn ivocab_list_to_map(value: &mut serde_json::Value) {
    if let Some(ivocab) = value.get_mut("ivocab") {
        if let serde_json::Value::Array(list) = ivocab {
            let map = list.drain(..).enumerate().map(|(i, t)| (i.to_string(), t)).collect();
            *ivocab = serde_json::Value::Object(map);
        }
    }
}

pub fn save_model(model: &Model, path: &Path) -> Result<()> {
    let format = ArtifactFormat::from_path(path);
    let bytes = ModelArtifact::from_model(model).to_bytes(format)?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, &bytes)?;
    tracing::info!(path = %path.display(), format = ?format, "saved model ({:.2} MB)", bytes.len() as f64 / 1_048_576.0);
    Ok(())
}

pub fn load_model(path: &Path) -> Result<Model> {
    let format = ArtifactFormat::from_path(path);
    let bytes = fs::read(path)?;
    let model = ModelArtifact::from_bytes(&bytes, format)?.into_model()?;
    tracing::info!(path = %path.display(), vocab = model.vocab_size(), hidden = model.hidden_size(),
        "loaded model ({} params)", model.params().total_params());
    Ok(model)
}

// ============================================================================
// TIMESTAMPS
// ============================================================================

struct Civil { y: i64, mo: u32, d: u32, h: i64, m: i64, s: i64, ms: u32 }

fn civil_now() -> Civil {
    civil_from(SystemTime::now())
}

fn civil_from(t: SystemTime) -> Civil {
    let now = t.duration_since(UNIX_EPOCH).unwrap_or_default();
    let (secs, ms) = (now.as_secs() as i64, now.subsec_millis());
    let (days, tod) = (secs / 86400, secs % 86400);
    let mut y = 1970i64; let mut rd = days;
    loop {
        let diy = if (y % 4 == 0 && y % 100 != 0) || y % 400 == 0 { 366 } else { 365 };
        if rd < diy { break; } rd -= diy; y += 1;
    }
    let leap = (y % 4 == 0 && y % 100 != 0) || y % 400 == 0;
    let md = [31, if leap { 29 } else { 28 }, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut mo = 0;
    for d in md { if rd < d { break; } rd -= d; mo += 1; }
    Civil { y, mo: mo + 1, d: rd as u32 + 1, h: tod / 3600, m: (tod % 3600) / 60, s: tod % 60, ms }
}

/// UTC `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn iso_timestamp() -> String {
    let c = civil_now();
    format!("{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z", c.y, c.mo, c.d, c.h, c.m, c.s, c.ms)
}

/// UTC `YYYY-MM-DD HH:MM:SS`, for listings.
pub fn format_utc(t: SystemTime) -> String {
    let c = civil_from(t);
    format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", c.y, c.mo, c.d, c.h, c.m, c.s)
}

/// `rnn_<dataset stem>_H<H>_<YYYYmmdd_HHMMSS>.<ext>`
pub fn default_model_filename(dataset: &str, hidden_size: usize, format: ArtifactFormat) -> String {
    let stem = Path::new(dataset).file_stem().and_then(|s| s.to_str()).unwrap_or("model");
    let c = civil_now();
    format!("rnn_{}_H{}_{:04}{:02}{:02}_{:02}{:02}{:02}.{}",
        stem, hidden_size, c.y, c.mo, c.d, c.h, c.m, c.s, format.extension())
}
